//! RAPID output post-processing
//!
//! Converts raw RAPID discharge output (`Qout`) to CF-1.6 compliant NetCDF,
//! generates initial-flow (Qinit) files from a past simulation, and extracts
//! per-reach discharge time series to CSV.

use crate::connectivity::Connectivity;
use crate::errors::{RapidPrepError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ndarray::{Array1, Array2};
use netcdf::{create, File};
use std::collections::HashMap;
use std::fs;
use std::fs::File as FsFile;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Variable names RAPID has used for discharge output, probed in order.
const DISCHARGE_VARS: &[&str] = &["Qout", "m3_riv"];

/// Attributes and lat/lon/z metadata for a CF conversion.
#[derive(Debug, Clone)]
pub struct CfConversion {
    /// Simulation start (UTC, naive)
    pub start_datetime: NaiveDateTime,
    /// Routing time step in seconds (spacing of the output time axis)
    pub time_step_seconds: i64,
    /// Optional `comid_lat_lon_z` CSV with per-reach coordinates
    pub comid_lat_lon_z_file: Option<PathBuf>,
    /// Value of the `title` global attribute
    pub project_name: String,
}

/// Select a reach either by its ID or by its position in the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachSelector {
    Id(i32),
    Index(usize),
}

/// Convert a raw RAPID Qout file to CF-1.6 `timeSeries` NetCDF.
///
/// The raw layout is `Qout(Time, COMID)` with no coordinate variables. The
/// converted file carries `time`, `rivid`, optional `lat`/`lon`/`z` and a
/// `crs` grid mapping, and replaces the original atomically (written to a
/// sibling temp file, then renamed). Files that already have a `time`
/// variable are considered CF compliant and left untouched; returns whether
/// a conversion happened.
pub fn convert_qout_to_cf<P: AsRef<Path>, Q: AsRef<Path>>(
    qout_path: P,
    connectivity_path: Q,
    conversion: &CfConversion,
) -> Result<bool> {
    let qout_path = qout_path.as_ref();
    let file = netcdf::open(qout_path)?;

    if file.variable("time").is_some() {
        println!("Qout file already CF compliant, skipping conversion");
        return Ok(false);
    }

    let (discharge, n_time, n_riv) = read_discharge(&file)?;

    let connectivity = Connectivity::from_csv(connectivity_path)?;
    if connectivity.len() != n_riv {
        return Err(RapidPrepError::Generic(format!(
            "Connectivity file has {} reaches but Qout file has {}",
            connectivity.len(),
            n_riv
        )));
    }
    let rivids = connectivity.rivids();

    let coordinates = match &conversion.comid_lat_lon_z_file {
        Some(path) => Some(read_comid_lat_lon_z(path)?),
        None => None,
    };

    let start_epoch = conversion.start_datetime.and_utc().timestamp();
    let times: Vec<i32> = (0..n_time)
        .map(|i| (start_epoch + i as i64 * conversion.time_step_seconds) as i32)
        .collect();

    let tmp_path = qout_path.with_extension("cf_tmp.nc");
    if tmp_path.exists() {
        fs::remove_file(&tmp_path)?;
    }

    {
        let mut out = create(&tmp_path)?;
        out.add_dimension("time", n_time)?;
        out.add_dimension("rivid", n_riv)?;

        let mut time_var = out.add_variable::<i32>("time", &["time"])?;
        time_var.put_attribute("long_name", "time")?;
        time_var.put_attribute("standard_name", "time")?;
        time_var.put_attribute("units", "seconds since 1970-01-01 00:00:00+00:00")?;
        time_var.put_attribute("calendar", "gregorian")?;
        time_var.put_attribute("axis", "T")?;
        time_var.put(Array1::from(times).view(), ..)?;

        let mut rivid_var = out.add_variable::<i32>("rivid", &["rivid"])?;
        rivid_var.put_attribute("long_name", "unique identifier for each river reach")?;
        rivid_var.put_attribute("units", "1")?;
        rivid_var.put_attribute("cf_role", "timeseries_id")?;
        rivid_var.put(Array1::from(rivids.clone()).view(), ..)?;

        let mut q_var = out.add_variable::<f32>("Qout", &["time", "rivid"])?;
        q_var.put_attribute(
            "long_name",
            "average river water discharge downstream of each river reach",
        )?;
        q_var.put_attribute("units", "m3 s-1")?;
        if coordinates.is_some() {
            q_var.put_attribute("coordinates", "lon lat z")?;
        }
        q_var.put_attribute("grid_mapping", "crs")?;
        q_var.put_attribute("cell_methods", "time: point")?;
        q_var.put(discharge.view(), ..)?;

        if let Some(coords) = &coordinates {
            let mut lats = Vec::with_capacity(n_riv);
            let mut lons = Vec::with_capacity(n_riv);
            let mut zs = Vec::with_capacity(n_riv);
            for rivid in &rivids {
                let (lat, lon, z) = coords.get(rivid).copied().unwrap_or((0.0, 0.0, 0.0));
                lats.push(lat);
                lons.push(lon);
                zs.push(z);
            }

            let mut lat_var = out.add_variable::<f64>("lat", &["rivid"])?;
            lat_var.put_attribute("long_name", "latitude of the river reach midpoint")?;
            lat_var.put_attribute("standard_name", "latitude")?;
            lat_var.put_attribute("units", "degrees_north")?;
            lat_var.put_attribute("axis", "Y")?;
            lat_var.put(Array1::from(lats).view(), ..)?;

            let mut lon_var = out.add_variable::<f64>("lon", &["rivid"])?;
            lon_var.put_attribute("long_name", "longitude of the river reach midpoint")?;
            lon_var.put_attribute("standard_name", "longitude")?;
            lon_var.put_attribute("units", "degrees_east")?;
            lon_var.put_attribute("axis", "X")?;
            lon_var.put(Array1::from(lons).view(), ..)?;

            let mut z_var = out.add_variable::<f64>("z", &["rivid"])?;
            z_var.put_attribute("long_name", "elevation of the river reach midpoint")?;
            z_var.put_attribute("standard_name", "height")?;
            z_var.put_attribute("units", "m")?;
            z_var.put_attribute("axis", "Z")?;
            z_var.put_attribute("positive", "up")?;
            z_var.put(Array1::from(zs).view(), ..)?;
        }

        let mut crs_var = out.add_variable::<i32>("crs", &[])?;
        crs_var.put_attribute("grid_mapping_name", "latitude_longitude")?;
        crs_var.put_attribute("epsg_code", "EPSG:4326")?;
        crs_var.put_attribute("semi_major_axis", 6378137.0f64)?;
        crs_var.put_attribute("inverse_flattening", 298.257223563f64)?;
        crs_var.put_values(&[0i32], ..)?;

        out.add_attribute("Conventions", "CF-1.6")?;
        out.add_attribute("title", conversion.project_name.as_str())?;
        out.add_attribute("featureType", "timeSeries")?;
        out.add_attribute("source", "RAPID river routing output")?;
        out.add_attribute(
            "history",
            format!("Converted by rapid_prep on {}", Utc::now().to_rfc3339()),
        )?;
    }

    drop(file);
    fs::rename(&tmp_path, qout_path)?;
    println!("Converted {} to CF-1.6", qout_path.display());
    Ok(true)
}

/// Write a Qinit file from one time step of a past Qout simulation.
///
/// Takes the last time step unless `time_index` is given. Flows are written
/// one per line, in connectivity-table order; when the Qout file carries a
/// `rivid` coordinate its ordering is honored, otherwise the discharge
/// columns are assumed to already follow the connectivity order.
pub fn write_qinit_from_qout<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    qout_path: P,
    connectivity_path: Q,
    qinit_path: R,
    time_index: Option<usize>,
) -> Result<usize> {
    let file = netcdf::open(qout_path.as_ref())?;
    let var = discharge_variable(&file)?;
    let (n_time, n_riv) = discharge_shape(&var)?;

    let idx = time_index.unwrap_or(n_time.saturating_sub(1));
    if idx >= n_time {
        return Err(RapidPrepError::Generic(format!(
            "Time index {} out of range ({} time steps)",
            idx, n_time
        )));
    }

    let flows: Vec<f64> = var.get_values::<f64, _>((idx..idx + 1, 0..n_riv))?;

    let connectivity = Connectivity::from_csv(connectivity_path)?;
    if connectivity.len() != n_riv {
        return Err(RapidPrepError::Generic(format!(
            "Connectivity file has {} reaches but Qout file has {}",
            connectivity.len(),
            n_riv
        )));
    }

    // Reorder through the file's rivid coordinate when present
    let ordered: Vec<f64> = match file_rivids(&file)? {
        Some(file_ids) => {
            let position: HashMap<i32, usize> = file_ids
                .iter()
                .enumerate()
                .map(|(i, &id)| (id, i))
                .collect();
            connectivity
                .rivids()
                .iter()
                .map(|rivid| {
                    position
                        .get(rivid)
                        .map(|&i| flows[i])
                        .ok_or(RapidPrepError::ReachNotFound { rivid: *rivid })
                })
                .collect::<Result<_>>()?
        }
        None => flows,
    };

    let out = FsFile::create(qinit_path.as_ref())?;
    let mut writer = BufWriter::new(out);
    for flow in &ordered {
        writeln!(writer, "{}", flow)?;
    }
    writer.flush()?;

    println!("Wrote {} initial flows from time step {}", ordered.len(), idx);
    Ok(ordered.len())
}

/// Extract the discharge series for one reach to CSV.
///
/// With a valid CF time axis the rows are `datetime,flow` (or per-day
/// averages when `daily` is set); without one, bare flows are written.
/// Returns whether a valid time axis was found.
pub fn write_flows_to_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    qout_path: P,
    out_csv: Q,
    reach: ReachSelector,
    daily: bool,
) -> Result<bool> {
    let file = netcdf::open(qout_path.as_ref())?;
    let var = discharge_variable(&file)?;
    let (n_time, n_riv) = discharge_shape(&var)?;

    let idx = match reach {
        ReachSelector::Index(i) => i,
        ReachSelector::Id(rivid) => {
            let ids = file_rivids(&file)?
                .ok_or(RapidPrepError::ReachNotFound { rivid })?;
            ids.iter()
                .position(|&id| id == rivid)
                .ok_or(RapidPrepError::ReachNotFound { rivid })?
        }
    };
    if idx >= n_riv {
        return Err(RapidPrepError::Generic(format!(
            "Reach index {} out of range ({} reaches)",
            idx, n_riv
        )));
    }

    let flows: Vec<f64> = var.get_values::<f64, _>((0..n_time, idx..idx + 1))?;
    let times = read_time_axis(&file, n_time)?;

    let out = FsFile::create(out_csv.as_ref())?;
    let mut writer = BufWriter::new(out);

    match times {
        Some(times) if daily => {
            if times.is_empty() {
                writer.flush()?;
                return Ok(true);
            }
            // Average consecutive samples sharing a calendar day
            let mut current_day = times[0].date_naive();
            let mut day_sum = 0.0;
            let mut day_count = 0usize;
            for (time, flow) in times.iter().zip(flows.iter()) {
                let day = time.date_naive();
                if day != current_day {
                    writeln!(writer, "{},{}", current_day, day_sum / day_count as f64)?;
                    current_day = day;
                    day_sum = 0.0;
                    day_count = 0;
                }
                day_sum += flow;
                day_count += 1;
            }
            if day_count > 0 {
                writeln!(writer, "{},{}", current_day, day_sum / day_count as f64)?;
            }
            writer.flush()?;
            Ok(true)
        }
        Some(times) => {
            for (time, flow) in times.iter().zip(flows.iter()) {
                writeln!(writer, "{},{}", time.format("%Y-%m-%d %H:%M:%S"), flow)?;
            }
            writer.flush()?;
            Ok(true)
        }
        None => {
            if daily {
                println!("Warning: no valid time axis, writing raw flows instead of daily means");
            }
            for flow in &flows {
                writeln!(writer, "{}", flow)?;
            }
            writer.flush()?;
            Ok(false)
        }
    }
}

/// The discharge variable of a Qout file.
fn discharge_variable<'f>(file: &'f File) -> Result<netcdf::Variable<'f>> {
    for name in DISCHARGE_VARS {
        if let Some(var) = file.variable(name) {
            return Ok(var);
        }
    }
    Err(RapidPrepError::VariableNotFound {
        var: DISCHARGE_VARS.join("/"),
    })
}

/// The (time, rivid) dimension sizes of a discharge variable.
fn discharge_shape(var: &netcdf::Variable) -> Result<(usize, usize)> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    if shape.len() != 2 {
        return Err(RapidPrepError::Generic(format!(
            "Expected 2-dimensional discharge variable, got {} dimensions",
            shape.len()
        )));
    }
    Ok((shape[0], shape[1]))
}

/// Full discharge array as (time, rivid), plus the dimension sizes.
fn read_discharge(file: &File) -> Result<(Array2<f32>, usize, usize)> {
    let var = discharge_variable(file)?;
    let (n_time, n_riv) = discharge_shape(&var)?;
    let values: Vec<f32> = var.get_values::<f32, _>(..)?;
    let array = Array2::from_shape_vec((n_time, n_riv), values)?;
    Ok((array, n_time, n_riv))
}

/// Reach IDs from the file's `rivid` (or legacy `COMID`) coordinate.
fn file_rivids(file: &File) -> Result<Option<Vec<i32>>> {
    for name in ["rivid", "COMID"] {
        if let Some(var) = file.variable(name) {
            return Ok(Some(var.get_values::<i32, _>(..)?));
        }
    }
    Ok(None)
}

/// CF time axis as UTC datetimes, `None` when absent or unusable.
fn read_time_axis(file: &File, n_time: usize) -> Result<Option<Vec<DateTime<Utc>>>> {
    let var = match file.variable("time") {
        Some(v) => v,
        None => return Ok(None),
    };

    let seconds: Vec<i64> = var.get_values::<i64, _>(..)?;
    if seconds.len() != n_time || seconds.iter().all(|&s| s <= 0) {
        return Ok(None);
    }

    let times = seconds
        .iter()
        .map(|&s| Utc.timestamp_opt(s, 0).single())
        .collect::<Option<Vec<_>>>();
    Ok(times)
}

/// Parse a `comid_lat_lon_z` CSV into rivid -> (lat, lon, z).
///
/// A header row is detected by its first cell not parsing as a number.
fn read_comid_lat_lon_z(path: &Path) -> Result<HashMap<i32, (f64, f64, f64)>> {
    let file = FsFile::open(path)?;
    let reader = BufReader::new(file);

    let mut coords = HashMap::new();
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if line_idx == 0 && cells[0].parse::<f64>().is_err() {
            continue; // header
        }
        if cells.len() < 4 {
            return Err(RapidPrepError::CsvParse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                message: format!("expected 4 columns (id, lat, lon, z), got {}", cells.len()),
            });
        }

        let parse = |cell: &str| -> Result<f64> {
            cell.parse::<f64>().map_err(|_| RapidPrepError::CsvParse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                message: format!("'{}' is not a number", cell),
            })
        };

        let rivid = parse(cells[0])? as i32;
        coords.insert(rivid, (parse(cells[1])?, parse(cells[2])?, parse(cells[3])?));
    }

    Ok(coords)
}
