//! Muskingum routing parameter computation
//!
//! This module computes the per-reach Muskingum parameter files RAPID
//! consumes: the Kfac travel-time scaling factor, the calibrated K file, and
//! the X attenuation weighting files. All outputs are headerless CSVs with
//! one value per line, in connectivity-table row order.

use crate::connectivity::{count_csv_rows, Connectivity};
use crate::drainage::DrainageLine;
use crate::errors::{RapidPrepError, Result};
use ndarray::Array1;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Lower clip bound (percent) for the filtered Kfac formula.
const PERCENTILE_LOW: f64 = 5.0;
/// Upper clip bound (percent) for the filtered Kfac formula.
const PERCENTILE_HIGH: f64 = 95.0;

/// Slope assigned when a reach and its neighbors provide no usable slope.
const MIN_SLOPE: f64 = 0.001;

/// The three Kfac formulas supported by RAPID preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KfacFormula {
    /// Formula 1: river length / celerity
    LengthCelerity,
    /// Formula 2: eta * river length / sqrt(river slope)
    EtaLengthSlope,
    /// Formula 3: formula 2 with length/sqrt(slope) clipped to its
    /// 5th-95th percentiles before averaging
    EtaLengthSlopeClipped,
}

impl KfacFormula {
    /// Map the conventional formula number (1-3) onto a variant.
    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(KfacFormula::LengthCelerity),
            2 => Ok(KfacFormula::EtaLengthSlope),
            3 => Ok(KfacFormula::EtaLengthSlopeClipped),
            other => Err(RapidPrepError::InvalidFormula(other)),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            KfacFormula::LengthCelerity => "River Length/Celerity",
            KfacFormula::EtaLengthSlope => "Eta*River Length/Sqrt(River Slope)",
            KfacFormula::EtaLengthSlopeClipped => {
                "Eta*River Length/Sqrt(River Slope) [0.05, 0.95]"
            }
        }
    }
}

/// Aggregates reported by a Kfac computation.
///
/// `eta` is `None` for the plain length/celerity formula.
#[derive(Debug, Clone, Copy)]
pub struct KfacSummary {
    pub reach_count: usize,
    pub eta: Option<f64>,
}

/// Compute per-reach Kfac values in connectivity-table order.
///
/// Reaches referenced by the connectivity table but missing from the
/// drainage line dataset contribute zero length. For the eta formulas, a
/// non-positive slope falls back to the average of the downstream and first
/// upstream reach slopes, then to 0.001.
pub fn compute_kfac(
    drainage: &DrainageLine,
    connectivity: &Connectivity,
    celerity: f64,
    formula: KfacFormula,
) -> Result<(Vec<f64>, KfacSummary)> {
    if celerity <= 0.0 {
        return Err(RapidPrepError::InvalidParameter {
            name: "celerity".to_string(),
            message: format!("{} m/s is not a positive wave celerity", celerity),
        });
    }

    println!("{}", formula.description());

    if let KfacFormula::LengthCelerity = formula {
        let kfac: Vec<f64> = connectivity
            .rows()
            .iter()
            .map(|row| reach_length_m(drainage, row.rivid) / celerity)
            .collect();
        let summary = KfacSummary {
            reach_count: kfac.len(),
            eta: None,
        };
        return Ok((kfac, summary));
    }

    // Eta formulas: accumulate both populations over all reaches first
    let mut length_slope = Vec::with_capacity(connectivity.len());
    let mut length_celerity = Vec::with_capacity(connectivity.len());

    for row in connectivity.rows() {
        let length_m = reach_length_m(drainage, row.rivid);

        let mut slope = drainage
            .index_of(row.rivid)
            .map(|i| drainage.slope(i))
            .unwrap_or(0.0);
        if slope <= 0.0 {
            let down = drainage.slope_of(row.next_down_id);
            let up = row
                .first_upstream()
                .map(|id| drainage.slope_of(id))
                .unwrap_or(0.0);
            slope = (down + up) / 2.0;
            if slope <= 0.0 {
                slope = MIN_SLOPE;
            }
        }

        length_slope.push(length_m / slope.sqrt());
        length_celerity.push(length_m / celerity);
    }

    let mut length_slope = Array1::from(length_slope);

    if let KfacFormula::EtaLengthSlopeClipped = formula {
        println!("Filtering data by 5th and 95th percentiles ...");
        let low = percentile(length_slope.as_slice().unwrap_or(&[]), PERCENTILE_LOW)?;
        let high = percentile(length_slope.as_slice().unwrap_or(&[]), PERCENTILE_HIGH)?;
        length_slope.mapv_inplace(|v| v.clamp(low, high));
    }

    let celerity_mean = parallel_mean(&length_celerity);
    let slope_mean = parallel_mean(length_slope.as_slice().unwrap_or(&[]));
    if slope_mean == 0.0 {
        return Err(RapidPrepError::Generic(
            "Cannot compute eta: mean length/sqrt(slope) is zero".to_string(),
        ));
    }
    let eta = celerity_mean / slope_mean;

    println!("Kfac2 average: {}", celerity_mean);
    println!("Length/slope average: {}", slope_mean);
    println!("Eta: {}", eta);

    let kfac: Vec<f64> = length_slope.iter().map(|&v| eta * v).collect();
    let summary = KfacSummary {
        reach_count: kfac.len(),
        eta: Some(eta),
    };
    Ok((kfac, summary))
}

/// Compute Kfac values and write them, one per line, to `out_path`.
pub fn write_kfac_file<P: AsRef<Path>>(
    drainage: &DrainageLine,
    connectivity: &Connectivity,
    celerity: f64,
    formula: KfacFormula,
    out_path: P,
) -> Result<KfacSummary> {
    let (kfac, summary) = compute_kfac(drainage, connectivity, celerity, formula)?;
    write_scalar_file(&kfac, out_path)?;
    Ok(summary)
}

/// Write the Muskingum K file: `K = lambda_k * Kfac`, row-by-row.
///
/// `lambda_k` is the calibration constant RAPID reports; 0.35 is a
/// reasonable default when no calibration has been performed.
pub fn write_k_file<P: AsRef<Path>, Q: AsRef<Path>>(
    lambda_k: f64,
    kfac_path: P,
    out_path: Q,
) -> Result<usize> {
    let kfac_path = kfac_path.as_ref();
    let reader = BufReader::new(File::open(kfac_path)?);
    let out = File::create(out_path.as_ref())?;
    let mut writer = BufWriter::new(out);

    let mut count = 0;
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // First cell only; Kfac files are single-column
        let cell = line.split(',').next().unwrap_or(line);
        let kfac: f64 = cell.parse().map_err(|_| RapidPrepError::CsvParse {
            path: kfac_path.to_path_buf(),
            line: line_idx + 1,
            message: format!("'{}' is not a number", cell),
        })?;
        writeln!(writer, "{}", lambda_k * kfac)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Write a constant Muskingum X value once per connectivity-table row.
pub fn write_const_x_file<P: AsRef<Path>, Q: AsRef<Path>>(
    x_value: f64,
    connectivity_path: P,
    out_path: Q,
) -> Result<usize> {
    if !(0.0..=0.5).contains(&x_value) {
        return Err(RapidPrepError::InvalidParameter {
            name: "x_value".to_string(),
            message: format!("{} is outside the Muskingum X range [0, 0.5]", x_value),
        });
    }

    let num_rivers = count_csv_rows(connectivity_path)?;
    let values = vec![x_value; num_rivers];
    write_scalar_file(&values, out_path)?;
    Ok(num_rivers)
}

/// Copy a per-feature Muskingum X attribute from the drainage-line
/// shapefile, one value per line in feature order.
pub fn write_x_file_from_field<P: AsRef<Path>, Q: AsRef<Path>>(
    drainage_line_path: P,
    x_field: &str,
    out_path: Q,
) -> Result<usize> {
    let values = crate::drainage::read_numeric_field(drainage_line_path, x_field)?;
    write_scalar_file(&values, out_path)?;
    Ok(values.len())
}

/// Length in meters for a reach ID, zero when the reach is not in the
/// drainage-line dataset.
fn reach_length_m(drainage: &DrainageLine, rivid: i32) -> f64 {
    drainage
        .index_of(rivid)
        .map(|i| drainage.length_m(i))
        .unwrap_or(0.0)
}

/// Write one scalar per line to a headerless CSV.
fn write_scalar_file<P: AsRef<Path>>(values: &[f64], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    for v in values {
        writeln!(writer, "{}", v)?;
    }
    writer.flush()?;
    Ok(())
}

/// Mean of a slice using a parallel sum.
fn parallel_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.par_iter().sum::<f64>() / values.len() as f64
}

/// Percentile with linear interpolation between order statistics.
fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(RapidPrepError::Generic(
            "Cannot take a percentile of an empty array".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Ok(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
