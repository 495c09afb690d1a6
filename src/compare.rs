//! Output file comparison utilities
//!
//! Tolerance-based comparison of generated CSV parameter files, timeseries
//! CSVs and Qout NetCDF files against reference solutions. Used both by the
//! CLI and by regression tests around RAPID runs.

use crate::errors::{RapidPrepError, Result};
use netcdf::File;
use std::fs::File as FsFile;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Absolute tolerance for per-cell CSV comparison (two decimal places).
const CSV_ABS_TOLERANCE: f64 = 1.5e-2;

/// Relative and absolute tolerances for NetCDF discharge comparison.
const NC_REL_TOLERANCE: f64 = 1e-5;
const NC_ABS_TOLERANCE: f64 = 1e-8;

/// Compare two CSV files of decimal values cell-by-cell.
///
/// Files must have the same number of rows. When `header` is set, the first
/// rows must match exactly; all other cells must parse as numbers and agree
/// within an absolute tolerance of two decimal places.
pub fn compare_csv_decimal_files<P: AsRef<Path>, Q: AsRef<Path>>(
    file1: P,
    file2: Q,
    header: bool,
) -> Result<bool> {
    compare_csv(file1.as_ref(), file2.as_ref(), header, 0)
}

/// Compare two timeseries CSV files.
///
/// Like [`compare_csv_decimal_files`], except the first column (dates) is
/// compared as an exact string.
pub fn compare_csv_timeseries_files<P: AsRef<Path>, Q: AsRef<Path>>(
    file1: P,
    file2: Q,
    header: bool,
) -> Result<bool> {
    compare_csv(file1.as_ref(), file2.as_ref(), header, 1)
}

fn compare_csv(file1: &Path, file2: &Path, header: bool, exact_cols: usize) -> Result<bool> {
    let rows1 = read_rows(file1)?;
    let rows2 = read_rows(file2)?;

    if rows1.len() != rows2.len() {
        println!(
            "Row count mismatch: {} has {}, {} has {}",
            file1.display(),
            rows1.len(),
            file2.display(),
            rows2.len()
        );
        return Ok(false);
    }

    let mut rows = rows1.iter().zip(rows2.iter()).enumerate();

    if header {
        if let Some((_, (h1, h2))) = rows.next() {
            if h1 != h2 {
                println!("Header mismatch: {:?} vs {:?}", h1, h2);
                return Ok(false);
            }
        }
    }

    for (row_idx, (r1, r2)) in rows {
        if r1.len() != r2.len() {
            println!("Column count mismatch at row {}", row_idx + 1);
            return Ok(false);
        }
        for (col_idx, (c1, c2)) in r1.iter().zip(r2.iter()).enumerate() {
            if col_idx < exact_cols {
                if c1 != c2 {
                    println!(
                        "Mismatch at row {}, column {}: '{}' vs '{}'",
                        row_idx + 1,
                        col_idx + 1,
                        c1,
                        c2
                    );
                    return Ok(false);
                }
                continue;
            }

            let v1 = parse_cell(c1, file1, row_idx + 1)?;
            let v2 = parse_cell(c2, file2, row_idx + 1)?;
            if (v1 - v2).abs() > CSV_ABS_TOLERANCE {
                println!(
                    "Mismatch at row {}, column {}: {} vs {}",
                    row_idx + 1,
                    col_idx + 1,
                    v1,
                    v2
                );
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Compare the discharge variables of two Qout NetCDF files.
///
/// Shapes must match; values are compared with `np.allclose`-style combined
/// relative and absolute tolerance.
pub fn compare_qout_files<P: AsRef<Path>, Q: AsRef<Path>>(file1: P, file2: Q) -> Result<bool> {
    let nc1 = netcdf::open(file1.as_ref())?;
    let nc2 = netcdf::open(file2.as_ref())?;

    let (data1, shape1) = read_discharge_values(&nc1)?;
    let (data2, shape2) = read_discharge_values(&nc2)?;

    if shape1 != shape2 {
        println!("Discharge shape mismatch: {:?} vs {:?}", shape1, shape2);
        return Ok(false);
    }

    let mut mismatches = 0usize;
    for (&a, &b) in data1.iter().zip(data2.iter()) {
        let (a, b) = (a as f64, b as f64);
        if (a - b).abs() > NC_ABS_TOLERANCE + NC_REL_TOLERANCE * b.abs() {
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        println!(
            "Discharge mismatch: {} of {} values outside tolerance",
            mismatches,
            data1.len()
        );
        return Ok(false);
    }

    Ok(true)
}

fn read_discharge_values(file: &File) -> Result<(Vec<f32>, Vec<usize>)> {
    for name in ["Qout", "m3_riv"] {
        if let Some(var) = file.variable(name) {
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
            let values: Vec<f32> = var.get_values::<f32, _>(..)?;
            return Ok((values, shape));
        }
    }
    Err(RapidPrepError::VariableNotFound {
        var: "Qout/m3_riv".to_string(),
    })
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = FsFile::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rows.push(line.split(',').map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}

fn parse_cell(cell: &str, path: &Path, line: usize) -> Result<f64> {
    cell.parse::<f64>().map_err(|_| RapidPrepError::CsvParse {
        path: path.to_path_buf(),
        line,
        message: format!("'{}' is not a number", cell),
    })
}
