//! RAPID connectivity table parsing
//!
//! The connectivity file is a headerless CSV encoding the routing topology:
//! one row per river reach with its ID, the downstream reach ID, the number
//! of upstream reaches, and the upstream reach IDs (zero-padded to a common
//! width). Row order is significant and is preserved: every per-reach
//! parameter file RAPID consumes must line up with this order.

use crate::errors::{RapidPrepError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One row of the connectivity table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityRow {
    /// River reach ID
    pub rivid: i32,
    /// Downstream reach ID (0 if the reach is an outlet)
    pub next_down_id: i32,
    /// Declared number of upstream reaches
    pub n_upstream: usize,
    /// Upstream reach IDs, possibly zero-padded
    pub upstream: Vec<i32>,
}

impl ConnectivityRow {
    /// The first upstream reach ID, if the reach has one.
    ///
    /// Zero padding counts as "no upstream reach".
    pub fn first_upstream(&self) -> Option<i32> {
        self.upstream.first().copied().filter(|&id| id != 0)
    }
}

/// Parsed connectivity table, rows in file order.
#[derive(Debug, Clone)]
pub struct Connectivity {
    rows: Vec<ConnectivityRow>,
}

impl Connectivity {
    /// Read a connectivity table from a RAPID `rapid_connect.csv` file.
    ///
    /// Blank lines are skipped. Any cell that does not parse as an integer
    /// is an error carrying the file path and line number.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut rows = Vec::new();
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let cells = parse_int_row(line, path, line_idx + 1)?;
            if cells.len() < 3 {
                return Err(RapidPrepError::CsvParse {
                    path: path.to_path_buf(),
                    line: line_idx + 1,
                    message: format!(
                        "expected at least 3 columns (rivid, next_down_id, n_upstream), got {}",
                        cells.len()
                    ),
                });
            }

            rows.push(ConnectivityRow {
                rivid: cells[0],
                next_down_id: cells[1],
                n_upstream: cells[2].max(0) as usize,
                upstream: cells[3..].to_vec(),
            });
        }

        Ok(Self { rows })
    }

    /// Number of reaches (rows) in the table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in original file order.
    pub fn rows(&self) -> &[ConnectivityRow] {
        &self.rows
    }

    /// Reach IDs in original file order.
    pub fn rivids(&self) -> Vec<i32> {
        self.rows.iter().map(|r| r.rivid).collect()
    }

    /// Maximum declared number of upstream reaches over all rows.
    pub fn max_upstream(&self) -> usize {
        self.rows.iter().map(|r| r.n_upstream).max().unwrap_or(0)
    }
}

fn parse_int_row(line: &str, path: &Path, line_no: usize) -> Result<Vec<i32>> {
    line.split(',')
        .map(|cell| {
            let cell = cell.trim();
            // Some tools write connectivity IDs as floats ("17.0")
            cell.parse::<i32>()
                .or_else(|_| cell.parse::<f64>().map(|v| v as i32))
                .map_err(|_| RapidPrepError::CsvParse {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: format!("'{}' is not an integer", cell),
                })
        })
        .collect()
}

/// Count the non-blank rows of a CSV file.
///
/// Used for `IS_riv_bas` (basin ID file) and for constant-X generation,
/// where only the row count matters.
pub fn count_csv_rows<P: AsRef<Path>>(path: P) -> Result<usize> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
