//! Centralized error handling for rapid_prep
//!
//! This module provides structured error types used across the file
//! preparation and post-processing pipeline, enabling better error context
//! than a generic `Box<dyn Error>`.

use std::fmt;
use std::path::PathBuf;

/// Main error type for rapid_prep operations
#[derive(Debug)]
pub enum RapidPrepError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Shapefile reading errors
    ShapefileError(String),

    /// A malformed row in a CSV input file
    CsvParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Attribute field not found in the drainage-line dataset
    FieldNotFound { field: String },

    /// Variable not found in a NetCDF file
    VariableNotFound { var: String },

    /// River reach ID not present where it is required
    ReachNotFound { rivid: i32 },

    /// Invalid Kfac formula number (valid range: 1-3)
    InvalidFormula(u8),

    /// Invalid parameter value or unknown namelist parameter
    InvalidParameter { name: String, message: String },

    /// The external RAPID executable failed
    SimulationFailed(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl fmt::Display for RapidPrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RapidPrepError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            RapidPrepError::IoError(e) => write!(f, "I/O error: {}", e),
            RapidPrepError::ShapefileError(msg) => write!(f, "Shapefile error: {}", msg),
            RapidPrepError::CsvParse {
                path,
                line,
                message,
            } => write!(
                f,
                "Malformed CSV row in {} (line {}): {}",
                path.display(),
                line,
                message
            ),
            RapidPrepError::FieldNotFound { field } => {
                write!(f, "Field '{}' not found in drainage line dataset", field)
            }
            RapidPrepError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            RapidPrepError::ReachNotFound { rivid } => {
                write!(f, "River reach {} not found", rivid)
            }
            RapidPrepError::InvalidFormula(n) => {
                write!(f, "Invalid Kfac formula type {} (valid range: 1-3)", n)
            }
            RapidPrepError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            RapidPrepError::SimulationFailed(msg) => {
                write!(f, "RAPID simulation failed: {}", msg)
            }
            RapidPrepError::ArrayError(e) => write!(f, "Array error: {}", e),
            RapidPrepError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RapidPrepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RapidPrepError::NetCDFError(e) => Some(e),
            RapidPrepError::IoError(e) => Some(e),
            RapidPrepError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for RapidPrepError {
    fn from(error: netcdf::Error) -> Self {
        RapidPrepError::NetCDFError(error)
    }
}

impl From<std::io::Error> for RapidPrepError {
    fn from(error: std::io::Error) -> Self {
        RapidPrepError::IoError(error)
    }
}

impl From<shapefile::Error> for RapidPrepError {
    fn from(error: shapefile::Error) -> Self {
        RapidPrepError::ShapefileError(error.to_string())
    }
}

impl From<ndarray::ShapeError> for RapidPrepError {
    fn from(error: ndarray::ShapeError) -> Self {
        RapidPrepError::ArrayError(error)
    }
}

impl From<String> for RapidPrepError {
    fn from(error: String) -> Self {
        RapidPrepError::Generic(error)
    }
}

impl From<&str> for RapidPrepError {
    fn from(error: &str) -> Self {
        RapidPrepError::Generic(error.to_string())
    }
}

/// Result type alias for rapid_prep operations
pub type Result<T> = std::result::Result<T, RapidPrepError>;
