//! rapid_prep: RAPID river-routing file preparation and post-processing
//!
//! A Rust library and CLI for preparing input files for, and post-processing
//! output files of, the RAPID river-routing model. It computes Muskingum
//! routing parameters (Kfac, K, X) from a stream-network shapefile and a
//! connectivity table, generates and updates RAPID namelist configuration
//! files, compares CSV/NetCDF outputs with numeric tolerance, and converts
//! raw RAPID discharge output to CF-1.6 compliant NetCDF.
//!
//! ## Module Organization
//!
//! - [`connectivity`]: RAPID connectivity table (routing topology) parsing
//! - [`drainage`]: stream-network shapefile attribute reading
//! - [`muskingum`]: Kfac/K/X parameter file computation
//! - [`namelist`]: RAPID Fortran-namelist generation and updating
//! - [`rapid`]: simulation manager tying the namelist to its input files
//! - [`postprocess`]: CF conversion, Qinit generation, time-series extraction
//! - [`compare`]: tolerance-based CSV and NetCDF comparison
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rapid_prep::prelude::*;
//!
//! let drainage = DrainageLine::from_shapefile(
//!     "drainageline.shp", "LINKNO", "Length", "Slope", LengthUnits::Meters)?;
//! let connectivity = Connectivity::from_csv("rapid_connect.csv")?;
//!
//! let summary = rapid_prep::muskingum::write_kfac_file(
//!     &drainage,
//!     &connectivity,
//!     1000.0 / 3600.0,
//!     KfacFormula::EtaLengthSlopeClipped,
//!     "kfac.csv",
//! )?;
//! println!("eta = {:?}", summary.eta);
//! # Ok::<(), rapid_prep::errors::RapidPrepError>(())
//! ```

pub mod cli;
pub mod compare;
pub mod connectivity;
pub mod drainage;
pub mod errors;
pub mod muskingum;
pub mod namelist;
pub mod postprocess;
pub mod rapid;

// Direct re-exports for the public API
pub use compare::*;
pub use connectivity::*;
pub use drainage::*;
pub use errors::*;
pub use muskingum::*;
pub use namelist::*;
pub use postprocess::*;
pub use rapid::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::connectivity::Connectivity;
    pub use crate::drainage::{DrainageLine, LengthUnits};
    pub use crate::errors::{RapidPrepError, Result};
    pub use crate::muskingum::{KfacFormula, KfacSummary};
    pub use crate::namelist::{Namelist, ParamValue};
    pub use crate::postprocess::{CfConversion, ReachSelector};
    pub use crate::rapid::RapidManager;
}
