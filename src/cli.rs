//! Defines command-line interface options using `clap` for the rapidprep tool.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A CLI tool for preparing and post-processing RAPID river-routing files
#[derive(Parser, Debug)]
#[command(
    name = "rapidprep",
    version,
    about = "Prepare Muskingum parameter, namelist and NetCDF files for the RAPID river-routing model"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the Muskingum Kfac file from a drainage-line shapefile
    Kfac {
        /// Drainage-line shapefile (.shp)
        drainage_line: PathBuf,
        /// RAPID connectivity CSV
        connectivity: PathBuf,
        /// Output Kfac CSV
        output: PathBuf,
        /// Attribute field holding the river reach ID (e.g. LINKNO, COMID)
        #[arg(long)]
        river_id: String,
        /// Attribute field holding the reach length
        #[arg(long)]
        length: String,
        /// Attribute field holding the reach slope
        #[arg(long)]
        slope: String,
        /// Flow wave celerity in m/s (1 km/hr is a reasonable default)
        #[arg(long, default_value_t = 1000.0 / 3600.0)]
        celerity: f64,
        /// Kfac formula number (1-3)
        #[arg(long, default_value_t = 3)]
        formula: u8,
        /// Units of the length field: m or km
        #[arg(long, default_value = "km")]
        length_units: String,
    },

    /// Compute the Muskingum K file from a Kfac file
    K {
        /// Input Kfac CSV
        kfac: PathBuf,
        /// Output K CSV
        output: PathBuf,
        /// Calibration constant lambda (0.35 if uncalibrated)
        #[arg(long, default_value_t = 0.35)]
        lambda_k: f64,
    },

    /// Write a constant Muskingum X file, one row per connectivity entry
    XConst {
        /// RAPID connectivity CSV
        connectivity: PathBuf,
        /// Output X CSV
        output: PathBuf,
        /// Muskingum X value [0, 0.5]
        #[arg(long, default_value_t = 0.3)]
        x_value: f64,
    },

    /// Copy a per-reach Muskingum X attribute from the drainage line
    XField {
        /// Drainage-line shapefile (.shp)
        drainage_line: PathBuf,
        /// Output X CSV
        output: PathBuf,
        /// Attribute field holding X (e.g. Musk_x)
        #[arg(long)]
        field: String,
    },

    /// Generate or update a RAPID namelist file
    Namelist {
        /// Namelist file to write (or update with --update)
        file: PathBuf,
        /// Parameter assignments, e.g. --set k_file=k.csv (repeatable)
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
        /// Update the existing file in place instead of regenerating it
        #[arg(long)]
        update: bool,
        /// Derive IS_riv_tot/IS_max_up/IS_riv_bas from the configured files
        #[arg(long)]
        reach_numbers: bool,
    },

    /// Convert raw RAPID Qout output to CF-1.6 compliant NetCDF
    CfConvert {
        /// Qout NetCDF file (converted in place)
        qout: PathBuf,
        /// RAPID connectivity CSV
        connectivity: PathBuf,
        /// Simulation start, e.g. "1980-01-01 00:00:00"
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        /// Routing output time step in seconds
        #[arg(long)]
        time_step: i64,
        /// Optional comid_lat_lon_z CSV with reach coordinates
        #[arg(long)]
        comid_lat_lon_z: Option<PathBuf>,
        /// Value for the title global attribute
        #[arg(long, default_value = "RAPID simulation")]
        project_name: String,
    },

    /// Generate a Qinit file from a past Qout simulation
    Qinit {
        /// Qout NetCDF file
        qout: PathBuf,
        /// RAPID connectivity CSV
        connectivity: PathBuf,
        /// Output Qinit CSV
        output: PathBuf,
        /// Time step to take flows from (default: last)
        #[arg(long)]
        time_index: Option<usize>,
    },

    /// Extract the discharge time series of one reach to CSV
    Timeseries {
        /// Qout NetCDF file
        qout: PathBuf,
        /// Output CSV
        output: PathBuf,
        /// Select the reach by its ID (requires a rivid coordinate)
        #[arg(long, conflicts_with = "reach_index")]
        reach_id: Option<i32>,
        /// Select the reach by its column index
        #[arg(long)]
        reach_index: Option<usize>,
        /// Write per-day averages (requires a CF time axis)
        #[arg(long)]
        daily: bool,
    },

    /// Compare two CSV files with numeric tolerance
    CompareCsv {
        file1: PathBuf,
        file2: PathBuf,
        /// Compare first rows as headers
        #[arg(long)]
        header: bool,
        /// Treat the first column as exact date strings
        #[arg(long)]
        timeseries: bool,
    },

    /// Compare the discharge variables of two Qout NetCDF files
    CompareQout { file1: PathBuf, file2: PathBuf },

    /// Run the RAPID executable with a generated namelist
    Run {
        /// Path to the RAPID executable
        executable: PathBuf,
        /// Working directory (rapid_namelist is written here)
        work_dir: PathBuf,
        /// Parameter assignments, e.g. --set Vlat_file=m3_riv.nc (repeatable)
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
        /// Number of processors (>1 launches through mpiexec)
        #[arg(long, default_value_t = 1)]
        num_processors: usize,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err("Invalid format: Expected '<parameter>=<value>'.".to_string()),
    }
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            s.parse::<chrono::NaiveDate>()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| "Invalid datetime: Expected 'YYYY-MM-DD [HH:MM:SS]'.".to_string())
}
