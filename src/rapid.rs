//! RAPID simulation manager
//!
//! Ties the namelist parameter set to the files it references: derives the
//! reach-count parameters from the connectivity and basin-ID files,
//! generates or updates namelist files, and invokes the external RAPID
//! executable.

use crate::connectivity::{count_csv_rows, Connectivity};
use crate::errors::{RapidPrepError, Result};
use crate::namelist::{Namelist, ParamValue};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Manages a RAPID run configuration.
#[derive(Debug, Clone)]
pub struct RapidManager {
    namelist: Namelist,
    executable: Option<PathBuf>,
    num_processors: usize,
    mpiexec: String,
}

impl RapidManager {
    /// Create a manager with default namelist parameters.
    ///
    /// `executable` may be empty when the manager is only used for file
    /// generation; `run` will then fail with a clear error.
    pub fn new(executable: Option<PathBuf>, num_processors: usize) -> Self {
        Self {
            namelist: Namelist::with_defaults(),
            executable,
            num_processors: num_processors.max(1),
            mpiexec: "mpiexec".to_string(),
        }
    }

    /// Override the MPI launcher command (default `mpiexec`).
    pub fn with_mpiexec(mut self, command: &str) -> Self {
        self.mpiexec = command.to_string();
        self
    }

    /// Set namelist parameters from `name=value` textual pairs.
    pub fn update_parameters<'a, I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in params {
            self.namelist.set(name, value)?;
        }
        Ok(())
    }

    /// Set a single parameter to a typed value.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.namelist.set_value(name, value)
    }

    /// Derive `IS_riv_tot`, `IS_max_up` and `IS_riv_bas` from the
    /// connectivity and basin-ID files currently configured.
    pub fn update_reach_number_data(&mut self) -> Result<()> {
        let connect_path = self
            .namelist
            .get_path("rapid_connect_file")
            .ok_or_else(|| RapidPrepError::InvalidParameter {
                name: "rapid_connect_file".to_string(),
                message: "must be set before updating reach numbers".to_string(),
            })?
            .to_string();

        let connectivity = Connectivity::from_csv(&connect_path)?;
        self.namelist
            .set_value("IS_riv_tot", ParamValue::Int(connectivity.len() as i64))?;
        self.namelist.set_value(
            "IS_max_up",
            ParamValue::Int(connectivity.max_upstream() as i64),
        )?;

        if let Some(bas_path) = self.namelist.get_path("riv_bas_id_file") {
            let riv_bas = count_csv_rows(bas_path)?;
            self.namelist
                .set_value("IS_riv_bas", ParamValue::Int(riv_bas as i64))?;
        }

        println!(
            "Reach numbers: IS_riv_tot = {}, IS_max_up = {}",
            connectivity.len(),
            connectivity.max_upstream()
        );
        Ok(())
    }

    /// Write the namelist to a new file.
    pub fn generate_namelist_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.namelist.generate_file(path)
    }

    /// Rewrite an existing namelist file with this manager's values,
    /// preserving unrelated lines.
    pub fn update_namelist_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.namelist.update_file(path)
    }

    /// The current namelist.
    pub fn namelist(&self) -> &Namelist {
        &self.namelist
    }

    /// Run the RAPID executable.
    ///
    /// Writes `rapid_namelist` into `work_dir` (RAPID reads it from its
    /// working directory) and spawns the executable there, through the MPI
    /// launcher when more than one processor is requested.
    pub fn run<P: AsRef<Path>>(&self, work_dir: P) -> Result<()> {
        let executable = self.executable.as_ref().ok_or_else(|| {
            RapidPrepError::SimulationFailed("no RAPID executable configured".to_string())
        })?;

        let work_dir = work_dir.as_ref();
        let namelist_path = work_dir.join("rapid_namelist");
        self.namelist.generate_file(&namelist_path)?;

        let mut command = if self.num_processors > 1 {
            let mut c = Command::new(&self.mpiexec);
            c.arg("-n").arg(self.num_processors.to_string());
            c.arg(executable);
            c
        } else {
            Command::new(executable)
        };

        println!(
            "Running RAPID with {} processor(s) in {}",
            self.num_processors,
            work_dir.display()
        );

        let status = command
            .current_dir(work_dir)
            .status()
            .map_err(|e| RapidPrepError::SimulationFailed(e.to_string()))?;

        if !status.success() {
            return Err(RapidPrepError::SimulationFailed(format!(
                "exit status {}",
                status
            )));
        }

        println!("RAPID simulation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_update_reach_number_data() {
        let dir = tempdir().expect("Failed to create temp dir");
        let connect_path = dir.path().join("rapid_connect.csv");
        let bas_path = dir.path().join("riv_bas_id.csv");

        let mut f = std::fs::File::create(&connect_path).expect("create failed");
        writeln!(f, "1,2,0,0,0").expect("write failed");
        writeln!(f, "2,3,1,1,0").expect("write failed");
        writeln!(f, "3,0,2,1,2").expect("write failed");

        let mut f = std::fs::File::create(&bas_path).expect("create failed");
        writeln!(f, "2").expect("write failed");
        writeln!(f, "3").expect("write failed");

        let mut manager = RapidManager::new(None, 1);
        manager
            .update_parameters(vec![
                ("rapid_connect_file", connect_path.to_str().unwrap()),
                ("riv_bas_id_file", bas_path.to_str().unwrap()),
            ])
            .expect("update failed");
        manager.update_reach_number_data().expect("reach numbers failed");

        assert_eq!(manager.namelist().get("IS_riv_tot"), Some(&ParamValue::Int(3)));
        assert_eq!(manager.namelist().get("IS_max_up"), Some(&ParamValue::Int(2)));
        assert_eq!(manager.namelist().get("IS_riv_bas"), Some(&ParamValue::Int(2)));
    }

    #[test]
    fn test_reach_numbers_require_connectivity() {
        let mut manager = RapidManager::new(None, 1);
        assert!(manager.update_reach_number_data().is_err());
    }

    #[test]
    fn test_run_without_executable() {
        let dir = tempdir().expect("Failed to create temp dir");
        let manager = RapidManager::new(None, 1);
        assert!(manager.run(dir.path()).is_err());
    }
}
