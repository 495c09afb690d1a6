//! RAPID Fortran-namelist configuration files
//!
//! RAPID reads its run configuration from a Fortran namelist
//! (`&NL_namelist` ... `/`) with one `key = value` line per parameter.
//! This module models the full parameter set in the canonical RAPID order,
//! so generated files are byte-stable, and supports updating an existing
//! namelist in place while preserving lines it does not recognize.

use crate::errors::{RapidPrepError, Result};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A typed namelist parameter value.
///
/// The variant fixes how the value parses and renders; `set` refuses to
/// change a parameter's type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, ".true."),
            ParamValue::Bool(false) => write!(f, ".false."),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "'{}'", v),
        }
    }
}

/// The RAPID namelist parameter set, in canonical order.
#[derive(Debug, Clone)]
pub struct Namelist {
    entries: Vec<(String, ParamValue)>,
}

impl Default for Namelist {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Namelist {
    /// The full RAPID parameter set with its default values.
    pub fn with_defaults() -> Self {
        use ParamValue::{Bool, Float, Int, Str};

        let entries: Vec<(&str, ParamValue)> = vec![
            // Run options
            ("BS_opt_Qinit", Bool(false)),
            ("BS_opt_Qfinal", Bool(false)),
            ("BS_opt_dam", Bool(false)),
            ("BS_opt_for", Bool(false)),
            ("BS_opt_influence", Bool(false)),
            ("IS_opt_routing", Int(1)),
            ("IS_opt_run", Int(1)),
            ("IS_opt_phi", Int(1)),
            // Temporal parameters (seconds)
            ("ZS_TauM", Float(0.0)),
            ("ZS_dtM", Float(0.0)),
            ("ZS_TauO", Float(0.0)),
            ("ZS_dtO", Float(0.0)),
            ("ZS_TauR", Float(0.0)),
            ("ZS_dtR", Float(0.0)),
            ("ZS_dtF", Float(0.0)),
            ("ZS_phifac", Float(0.001)),
            // Domain sizes
            ("IS_riv_tot", Int(0)),
            ("IS_riv_bas", Int(0)),
            ("IS_max_up", Int(2)),
            ("IS_for_tot", Int(0)),
            ("IS_for_use", Int(0)),
            ("IS_dam_tot", Int(0)),
            ("IS_dam_use", Int(0)),
            ("IS_obs_tot", Int(0)),
            ("IS_obs_use", Int(0)),
            ("IS_strt_opt", Int(0)),
            // Input files
            ("rapid_connect_file", Str(String::new())),
            ("riv_bas_id_file", Str(String::new())),
            ("k_file", Str(String::new())),
            ("x_file", Str(String::new())),
            ("kfac_file", Str(String::new())),
            ("Vlat_file", Str(String::new())),
            ("Qinit_file", Str(String::new())),
            ("Qfor_file", Str(String::new())),
            ("for_tot_id_file", Str(String::new())),
            ("for_use_id_file", Str(String::new())),
            ("dam_tot_id_file", Str(String::new())),
            ("dam_use_id_file", Str(String::new())),
            ("Qdam_file", Str(String::new())),
            ("obs_tot_id_file", Str(String::new())),
            ("obs_use_id_file", Str(String::new())),
            ("Qobs_file", Str(String::new())),
            ("Qobsbarrec_file", Str(String::new())),
            // Output files
            ("Qout_file", Str(String::new())),
            ("Qfinal_file", Str(String::new())),
            ("babsmax_file", Str(String::new())),
            ("QoutRabsmin_file", Str(String::new())),
            ("QoutRabsmax_file", Str(String::new())),
        ];

        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Set a parameter from its textual representation.
    ///
    /// The value is parsed according to the parameter's declared type;
    /// unknown parameter names are errors.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .ok_or_else(|| RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: "not a RAPID namelist parameter".to_string(),
            })?;

        entry.1 = parse_as(&entry.1, name, value)?;
        Ok(())
    }

    /// Set a parameter to an already-typed value (type must match).
    pub fn set_value(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .ok_or_else(|| RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: "not a RAPID namelist parameter".to_string(),
            })?;

        if std::mem::discriminant(&entry.1) != std::mem::discriminant(&value) {
            return Err(RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: format!("type mismatch: expected {:?}", entry.1),
            });
        }
        entry.1 = value;
        Ok(())
    }

    /// Current value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Current string value of a parameter, `None` if unset or non-string.
    pub fn get_path(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Write the namelist as `&NL_namelist` ... `/`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "&NL_namelist")?;
        for (name, value) in &self.entries {
            writeln!(writer, "{} = {}", name, value)?;
        }
        writeln!(writer, "/")?;
        Ok(())
    }

    /// Generate a namelist file, overwriting any existing file.
    pub fn generate_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Update an existing namelist file in place.
    ///
    /// Lines assigning a known parameter are rewritten with this namelist's
    /// value; `&` headers, the closing `/`, comments and anything else are
    /// preserved verbatim. Assignments to names RAPID does not know are
    /// dropped with a warning, since RAPID refuses to start on them.
    pub fn update_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let original = fs::read_to_string(path)?;

        let mut output = String::new();
        for line in original.lines() {
            let trimmed = line.trim();
            if let Some((name, _)) = split_assignment(trimmed) {
                if let Some(value) = self.get(name) {
                    output.push_str(&format!("{} = {}\n", name, value));
                } else {
                    println!("Warning: dropping unknown namelist parameter '{}'", name);
                }
                continue;
            }
            output.push_str(line);
            output.push('\n');
        }

        fs::write(path, output)?;
        Ok(())
    }

    /// Parameter names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    if line.starts_with('&') || line.starts_with('/') || line.starts_with('!') {
        return None;
    }
    let (name, value) = line.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

fn parse_as(current: &ParamValue, name: &str, value: &str) -> Result<ParamValue> {
    let value = value.trim();
    match current {
        ParamValue::Bool(_) => match value.to_ascii_lowercase().as_str() {
            ".true." | "true" | "t" => Ok(ParamValue::Bool(true)),
            ".false." | "false" | "f" => Ok(ParamValue::Bool(false)),
            _ => Err(RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: format!("'{}' is not a Fortran logical", value),
            }),
        },
        ParamValue::Int(_) => value
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: format!("'{}' is not an integer", value),
            }),
        ParamValue::Float(_) => value
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| RapidPrepError::InvalidParameter {
                name: name.to_string(),
                message: format!("'{}' is not a number", value),
            }),
        ParamValue::Str(_) => Ok(ParamValue::Str(
            value.trim_matches(|c| c == '\'' || c == '"').to_string(),
        )),
    }
}
