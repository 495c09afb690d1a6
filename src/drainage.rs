//! Stream-network (drainage line) attribute reading
//!
//! Loads per-feature attributes from a drainage-line shapefile: the river
//! reach ID plus the numeric fields (length, slope, Muskingum X) the
//! parameter writers need. Geometry is ignored; only the dbase attribute
//! records matter here.

use crate::errors::{RapidPrepError, Result};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Units of the length attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnits {
    Meters,
    Kilometers,
}

impl FromStr for LengthUnits {
    type Err = RapidPrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "m" => Ok(LengthUnits::Meters),
            "km" => Ok(LengthUnits::Kilometers),
            other => Err(RapidPrepError::InvalidParameter {
                name: "length_units".to_string(),
                message: format!("'{}' is not supported (use 'm' or 'km')", other),
            }),
        }
    }
}

/// Per-reach attributes of a drainage-line dataset, in feature order.
///
/// Lengths are stored in kilometers regardless of the source field units.
/// Null attribute values are read as 0.0, matching how absent lengths and
/// slopes are treated downstream.
#[derive(Debug, Clone)]
pub struct DrainageLine {
    rivids: Vec<i32>,
    lengths_km: Vec<f64>,
    slopes: Vec<f64>,
    index: HashMap<i32, usize>,
}

impl DrainageLine {
    /// Load reach IDs, lengths and slopes from a drainage-line shapefile.
    ///
    /// `river_id_field`, `length_field` and `slope_field` name the dbase
    /// attribute columns (e.g. `LINKNO`, `Length`, `Slope`).
    pub fn from_shapefile<P: AsRef<Path>>(
        path: P,
        river_id_field: &str,
        length_field: &str,
        slope_field: &str,
        units: LengthUnits,
    ) -> Result<Self> {
        let mut reader = Reader::from_path(path.as_ref())?;

        let mut rivids = Vec::new();
        let mut lengths_km = Vec::new();
        let mut slopes = Vec::new();
        let mut index = HashMap::new();

        for result in reader.iter_shapes_and_records() {
            let (_shape, record) = result?;

            let rivid = required_numeric(&record, river_id_field)? as i32;
            let length = optional_numeric(&record, length_field)?.unwrap_or(0.0);
            let slope = optional_numeric(&record, slope_field)?.unwrap_or(0.0);

            let length_km = match units {
                LengthUnits::Meters => length / 1000.0,
                LengthUnits::Kilometers => length,
            };

            // First occurrence wins for duplicate reach IDs
            index.entry(rivid).or_insert(rivids.len());
            rivids.push(rivid);
            lengths_km.push(length_km);
            slopes.push(slope);
        }

        Ok(Self {
            rivids,
            lengths_km,
            slopes,
            index,
        })
    }

    /// Build a dataset from already-extracted attribute columns.
    ///
    /// Lengths must already be in kilometers. Useful when reach attributes
    /// come from somewhere other than a shapefile.
    pub fn from_parts(rivids: Vec<i32>, lengths_km: Vec<f64>, slopes: Vec<f64>) -> Self {
        let mut index = HashMap::new();
        for (i, &rivid) in rivids.iter().enumerate() {
            index.entry(rivid).or_insert(i);
        }
        Self {
            rivids,
            lengths_km,
            slopes,
            index,
        }
    }

    /// Number of features loaded.
    pub fn len(&self) -> usize {
        self.rivids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rivids.is_empty()
    }

    /// Feature index of a reach ID, if the reach exists in the dataset.
    pub fn index_of(&self, rivid: i32) -> Option<usize> {
        self.index.get(&rivid).copied()
    }

    /// Reach length in meters at a feature index.
    pub fn length_m(&self, idx: usize) -> f64 {
        self.lengths_km[idx] * 1000.0
    }

    /// Reach slope at a feature index.
    pub fn slope(&self, idx: usize) -> f64 {
        self.slopes[idx]
    }

    /// Slope of a reach by ID, 0.0 when the reach is absent.
    ///
    /// The zero default feeds the upstream/downstream slope averaging used
    /// when a reach has no usable slope of its own.
    pub fn slope_of(&self, rivid: i32) -> f64 {
        self.index_of(rivid).map(|i| self.slopes[i]).unwrap_or(0.0)
    }
}

/// Read a single numeric attribute for every feature, in feature order.
///
/// Used to extract a precomputed Muskingum X column. Null values are errors
/// here: an X file with holes would silently corrupt a simulation.
pub fn read_numeric_field<P: AsRef<Path>>(path: P, field: &str) -> Result<Vec<f64>> {
    let mut reader = Reader::from_path(path.as_ref())?;
    let mut values = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (_shape, record) = result?;
        match optional_numeric(&record, field)? {
            Some(v) => values.push(v),
            None => {
                return Err(RapidPrepError::InvalidParameter {
                    name: field.to_string(),
                    message: format!("null value at feature {}", values.len()),
                })
            }
        }
    }

    Ok(values)
}

fn required_numeric(record: &shapefile::dbase::Record, field: &str) -> Result<f64> {
    optional_numeric(record, field)?.ok_or_else(|| RapidPrepError::InvalidParameter {
        name: field.to_string(),
        message: "null value where an ID is required".to_string(),
    })
}

fn optional_numeric(record: &shapefile::dbase::Record, field: &str) -> Result<Option<f64>> {
    let value = record
        .get(field)
        .ok_or_else(|| RapidPrepError::FieldNotFound {
            field: field.to_string(),
        })?;

    match value {
        FieldValue::Numeric(v) => Ok(*v),
        FieldValue::Float(v) => Ok((*v).map(f64::from)),
        FieldValue::Integer(v) => Ok(Some(f64::from(*v))),
        FieldValue::Double(v) => Ok(Some(*v)),
        FieldValue::Currency(v) => Ok(Some(*v)),
        FieldValue::Character(Some(s)) => {
            s.trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| RapidPrepError::InvalidParameter {
                    name: field.to_string(),
                    message: format!("'{}' is not numeric", s),
                })
        }
        FieldValue::Character(None) => Ok(None),
        other => Err(RapidPrepError::InvalidParameter {
            name: field.to_string(),
            message: format!("unsupported attribute type {:?}", other),
        }),
    }
}
