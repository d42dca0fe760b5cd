//! Static sensor to mesh gateway reference table.
//!
//! Mesh readings only carry the relaying gateway's sequence token. The
//! deployment records map `(sensor_id, sequence)` to the mesh gateway id and
//! its surveyed position. The table is loaded once at startup and shared
//! read-only; a CSV at `MESH_REFERENCE_PATH` replaces the built-in records.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::Coordinate;
use crate::normalize::normalize_sensor;

/// Deployment records compiled into the binary.
const BUILTIN_REFERENCE: &str = include_str!("../data/mesh_reference.csv");

// ---

/// One deployment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshGateway {
    pub sensor_id: String,
    pub mesh_gateway_id: String,
    pub mesh_gateway_sequence: String,
    pub mesh_gateway_lat: f64,
    pub mesh_gateway_long: f64,
}

/// Read-only lookup from `(sensor_id, sequence)` to [`MeshGateway`].
#[derive(Debug, Clone, Default)]
pub struct MeshReference {
    entries: HashMap<(String, String), MeshGateway>,
}

impl MeshReference {
    /// The deployment records shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_reader(BUILTIN_REFERENCE.as_bytes())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reference = Self::from_reader(file)?;
        info!(
            "Loaded {} mesh reference entries from {}",
            reference.len(),
            path.display()
        );
        Ok(reference)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        // ---
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let records = reader
            .deserialize::<MeshGateway>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_entries(records)
    }

    /// Build from records; sensor ids are normalized and duplicate keys rejected.
    pub fn from_entries<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = MeshGateway>,
    {
        // ---
        let mut entries = HashMap::new();
        for mut record in records {
            record.sensor_id = normalize_sensor(&record.sensor_id);
            let key = (
                record.sensor_id.clone(),
                record.mesh_gateway_sequence.clone(),
            );
            if !Coordinate::new(record.mesh_gateway_lat, record.mesh_gateway_long).is_valid() {
                return Err(PipelineError::Reference(format!(
                    "invalid position for {} ({}, {})",
                    record.mesh_gateway_id, record.mesh_gateway_lat, record.mesh_gateway_long
                )));
            }
            if entries.contains_key(&key) {
                return Err(PipelineError::Reference(format!(
                    "duplicate entry for sensor {} sequence {}",
                    key.0, key.1
                )));
            }
            entries.insert(key, record);
        }
        Ok(Self { entries })
    }

    /// Mesh gateway that relayed `sensor_id`'s frame tagged `sequence`.
    pub fn resolve(&self, sensor_id: &str, sequence: &str) -> Option<&MeshGateway> {
        self.entries
            .get(&(sensor_id.to_string(), sequence.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
