//! Data models for the link-audit pipeline.
//!
//! [`RawReading`] mirrors one row of the warehouse extract with its
//! lower-cased column names. [`Reading`] is the normalized row the engine
//! works on, and [`SummaryRow`] is one line of the final quality table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PipelineError;
use crate::normalize::{normalize_gateway, normalize_sensor};

/// Frame port used by the firmware for diagnostic frames.
pub const DIAGNOSTIC_FRAME_PORT: i64 = 99;

// ---

/// Relay path a sensor's messages travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayTier {
    /// Sensor to border gateway ("BG").
    #[serde(rename = "bg")]
    Direct,
    /// Sensor to mesh gateway ("MG"), relayed on to a border gateway.
    #[serde(rename = "mg")]
    Mesh,
}

impl FromStr for GatewayTier {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "bg" | "direct" | "sn2bg" | "0" => Ok(GatewayTier::Direct),
            "mg" | "mesh" | "sn2mg" | "1" => Ok(GatewayTier::Mesh),
            _ => Err(PipelineError::UnknownTier(s.to_string())),
        }
    }
}

impl fmt::Display for GatewayTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayTier::Direct => write!(f, "bg"),
            GatewayTier::Mesh => write!(f, "mg"),
        }
    }
}

/// Raw reading as produced by the extraction stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    // ---
    pub sensor_id: String,
    #[serde(default)]
    pub sensor_lat: Option<f64>,
    #[serde(default)]
    pub sensor_long: Option<f64>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "bgtw_id", alias = "gateway_id")]
    pub gateway_id: String,
    #[serde(
        default,
        alias = "mgtw_nr",
        deserialize_with = "deserialize_sequence_token"
    )]
    pub mesh_gateway_sequence: Option<String>,
    #[serde(rename = "bgtw_rssi", alias = "signal_rssi")]
    pub signal_rssi: f64,
    #[serde(rename = "bgtw_snr", alias = "signal_snr")]
    pub signal_snr: f64,
    #[serde(rename = "framecount", alias = "frame_counter")]
    pub frame_counter: i64,
    #[serde(rename = "frameport", alias = "frame_port")]
    pub frame_port: i64,
}

/// Normalized reading; mesh fields are set once the reference join resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub sensor_id: String,
    pub gateway_id: String,
    pub timestamp: DateTime<Utc>,
    pub frame_counter: i64,
    pub frame_port: i64,
    pub signal_rssi: f64,
    pub signal_snr: f64,
    pub sensor_lat: Option<f64>,
    pub sensor_long: Option<f64>,
    pub mesh_gateway_sequence: Option<String>,
    pub mesh_gateway_id: Option<String>,
    pub mesh_gateway_lat: Option<f64>,
    pub mesh_gateway_long: Option<f64>,
}

impl RawReading {
    // ---
    pub fn is_diagnostic(&self) -> bool {
        self.frame_port == DIAGNOSTIC_FRAME_PORT
    }

    /// Canonicalize identifiers; mesh fields stay empty until resolved.
    pub fn to_normalized(&self) -> Reading {
        // ---
        Reading {
            sensor_id: normalize_sensor(&self.sensor_id),
            gateway_id: normalize_gateway(&self.gateway_id),
            timestamp: self.timestamp,
            frame_counter: self.frame_counter,
            frame_port: self.frame_port,
            signal_rssi: self.signal_rssi,
            signal_snr: self.signal_snr,
            sensor_lat: self.sensor_lat,
            sensor_long: self.sensor_long,
            mesh_gateway_sequence: self.mesh_gateway_sequence.clone(),
            mesh_gateway_id: None,
            mesh_gateway_lat: None,
            mesh_gateway_long: None,
        }
    }
}

impl Reading {
    // ---
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            sensor_id: self.sensor_id.clone(),
            gateway_id: self.gateway_id.clone(),
            mesh_gateway_id: self.mesh_gateway_id.clone(),
        }
    }

    /// Sensor and mesh gateway positions, when both are known.
    pub fn mesh_link(&self) -> Option<MeshLink> {
        // ---
        Some(MeshLink {
            sensor: Coordinate::new(self.sensor_lat?, self.sensor_long?),
            gateway: Coordinate::new(self.mesh_gateway_lat?, self.mesh_gateway_long?),
        })
    }
}

/// Unit over which sequence continuity and aggregation are evaluated,
/// minus the time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    // ---
    pub sensor_id: String,
    pub gateway_id: String,
    pub mesh_gateway_id: Option<String>,
}

/// WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub long: f64,
}

impl Coordinate {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Finite and within `[-90, 90]` x `[-180, 180]`.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.long)
    }
}

/// Endpoints of a sensor to mesh gateway hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshLink {
    pub sensor: Coordinate,
    pub gateway: Coordinate,
}

/// One line of the quality summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    // ---
    pub sensor_id: String,
    pub gateway_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_gateway_id: Option<String>,
    pub time_bucket: NaiveDate,
    pub avg_rssi: f64,
    pub avg_snr: f64,
    pub received_messages: u64,
    pub missing_messages: u64,
    pub total_messages: u64,
    /// `None` when the bucket has no messages at all.
    pub loss_rate_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,

    /// Positions used by the distance enricher; never serialized.
    #[serde(skip)]
    pub link: Option<MeshLink>,
}

// ---

/// Accepts RFC 3339 or the warehouse's naive `YYYY-MM-DD HH:MM:SS[.fff]`,
/// which is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    // ---
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid timestamp: {raw}"))
}

/// Mesh gateway sequence arrives as text from the warehouse and as a number
/// from some exports; both end up as the same string key.
#[derive(Deserialize)]
#[serde(untagged)]
enum SequenceToken {
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_sequence_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    let token = Option::<SequenceToken>::deserialize(deserializer)?;
    Ok(token.and_then(|t| match t {
        SequenceToken::Int(n) => Some(n.to_string()),
        SequenceToken::Float(f) if f.fract() == 0.0 => Some(format!("{}", f as i64)),
        SequenceToken::Float(f) => Some(f.to_string()),
        SequenceToken::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
    }))
}
