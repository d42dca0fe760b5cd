//! Link-quality audit engine for LoRa sensor gateways.
//!
//! Turns a table of received sensor frames into per-group, per-bucket
//! quality summaries: mean RSSI/SNR, received and estimated-missing frame
//! counts, loss rate and, for mesh gateways, sensor to gateway distance.
//!
//! Module layout (EMBP): each stage lives in its own module and is reached
//! through [`pipeline::run`]; the `routes` gateway and `main.rs` only wire
//! configuration and I/O around it.

pub mod compose;
pub mod config;
pub mod distance;
pub mod error;
pub mod export;
pub mod frequency;
pub mod gap;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod routes;
pub mod source;
pub mod window;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use frequency::Frequency;
pub use gap::CounterRange;
pub use models::{GatewayTier, RawReading, Reading, SummaryRow};
pub use pipeline::{run, AuditCounters, RunOptions, RunReport};
pub use reference::MeshReference;

// ---

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
