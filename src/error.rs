//! Error types for the link-audit engine.
//!
//! Per-reading and per-group conditions (diagnostic frames, unresolved mesh
//! joins, clamped wraps) are not errors; they are counted in the run audit.
//! Only conditions that stop a run, or that a caller must tell apart,
//! appear here.

use thiserror::Error;

/// Errors raised by the pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The reading table had no rows at all.
    #[error("No readings found for the given parameters")]
    EmptyInput,

    /// Resampling frequency token could not be parsed.
    #[error("Unknown resampling frequency: {0}")]
    UnknownFrequency(String),

    /// Frequency finer than the one-day continuity window.
    #[error("Sub-daily resampling frequency is not supported: {0}")]
    SubDailyFrequency(String),

    /// Gateway tier token could not be parsed.
    #[error("Unknown gateway tier: {0} (expected bg or mg)")]
    UnknownTier(String),

    /// Frame counter range that is empty, negative or wider than 32 bits.
    #[error("Invalid frame counter range {min}..={max}: expected 0 <= min <= max <= 4294967295")]
    InvalidCounterRange { min: i64, max: i64 },

    /// Mesh reference table could not be loaded.
    #[error("Invalid mesh reference table: {0}")]
    Reference(String),

    /// Delimited input or output failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON input failed to parse.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote readings source failed.
    #[error("Readings source error: {0}")]
    Source(#[from] reqwest::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
