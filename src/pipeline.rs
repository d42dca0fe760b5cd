//! End-to-end summary run over one materialized reading table.
//!
//! Stages, in order:
//! 1. drop diagnostic frames (`frameport == 99`) and invalid rows
//! 2. normalize sensor and gateway identifiers
//! 3. mesh tier only: join the mesh reference, drop what does not resolve
//! 4. gap estimation and window aggregation over the same group keys
//! 5. compose the summary, then (mesh tier) attach distances
//!
//! Everything dropped along the way is counted in [`AuditCounters`]; no
//! per-row condition aborts the run.

use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::compose::compose;
use crate::distance::enrich;
use crate::error::{PipelineError, Result};
use crate::frequency::Frequency;
use crate::gap::{estimate_missing, CounterRange};
use crate::models::{Coordinate, GatewayTier, RawReading, Reading, SummaryRow};
use crate::reference::MeshReference;
use crate::window::aggregate;

// ---

/// Selects the aggregation path and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub tier: GatewayTier,
    pub frequency: Frequency,
    pub counter_range: CounterRange,
}

/// Rows filtered out during a run, plus sequence anomalies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditCounters {
    pub input_rows: u64,
    pub diagnostic_frames: u64,
    pub invalid_readings: u64,
    pub unresolved_mesh: u64,
    pub missing_sensor_location: u64,
    pub clamped_wraps: u64,
    pub repeated_counters: u64,
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub tier: GatewayTier,
    pub frequency: Frequency,
    pub rows: Vec<SummaryRow>,
    pub audit: AuditCounters,

    /// Cleaned readings that fed the summary, for export.
    #[serde(skip)]
    pub readings: Vec<Reading>,
}

/// Run the summary over `raw`.
///
/// Returns [`PipelineError::EmptyInput`] when the table has no rows at all.
/// A table that empties out during filtering yields a report with no rows.
pub fn run(raw: &[RawReading], options: &RunOptions, reference: &MeshReference) -> Result<RunReport> {
    // ---
    if raw.is_empty() {
        warn!("Reading table is empty, no summary produced");
        return Err(PipelineError::EmptyInput);
    }

    let run_id = Uuid::new_v4();
    let span = info_span!("summary_run", %run_id, tier = %options.tier);
    let _guard = span.enter();

    info!(
        "Summarizing {} readings at {} frequency",
        raw.len(),
        options.frequency
    );

    let mut audit = AuditCounters {
        input_rows: raw.len() as u64,
        ..AuditCounters::default()
    };

    let mut readings = clean(raw, options.counter_range, &mut audit);
    if options.tier == GatewayTier::Mesh {
        readings = resolve_mesh(readings, reference, &mut audit);
    }

    let estimate = estimate_missing(&readings, options.frequency, options.counter_range);
    audit.clamped_wraps = estimate.tally.clamped_wraps;
    audit.repeated_counters = estimate.tally.repeats;

    let stats = aggregate(&readings, options.frequency);
    let mut rows = compose(stats, &estimate.missing);
    if options.tier == GatewayTier::Mesh {
        enrich(&mut rows);
    }

    log_audit(&audit, rows.len());

    Ok(RunReport {
        run_id,
        tier: options.tier,
        frequency: options.frequency,
        rows,
        audit,
        readings,
    })
}

/// Drop diagnostic and invalid rows, normalize the rest.
fn clean(raw: &[RawReading], range: CounterRange, audit: &mut AuditCounters) -> Vec<Reading> {
    // ---
    raw.iter()
        .filter(|r| {
            if r.is_diagnostic() {
                audit.diagnostic_frames += 1;
                return false;
            }
            if !is_valid(r, range) {
                audit.invalid_readings += 1;
                return false;
            }
            true
        })
        .map(RawReading::to_normalized)
        .collect()
}

fn is_valid(raw: &RawReading, range: CounterRange) -> bool {
    // ---
    !raw.sensor_id.trim().is_empty()
        && !raw.gateway_id.trim().is_empty()
        && raw.signal_rssi.is_finite()
        && raw.signal_snr.is_finite()
        && range.contains(raw.frame_counter)
}

/// Attach mesh gateway id and position; unresolved or unlocated rows are dropped.
///
/// A sensor position that is non-finite or off the globe counts as unlocated.
fn resolve_mesh(
    readings: Vec<Reading>,
    reference: &MeshReference,
    audit: &mut AuditCounters,
) -> Vec<Reading> {
    // ---
    readings
        .into_iter()
        .filter_map(|mut reading| {
            let entry = reading
                .mesh_gateway_sequence
                .as_deref()
                .and_then(|seq| reference.resolve(&reading.sensor_id, seq));
            let Some(entry) = entry else {
                audit.unresolved_mesh += 1;
                return None;
            };
            let located = match (reading.sensor_lat, reading.sensor_long) {
                (Some(lat), Some(long)) => Coordinate::new(lat, long).is_valid(),
                _ => false,
            };
            if !located {
                audit.missing_sensor_location += 1;
                return None;
            }

            reading.mesh_gateway_id = Some(entry.mesh_gateway_id.clone());
            reading.mesh_gateway_lat = Some(entry.mesh_gateway_lat);
            reading.mesh_gateway_long = Some(entry.mesh_gateway_long);
            Some(reading)
        })
        .collect()
}

fn log_audit(audit: &AuditCounters, rows: usize) {
    // ---
    info!("Summary complete: {} rows", rows);
    info!("  input rows              : {}", audit.input_rows);
    info!("  diagnostic frames       : {}", audit.diagnostic_frames);
    info!("  invalid readings        : {}", audit.invalid_readings);
    info!("  unresolved mesh joins   : {}", audit.unresolved_mesh);
    info!("  missing sensor location : {}", audit.missing_sensor_location);
    info!("  clamped wraps           : {}", audit.clamped_wraps);
    info!("  repeated counters       : {}", audit.repeated_counters);

    if audit.unresolved_mesh > 0 {
        warn!(
            "{} mesh readings had no reference entry and were dropped",
            audit.unresolved_mesh
        );
    }
}
