//! Merges gap estimates into the windowed metrics to form the summary.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{GroupKey, SummaryRow};
use crate::round2;
use crate::window::WindowStats;

// ---

/// Percentage of `total` that went missing, or `None` when nothing was sent.
pub fn loss_rate(missing: u64, total: u64) -> Option<f64> {
    // ---
    if total == 0 {
        return None;
    }
    Some(round2(missing as f64 / total as f64 * 100.0))
}

/// Left join `stats` with `missing` on group and bucket.
///
/// A bucket without a gap estimate counts as zero missing. Rows are sorted
/// by bucket, sensor, mesh gateway, then gateway.
pub fn compose(
    stats: Vec<WindowStats>,
    missing: &BTreeMap<(GroupKey, NaiveDate), u64>,
) -> Vec<SummaryRow> {
    // ---
    let mut rows: Vec<SummaryRow> = stats
        .into_iter()
        .map(|s| {
            let missing_messages = missing
                .get(&(s.key.clone(), s.bucket))
                .copied()
                .unwrap_or(0);
            let total_messages = s.received_messages + missing_messages;

            SummaryRow {
                sensor_id: s.key.sensor_id,
                gateway_id: s.key.gateway_id,
                mesh_gateway_id: s.key.mesh_gateway_id,
                time_bucket: s.bucket,
                avg_rssi: s.avg_rssi,
                avg_snr: s.avg_snr,
                received_messages: s.received_messages,
                missing_messages,
                total_messages,
                loss_rate_percent: loss_rate(missing_messages, total_messages),
                distance_m: None,
                link: s.link,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.time_bucket, &a.sensor_id, &a.mesh_gateway_id, &a.gateway_id).cmp(&(
            b.time_bucket,
            &b.sensor_id,
            &b.mesh_gateway_id,
            &b.gateway_id,
        ))
    });
    rows
}
