//! Windowed signal-quality aggregation.
//!
//! Computes, per group and resampling bucket, the mean RSSI and SNR and the
//! number of readings received. Buckets without readings are not emitted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::frequency::Frequency;
use crate::models::{GroupKey, MeshLink, Reading};
use crate::round2;

// ---

/// Aggregated metrics for one group and bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub key: GroupKey,
    pub bucket: NaiveDate,
    pub avg_rssi: f64,
    pub avg_snr: f64,
    pub received_messages: u64,
    /// Positions from the bucket's earliest reading, mesh path only.
    pub link: Option<MeshLink>,
}

#[derive(Debug)]
struct Accumulator {
    rssi_sum: f64,
    snr_sum: f64,
    count: u64,
    earliest: DateTime<Utc>,
    link: Option<MeshLink>,
}

impl Accumulator {
    fn new(reading: &Reading) -> Self {
        Self {
            rssi_sum: 0.0,
            snr_sum: 0.0,
            count: 0,
            earliest: reading.timestamp,
            link: reading.mesh_link(),
        }
    }

    fn push(&mut self, reading: &Reading) {
        // ---
        self.rssi_sum += reading.signal_rssi;
        self.snr_sum += reading.signal_snr;
        self.count += 1;
        if reading.timestamp < self.earliest {
            self.earliest = reading.timestamp;
            self.link = reading.mesh_link();
        }
    }
}

/// Aggregate readings into `frequency` buckets, ordered by group then bucket.
pub fn aggregate(readings: &[Reading], frequency: Frequency) -> Vec<WindowStats> {
    // ---
    let mut buckets: BTreeMap<(GroupKey, NaiveDate), Accumulator> = BTreeMap::new();
    for reading in readings {
        let bucket = frequency.bucket_start(reading.timestamp.date_naive());
        buckets
            .entry((reading.group_key(), bucket))
            .or_insert_with(|| Accumulator::new(reading))
            .push(reading);
    }

    buckets
        .into_iter()
        .map(|((key, bucket), acc)| {
            let n = acc.count as f64;
            WindowStats {
                key,
                bucket,
                avg_rssi: round2(acc.rssi_sum / n),
                avg_snr: round2(acc.snr_sum / n),
                received_messages: acc.count,
                link: acc.link,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn create_test_reading(gateway: &str, day: u32, hour: i64, rssi: f64, snr: f64) -> Reading {
        // ---
        Reading {
            sensor_id: "sn-silvav3n34".to_string(),
            gateway_id: gateway.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
                + Duration::hours(hour),
            frame_counter: 0,
            frame_port: 1,
            signal_rssi: rssi,
            signal_snr: snr,
            sensor_lat: None,
            sensor_long: None,
            mesh_gateway_sequence: None,
            mesh_gateway_id: None,
            mesh_gateway_lat: None,
            mesh_gateway_long: None,
        }
    }

    #[test]
    fn test_means_are_rounded() {
        // ---
        let readings = vec![
            create_test_reading("bg-1", 3, 1, -100.0, 5.0),
            create_test_reading("bg-1", 3, 2, -101.0, 6.0),
            create_test_reading("bg-1", 3, 3, -101.0, 6.0),
        ];
        let stats = aggregate(&readings, Frequency::Days(1));

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].avg_rssi, -100.67);
        assert_eq!(stats[0].avg_snr, 5.67);
        assert_eq!(stats[0].received_messages, 3);
    }

    #[test]
    fn test_groups_and_buckets_are_split() {
        // ---
        let readings = vec![
            create_test_reading("bg-1", 3, 1, -100.0, 5.0),
            create_test_reading("bg-2", 3, 1, -90.0, 9.0),
            create_test_reading("bg-1", 4, 1, -110.0, 1.0),
        ];
        let stats = aggregate(&readings, Frequency::Days(1));

        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.received_messages == 1));
        assert_eq!(stats[0].key.gateway_id, "bg-1");
        assert_eq!(stats[0].bucket, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(stats[1].key.gateway_id, "bg-1");
        assert_eq!(stats[1].bucket, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(stats[2].key.gateway_id, "bg-2");
    }

    #[test]
    fn test_empty_buckets_are_absent() {
        // ---
        let readings = vec![
            create_test_reading("bg-1", 3, 1, -100.0, 5.0),
            create_test_reading("bg-1", 6, 1, -100.0, 5.0),
        ];
        let stats = aggregate(&readings, Frequency::Days(1));
        assert_eq!(stats.len(), 2);

        assert!(aggregate(&[], Frequency::Days(1)).is_empty());
    }

    #[test]
    fn test_link_comes_from_earliest_reading() {
        // ---
        let mut late = create_test_reading("bg-1", 3, 5, -100.0, 5.0);
        late.sensor_lat = Some(1.0);
        late.sensor_long = Some(1.0);
        late.mesh_gateway_lat = Some(0.0);
        late.mesh_gateway_long = Some(0.0);
        let mut early = late.clone();
        early.timestamp -= Duration::hours(2);
        early.sensor_lat = Some(2.0);

        let stats = aggregate(&[late, early], Frequency::Days(1));
        assert_eq!(stats[0].link.unwrap().sensor.lat, 2.0);
    }
}
