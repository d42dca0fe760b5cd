//! Delimited-file input and output.
//!
//! Reading tables come in as CSV (warehouse extract) or a JSON array. The
//! cleaned readings and the summary go out as CSV; missing values are
//! written as empty fields.

use std::io;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::{GatewayTier, RawReading, Reading, SummaryRow};

const DIRECT_SUMMARY_HEADERS: &[&str] = &[
    "sensor_id",
    "gateway_id",
    "time_bucket",
    "avg_rssi",
    "avg_snr",
    "received_messages",
    "missing_messages",
    "total_messages",
    "loss_rate_percent",
];

const MESH_SUMMARY_HEADERS: &[&str] = &[
    "sensor_id",
    "gateway_id",
    "mesh_gateway_id",
    "time_bucket",
    "avg_rssi",
    "avg_snr",
    "received_messages",
    "missing_messages",
    "total_messages",
    "loss_rate_percent",
    "distance_m",
];

// ---

pub fn read_readings_csv<R: io::Read>(reader: R) -> Result<Vec<RawReading>> {
    // ---
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let readings = reader
        .deserialize::<RawReading>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(readings)
}

/// Load a reading table; `.json` files are parsed as a JSON array, anything
/// else as CSV.
pub fn read_readings_path(path: &Path) -> Result<Vec<RawReading>> {
    // ---
    let file = std::fs::File::open(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let readings = if is_json {
        serde_json::from_reader(io::BufReader::new(file))?
    } else {
        read_readings_csv(file)?
    };

    info!("Read {} readings from {}", readings.len(), path.display());
    Ok(readings)
}

/// Write the summary table. An empty table still gets its header line.
pub fn write_summary_csv<W: io::Write>(
    writer: W,
    tier: GatewayTier,
    rows: &[SummaryRow],
) -> Result<()> {
    // ---
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        let headers = match tier {
            GatewayTier::Direct => DIRECT_SUMMARY_HEADERS,
            GatewayTier::Mesh => MESH_SUMMARY_HEADERS,
        };
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_readings_csv<W: io::Write>(writer: W, readings: &[Reading]) -> Result<()> {
    // ---
    let mut writer = csv::Writer::from_writer(writer);
    for reading in readings {
        writer.serialize(reading)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn summary_to_csv_string(tier: GatewayTier, rows: &[SummaryRow]) -> Result<String> {
    // ---
    let mut buffer = Vec::new();
    write_summary_csv(&mut buffer, tier, rows)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn create_test_row(mesh: bool, loss: Option<f64>) -> SummaryRow {
        // ---
        SummaryRow {
            sensor_id: "sn-silvav3n34".to_string(),
            gateway_id: "bg-12".to_string(),
            mesh_gateway_id: mesh.then(|| "mg3-9".to_string()),
            time_bucket: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            avg_rssi: -100.5,
            avg_snr: 6.25,
            received_messages: 8,
            missing_messages: 2,
            total_messages: 10,
            loss_rate_percent: loss,
            distance_m: mesh.then_some(661.92),
            link: None,
        }
    }

    #[test]
    fn test_direct_summary_csv() {
        // ---
        let csv = summary_to_csv_string(
            GatewayTier::Direct,
            &[create_test_row(false, Some(20.0))],
        )
        .unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next().unwrap(), DIRECT_SUMMARY_HEADERS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "sn-silvav3n34,bg-12,2024-06-03,-100.5,6.25,8,2,10,20.0"
        );
    }

    #[test]
    fn test_mesh_summary_csv_with_missing_rate() {
        // ---
        let csv =
            summary_to_csv_string(GatewayTier::Mesh, &[create_test_row(true, None)]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next().unwrap(), MESH_SUMMARY_HEADERS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "sn-silvav3n34,bg-12,mg3-9,2024-06-03,-100.5,6.25,8,2,10,,661.92"
        );
    }

    #[test]
    fn test_empty_summary_keeps_header() {
        let csv = summary_to_csv_string(GatewayTier::Mesh, &[]).unwrap();
        assert_eq!(csv.trim_end(), MESH_SUMMARY_HEADERS.join(","));
    }

    #[test]
    fn test_readings_csv_from_warehouse_columns() {
        // ---
        let csv = "sensor_id,sensor_lat,sensor_long,timestamp,bgtw_id,mgtw_nr,bgtw_rssi,bgtw_snr,framecount,frameport\n\
                   sn-silvav3n34-x,52.85,13.80,2024-06-03 08:00:00.000,bg-12-ff,2057,-101.0,7.5,0,1\n\
                   sn-silvav3n34-x,,,2024-06-03 08:10:00.000,bg-12-ff,,-99.0,8.0,1,99\n";
        let readings = read_readings_csv(csv.as_bytes()).unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].mesh_gateway_sequence.as_deref(), Some("2057"));
        assert_eq!(readings[0].sensor_lat, Some(52.85));
        assert!(readings[1].mesh_gateway_sequence.is_none());
        assert!(readings[1].sensor_lat.is_none());
        assert!(readings[1].is_diagnostic());
    }

    #[test]
    fn test_cleaned_readings_csv() {
        // ---
        let csv = "sensor_id,timestamp,bgtw_id,bgtw_rssi,bgtw_snr,framecount,frameport\n\
                   sn-a-1,2024-06-03T08:00:00Z,bg3-0a-17-ff,-101.0,7.5,0,1\n";
        let readings: Vec<Reading> = read_readings_csv(csv.as_bytes())
            .unwrap()
            .iter()
            .map(RawReading::to_normalized)
            .collect();

        let mut buffer = Vec::new();
        write_readings_csv(&mut buffer, &readings).unwrap();
        let out = String::from_utf8(buffer).unwrap();
        let row = out.lines().nth(1).unwrap();
        assert!(row.starts_with("sn-a,bg3-0a-17,2024-06-03T08:00:00Z,0,1,"));
    }
}
