//! Identifier canonicalization.
//!
//! Sensor and gateway identifiers arrive with firmware or hardware suffixes
//! (`sn-silvav3n34-r2`, `bg3-0a-17-x`). Grouping needs the stable prefix
//! only, so both are cut down to a fixed number of hyphen-delimited segments.

/// Segments kept from a sensor id: vendor/device-class prefix plus number.
const SENSOR_SEGMENTS: usize = 2;

/// Generation-3 border gateways carry an extra segment in their id.
const GEN3_GATEWAY_PREFIX: &str = "bg3";
const GEN3_GATEWAY_SEGMENTS: usize = 3;

const GATEWAY_PREFIX: &str = "bg";
const GATEWAY_SEGMENTS: usize = 2;

// ---

/// Keep the first `n` hyphen-delimited segments of `value`.
fn first_segments(value: &str, n: usize) -> String {
    // ---
    value.split('-').take(n).collect::<Vec<_>>().join("-")
}

/// Canonical sensor id: the first two hyphen-delimited segments.
pub fn normalize_sensor(value: &str) -> String {
    first_segments(value, SENSOR_SEGMENTS)
}

/// Canonical gateway id.
///
/// `bg3…` ids keep three segments, other `bg…` ids keep two, anything else
/// is returned unchanged.
pub fn normalize_gateway(value: &str) -> String {
    // ---
    if value.starts_with(GEN3_GATEWAY_PREFIX) {
        first_segments(value, GEN3_GATEWAY_SEGMENTS)
    } else if value.starts_with(GATEWAY_PREFIX) {
        first_segments(value, GATEWAY_SEGMENTS)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_sensor_suffix_is_dropped() {
        assert_eq!(normalize_sensor("sn-silvav3n34-rev2-x"), "sn-silvav3n34");
        assert_eq!(normalize_sensor("sn-silvav3n34"), "sn-silvav3n34");
    }

    #[test]
    fn test_sensor_short_input_passes_through() {
        assert_eq!(normalize_sensor("sensor"), "sensor");
        assert_eq!(normalize_sensor(""), "");
    }

    #[test]
    fn test_gateway_prefixes() {
        // ---
        assert_eq!(normalize_gateway("bg3-0a-17-ffee"), "bg3-0a-17");
        assert_eq!(normalize_gateway("bg-12-ffee-01"), "bg-12");
        assert_eq!(normalize_gateway("bg2-12-ffee"), "bg2-12");
        assert_eq!(normalize_gateway("mg3-08-extra"), "mg3-08-extra");
        assert_eq!(normalize_gateway("eui-0011223344"), "eui-0011223344");
    }

    #[test]
    fn test_gateway_short_input_passes_through() {
        assert_eq!(normalize_gateway("bg3"), "bg3");
        assert_eq!(normalize_gateway("bg3-0a"), "bg3-0a");
        assert_eq!(normalize_gateway("bg"), "bg");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        // ---
        for raw in ["sn-silvav3n34-rev2", "sn", "a-b-c-d"] {
            let once = normalize_sensor(raw);
            assert_eq!(normalize_sensor(&once), once);
        }
        for raw in ["bg3-0a-17-ffee", "bg-12-ffee", "mg3-08-x", "other"] {
            let once = normalize_gateway(raw);
            assert_eq!(normalize_gateway(&once), once);
        }
    }
}
