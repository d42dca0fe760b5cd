//! Paginated readings source.
//!
//! Boundary of the extraction collaborator: the upstream service owns query
//! construction and warehouse credentials and serves already-selected
//! readings as pages of `{"results": [...], "next_cursor": "..."}`.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::RawReading;

// ---

/// Selection forwarded to the readings source as query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SourceQuery {
    /// Comma-separated sensor ids.
    pub sensor_id: Option<String>,
    /// Comma-separated gateway ids or mesh sequence tokens.
    pub gateway_id: Option<String>,
    /// Inclusive range start, e.g. `2024-06-01`.
    pub start: Option<String>,
    /// Inclusive range end.
    pub end: Option<String>,
}

impl SourceQuery {
    fn params(&self) -> Vec<(&'static str, &str)> {
        // ---
        [
            ("sensor_id", self.sensor_id.as_deref()),
            ("gateway_id", self.gateway_id.as_deref()),
            ("start", self.start.as_deref()),
            ("end", self.end.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// Fetch every page of readings, up to `max_pages`.
///
/// Items that fail to parse are logged and skipped.
pub async fn fetch_readings(
    base_url: &str,
    max_pages: u32,
    query: &SourceQuery,
) -> Result<Vec<RawReading>> {
    // ---
    let client = reqwest::Client::new();
    let mut all_data = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_count = 0;

    loop {
        if page_count >= max_pages {
            debug!(
                "Hit page limit of {}, stopping pagination. Fetched {} records so far.",
                max_pages,
                all_data.len()
            );
            break;
        }
        page_count += 1;

        debug!("Fetching page {} from: {}", page_count, base_url);

        let response: serde_json::Value = {
            let mut params = query.params();
            if let Some(ref cursor) = cursor {
                params.push(("cursor", cursor.as_str()));
            }
            client
                .get(base_url)
                .query(&params)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        };

        if let Some(data) = response.get("results").and_then(|d| d.as_array()) {
            debug!(
                "Page {} found data array with {} items",
                page_count,
                data.len()
            );
            for (i, item) in data.iter().enumerate() {
                match serde_json::from_value::<RawReading>(item.clone()) {
                    Ok(reading) => all_data.push(reading),
                    Err(e) => {
                        debug!(
                            "Failed to parse item {} on page {}: {} - Raw item: {}",
                            i, page_count, e, item
                        );
                    }
                }
            }
        } else {
            debug!(
                "Page {} response missing 'results' field or not an array",
                page_count
            );
        }

        cursor = response
            .get("next_cursor")
            .and_then(|c| c.as_str())
            .map(String::from);

        if cursor.is_none() {
            break;
        }
    }

    info!(
        "Finished fetching {} total readings from {} pages",
        all_data.len(),
        page_count
    );
    Ok(all_data)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_only_set_params_are_forwarded() {
        // ---
        let query = SourceQuery {
            sensor_id: Some("sn-a,sn-b".to_string()),
            start: Some("2024-06-01".to_string()),
            ..SourceQuery::default()
        };
        assert_eq!(
            query.params(),
            vec![("sensor_id", "sn-a,sn-b"), ("start", "2024-06-01")]
        );
        assert!(SourceQuery::default().params().is_empty());
    }
}
