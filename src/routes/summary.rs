use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::export::summary_to_csv_string;
use crate::source::{fetch_readings, SourceQuery};
use crate::{pipeline, MeshReference, PipelineError, RawReading, RunOptions};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/summary", get(fetch_and_summarize).post(summarize_posted))
}

/// Query parameters shared by both `/summary` methods
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// `bg` or `mg`
    tier: Option<String>,
    /// Resampling frequency token, e.g. `1D`, `W`
    freq: Option<String>,
    /// `json` (default) or `csv`
    format: Option<String>,
    #[serde(flatten)]
    source: SourceQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    fn parse(token: Option<&str>) -> Option<Self> {
        // ---
        match token.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            None | Some("json") => Some(OutputFormat::Json),
            Some("csv") => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

/// Handle `POST /summary`: summarize the readings in the request body.
async fn summarize_posted(
    Query(params): Query<SummaryQuery>,
    State((reference, config)): State<AppState>,
    Json(readings): Json<Vec<RawReading>>,
) -> Response {
    // ---
    info!("POST /summary - {} readings", readings.len());

    let (options, format) = match resolve(&params, &config) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };
    summarize(&readings, &options, format, &reference)
}

/// Handle `GET /summary`: pull readings from the configured source and summarize.
async fn fetch_and_summarize(
    Query(params): Query<SummaryQuery>,
    State((reference, config)): State<AppState>,
) -> Response {
    // ---
    info!("GET /summary - Starting pipeline");

    let Some(api_url) = config.api_url.as_deref() else {
        warn!("GET /summary called without SENSOR_API_URL");
        return error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "SENSOR_API_URL is not configured".to_string(),
        );
    };

    let (options, format) = match resolve(&params, &config) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    debug!("GET /summary - Fetching readings: {:?}", params.source);
    let readings = match fetch_readings(api_url, config.api_max_pages, &params.source).await {
        Ok(readings) => readings,
        Err(e) => {
            error!("Failed to fetch readings: {}", e);
            return pipeline_error(e);
        }
    };

    summarize(&readings, &options, format, &reference)
}

// ---

fn resolve(
    params: &SummaryQuery,
    config: &crate::Config,
) -> Result<(RunOptions, OutputFormat), Response> {
    // ---
    let options = config
        .run_options(params.tier.as_deref(), params.freq.as_deref())
        .map_err(pipeline_error)?;
    let format = OutputFormat::parse(params.format.as_deref()).ok_or_else(|| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("Unknown format: {}", params.format.as_deref().unwrap_or("")),
        )
    })?;
    Ok((options, format))
}

fn summarize(
    readings: &[RawReading],
    options: &RunOptions,
    format: OutputFormat,
    reference: &MeshReference,
) -> Response {
    // ---
    let report = match pipeline::run(readings, options, reference) {
        Ok(report) => report,
        Err(e) => return pipeline_error(e),
    };

    match format {
        OutputFormat::Json => (StatusCode::OK, Json(report)).into_response(),
        OutputFormat::Csv => match summary_to_csv_string(report.tier, &report.rows) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => pipeline_error(e),
        },
    }
}

fn pipeline_error(e: PipelineError) -> Response {
    // ---
    let status = match e {
        PipelineError::EmptyInput => StatusCode::NOT_FOUND,
        PipelineError::UnknownFrequency(_)
        | PipelineError::SubDailyFrequency(_)
        | PipelineError::UnknownTier(_)
        | PipelineError::InvalidCounterRange { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Source(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, e.to_string())
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_output_format_tokens() {
        // ---
        assert_eq!(OutputFormat::parse(None), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse(Some("CSV")), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::parse(Some("xml")), None);
    }

    #[test]
    fn test_error_statuses() {
        // ---
        assert_eq!(
            pipeline_error(PipelineError::EmptyInput).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            pipeline_error(PipelineError::UnknownTier("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            pipeline_error(PipelineError::Reference("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
