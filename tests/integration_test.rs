use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Query, routing::get, Json, Router};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

use linkaudit::{routes, Config, MeshReference};

// ---

/// Bind `app` on an ephemeral port and return its base URL.
async fn spawn_app(app: Router) -> Result<String> {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

async fn spawn_service(config: Config) -> Result<String> {
    // ---
    let reference = Arc::new(MeshReference::builtin()?);
    spawn_app(routes::router(reference, config)).await
}

fn create_test_reading(minute: u32, counter: i64) -> Value {
    // ---
    json!({
        "sensor_id": "sn-silvav3n34-x",
        "sensor_lat": 52.8563339,
        "sensor_long": 13.7961379,
        "timestamp": format!("2024-06-03T08:{:02}:00Z", minute),
        "bgtw_id": "bg-12-ff",
        "mesh_gateway_sequence": "2057",
        "bgtw_rssi": -100.0,
        "bgtw_snr": 7.0,
        "framecount": counter,
        "frameport": 1
    })
}

/// Counters 0, 1, 3, 4 on one day: one frame lost out of five.
fn create_test_readings() -> Vec<Value> {
    [0, 1, 3, 4]
        .into_iter()
        .enumerate()
        .map(|(i, counter)| create_test_reading(i as u32 * 10, counter))
        .collect()
}

#[tokio::test]
async fn health_reports_reference_size() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;

    let response = Client::new().get(format!("{}/health", base)).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mesh_reference_entries"], 116);
    Ok(())
}

#[tokio::test]
async fn posted_direct_summary() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;

    let response = Client::new()
        .post(format!("{}/summary?tier=bg&freq=1D", base))
        .json(&create_test_readings())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await?;
    assert_eq!(report["tier"], "bg");
    assert_eq!(report["frequency"], "1D");
    assert_eq!(report["audit"]["input_rows"], 4);

    let rows = report["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["sensor_id"], "sn-silvav3n34");
    assert_eq!(row["gateway_id"], "bg-12");
    assert_eq!(row["time_bucket"], "2024-06-03");
    assert_eq!(row["received_messages"], 4);
    assert_eq!(row["missing_messages"], 1);
    assert_eq!(row["total_messages"], 5);
    assert_eq!(row["loss_rate_percent"], 20.0);
    assert!(row.get("distance_m").is_none());
    Ok(())
}

#[tokio::test]
async fn posted_mesh_summary_as_csv() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;

    let response = Client::new()
        .post(format!("{}/summary?tier=mg&format=csv", base))
        .json(&create_test_readings())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/csv"));

    let body = response.text().await?;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines[0],
        "sensor_id,gateway_id,mesh_gateway_id,time_bucket,avg_rssi,avg_snr,\
         received_messages,missing_messages,total_messages,loss_rate_percent,distance_m"
    );
    assert_eq!(
        lines[1],
        "sn-silvav3n34,bg-12,mg3-9,2024-06-03,-100.0,7.0,4,1,5,20.0,0.0"
    );
    assert_eq!(lines.len(), 2);
    Ok(())
}

#[tokio::test]
async fn bad_tokens_are_rejected() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;
    let client = Client::new();

    for query in ["tier=xg", "freq=1h", "freq=fortnight", "format=xml"] {
        let response = client
            .post(format!("{}/summary?{}", base, query))
            .json(&create_test_readings())
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "query {}", query);

        let body: Value = response.json().await?;
        assert!(body["error"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn empty_table_is_not_found() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;

    let response = Client::new()
        .post(format!("{}/summary", base))
        .json(&Vec::<Value>::new())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn filtered_out_table_gives_empty_rows() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;
    let mut diagnostic = create_test_reading(0, 0);
    diagnostic["frameport"] = json!(99);

    let response = Client::new()
        .post(format!("{}/summary", base))
        .json(&vec![diagnostic])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await?;
    assert_eq!(report["rows"], json!([]));
    assert_eq!(report["audit"]["diagnostic_frames"], 1);
    Ok(())
}

#[tokio::test]
async fn fetch_without_source_is_unavailable() -> Result<()> {
    // ---
    let base = spawn_service(Config::default()).await?;

    let response = Client::new().get(format!("{}/summary", base)).send().await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn fetch_follows_source_pagination() -> Result<()> {
    // ---
    let readings = create_test_readings();
    let pages = json!({
        "first": { "results": readings[..2].to_vec(), "next_cursor": "p2" },
        "p2": { "results": readings[2..].to_vec(), "next_cursor": null }
    });

    let upstream = Router::new().route(
        "/readings",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let pages = pages.clone();
            async move {
                assert_eq!(params.get("sensor_id").map(String::as_str), Some("sn-silvav3n34"));
                let page = params.get("cursor").map(String::as_str).unwrap_or("first");
                Json(pages[page].clone())
            }
        }),
    );
    let upstream_base = spawn_app(upstream).await?;

    let config = Config {
        api_url: Some(format!("{}/readings", upstream_base)),
        ..Config::default()
    };
    let base = spawn_service(config).await?;

    let response = assert_ok!(
        Client::new()
            .get(format!("{}/summary?sensor_id=sn-silvav3n34", base))
            .send()
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await?;
    let row = &report["rows"][0];
    assert_eq!(row["received_messages"], 4);
    assert_eq!(row["missing_messages"], 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_source_is_bad_gateway() -> Result<()> {
    // ---
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let dead = listener.local_addr()?;
    drop(listener);

    let config = Config {
        api_url: Some(format!("http://{}/readings", dead)),
        ..Config::default()
    };
    let base = spawn_service(config).await?;

    let response = Client::new().get(format!("{}/summary", base)).send().await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    Ok(())
}
