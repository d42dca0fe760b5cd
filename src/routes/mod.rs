//! HTTP routes gateway (EMBP).
//!
//! Each endpoint file exports a subrouter; this gateway merges them and
//! attaches the shared state so `main.rs` never sees individual routes.

use std::sync::Arc;

use axum::Router;

use crate::{Config, MeshReference};

mod health;
mod summary;

/// Shared, read-only state handed to every handler.
pub type AppState = (Arc<MeshReference>, Config);

// ---

pub fn router(reference: Arc<MeshReference>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(summary::router())
        .merge(health::router())
        .with_state((reference, config))
}
