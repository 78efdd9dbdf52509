//! HTTP lookup server
//!
//! This module exposes the index store over HTTP with axum:
//!
//! - `GET /` - welcome text
//! - `GET /data?rir=&country=&asn=&output=` - lookup, rendered as csv, txt or
//!   paloalto (the default, also used for unknown `output` values)
//! - `GET /status` - `{"status":"Running"}`
//!
//! Keys are normalized without truncation. The server only reads the index
//! store; a concurrent ingestion run swaps whole namespace directories, so a
//! request sees either the previous or the new index of a namespace.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rirlists::server::{start_server, ServerConfig};
//!
//! let config = ServerConfig::new().with_port(5000);
//! start_server("~/.rirlists/out", config).await?;
//! ```

use crate::config::{RirListsConfig, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVER_PORT};
use crate::database::IndexStore;
use crate::lens::query::{KeyNormalization, NoKeysRequested, QueryLens, QueryRequest};
use crate::lens::utils::OutputFormat;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// =============================================================================
// Server Configuration
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub address: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVER_ADDRESS.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RirListsConfig) -> Self {
        Self {
            address: config.server_address.clone(),
            port: config.server_port,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<IndexStore>,
}

impl ServerState {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(IndexStore::new(output_dir)),
        }
    }
}

/// Query string of `GET /data`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataParams {
    pub rir: Option<String>,
    pub country: Option<String>,
    pub asn: Option<String>,
    pub output: Option<String>,
}

// =============================================================================
// Axum Router Creation
// =============================================================================

/// Create the axum router serving the lookup endpoints
pub fn create_axum_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home_handler))
        .route("/data", get(data_handler))
        .route("/status", get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home_handler() -> &'static str {
    "Welcome to the rirlists API!"
}

async fn status_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "Running"}))
}

async fn data_handler(
    State(state): State<ServerState>,
    Query(params): Query<DataParams>,
) -> Response {
    let format = OutputFormat::parse_or_default(params.output.as_deref().unwrap_or_default());
    let store = state.store.clone();

    // index files are read with blocking IO
    let rendered = tokio::task::spawn_blocking(move || render_data(&store, &params, format)).await;

    match rendered {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, format.content_type())], body).into_response(),
        Ok(Err(e)) if e.downcast_ref::<NoKeysRequested>().is_some() => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Ok(Err(e)) => {
            warn!("Lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            warn!("Lookup task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render_data(store: &IndexStore, params: &DataParams, format: OutputFormat) -> Result<String> {
    let request = QueryRequest::from_lists(
        params.rir.as_deref(),
        params.country.as_deref(),
        params.asn.as_deref(),
        KeyNormalization::Plain,
    );
    let lens = QueryLens::new(store);
    let entries = lens.lookup(&request)?;
    for message in lens.processed_messages(&request) {
        info!("{}", message);
    }
    QueryLens::render(&entries, format)
}

// =============================================================================
// Server Startup
// =============================================================================

/// Start the lookup server over the index store at `output_dir`
pub async fn start_server(output_dir: impl Into<PathBuf>, config: ServerConfig) -> Result<()> {
    let state = ServerState::new(output_dir);
    let app = create_axum_router(state);

    let bind_address = config.bind_address();
    info!("Starting lookup server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
