use crate::homeassistant::connection::ConnectionState;
use crate::upload::StationUpload;
use crate::wunderground::WU_PATH;
use crate::WeatherBridge;
use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const TEXT_PLAIN: [(header::HeaderName, &str); 1] = [(header::CONTENT_TYPE, "text/plain")];

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<WeatherBridge>,
    pub connection: Arc<ConnectionState>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(WU_PATH, get(update))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Station upload endpoint. The station only ever sees `success`.
async fn update(State(state): State<AppState>, RawQuery(query): RawQuery) -> impl IntoResponse {
    let upload = StationUpload::parse(query.as_deref().unwrap_or_default());
    debug!(params = upload.len(), "Received weather station upload");

    state.bridge.ingest(&upload);

    (StatusCode::OK, TEXT_PLAIN, "success")
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.connection.is_connected() {
        (StatusCode::OK, TEXT_PLAIN, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, TEXT_PLAIN, "MQTT disconnected")
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
