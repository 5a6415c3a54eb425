// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # HTTP Server
//!
//! Health, version and metrics endpoints:
//!
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/version` - Build information as JSON
//! - `/metrics` - Prometheus metrics in text format

use crate::constants::{HEALTHZ_SERVER_PATH, METRICS_SERVER_PATH, VERSION_SERVER_PATH};
use crate::metrics::gather_metrics;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Body of the `/version` endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

impl VersionInfo {
    /// Information about this build.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
        }
    }
}

/// Routes served by the HTTP server.
pub fn router() -> Router {
    Router::new()
        .route(HEALTHZ_SERVER_PATH, get(healthz_handler))
        .route(VERSION_SERVER_PATH, get(version_handler))
        .route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve [`router`] on `address` until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or serving fails.
pub async fn start_server(address: SocketAddr, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %address, "HTTP server listening");
    serve(listener, cancel).await
}

/// Serve [`router`] on an already bound `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns an error if serving fails.
pub async fn serve(listener: TcpListener, cancel: CancellationToken) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn version_handler() -> impl IntoResponse {
    Json(VersionInfo::current())
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
