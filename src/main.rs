// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream;
use prometheus_config_controller::{
    config::{Args, Config},
    constants::{MAIN_LOOP, RELOAD_LOOP, TOKIO_WORKER_THREADS},
    controller::run_loop,
    informer::{artificial_ticks, config_map_triggers, service_triggers},
    kubernetes::{connect, KubeApi, KubeClient},
    metrics::{PrometheusTelemetry, Telemetry},
    reconciler::Reconciler,
    reloader::{Reloader, SystemClock},
    resources::{CertificateResource, ConfigMapResource, ReloadResource, ResourceStep, Step},
    retry::retry_api_call,
    server::start_server,
};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("prometheus-config-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or text).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Resolve once SIGINT or SIGTERM is received.
async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown");
        }
    }
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Prometheus config controller"
    );

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = Config::try_from(args).context("invalid configuration")?;
    debug!(config = ?config, "Configuration loaded");

    let client = connect(&config.kubernetes).await?;
    let version = retry_api_call(|| client.apiserver_version(), "apiserver version")
        .await
        .context("kubernetes api server is unreachable")?;
    info!(
        git_version = %version.git_version,
        platform = %version.platform,
        "Connected to Kubernetes API server"
    );

    let kube: Arc<dyn KubeApi> = Arc::new(KubeClient::new(client.clone()));
    let telemetry: Arc<dyn Telemetry> = Arc::new(PrometheusTelemetry);
    let reloader = Arc::new(Reloader::new(
        &config.prometheus_address,
        config.minimum_reload_time,
        config.config_map.clone(),
        kube.clone(),
        Arc::new(SystemClock),
        telemetry.clone(),
    )?);

    let certificate = CertificateResource::new(
        &config.certificate,
        kube.clone(),
        reloader.clone(),
        telemetry.clone(),
    );
    let config_map = ConfigMapResource::new(
        config.config_map.clone(),
        config.certificate.directory.clone(),
        kube.clone(),
        reloader.clone(),
        telemetry.clone(),
    );

    let main_steps: Vec<Box<dyn Step>> = vec![
        Box::new(ResourceStep::new(certificate)),
        Box::new(ResourceStep::new(config_map)),
    ];
    let reload_steps: Vec<Box<dyn Step>> = vec![Box::new(ReloadResource::new(reloader))];

    let main_reconciler = Arc::new(Reconciler::new(
        MAIN_LOOP,
        main_steps,
        config.resource_retries,
        telemetry.clone(),
    ));
    let reload_reconciler = Arc::new(Reconciler::new(
        RELOAD_LOOP,
        reload_steps,
        config.resource_retries,
        telemetry,
    ));

    let main_triggers = stream::select(
        service_triggers(client.clone()),
        artificial_ticks(config.resync_period),
    );
    let reload_triggers = stream::select(
        config_map_triggers(client, &config.config_map.namespace, &config.config_map.name),
        artificial_ticks(config.resync_period),
    );

    let cancel = CancellationToken::new();
    info!("Starting reconciliation loops");

    let (signal_result, (), (), server_result) = tokio::join!(
        async {
            let result = shutdown_signal().await;
            cancel.cancel();
            result
        },
        run_loop(main_reconciler, main_triggers, cancel.clone()),
        run_loop(reload_reconciler, reload_triggers, cancel.clone()),
        async {
            let result = start_server(config.listen_address, cancel.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "HTTP server failed, shutting down");
                cancel.cancel();
            }
            result
        },
    );

    signal_result?;
    server_result?;
    info!("Prometheus config controller stopped");
    Ok(())
}
