//! dpdk-telemetry-exporter - version 0.1.0
//!
//! Prometheus exporter for DPDK ethdev telemetry with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod push;
mod state;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use dpdk_telemetry_exporter::telemetry::{scan_existing, DirectoryWatcher, EndpointRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_rates};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    config_handler, endpoint_info_handler, endpoint_rates_handler, endpoint_stats_handler,
    endpoints_handler, ethdev_rates_handler, ethdev_stats_handler, health_handler,
    metrics_handler, root_handler,
};
use push::{run_push_loop, stop_push_task};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match config.log_level() {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", config.log_level());
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Builds the HTTP router.
fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/config", get(config_handler))
        .route("/endpoints", get(endpoints_handler))
        .route("/endpoints/{name}/stats", get(endpoint_stats_handler))
        .route("/endpoints/{name}/rates", get(endpoint_rates_handler))
        .route("/endpoints/{name}/info", get(endpoint_info_handler))
        .route("/ethdev/stats", get(ethdev_stats_handler))
        .route("/ethdev/stats/rate", get(ethdev_rates_handler))
        .with_state(state)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), *format, *commented);
        }

        let config = load_validated_config(&args)?;

        return match command {
            Commands::Check { stats } => command_check(*stats, &config).await,

            Commands::Rates {
                endpoint,
                interval,
                iterations,
            } => command_rates(endpoint.clone(), *interval, *iterations, &config).await,

            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config)?;

    info!("Starting dpdk-telemetry-exporter");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).to_string();
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Endpoint registry and discovery
    let shutdown = CancellationToken::new();
    let endpoints = Arc::new(EndpointRegistry::with_shutdown(
        config.poller_settings(),
        config.drain_timeout(),
        shutdown.child_token(),
    ));

    let sock_prefix = config.sock_prefix().to_path_buf();
    if !sock_prefix.is_dir() {
        error!(
            "❌ Socket root {} does not exist or is not a directory",
            sock_prefix.display()
        );
        return Err(format!("socket root {} not found", sock_prefix.display()).into());
    }

    // Watch before scanning; a directory seen by both is added twice, which replaces it.
    let watcher = DirectoryWatcher::start(
        endpoints.clone(),
        &sock_prefix,
        config.socket_name(),
        shutdown.clone(),
    )
    .map_err(|e| {
        error!("❌ Cannot watch {}: {}", sock_prefix.display(), e);
        e
    })?;

    let found = scan_existing(&endpoints, &sock_prefix, config.socket_name()).await?;
    info!(
        "Found {} telemetry endpoint(s) under {}",
        found,
        sock_prefix.display()
    );

    let state = Arc::new(AppState::new(endpoints.clone(), config.clone())?);
    debug!("Application state initialized");

    // Optional Pushgateway task
    let push_task = config.push_gateway_url.clone().map(|url| {
        tokio::spawn(run_push_loop(
            state.clone(),
            url,
            config.push_job().to_string(),
            config.push_interval(),
            shutdown.child_token(),
        ))
    });

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = build_router(state.clone());

    // Check if TLS is enabled
    let enable_tls = config.enable_tls.unwrap_or(false);

    let served: Result<(), Box<dyn std::error::Error>> = if enable_tls {
        // Both paths were checked by validate_effective_config()
        let cert_path = config
            .tls_cert_path
            .as_ref()
            .ok_or("tls_cert_path must be set when enable_tls is true")?;
        let key_path = config
            .tls_key_path
            .as_ref()
            .ok_or("tls_key_path must be set when enable_tls is true")?;

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "dpdk-telemetry-exporter listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => result.map_err(|e| {
                error!("Server error: {}", e);
                e.into()
            }),
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
                Ok(())
            }
        }
    } else {
        // TLS is disabled - use standard TCP listener
        let listener = TcpListener::bind(addr).await?;
        info!(
            "dpdk-telemetry-exporter listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => result.map_err(|e| {
                error!("Server error: {}", e);
                e.into()
            }),
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
                Ok(())
            }
        }
    };

    // Stop discovery first so no poller starts while the others drain.
    shutdown.cancel();
    watcher.stop().await;
    endpoints.shutdown().await;
    if let Some(task) = push_task {
        stop_push_task(task, config.drain_timeout()).await;
    }

    served?;
    info!("dpdk-telemetry-exporter stopped gracefully");
    Ok(())
}
