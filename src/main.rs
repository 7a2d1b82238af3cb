//! Audit Slice - paginated audit record service
//!
//! Serves `GET /api/v1/audit` over a SQLite audit store, seeding the store
//! with generated records on first start, and optionally hosts the UI bundle.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use audit_slice::{api, config, db, middleware, services, AppConfig, AppState};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use config::{LogFormat, LogTarget};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Audit Slice {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Check for --issue-token flag
    if let Some(pos) = args.iter().position(|arg| arg == "--issue-token") {
        let subject = args
            .get(pos + 1)
            .context("--issue-token requires a subject argument")?;
        let token = middleware::create_access_token(subject, &config.auth)
            .context("Failed to issue token")?;
        println!("{}", token);
        return Ok(());
    }

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    info!("Audit Slice starting up");
    if !config.auth.enabled {
        warn!("Authentication is disabled; the audit API is open");
    }

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    services::seed_if_empty(&db, &config.seed)
        .await
        .context("Failed to seed audit store")?;

    let state = AppState {
        config: config.clone(),
        db,
    };

    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Audit Slice stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;
    let to_console = matches!(log_config.target, LogTarget::Console | LogTarget::Both);
    let to_file = matches!(log_config.target, LogTarget::File | LogTarget::Both);

    let (file_writer, guard) = if to_file {
        let (writer, guard) = create_file_writer(log_config);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(to_console.then(|| fmt_layer(&log_config.format, std::io::stdout)))
        .with(file_writer.map(|writer| fmt_layer(&log_config.format, writer)))
        .init();

    guard
}

/// A fmt layer in the configured format writing to `writer`
fn fmt_layer<S, W>(
    format: &LogFormat,
    writer: W,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, config: &AppConfig) -> Router {
    // Only needed when the UI is served from another origin (development)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api_router = api::router(state);

    let router = match config.server.static_dir {
        Some(ref static_dir) if config.server.serve_frontend && static_dir.exists() => {
            info!("Serving frontend from {:?}", static_dir);
            let index_file = static_dir.join("index.html");
            if index_file.exists() {
                api_router.fallback_service(
                    ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file)),
                )
            } else {
                warn!("index.html not found in {:?}, SPA fallback disabled", static_dir);
                api_router.fallback_service(ServeDir::new(static_dir))
            }
        }
        Some(ref static_dir) if config.server.serve_frontend => {
            warn!("Static directory {:?} does not exist, frontend not served", static_dir);
            api_router
        }
        _ => {
            info!("Frontend not served");
            api_router
        }
    };

    router
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

/// Print help message
fn print_help() {
    println!(
        r#"Audit Slice {}

USAGE:
    audit-slice [OPTIONS]

OPTIONS:
    -h, --help                  Print this help message
    -V, --version               Print version information
    --issue-token <SUBJECT>     Print a signed access token for SUBJECT and exit
                                (uses auth.jwt_secret from the configuration)

ENVIRONMENT:
    AUDIT_SLICE_CONFIG          Path to configuration file (default: config.yaml)
    AUDIT_SLICE_HOST            Listen address
    AUDIT_SLICE_PORT            Listen port
    DATABASE_URL                SQLite connection string
    JWT_SECRET                  Token signing secret
    AUDIT_SLICE_AUTH_ENABLED    Set to false to serve the API without tokens
    SEED_DATA_SET               Seed data set identifier
    AUDIT_SLICE_SEED_COUNT      Number of records seeded into an empty store
    RUST_LOG                    Log filter

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by AUDIT_SLICE_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/audit-slice/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
