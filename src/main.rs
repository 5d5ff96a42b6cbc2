use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lakehouse_relay::query::export::{self, ExportFormat};
use lakehouse_relay::{build_router, config, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Login) => login(cfg).await,
        Some(cli::Commands::Query {
            sql,
            catalog,
            schema,
            format,
        }) => run_query(cfg, &sql, &catalog, &schema, &format).await,
        Some(cli::Commands::QueryStatus { query_id }) => query_status(cfg, &query_id).await,
        Some(cli::Commands::CancelQuery { query_id }) => cancel_query(cfg, &query_id).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    opentelemetry::global::shutdown_tracer_provider();
    result
}

/// Console logs, JSON when LOG_FORMAT=json, plus OTLP export when
/// OTEL_EXPORTER_OTLP_ENDPOINT is set.
fn init_tracing() {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let installed = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "lakehouse-relay"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio);
        match installed {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                eprintln!("OpenTelemetry exporter disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    let (plain_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "lakehouse_relay=debug,tower_http=debug".into()),
        ))
        .with(plain_layer)
        .with(json_layer)
        .with(telemetry_layer)
        .init();
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid HOST: {}", cfg.host))?;
    let environment = cfg.environment.clone();
    let platform = cfg.lakehouse.base_url.clone();

    let state = Arc::new(AppState::new(cfg).context("failed to initialize relay state")?);
    let app = build_router(state);

    let addr = SocketAddr::new(host, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, %environment, %platform, "lakehouse relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

async fn login(cfg: config::Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    state
        .credentials
        .force_renew()
        .await
        .context("authentication failed")?;
    let info = state.credentials.describe();
    println!("Authenticated.");
    if let Some(expires_at) = info.expires_at {
        println!("  Expires:   {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Remaining: {}s", info.remaining_ms / 1000);
    state.credentials.invalidate();
    Ok(())
}

async fn run_query(
    cfg: config::Config,
    sql: &str,
    catalog: &str,
    schema: &str,
    format: &str,
) -> anyhow::Result<()> {
    let format = ExportFormat::parse(Some(format))?;
    let state = AppState::new(cfg)?;
    let result = state.queries.execute(sql, catalog, schema).await?;

    let rendered = match format {
        ExportFormat::Csv => export::to_csv(&result.columns, &result.rows),
        ExportFormat::Json => export::to_json(&result.rows)?,
    };
    println!("{}", rendered);
    eprintln!(
        "{} row(s) in {} ms (query {})",
        result.row_count, result.execution_time_ms, result.query_id
    );
    state.credentials.invalidate();
    Ok(())
}

async fn query_status(cfg: config::Config, query_id: &str) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    let view = state.queries.status(query_id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    state.credentials.invalidate();
    Ok(())
}

async fn cancel_query(cfg: config::Config, query_id: &str) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    state.queries.cancel(query_id).await?;
    println!("Query {} cancelled.", query_id);
    state.credentials.invalidate();
    Ok(())
}
