use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::TryStreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatepass::config::{self, Config};
use gatepass::lifecycle::export::CSV_HEADER;
use gatepass::models::ViewResult;
use gatepass::{app, store, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export is opt-in: only when OTEL_EXPORTER_OTLP_ENDPOINT is set.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "gatepass"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gatepass=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(command) => {
            let store = store::connect(&cfg.database_url).await?;
            let state = AppState::new(store, cfg);
            handle_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to token store...");
    let store = store::connect(&cfg.database_url).await?;

    let state = Arc::new(AppState::new(store, cfg));
    let app = app::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gatepass listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Ticket URLs printed by the CLI use the configured base, or localhost.
fn cli_url_base(cfg: &Config) -> String {
    cfg.base_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", cfg.port))
}

async fn handle_command(cmd: cli::Commands, state: &AppState) -> anyhow::Result<()> {
    let url = app::ticket_url_builder(&cli_url_base(&state.config));

    match cmd {
        cli::Commands::Serve { .. } => unreachable!("serve is dispatched in main"),
        cli::Commands::Issue {
            count,
            prefix,
            label,
        } => {
            let count = count.clamp(1, state.engine.max_issue());
            let tokens = state
                .engine
                .issue(count, &prefix, label.as_deref())
                .await
                .context("failed to issue tickets")?;
            println!("Issued {} ticket(s):", tokens.len());
            println!("{:<40} URL", "TOKEN");
            for t in tokens {
                println!("{:<40} {}", t, url(&t));
            }
        }
        cli::Commands::Stats => {
            let stats = state.engine.store().count().await?;
            println!(
                "Total:  {}\nUsed:   {}\nUnused: {}",
                stats.total,
                stats.used,
                stats.unused()
            );
        }
        cli::Commands::Export { csv } => {
            let exporter = gatepass::lifecycle::Exporter::new(state.engine.store().clone(), url);
            if csv {
                print!("{}", CSV_HEADER);
                let mut rows = exporter.rows();
                while let Some(row) = rows.try_next().await? {
                    print!("{}", row.to_csv_line());
                }
            } else {
                let mut rows = exporter.rows();
                let mut any = false;
                while let Some(row) = rows.try_next().await? {
                    if !any {
                        println!("{:<28} {:<20} {:<26} USED AT", "TOKEN", "LABEL", "CREATED");
                        any = true;
                    }
                    println!(
                        "{:<28} {:<20} {:<26} {}",
                        row.token,
                        row.label.as_deref().unwrap_or("-"),
                        row.created_at.format("%Y-%m-%d %H:%M:%S"),
                        row.used_at
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "-".into())
                    );
                }
                if !any {
                    println!("No tickets found.");
                }
            }
        }
        cli::Commands::Resolve { token, validator } => {
            match state.engine.resolve(&token, validator).await? {
                ViewResult::Validated { label, used_at, .. } => println!(
                    "VALID — admitted at {} (label: {})",
                    used_at,
                    label.as_deref().unwrap_or("-")
                ),
                ViewResult::AlreadyUsed { label, used_at, .. } => println!(
                    "ALREADY USED at {} (label: {})",
                    used_at,
                    label.as_deref().unwrap_or("-")
                ),
                ViewResult::NotFound { .. } => println!("NOT FOUND — no such ticket"),
                ViewResult::Neutral => println!("Ticket presented (public view)."),
            }
        }
    }
    Ok(())
}
