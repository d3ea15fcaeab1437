use std::sync::Arc;

use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use mf_domain::config::{Config, ConfigSeverity};
use mf_gateway::cli::{self, Cli, Command, ConfigCommand};
use mf_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = cli::load_config(&cli)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config {
            command: ConfigCommand::Validate,
        }) => {
            let config = cli::load_config(&cli)?;
            if !cli::validate(&config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("medflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mf_gateway=debug")),
        )
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("MedFlow starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Browser trace directory ──────────────────────────────────────
    std::fs::create_dir_all(&config.browser.history_dir)?;

    // ── Shared state ─────────────────────────────────────────────────
    let state = AppState::build(config.clone())?;

    // ── Router ───────────────────────────────────────────────────────
    let cors = cors_layer(&config.server.cors.allowed_origins);
    let app = mf_gateway::api::router()
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the CORS layer. Entries ending in `:*` match any port on that
/// host; `*` alone is fully permissive.
fn cors_layer(allowed: &[String]) -> CorsLayer {
    if allowed.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let patterns: Vec<String> = allowed.to_vec();
    let origin = AllowOrigin::predicate(move |origin, _| {
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        patterns.iter().any(|p| {
            if let Some(prefix) = p.strip_suffix(":*") {
                origin == prefix
                    || origin
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(':'))
            } else {
                origin == p
            }
        })
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
