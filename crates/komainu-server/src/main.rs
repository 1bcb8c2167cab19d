use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.json_logs);

    let commands = komainu_core::commands::default_registry()?;
    if args.print_commands {
        println!("{}", serde_json::to_string_pretty(&commands.definitions())?);
        return Ok(());
    }

    let config = config::Config::load(&args.config)?;
    ensure_data_dirs(&config);

    let db = komainu_db::create_pool_with_options(&config.store_options()).await?;
    komainu_db::run_migrations(&db).await?;

    let state = komainu_core::AppState::new(db.clone(), config.app_config(), commands);
    let sweeper = spawn_pending_sweeper(
        Arc::clone(&state.pending_polls),
        state.config.pending_poll_ttl,
    );

    let app = komainu_api::build_router()
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests,
        ))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        bind_address = %config.server.bind_address,
        database = %config.database.url,
        "komainu listening"
    );

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    sweeper.abort();
    db.close().await;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("komainu=info,tower_http=debug"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Periodically drop poll drafts whose message was never confirmed.
fn spawn_pending_sweeper(
    pending: Arc<komainu_core::pending::PendingPolls>,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let dropped = pending.sweep_expired(ttl);
            if dropped > 0 {
                tracing::info!(dropped, "discarded unconfirmed poll drafts");
            }
        }
    })
}

/// Ensure the database's parent directory exists before the pool opens it.
fn ensure_data_dirs(config: &config::Config) {
    if let Some(db_path) = config
        .database
        .url
        .strip_prefix("sqlite://")
        .and_then(|s| s.split('?').next())
    {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Could not create directory '{}': {}", parent.display(), e);
                }
            }
        }
    }
}
