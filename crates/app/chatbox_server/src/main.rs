//! Chatbox API server binary.
//!
//! Reads configuration from the environment (and `.env`), connects to
//! PostgreSQL unless `--in-memory` is given, and serves `/api/chat`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatbox_api::config::ApiConfig;
use chatbox_core::store::ChatStore;
use chatbox_core::store::memory::MemoryChatStore;
use chatbox_core::store::postgres::PgChatStore;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "chatbox_server", about = "Chatbox API server")]
struct Args {
    /// Port to listen on. Overrides the port in `BIND_ADDR` (0 = ephemeral).
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/chatbox"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep chat records in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

/// Replace the port of `bind_addr`, keeping its host.
fn with_port(bind_addr: &str, port: u16) -> String {
    match bind_addr.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{bind_addr}:{port}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,chatbox_api=debug,chatbox_core=debug")
                }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.database_url = args.database_url.clone();
    if let Some(port) = args.port {
        config.bind_addr = with_port(&config.bind_addr, port);
    }

    info!(?config, in_memory = args.in_memory, "starting chatbox_server");

    let store: Arc<dyn ChatStore> = if args.in_memory {
        warn!("using in-memory store; chat history is lost on restart");
        Arc::new(MemoryChatStore::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&args.database_url)
            .await?;

        info!("running database migrations");
        chatbox_core::migrate::migrate(&pool).await?;

        Arc::new(PgChatStore::new(pool))
    };

    let state = chatbox_api::services::pipeline::build_state(config, store)?;
    info!(
        policy = ?state.pipeline.policy(),
        uploads_enabled = state.pipeline.uploads_enabled(),
        "chat pipeline ready"
    );

    if let Some(limiter) = state.rate_limiter.clone() {
        let every = limiter.config().window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = limiter.purge_expired();
                if purged > 0 {
                    debug!(purged, "purged expired rate-limit windows");
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    let app = chatbox_api::router(state);

    info!(addr = %local_addr, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}
