use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use log::info;

use ytscribe::cache::ResultCache;
use ytscribe::config::Config;
use ytscribe::server::{AppState, create_router};
use ytscribe::service::TranscriptService;
use ytscribe::youtube::YouTubeProvider;

mod cli;

use cli::Cli;

fn setup_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(log_file) = log_file {
        if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(log_file)?);
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.init();
    if let Some(log_file) = log_file {
        info!("Logging initialized: {}", log_file.display());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
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
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?.with_port_override(std::env::var("PORT").ok().as_deref());
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let client = config.http.build_client()?;
    let provider = Arc::new(YouTubeProvider::new(client));
    let cache = ResultCache::default();
    info!(
        "Cache: {}s TTL, max {} entries",
        ytscribe::cache::DEFAULT_TTL.as_secs(),
        cache.capacity()
    );
    let service = TranscriptService::new(provider, cache, config.fetch_timeout());

    let app = create_router(
        AppState {
            service: Arc::new(service),
        },
        &config,
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .wrap_err_with(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding {addr}"))?;

    info!("ytscribe {} listening on http://{addr}", env!("GIT_DESCRIBE"));
    info!(
        "Rate limit: {}/hour per client, {}/hour for transcripts",
        config.rate_limit_per_hour, config.transcript_rate_limit_per_hour
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
