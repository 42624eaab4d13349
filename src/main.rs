use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bootcamp::config::{Cli, Config, default_config_dir, default_config_path};
use bootcamp::db::Database;
use bootcamp::handler::AppState;
use bootcamp::products::ProductCatalog;
use bootcamp::rate_limit::RateLimiter;
use bootcamp::router;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // --config puts the database next to the config file; otherwise both
    // live under ~/.bootcamp/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("bootcamp.svc starting");

    let cfg = Config::load_or_default(&config_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let db = Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    });
    if args.seed {
        if let Err(e) = db.seed().await {
            tracing::error!(error = %e, "failed to seed database");
            std::process::exit(1);
        }
        tracing::info!("demo data loaded");
    }

    let products_file = cfg.app.products_file.as_ref().map(PathBuf::from);
    let products = ProductCatalog::load(products_file.as_deref()).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?products_file, "failed to load products");
        std::process::exit(1);
    });

    let cancellation_token = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::from_config(&cfg.rate_limit));
    let pruner = limiter.clone().spawn_pruner(cancellation_token.clone());

    let app = router::app(AppState::new(Arc::new(db), products, limiter));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("bootcamp.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
    }

    cancellation_token.cancel();
    if let Err(e) = pruner.await {
        tracing::warn!(error = %e, "rate limit pruner did not stop cleanly");
    }
    tracing::info!("bootcamp.svc going off, graceful shutdown complete");
}
