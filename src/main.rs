use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_price_service::{AppConfig, ModelRegistry, build_router, ensure_local, store_for};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry RUST_LOG, so it is read before the subscriber exists.
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => return Err(err.into()),
    }

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        bucket = %config.storage.bucket,
        model_dir = %config.model_dir.display(),
        "ensuring model artifacts"
    );

    let store = store_for(&config.storage)?;
    let paths = ensure_local(store.as_ref(), config.as_ref()).await?;

    let registry = Arc::new(ModelRegistry::initialize(&paths)?);
    let router = build_router(config.clone(), registry)?;

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
