//! Four Pics Back binary entrypoint wiring REST, SSE and the configured storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use futures::{FutureExt, future::BoxFuture};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use four_pics_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageResult,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

type Connector = Box<dyn FnMut() -> BoxFuture<'static, StorageResult<Arc<dyn GameStore>>> + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
    let connect = connector(&backend)?;
    info!(backend = %backend, "selected storage backend");

    let app_state = AppState::new(config);
    tokio::spawn(storage_supervisor::run(app_state.clone(), connect));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the connection factory for the backend named by `STORE_BACKEND`.
fn connector(backend: &str) -> anyhow::Result<Connector> {
    match backend {
        "memory" => {
            let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
            Ok(Box::new(move || {
                let store = store.clone();
                async move { StorageResult::Ok(store) }.boxed()
            }))
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => Ok(Box::new(|| connect_mongo().boxed())),
        #[cfg(feature = "rest-store")]
        "rest" => Ok(Box::new(|| connect_rest().boxed())),
        other => bail!("unsupported STORE_BACKEND `{other}` (is the matching feature enabled?)"),
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> StorageResult<Arc<dyn GameStore>> {
    use four_pics_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoGameStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "rest-store")]
async fn connect_rest() -> StorageResult<Arc<dyn GameStore>> {
    use four_pics_back::dao::game_store::rest::{RestConfig, RestGameStore};

    let config = RestConfig::from_env()?;
    let store = RestGameStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
