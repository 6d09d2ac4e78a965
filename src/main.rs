//! Quiz room back binary entrypoint wiring the HTTP surface, the change feeds, storage and the retention janitor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_room_back::{
    config::AppConfig,
    dao::room_store::{MemoryRoomStore, RoomStore},
    quiz::{HttpQuizProvider, QuizProvider, StaticQuizProvider, UnconfiguredQuizProvider},
    routes,
    services::retention,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let quiz_provider = build_quiz_provider(&config)?;
    let app_state = AppState::new(config, quiz_provider);

    start_storage(&app_state).await;
    retention::spawn(app_state.clone());

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

/// Pick the quiz source: generator service, then JSON fixture, else none.
fn build_quiz_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn QuizProvider>> {
    if let Some(url) = &config.quiz.generator_url {
        info!(endpoint = %url, "using quiz generator service");
        let provider = HttpQuizProvider::new(url.clone(), config.quiz.generator_timeout)
            .context("building quiz generator client")?;
        return Ok(Arc::new(provider));
    }

    if let Some(path) = &config.quiz.fixture_path {
        info!(path = %path.display(), "using quiz fixture");
        let provider = StaticQuizProvider::from_path(path)
            .with_context(|| format!("loading quiz fixture {}", path.display()))?;
        return Ok(Arc::new(provider));
    }

    warn!("no quiz source configured; room creation will fail");
    Ok(Arc::new(UnconfiguredQuizProvider))
}

/// MongoDB when `MONGO_URI` is set (supervised in the background), the in-memory store otherwise.
async fn start_storage(state: &SharedState) {
    if spawn_mongo_supervisor(state) {
        return;
    }

    info!("MONGO_URI not set; rooms are kept in memory");
    state
        .install_room_store(Arc::new(MemoryRoomStore::new()))
        .await;
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> bool {
    use quiz_room_back::{
        dao::{
            room_store::mongodb::{MongoConfig, MongoRoomStore},
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    if env::var("MONGO_URI").is_err() {
        return false;
    }

    tokio::spawn(storage_supervisor::run(state.clone(), || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoRoomStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
    }));
    true
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> bool {
    false
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
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
