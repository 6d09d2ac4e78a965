use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the room store and report whether the service is serving or degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let active_feeds = state.notifier().active_rooms();

    match state.require_room_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
                return HealthResponse::degraded(active_feeds);
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded(active_feeds)
    } else {
        HealthResponse::ok(active_feeds)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::MemoryRoomStore, quiz::StaticQuizProvider,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default(), Arc::new(StaticQuizProvider::sample()));
        assert_eq!(health_status(&state).await.status, "degraded");

        state.install_room_store(Arc::new(MemoryRoomStore::new())).await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
