//! Retention janitor: rooms older than the configured max age are deleted together with their players.

use std::time::{Duration, SystemTime};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{info, warn};

use crate::{
    dao::models::RoomEntity,
    error::ServiceError,
    services::room_service,
    state::SharedState,
};

/// Delete every room created more than `max_age` ago.
pub async fn sweep_expired(
    state: &SharedState,
    max_age: Duration,
) -> Result<Vec<RoomEntity>, ServiceError> {
    let store = state.require_room_store().await?;
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let deleted = store.delete_rooms_created_before(cutoff).await?;
    for room in &deleted {
        room_service::announce_deleted(state, room);
    }
    if !deleted.is_empty() {
        info!(count = deleted.len(), "expired rooms deleted");
    }
    Ok(deleted)
}

/// Check the bearer token of a maintenance call against the configured secret.
///
/// No secret configured means the endpoint is open.
pub fn authorize(state: &SharedState, authorization: Option<&str>) -> Result<(), ServiceError> {
    let Some(secret) = state.config().cron_secret.as_deref() else {
        return Ok(());
    };

    let provided = authorization.and_then(|value| value.strip_prefix("Bearer "));
    if provided == Some(secret) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("invalid maintenance token".into()))
    }
}

/// Run [`sweep_expired`] on the configured interval until the runtime shuts down.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let retention = state.config().retention;
        let mut ticker = interval(retention.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if state.is_degraded() {
                continue;
            }
            if let Err(err) = sweep_expired(&state, retention.max_age).await {
                warn!(error = %err, "retention sweep failed");
            }
        }
    })
}
