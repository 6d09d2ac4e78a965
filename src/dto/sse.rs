use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::ChangeEvent;

/// SSE event name of the handshake sent when a feed opens.
pub const READY_EVENT: &str = "ready";
/// SSE event name of a room change notification.
pub const CHANGE_EVENT: &str = "change";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Wrap a store change notification.
    pub fn change(change: &ChangeEvent) -> serde_json::Result<Self> {
        Self::json(Some(CHANGE_EVENT.to_owned()), change)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// First message on a room feed.
pub struct FeedHandshake {
    pub room_id: Uuid,
    pub code: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}
