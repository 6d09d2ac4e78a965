//! Per-room "something changed" fan-out.
//!
//! Delivery is at-least-once from the point of view of a subscriber: a lagged
//! receiver is handed a synthetic [`ChangeKind::Resync`] instead of the events
//! it missed, which is enough because consumers always re-read the store.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// Store table a change originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// The `rooms` table.
    Rooms,
    /// The `players` table.
    Players,
}

/// What happened. Purely informational: consumers re-fetch regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Status or current question changed.
    RoomUpdated,
    /// The room is gone.
    RoomDeleted,
    /// A player joined.
    PlayerJoined,
    /// An answer was appended.
    PlayerUpdated,
    /// Events were dropped for this subscriber; treat as "anything may have changed".
    Resync,
}

/// Notification published after a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChangeEvent {
    /// Room the change belongs to.
    pub room_id: Uuid,
    /// Table the change originated from.
    pub table: TableKind,
    /// Kind of change.
    pub change: ChangeKind,
}

impl ChangeEvent {
    /// Change of the room record.
    pub fn room(room_id: Uuid, change: ChangeKind) -> Self {
        Self {
            room_id,
            table: TableKind::Rooms,
            change,
        }
    }

    /// Change of a player of the room.
    pub fn player(room_id: Uuid, change: ChangeKind) -> Self {
        Self {
            room_id,
            table: TableKind::Players,
            change,
        }
    }

    fn resync(room_id: Uuid) -> Self {
        Self::room(room_id, ChangeKind::Resync)
    }
}

/// Registry of per-room broadcast channels.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    channels: DashMap<Uuid, broadcast::Sender<ChangeEvent>>,
    capacity: usize,
}

impl NotifierInner {
    fn prune(&self, room_id: Uuid) {
        let removed = self
            .channels
            .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
        if removed.is_some() {
            debug!(room_id = %room_id, "dropped idle change channel");
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier {
    /// Each room channel buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                channels: DashMap::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Start receiving changes for `room_id`. Dropping the subscription unsubscribes.
    pub fn subscribe(&self, room_id: Uuid) -> Subscription {
        let receiver = self
            .inner
            .channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe();

        Subscription {
            room_id,
            receiver: Some(receiver),
            notifier: Arc::downgrade(&self.inner),
        }
    }

    /// Explicitly end a subscription.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Fan an event out to the room's subscribers. Returns how many were reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let delivered = self
            .inner
            .channels
            .get(&event.room_id)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0);
        if delivered == 0 {
            self.inner.prune(event.room_id);
        }
        delivered
    }

    /// Close the room's channel; subscribers drain what was already sent, then end.
    pub fn forget_room(&self, room_id: Uuid) {
        self.inner.channels.remove(&room_id);
    }

    /// Number of rooms with at least one live channel.
    pub fn active_rooms(&self) -> usize {
        self.inner.channels.len()
    }
}

/// Live subscription to one room's change feed.
pub struct Subscription {
    room_id: Uuid,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    notifier: Weak<NotifierInner>,
}

impl Subscription {
    /// Room this subscription follows.
    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    /// Next change, or `None` once the room's channel is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                debug!(room_id = %self.room_id, skipped, "change subscriber lagged");
                Some(ChangeEvent::resync(self.room_id))
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Adapt the subscription into a stream that unsubscribes when dropped.
    pub fn into_stream(mut self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.take();
        if let Some(inner) = self.notifier.upgrade() {
            inner.prune(self.room_id);
        }
    }
}
