//! Client side of a room session: the per-player synchronizer that turns
//! store snapshots and local timers into phases, and the task running it.

/// Store/notifier contract consumed by a client.
pub mod api;
/// Tokio task driving a synchronizer.
pub mod driver;
/// Host-only advance guard.
pub mod host;
/// HTTP + SSE implementation of the client contract.
pub mod http;
/// In-process implementation of the client contract.
pub mod local;
/// Snapshot comparison producing phase events.
pub mod reconcile;
/// Client-side copy of a room and its roster.
pub mod snapshot;
/// Phase transition table.
pub mod state_machine;
/// Phase, timers and answer state of one player.
pub mod synchronizer;

pub use api::{ClientError, JoinedRoom, RoomApi};
pub use driver::{ClientCommand, ClientHandle, ClientOptions};
pub use http::HttpRoomApi;
pub use local::LocalRoomApi;
pub use state_machine::ClientPhase;
pub use synchronizer::{ClientSynchronizer, ClientView, SyncEffect};
