use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Retention sweep trigger.
pub mod maintenance;
/// Player lookups.
pub mod players;
/// Room lifecycle, joins and answers.
pub mod rooms;
/// Room change feeds.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(rooms::router())
        .merge(players::router())
        .merge(sse::router())
        .merge(maintenance::router())
        .merge(docs::router())
        .with_state(state)
}
