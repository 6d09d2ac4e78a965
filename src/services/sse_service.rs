use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{
    dto::sse::{FeedHandshake, READY_EVENT, ServerEvent},
    error::ServiceError,
    services::room_service,
    state::{SharedState, Subscription},
};

/// Resolve the room and subscribe to its change feed.
pub async fn subscribe_room(
    state: &SharedState,
    code: &str,
) -> Result<(Subscription, ServerEvent), ServiceError> {
    let room = room_service::get_room(state, code).await?.room;
    let subscription = state.notifier().subscribe(room.id);
    let handshake = ServerEvent::json(
        Some(READY_EVENT.to_owned()),
        &FeedHandshake {
            room_id: room.id,
            code: room.code,
            degraded: state.is_degraded(),
        },
    )
    .map_err(|err| ServiceError::InvalidState(format!("failed to encode handshake: {err}")))?;
    Ok((subscription, handshake))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a room subscription into an SSE response. The forwarder ends when
/// the client disconnects or the room's channel closes.
pub fn to_sse_stream(
    mut subscription: Subscription,
    handshake: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let room_id = subscription.room_id();
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                change = subscription.recv() => {
                    let Some(change) = change else { break };
                    match ServerEvent::change(&change) {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(room_id = %room_id, error = %err, "failed to encode change event"),
                    }
                }
            }
        }

        debug!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
