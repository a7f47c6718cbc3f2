use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{GameSnapshotDto, ServerEvent},
    error::ServiceError,
    state::{SharedState, SyncLease, snapshot::GameSnapshot},
};

const SNAPSHOT_EVENT: &str = "snapshot";

/// Lease the live view of `game_id`, starting its synchronizer if no other
/// client is watching it yet.
pub async fn subscribe_game(state: &SharedState, game_id: Uuid) -> Result<SyncLease, ServiceError> {
    let store = state.require_game_store().await?;
    if store.find_game(game_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    }
    Ok(state.syncs().acquire(store, state.config().lobby, game_id))
}

fn snapshot_event(snapshot: GameSnapshot) -> Option<Event> {
    let game_id = snapshot.game_id;
    match ServerEvent::json(SNAPSHOT_EVENT, &GameSnapshotDto::from(snapshot)) {
        Ok(payload) => Some(Event::default().event(payload.event).data(payload.data)),
        Err(err) => {
            warn!(game_id = %game_id, error = %err, "failed to serialise snapshot");
            None
        }
    }
}

/// Turn a lease into an SSE response that pushes the current snapshot, then
/// every update, until the client disconnects.
pub fn to_sse_stream(lease: SyncLease) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let mut receiver: watch::Receiver<GameSnapshot> = lease.receiver();

    tokio::spawn(async move {
        let game_id = lease.game_id();
        let initial = receiver.borrow_and_update().clone();
        let mut open = match snapshot_event(initial) {
            Some(event) => tx.send(Ok(event)).await.is_ok(),
            None => true,
        };

        while open {
            tokio::select! {
                _ = tx.closed() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = receiver.borrow_and_update().clone();
                    if let Some(event) = snapshot_event(snapshot) {
                        open = tx.send(Ok(event)).await.is_ok();
                    }
                }
            }
        }

        // Releasing the lease stops the synchronizer when this was the last viewer.
        drop(lease);
        info!(game_id = %game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
