//! Game state synchronizer: keeps a [`GameSnapshot`] current for one game.
//!
//! A synchronizer subscribes to three change feeds scoped to its game (the
//! game row, score inserts and participant rows), performs an initial fetch,
//! then handles notifications one at a time on a dedicated task. Consumers
//! read the snapshot through a `watch` channel.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::LobbyConfig,
    dao::{
        feed::{FeedFilter, Notification, Row},
        game_store::GameStore,
    },
    services::{game_service, lifecycle_service, scoreboard},
    state::snapshot::GameSnapshot,
};

/// Owner of a running synchronizer. Dropping it stops the task.
pub struct SyncHandle {
    game_id: Uuid,
    receiver: watch::Receiver<GameSnapshot>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Game this synchronizer watches.
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// New receiver observing every snapshot update.
    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.receiver.clone()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> GameSnapshot {
        self.receiver.borrow().clone()
    }

    /// Stop the task and wait until it has released its subscriptions.
    pub async fn stop(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a synchronizer for `game_id` on the current runtime.
pub fn spawn(store: Arc<dyn GameStore>, lobby: LobbyConfig, game_id: Uuid) -> SyncHandle {
    let (sender, receiver) = watch::channel(GameSnapshot::loading(game_id));
    let task = tokio::spawn(run(store, lobby, game_id, sender));
    SyncHandle {
        game_id,
        receiver,
        task,
    }
}

async fn run(
    store: Arc<dyn GameStore>,
    lobby: LobbyConfig,
    game_id: Uuid,
    sender: watch::Sender<GameSnapshot>,
) {
    // Subscribe first so nothing written during the initial fetch is missed.
    let mut game_feed = store.subscribe(FeedFilter::game(game_id));
    let mut score_feed = store.subscribe(FeedFilter::score_inserts(game_id));
    let mut participant_feed = store.subscribe(FeedFilter::participants(game_id));
    debug!(game_id = %game_id, "synchronizer subscribed");

    fetch_all(store.as_ref(), game_id, &sender).await;

    loop {
        tokio::select! {
            notification = game_feed.next() => {
                let Some(notification) = notification else { break };
                on_game_change(store.as_ref(), game_id, notification, &sender).await;
            }
            notification = score_feed.next() => {
                let Some(notification) = notification else { break };
                if let Notification::Lagged(skipped) = notification {
                    debug!(game_id = %game_id, skipped, "score feed lagged");
                }
                refresh_scoreboard(store.as_ref(), game_id, &sender).await;
            }
            notification = participant_feed.next() => {
                let Some(notification) = notification else { break };
                if let Notification::Lagged(skipped) = notification {
                    debug!(game_id = %game_id, skipped, "participant feed lagged");
                }
                refresh_participants(store.as_ref(), &lobby, game_id, &sender).await;
            }
        }
    }

    info!(game_id = %game_id, "change feed closed; synchronizer stopped");
}

/// Fetch game, participants and scoreboard together and replace the snapshot.
async fn fetch_all(store: &dyn GameStore, game_id: Uuid, sender: &watch::Sender<GameSnapshot>) {
    let fetched = tokio::try_join!(
        store.find_game(game_id),
        game_service::load_participants(store, game_id),
        scoreboard::load_scoreboard(store, game_id),
    );
    match fetched {
        Ok((game, participants, board)) => {
            sender.send_modify(|snapshot| {
                snapshot.game = game;
                snapshot.participants = participants;
                snapshot.scoreboard = board;
                snapshot.is_loading = false;
                snapshot.error = None;
            });
        }
        Err(err) => {
            warn!(game_id = %game_id, error = %err, "game fetch failed");
            sender.send_modify(|snapshot| {
                snapshot.is_loading = false;
                snapshot.error = Some(err.to_string());
            });
        }
    }
}

/// A snapshot without its game row was never fully loaded.
fn needs_full_fetch(sender: &watch::Sender<GameSnapshot>) -> bool {
    sender.borrow().game.is_none()
}

async fn on_game_change(
    store: &dyn GameStore,
    game_id: Uuid,
    notification: Notification,
    sender: &watch::Sender<GameSnapshot>,
) {
    if needs_full_fetch(sender) {
        fetch_all(store, game_id, sender).await;
        return;
    }
    match notification {
        Notification::Change(event) => {
            if let Row::Game(game) = event.row {
                sender.send_modify(|snapshot| {
                    snapshot.game = Some(game);
                    snapshot.error = None;
                });
            }
        }
        Notification::Lagged(skipped) => {
            debug!(game_id = %game_id, skipped, "game feed lagged; re-fetching");
            match store.find_game(game_id).await {
                Ok(game) => sender.send_modify(|snapshot| {
                    snapshot.game = game;
                    snapshot.error = None;
                }),
                Err(err) => warn!(game_id = %game_id, error = %err, "game re-fetch failed"),
            }
        }
    }
}

async fn refresh_scoreboard(
    store: &dyn GameStore,
    game_id: Uuid,
    sender: &watch::Sender<GameSnapshot>,
) {
    if needs_full_fetch(sender) {
        fetch_all(store, game_id, sender).await;
        return;
    }
    match scoreboard::load_scoreboard(store, game_id).await {
        Ok(board) => sender.send_modify(|snapshot| {
            snapshot.scoreboard = board;
            snapshot.error = None;
        }),
        Err(err) => warn!(game_id = %game_id, error = %err, "scoreboard re-fetch failed"),
    }
}

async fn refresh_participants(
    store: &dyn GameStore,
    lobby: &LobbyConfig,
    game_id: Uuid,
    sender: &watch::Sender<GameSnapshot>,
) {
    if needs_full_fetch(sender) {
        fetch_all(store, game_id, sender).await;
    } else {
        match game_service::load_participants(store, game_id).await {
            Ok(participants) => sender.send_modify(|snapshot| {
                snapshot.participants = participants;
                snapshot.error = None;
            }),
            Err(err) => warn!(game_id = %game_id, error = %err, "participant re-fetch failed"),
        }
    }

    if let Err(err) = lifecycle_service::ensure_started(store, lobby, game_id).await {
        warn!(game_id = %game_id, error = %err, "capacity check failed; retrying on next change");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::OffsetDateTime;

    use super::*;
    use crate::{
        dao::{game_store::memory::MemoryGameStore, models::GameStatus},
        services::test_support::{
            Fault, FlakyStore, seed_game, seed_participant, seed_player, seed_score,
        },
    };

    async fn wait_for(
        receiver: &mut watch::Receiver<GameSnapshot>,
        predicate: impl FnMut(&GameSnapshot) -> bool,
    ) -> GameSnapshot {
        tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(predicate))
            .await
            .expect("snapshot condition not reached in time")
            .expect("synchronizer dropped its sender")
            .clone()
    }

    #[tokio::test]
    async fn initial_fetch_populates_the_snapshot() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Active).await;
        let participant = seed_participant(&*store, game.id, OffsetDateTime::now_utc()).await;
        seed_score(&*store, game.id, participant.player_id, 130).await;

        let handle = spawn(store.clone(), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        let snapshot = wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;

        assert_eq!(snapshot.game.map(|g| g.id), Some(game.id));
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(snapshot.scoreboard.len(), 1);
        assert_eq!(snapshot.scoreboard[0].total_points, 130);
        assert_eq!(snapshot.error, None);
        handle.stop().await;
    }

    #[tokio::test]
    async fn score_insert_refreshes_the_scoreboard() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Active).await;
        let player = seed_player(&*store, "alice").await;

        let handle = spawn(store.clone(), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;

        seed_score(&*store, game.id, player.id, 100).await;
        seed_score(&*store, game.id, player.id, 130).await;
        let snapshot = wait_for(&mut receiver, |snapshot| {
            snapshot.scoreboard.first().map(|entry| entry.total_points) == Some(230)
        })
        .await;

        assert_eq!(snapshot.scoreboard[0].username.as_deref(), Some("alice"));
        assert_eq!(snapshot.scoreboard[0].total_answers, 2);
        handle.stop().await;
    }

    #[tokio::test]
    async fn eighth_participant_starts_the_game() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Pending).await;
        for _ in 0..7 {
            seed_participant(&*store, game.id, OffsetDateTime::now_utc()).await;
        }

        let handle = spawn(store.clone(), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;

        seed_participant(&*store, game.id, OffsetDateTime::now_utc()).await;
        let snapshot = wait_for(&mut receiver, |snapshot| {
            snapshot.game.as_ref().map(|game| game.status) == Some(GameStatus::Active)
        })
        .await;

        assert!(snapshot.game.and_then(|game| game.started_at).is_some());
        handle.stop().await;
    }

    #[tokio::test]
    async fn failed_initial_fetch_reports_the_error() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Active).await;
        let store = FlakyStore::new(memory);
        store.fail(Fault::ListScores);

        let handle = spawn(Arc::new(store), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        let snapshot = wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;

        assert!(snapshot.error.is_some());
        handle.stop().await;
    }

    #[tokio::test]
    async fn next_notification_after_a_failed_fetch_reloads_everything() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Active).await;
        let participant = seed_participant(&memory, game.id, OffsetDateTime::now_utc()).await;
        let store = FlakyStore::new(memory);
        store.fail(Fault::ListScores);

        let handle = spawn(Arc::new(store.clone()), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        let snapshot = wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;
        assert!(snapshot.error.is_some());
        assert!(snapshot.game.is_none());

        store.heal(Fault::ListScores);
        seed_score(&store, game.id, participant.player_id, 100).await;
        let snapshot = wait_for(&mut receiver, |snapshot| !snapshot.scoreboard.is_empty()).await;

        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.game.map(|g| g.id), Some(game.id));
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(snapshot.scoreboard[0].total_points, 100);
        handle.stop().await;
    }

    #[tokio::test]
    async fn stopping_releases_every_subscription() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Pending).await;

        let handle = spawn(store.clone(), LobbyConfig::default(), game.id);
        let mut receiver = handle.subscribe();
        wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;
        assert_eq!(store.active_subscriptions(), 3);

        handle.stop().await;

        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn switching_games_does_not_leak_subscriptions() {
        let store = Arc::new(MemoryGameStore::new());
        let first = seed_game(&*store, GameStatus::Pending).await;
        let second = seed_game(&*store, GameStatus::Pending).await;

        let handle = spawn(store.clone(), LobbyConfig::default(), first.id);
        let mut receiver = handle.subscribe();
        wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;
        handle.stop().await;

        let handle = spawn(store.clone(), LobbyConfig::default(), second.id);
        let mut receiver = handle.subscribe();
        let snapshot = wait_for(&mut receiver, |snapshot| !snapshot.is_loading).await;

        assert_eq!(snapshot.game_id, second.id);
        assert_eq!(store.active_subscriptions(), 3);
        handle.stop().await;
        assert_eq!(store.active_subscriptions(), 0);
    }
}
