//! Row-level change notifications published by the storage backends.
//!
//! Every store owns a [`ChangeBus`]. Successful writes publish a
//! [`ChangeEvent`]; consumers open a [`Subscription`] scoped by a
//! [`FeedFilter`] and receive only the matching events, one at a time.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, ParticipantEntity, PlayerEntity, QuestionEntity, ScoreEntity,
};

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Tables (collections) exposed by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// `players`
    Players,
    /// `games`
    Games,
    /// `questions`
    Questions,
    /// `scores`
    Scores,
    /// `game_participants`
    GameParticipants,
}

impl Table {
    /// Name of the table in the backing store.
    pub fn name(self) -> &'static str {
        match self {
            Table::Players => "players",
            Table::Games => "games",
            Table::Questions => "questions",
            Table::Scores => "scores",
            Table::GameParticipants => "game_participants",
        }
    }
}

/// Kind of write that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
}

/// New value of the changed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Row of `players`.
    Player(PlayerEntity),
    /// Row of `games`.
    Game(GameEntity),
    /// Row of `questions`.
    Question(QuestionEntity),
    /// Row of `scores`.
    Score(ScoreEntity),
    /// Row of `game_participants`.
    Participant(ParticipantEntity),
}

impl Row {
    /// Table the row belongs to.
    pub fn table(&self) -> Table {
        match self {
            Row::Player(_) => Table::Players,
            Row::Game(_) => Table::Games,
            Row::Question(_) => Table::Questions,
            Row::Score(_) => Table::Scores,
            Row::Participant(_) => Table::GameParticipants,
        }
    }

    /// Game the row is scoped to; players are global.
    pub fn game_id(&self) -> Option<Uuid> {
        match self {
            Row::Player(_) => None,
            Row::Game(game) => Some(game.id),
            Row::Question(question) => Some(question.game_id),
            Row::Score(score) => Some(score.game_id),
            Row::Participant(participant) => Some(participant.game_id),
        }
    }
}

/// Notification payload carrying the kind of write and the new row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Insert or update.
    pub kind: ChangeKind,
    /// New value of the row.
    pub row: Row,
}

/// Scope of a subscription: one table, one game, optionally one kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedFilter {
    /// Watched table.
    pub table: Table,
    /// Game the rows must belong to (`id` for games, `game_id` otherwise).
    pub game_id: Uuid,
    /// Restrict to inserts or updates; `None` accepts both.
    pub kind: Option<ChangeKind>,
}

impl FeedFilter {
    /// Every write to the game row itself.
    pub fn game(game_id: Uuid) -> Self {
        Self {
            table: Table::Games,
            game_id,
            kind: None,
        }
    }

    /// Score insertions for the game.
    pub fn score_inserts(game_id: Uuid) -> Self {
        Self {
            table: Table::Scores,
            game_id,
            kind: Some(ChangeKind::Insert),
        }
    }

    /// Every write to the game's participant rows.
    pub fn participants(game_id: Uuid) -> Self {
        Self {
            table: Table::GameParticipants,
            game_id,
            kind: None,
        }
    }

    /// Whether the event falls inside this scope.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.row.table() == self.table
            && event.row.game_id() == Some(self.game_id)
            && self.kind.is_none_or(|kind| kind == event.kind)
    }
}

/// Item yielded by a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A matching row changed.
    Change(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped; consumers must re-fetch.
    Lagged(u64),
}

/// In-process fan-out of change events for one store.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
    live: Arc<AtomicUsize>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl ChangeBus {
    /// Build a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish a write to every subscriber, ignoring the no-subscriber case.
    pub fn publish(&self, kind: ChangeKind, row: Row) {
        let _ = self.sender.send(ChangeEvent { kind, row });
    }

    /// Open a subscription that only yields events matching `filter`.
    pub fn subscribe(&self, filter: FeedFilter) -> Subscription {
        self.live.fetch_add(1, Ordering::SeqCst);
        Subscription {
            filter,
            receiver: self.sender.subscribe(),
            _live: LiveGuard(self.live.clone()),
        }
    }

    /// Number of subscriptions that have not been released yet.
    pub fn active_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancellable, filtered view of a [`ChangeBus`].
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// releases it; no event is delivered afterwards.
pub struct Subscription {
    filter: FeedFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
    _live: LiveGuard,
}

impl Subscription {
    /// Scope of this subscription.
    pub fn filter(&self) -> FeedFilter {
        self.filter
    }

    /// Wait for the next matching notification. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    return Some(Notification::Change(event));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(Notification::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {}
}
