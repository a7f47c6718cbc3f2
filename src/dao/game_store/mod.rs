pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(feature = "rest-store")]
pub mod rest;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    feed::{FeedFilter, Subscription},
    models::{
        GameEntity, GameStatus, GameStatusPatch, ParticipantEntity, PlayerEntity, PlayerPatch,
        QuestionEntity, ScoreEntity,
    },
    storage::StorageResult,
};

/// Abstraction over the backing store holding players, games, questions,
/// scores and participants, plus its change feed.
pub trait GameStore: Send + Sync {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn find_players(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Games ordered newest first, optionally restricted to one status.
    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Apply `patch` only if the game is still in `expected`; `None` when no row matched.
    fn update_game_status(
        &self,
        id: Uuid,
        expected: GameStatus,
        patch: GameStatusPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    fn insert_question(
        &self,
        question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>>;
    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Questions of a game ordered by ascending `display_order`.
    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>>;
    /// Score records of a game in insertion order.
    fn list_scores(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    fn list_player_scores(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>>;
    fn find_participant(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Participants ordered by `final_score` descending (nulls last), then join time.
    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    fn count_participants(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    /// Freeze the final score and rank; `None` when the participant row does not exist.
    fn update_participant_result(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        final_score: i32,
        final_rank: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;

    /// Open a change feed scoped by `filter`.
    fn subscribe(&self, filter: FeedFilter) -> Subscription;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Order participants the way every backend returns them.
pub(crate) fn sort_participants(participants: &mut [ParticipantEntity]) {
    participants.sort_by(|a, b| {
        match (a.final_score, b.final_score) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then(a.joined_at.cmp(&b.joined_at))
    });
}
