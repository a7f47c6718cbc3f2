//! Fixtures shared by the service tests.

use std::{io, sync::Arc};

use dashmap::DashSet;
use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::{
    feed::{FeedFilter, Subscription},
    game_store::{GameStore, memory::MemoryGameStore},
    models::{
        GameEntity, GameStatus, GameStatusPatch, ParticipantEntity, PlayerEntity, PlayerPatch,
        QuestionEntity, ScoreEntity,
    },
    storage::{StorageError, StorageResult},
};

pub async fn seed_game(store: &dyn GameStore, status: GameStatus) -> GameEntity {
    let now = OffsetDateTime::now_utc();
    store
        .insert_game(GameEntity {
            id: Uuid::new_v4(),
            title: "Animals".into(),
            description: None,
            status,
            started_at: (status != GameStatus::Pending).then_some(now),
            ended_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

pub async fn seed_player(store: &dyn GameStore, username: &str) -> PlayerEntity {
    let now = OffsetDateTime::now_utc();
    store
        .insert_player(PlayerEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            email: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

/// Insert a fresh player and make them join `game_id` at `joined_at`.
pub async fn seed_participant(
    store: &dyn GameStore,
    game_id: Uuid,
    joined_at: OffsetDateTime,
) -> ParticipantEntity {
    let player = seed_player(store, &format!("player-{}", Uuid::new_v4().simple())).await;
    store
        .insert_participant(ParticipantEntity {
            id: Uuid::new_v4(),
            game_id,
            player_id: player.id,
            joined_at,
            final_score: None,
            final_rank: None,
        })
        .await
        .unwrap()
}

pub async fn seed_question(store: &dyn GameStore, game_id: Uuid, display_order: u32) -> QuestionEntity {
    store
        .insert_question(QuestionEntity {
            id: Uuid::new_v4(),
            game_id,
            question_text: None,
            images: vec!["/img/1.png".into(); 4],
            correct_answer: format!("word{display_order}"),
            display_order,
            time_limit_seconds: 30,
            created_at: OffsetDateTime::now_utc(),
        })
        .await
        .unwrap()
}

pub async fn seed_score(store: &dyn GameStore, game_id: Uuid, player_id: Uuid, points: i32) -> ScoreEntity {
    store
        .insert_score(ScoreEntity {
            id: Uuid::new_v4(),
            game_id,
            player_id,
            question_id: Uuid::new_v4(),
            answer_text: "word".into(),
            is_correct: points > 0,
            points_earned: points,
            response_time_ms: Some(4_000),
            created_at: OffsetDateTime::now_utc(),
        })
        .await
        .unwrap()
}

/// Operations [`FlakyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    ParticipantResult,
    CountParticipants,
    ListScores,
    InsertScore,
}

/// Memory store that fails selected operations on demand.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryGameStore,
    faults: Arc<DashSet<Fault>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryGameStore) -> Self {
        Self {
            inner,
            faults: Arc::new(DashSet::new()),
        }
    }

    pub fn fail(&self, fault: Fault) {
        self.faults.insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.faults.remove(&fault);
    }

    fn check(&self, fault: Fault) -> StorageResult<()> {
        if self.faults.contains(&fault) {
            return Err(StorageError::unavailable(
                format!("injected {fault:?} failure"),
                io::Error::other("connection reset"),
            ));
        }
        Ok(())
    }
}

impl GameStore for FlakyStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        self.inner.insert_player(player)
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player(id)
    }

    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player_by_username(username)
    }

    fn find_players(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        self.inner.find_players(ids)
    }

    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.update_player(id, patch)
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        self.inner.insert_game(game)
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.inner.find_game(id)
    }

    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        self.inner.list_games(status)
    }

    fn update_game_status(
        &self,
        id: Uuid,
        expected: GameStatus,
        patch: GameStatusPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.inner.update_game_status(id, expected, patch)
    }

    fn insert_question(
        &self,
        question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        self.inner.insert_question(question)
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        self.inner.find_question(id)
    }

    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        self.inner.list_questions(game_id)
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        if let Err(err) = self.check(Fault::InsertScore) {
            return Box::pin(async move { Err(err) });
        }
        self.inner.insert_score(score)
    }

    fn list_scores(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        if let Err(err) = self.check(Fault::ListScores) {
            return Box::pin(async move { Err(err) });
        }
        self.inner.list_scores(game_id)
    }

    fn list_player_scores(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        self.inner.list_player_scores(game_id, player_id)
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        self.inner.insert_participant(participant)
    }

    fn find_participant(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        self.inner.find_participant(game_id, player_id)
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        self.inner.list_participants(game_id)
    }

    fn count_participants(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        if let Err(err) = self.check(Fault::CountParticipants) {
            return Box::pin(async move { Err(err) });
        }
        self.inner.count_participants(game_id)
    }

    fn update_participant_result(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        final_score: i32,
        final_rank: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        if let Err(err) = self.check(Fault::ParticipantResult) {
            return Box::pin(async move { Err(err) });
        }
        self.inner
            .update_participant_result(game_id, player_id, final_score, final_rank)
    }

    fn subscribe(&self, filter: FeedFilter) -> Subscription {
        self.inner.subscribe(filter)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
