//! In-process [`GameStore`] used for local play and tests.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    feed::{ChangeBus, ChangeKind, FeedFilter, Row, Subscription},
    game_store::{GameStore, sort_participants},
    models::{
        GameEntity, GameStatus, GameStatusPatch, ParticipantEntity, PlayerEntity, PlayerPatch,
        QuestionEntity, ScoreEntity,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Default)]
struct Tables {
    players: IndexMap<Uuid, PlayerEntity>,
    games: IndexMap<Uuid, GameEntity>,
    questions: IndexMap<Uuid, QuestionEntity>,
    scores: Vec<ScoreEntity>,
    participants: Vec<ParticipantEntity>,
}

/// Store keeping every table in memory, with the same uniqueness rules as the
/// persistent backends.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    tables: Arc<RwLock<Tables>>,
    bus: ChangeBus,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of change-feed subscriptions currently open.
    pub fn active_subscriptions(&self) -> usize {
        self.bus.active_subscriptions()
    }

    /// Number of rows in the players table.
    pub async fn player_count(&self) -> usize {
        self.tables.read().await.players.len()
    }
}

impl GameStore for MemoryGameStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut tables = store.tables.write().await;
                if tables
                    .players
                    .values()
                    .any(|existing| existing.username == player.username)
                {
                    return Err(StorageError::conflict(format!(
                        "username `{}` already taken",
                        player.username
                    )));
                }
                tables.players.insert(player.id, player.clone());
                store
                    .bus
                    .publish(ChangeKind::Insert, Row::Player(player.clone()));
            }
            Ok(player)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.tables.read().await.players.get(&id).cloned()) })
    }

    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(tables
                .players
                .values()
                .find(|player| player.username == username)
                .cloned())
        })
    }

    fn find_players(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(ids
                .iter()
                .filter_map(|id| tables.players.get(id).cloned())
                .collect())
        })
    }

    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = {
                let mut tables = store.tables.write().await;
                let Some(player) = tables.players.get_mut(&id) else {
                    return Ok(None);
                };
                if let Some(email) = patch.email {
                    player.email = Some(email);
                }
                if let Some(avatar_url) = patch.avatar_url {
                    player.avatar_url = Some(avatar_url);
                }
                player.updated_at = time::OffsetDateTime::now_utc();
                let updated = player.clone();
                store
                    .bus
                    .publish(ChangeKind::Update, Row::Player(updated.clone()));
                updated
            };
            Ok(Some(updated))
        })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut tables = store.tables.write().await;
                if tables.games.contains_key(&game.id) {
                    return Err(StorageError::conflict(format!(
                        "game `{}` already exists",
                        game.id
                    )));
                }
                tables.games.insert(game.id, game.clone());
                store.bus.publish(ChangeKind::Insert, Row::Game(game.clone()));
            }
            Ok(game)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.tables.read().await.games.get(&id).cloned()) })
    }

    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            let mut games: Vec<GameEntity> = tables
                .games
                .values()
                .filter(|game| status.is_none_or(|status| game.status == status))
                .cloned()
                .collect();
            games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(games)
        })
    }

    fn update_game_status(
        &self,
        id: Uuid,
        expected: GameStatus,
        patch: GameStatusPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = {
                let mut tables = store.tables.write().await;
                let updated = match tables.games.get_mut(&id) {
                    Some(game) if game.status == expected => {
                        patch.apply_to(game);
                        game.clone()
                    }
                    _ => return Ok(None),
                };
                // Published under the write lock so feed order matches apply order.
                store
                    .bus
                    .publish(ChangeKind::Update, Row::Game(updated.clone()));
                updated
            };
            Ok(Some(updated))
        })
    }

    fn insert_question(
        &self,
        question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut tables = store.tables.write().await;
                if tables.questions.values().any(|existing| {
                    existing.game_id == question.game_id
                        && existing.display_order == question.display_order
                }) {
                    return Err(StorageError::conflict(format!(
                        "display order {} already used in game `{}`",
                        question.display_order, question.game_id
                    )));
                }
                tables.questions.insert(question.id, question.clone());
                store
                    .bus
                    .publish(ChangeKind::Insert, Row::Question(question.clone()));
            }
            Ok(question)
        })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.tables.read().await.questions.get(&id).cloned()) })
    }

    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            let mut questions: Vec<QuestionEntity> = tables
                .questions
                .values()
                .filter(|question| question.game_id == game_id)
                .cloned()
                .collect();
            questions.sort_by_key(|question| question.display_order);
            Ok(questions)
        })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.tables.write().await;
            tables.scores.push(score.clone());
            store.bus.publish(ChangeKind::Insert, Row::Score(score.clone()));
            Ok(score)
        })
    }

    fn list_scores(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(tables
                .scores
                .iter()
                .filter(|score| score.game_id == game_id)
                .cloned()
                .collect())
        })
    }

    fn list_player_scores(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(tables
                .scores
                .iter()
                .filter(|score| score.game_id == game_id && score.player_id == player_id)
                .cloned()
                .collect())
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut tables = store.tables.write().await;
                if tables.participants.iter().any(|existing| {
                    existing.game_id == participant.game_id
                        && existing.player_id == participant.player_id
                }) {
                    return Err(StorageError::conflict(format!(
                        "player `{}` already joined game `{}`",
                        participant.player_id, participant.game_id
                    )));
                }
                tables.participants.push(participant.clone());
                store
                    .bus
                    .publish(ChangeKind::Insert, Row::Participant(participant.clone()));
            }
            Ok(participant)
        })
    }

    fn find_participant(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(tables
                .participants
                .iter()
                .find(|participant| {
                    participant.game_id == game_id && participant.player_id == player_id
                })
                .cloned())
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut participants: Vec<ParticipantEntity> = {
                let tables = store.tables.read().await;
                tables
                    .participants
                    .iter()
                    .filter(|participant| participant.game_id == game_id)
                    .cloned()
                    .collect()
            };
            sort_participants(&mut participants);
            Ok(participants)
        })
    }

    fn count_participants(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.tables.read().await;
            Ok(tables
                .participants
                .iter()
                .filter(|participant| participant.game_id == game_id)
                .count() as u64)
        })
    }

    fn update_participant_result(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        final_score: i32,
        final_rank: u32,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = {
                let mut tables = store.tables.write().await;
                let Some(participant) = tables.participants.iter_mut().find(|participant| {
                    participant.game_id == game_id && participant.player_id == player_id
                }) else {
                    return Ok(None);
                };
                participant.final_score = Some(final_score);
                participant.final_rank = Some(final_rank);
                let updated = participant.clone();
                store
                    .bus
                    .publish(ChangeKind::Update, Row::Participant(updated.clone()));
                updated
            };
            Ok(Some(updated))
        })
    }

    fn subscribe(&self, filter: FeedFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::dao::feed::Notification;

    fn player(username: &str) -> PlayerEntity {
        let now = OffsetDateTime::now_utc();
        PlayerEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            email: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn game() -> GameEntity {
        let now = OffsetDateTime::now_utc();
        GameEntity {
            id: Uuid::new_v4(),
            title: "Friday round".into(),
            description: None,
            status: GameStatus::Pending,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn participant(game_id: Uuid, joined_at: OffsetDateTime) -> ParticipantEntity {
        ParticipantEntity {
            id: Uuid::new_v4(),
            game_id,
            player_id: Uuid::new_v4(),
            joined_at,
            final_score: None,
            final_rank: None,
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryGameStore::new();
        store.insert_player(player("alice")).await.unwrap();

        let err = store.insert_player(player("alice")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn status_update_only_applies_from_expected_status() {
        let store = MemoryGameStore::new();
        let game = store.insert_game(game()).await.unwrap();
        let now = OffsetDateTime::now_utc();
        let patch = GameStatusPatch {
            status: GameStatus::Active,
            started_at: Some(now),
            ended_at: None,
            updated_at: now,
        };

        let first = store
            .update_game_status(game.id, GameStatus::Pending, patch)
            .await
            .unwrap();
        let second = store
            .update_game_status(game.id, GameStatus::Pending, patch)
            .await
            .unwrap();

        let updated = first.expect("first transition applies");
        assert_eq!(updated.status, GameStatus::Active);
        assert_eq!(updated.started_at, Some(now));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn participants_are_ordered_by_final_score_then_join_time() {
        let store = MemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let t0 = OffsetDateTime::now_utc();
        let early = store
            .insert_participant(participant(game_id, t0))
            .await
            .unwrap();
        let late = store
            .insert_participant(participant(game_id, t0 + Duration::seconds(5)))
            .await
            .unwrap();
        let scored = store
            .insert_participant(participant(game_id, t0 + Duration::seconds(10)))
            .await
            .unwrap();
        store
            .update_participant_result(game_id, scored.player_id, 230, 1)
            .await
            .unwrap();

        let ordered: Vec<Uuid> = store
            .list_participants(game_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        assert_eq!(ordered, vec![scored.player_id, early.player_id, late.player_id]);
    }

    #[tokio::test]
    async fn duplicate_participant_is_a_conflict() {
        let store = MemoryGameStore::new();
        let row = participant(Uuid::new_v4(), OffsetDateTime::now_utc());
        store.insert_participant(row.clone()).await.unwrap();

        let mut again = row.clone();
        again.id = Uuid::new_v4();
        assert!(store.insert_participant(again).await.unwrap_err().is_conflict());
        assert_eq!(store.count_participants(row.game_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn writes_reach_subscribers() {
        let store = MemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let mut sub = store.subscribe(FeedFilter::participants(game_id));
        assert_eq!(store.active_subscriptions(), 1);

        let row = store
            .insert_participant(participant(game_id, OffsetDateTime::now_utc()))
            .await
            .unwrap();

        match sub.next().await {
            Some(Notification::Change(event)) => {
                assert_eq!(event.kind, ChangeKind::Insert);
                assert_eq!(event.row, Row::Participant(row));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        drop(sub);
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_published_in_apply_order() {
        let store = MemoryGameStore::new();
        let row = store
            .insert_participant(participant(Uuid::new_v4(), OffsetDateTime::now_utc()))
            .await
            .unwrap();
        let mut sub = store.subscribe(FeedFilter::participants(row.game_id));

        let writers: Vec<_> = (0..64)
            .map(|score| {
                tokio::spawn(store.update_participant_result(row.game_id, row.player_id, score, 1))
            })
            .collect();
        for writer in futures::future::join_all(writers).await {
            writer.unwrap().unwrap();
        }

        let mut last = None;
        for _ in 0..64 {
            match sub.next().await {
                Some(Notification::Change(event)) => last = Some(event.row),
                other => panic!("unexpected notification: {other:?}"),
            }
        }
        let stored = store
            .find_participant(row.game_id, row.player_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last, Some(Row::Participant(stored)));
    }
}
