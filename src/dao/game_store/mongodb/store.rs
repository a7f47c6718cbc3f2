use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        GAMES, GameDocument, PARTICIPANTS, PLAYERS, ParticipantDocument, PlayerDocument,
        QUESTIONS, QuestionDocument, SCORES, ScoreDocument, to_bson,
    },
};
use crate::dao::{
    feed::{ChangeBus, ChangeKind, FeedFilter, Row, Subscription},
    game_store::GameStore,
    models::{
        GameEntity, GameStatus, GameStatusPatch, ParticipantEntity, PlayerEntity, PlayerPatch,
        QuestionEntity, ScoreEntity,
    },
    storage::StorageResult,
};

/// MongoDB-backed store. Change notifications are published in-process after
/// each acknowledged write.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    bus: ChangeBus,
}

struct MongoState {
    // Keeps the connection pool alive alongside the database handle.
    _client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard._client = client;
        guard.database = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState {
                _client: client,
                database,
            }),
            config,
            bus: ChangeBus::default(),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let unique = |name: &str| {
            IndexOptions::builder()
                .name(Some(name.to_owned()))
                .unique(Some(true))
                .build()
        };
        let plain = |name: &str| IndexOptions::builder().name(Some(name.to_owned())).build();

        let indexes: [(&'static str, &'static str, Document, IndexOptions); 5] = [
            (PLAYERS, "username", doc! { "username": 1 }, unique("player_username_idx")),
            (
                PARTICIPANTS,
                "game_id,player_id",
                doc! { "game_id": 1, "player_id": 1 },
                unique("participant_game_player_idx"),
            ),
            (
                QUESTIONS,
                "game_id,display_order",
                doc! { "game_id": 1, "display_order": 1 },
                unique("question_order_idx"),
            ),
            (
                SCORES,
                "game_id,created_at",
                doc! { "game_id": 1, "created_at": 1 },
                plain("score_game_idx"),
            ),
            (
                GAMES,
                "status,created_at",
                doc! { "status": 1, "created_at": -1 },
                plain("game_status_idx"),
            ),
        ];

        let database = self.database().await;
        for (collection, index, keys, options) in indexes {
            let model = IndexModel::builder().keys(keys).options(options).build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    async fn collection<D: Send + Sync>(&self, name: &'static str) -> Collection<D> {
        self.database().await.collection::<D>(name)
    }

    async fn insert<D>(&self, name: &'static str, document: D) -> MongoResult<()>
    where
        D: Serialize + Send + Sync,
    {
        self.collection::<D>(name)
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: name,
                source,
            })?;
        Ok(())
    }

    async fn find_one<D, E>(&self, name: &'static str, filter: Document) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        self.collection::<D>(name)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: name,
                source,
            })?
            .map(E::try_from)
            .transpose()
    }

    async fn find_many<D, E>(
        &self,
        name: &'static str,
        filter: Document,
        sort: Document,
    ) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Unpin + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = self
            .collection::<D>(name)
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: name,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: name,
                source,
            })?;

        documents.into_iter().map(E::try_from).collect()
    }

    async fn update_one<D, E>(
        &self,
        name: &'static str,
        filter: Document,
        update: Document,
    ) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        self.collection::<D>(name)
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: name,
                source,
            })?
            .map(E::try_from)
            .transpose()
    }

    fn publish(&self, kind: ChangeKind, row: Row) {
        self.inner.bus.publish(kind, row);
    }

    async fn update_player(&self, id: Uuid, patch: PlayerPatch) -> MongoResult<Option<PlayerEntity>> {
        let mut set = doc! { "updated_at": to_bson(OffsetDateTime::now_utc()) };
        if let Some(email) = patch.email {
            set.insert("email", email);
        }
        if let Some(avatar_url) = patch.avatar_url {
            set.insert("avatar_url", avatar_url);
        }

        let updated: Option<PlayerEntity> = self
            .update_one::<PlayerDocument, PlayerEntity>(
                PLAYERS,
                doc! { "_id": id.to_string() },
                doc! { "$set": set },
            )
            .await?;
        if let Some(player) = &updated {
            self.publish(ChangeKind::Update, Row::Player(player.clone()));
        }
        Ok(updated)
    }

    async fn update_game_status(
        &self,
        id: Uuid,
        expected: GameStatus,
        patch: GameStatusPatch,
    ) -> MongoResult<Option<GameEntity>> {
        let mut set = doc! {
            "status": patch.status.as_str(),
            "updated_at": to_bson(patch.updated_at),
        };
        if let Some(started_at) = patch.started_at {
            set.insert("started_at", to_bson(started_at));
        }
        if let Some(ended_at) = patch.ended_at {
            set.insert("ended_at", to_bson(ended_at));
        }

        let updated: Option<GameEntity> = self
            .update_one::<GameDocument, GameEntity>(
                GAMES,
                doc! { "_id": id.to_string(), "status": expected.as_str() },
                doc! { "$set": set },
            )
            .await?;
        if let Some(game) = &updated {
            self.publish(ChangeKind::Update, Row::Game(game.clone()));
        }
        Ok(updated)
    }

    async fn update_participant_result(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        final_score: i32,
        final_rank: u32,
    ) -> MongoResult<Option<ParticipantEntity>> {
        let updated: Option<ParticipantEntity> = self
            .update_one::<ParticipantDocument, ParticipantEntity>(
                PARTICIPANTS,
                doc! { "game_id": game_id.to_string(), "player_id": player_id.to_string() },
                doc! { "$set": { "final_score": final_score, "final_rank": i64::from(final_rank) } },
            )
            .await?;
        if let Some(participant) = &updated {
            self.publish(ChangeKind::Update, Row::Participant(participant.clone()));
        }
        Ok(updated)
    }
}

impl GameStore for MongoGameStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert(PLAYERS, PlayerDocument::from(&player))
                .await?;
            store.publish(ChangeKind::Insert, Row::Player(player.clone()));
            Ok(player)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<PlayerDocument, PlayerEntity>(PLAYERS, doc! { "_id": id.to_string() })
                .await
                .map_err(Into::into)
        })
    }

    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<PlayerDocument, PlayerEntity>(PLAYERS, doc! { "username": username })
                .await
                .map_err(Into::into)
        })
    }

    fn find_players(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            store
                .find_many::<PlayerDocument, PlayerEntity>(
                    PLAYERS,
                    doc! { "_id": { "$in": ids } },
                    doc! { "username": 1 },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.update_player(id, patch).await.map_err(Into::into) })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.insert(GAMES, GameDocument::from(&game)).await?;
            store.publish(ChangeKind::Insert, Row::Game(game.clone()));
            Ok(game)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<GameDocument, GameEntity>(GAMES, doc! { "_id": id.to_string() })
                .await
                .map_err(Into::into)
        })
    }

    fn list_games(
        &self,
        status: Option<GameStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = match status {
                Some(status) => doc! { "status": status.as_str() },
                None => doc! {},
            };
            store
                .find_many::<GameDocument, GameEntity>(GAMES, filter, doc! { "created_at": -1 })
                .await
                .map_err(Into::into)
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
            store
                .update_game_status(id, expected, patch)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_question(
        &self,
        question: QuestionEntity,
    ) -> BoxFuture<'static, StorageResult<QuestionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert(QUESTIONS, QuestionDocument::from(&question))
                .await?;
            store.publish(ChangeKind::Insert, Row::Question(question.clone()));
            Ok(question)
        })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one::<QuestionDocument, QuestionEntity>(QUESTIONS, doc! { "_id": id.to_string() })
                .await
                .map_err(Into::into)
        })
    }

    fn list_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<QuestionDocument, QuestionEntity>(
                    QUESTIONS,
                    doc! { "game_id": game_id.to_string() },
                    doc! { "display_order": 1 },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.insert(SCORES, ScoreDocument::from(&score)).await?;
            store.publish(ChangeKind::Insert, Row::Score(score.clone()));
            Ok(score)
        })
    }

    fn list_scores(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<ScoreDocument, ScoreEntity>(
                    SCORES,
                    doc! { "game_id": game_id.to_string() },
                    doc! { "created_at": 1, "_id": 1 },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn list_player_scores(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<ScoreDocument, ScoreEntity>(
                    SCORES,
                    doc! { "game_id": game_id.to_string(), "player_id": player_id.to_string() },
                    doc! { "created_at": 1, "_id": 1 },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert(PARTICIPANTS, ParticipantDocument::from(&participant))
                .await?;
            store.publish(ChangeKind::Insert, Row::Participant(participant.clone()));
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
            store
                .find_one::<ParticipantDocument, ParticipantEntity>(
                    PARTICIPANTS,
                    doc! { "game_id": game_id.to_string(), "player_id": player_id.to_string() },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            // Missing final scores sort lowest, so descending puts them last.
            store
                .find_many::<ParticipantDocument, ParticipantEntity>(
                    PARTICIPANTS,
                    doc! { "game_id": game_id.to_string() },
                    doc! { "final_score": -1, "joined_at": 1 },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn count_participants(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .collection::<Document>(PARTICIPANTS)
                .await
                .count_documents(doc! { "game_id": game_id.to_string() })
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: PARTICIPANTS,
                    source,
                })
                .map_err(Into::into)
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
            store
                .update_participant_result(game_id, player_id, final_score, final_rank)
                .await
                .map_err(Into::into)
        })
    }

    fn subscribe(&self, filter: FeedFilter) -> Subscription {
        self.inner.bus.subscribe(filter)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
