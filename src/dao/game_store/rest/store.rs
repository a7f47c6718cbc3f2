use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
};
use crate::dao::{
    feed::{ChangeBus, ChangeKind, FeedFilter, Row, Subscription, Table},
    game_store::GameStore,
    models::{
        GameEntity, GameStatus, GameStatusPatch, ParticipantEntity, PlayerEntity, PlayerPatch,
        QuestionEntity, ScoreEntity,
    },
    storage::StorageResult,
};

type Query = Vec<(&'static str, String)>;

#[skip_serializing_none]
#[derive(Serialize)]
struct PlayerUpdate {
    email: Option<String>,
    avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Store talking to a PostgREST endpoint (Supabase-style `rest/v1`).
#[derive(Clone)]
pub struct RestGameStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    bus: ChangeBus,
}

impl RestGameStore {
    /// Build the HTTP client and check that the endpoint answers.
    pub async fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::from),
            bus: ChangeBus::default(),
        };

        store.ping().await?;
        Ok(store)
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, table.name());
        let builder = self.client.request(method, url);
        match self.api_key {
            Some(ref key) => builder
                .header("apikey", key.as_ref())
                .bearer_auth(key.as_ref()),
            None => builder,
        }
    }

    async fn send(table: Table, builder: RequestBuilder) -> RestResult<Response> {
        let path = table.name().to_string();
        let response = builder
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(RestDaoError::Conflict { path }),
            status if status.is_success() => Ok(response),
            status => Err(RestDaoError::RequestStatus { path, status }),
        }
    }

    async fn decode<T: DeserializeOwned>(table: Table, response: Response) -> RestResult<Vec<T>> {
        response
            .json::<Vec<T>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                path: table.name().to_string(),
                source,
            })
    }

    async fn select<T: DeserializeOwned>(&self, table: Table, mut query: Query) -> RestResult<Vec<T>> {
        query.insert(0, ("select", "*".to_string()));
        let builder = self.request(Method::GET, table).query(&query);
        let response = Self::send(table, builder).await?;
        Self::decode(table, response).await
    }

    async fn select_one<T: DeserializeOwned>(&self, table: Table, mut query: Query) -> RestResult<Option<T>> {
        query.push(("limit", "1".to_string()));
        Ok(self.select(table, query).await?.into_iter().next())
    }

    async fn insert<T>(&self, table: Table, row: &T) -> RestResult<()>
    where
        T: Serialize + ?Sized,
    {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(row);
        Self::send(table, builder).await?;
        Ok(())
    }

    async fn update<B, T>(&self, table: Table, query: Query, body: &B) -> RestResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&query)
            .json(body);
        let response = Self::send(table, builder).await?;
        Ok(Self::decode(table, response).await?.into_iter().next())
    }

    async fn ping(&self) -> RestResult<()> {
        let builder = self
            .request(Method::GET, Table::Games)
            .query(&[("select", "id"), ("limit", "1")]);
        Self::send(Table::Games, builder).await?;
        debug!(base_url = %self.base_url, "REST store reachable");
        Ok(())
    }

    async fn insert_row<T: Serialize>(&self, event: Row, table: Table, row: &T) -> RestResult<()> {
        self.insert(table, row).await?;
        self.bus.publish(ChangeKind::Insert, event);
        Ok(())
    }

    async fn update_player(&self, id: Uuid, patch: PlayerPatch) -> RestResult<Option<PlayerEntity>> {
        let body = PlayerUpdate {
            email: patch.email,
            avatar_url: patch.avatar_url,
            updated_at: OffsetDateTime::now_utc(),
        };

        let updated: Option<PlayerEntity> = self
            .update(Table::Players, vec![("id", eq(id))], &body)
            .await?;
        if let Some(player) = &updated {
            self.bus
                .publish(ChangeKind::Update, Row::Player(player.clone()));
        }
        Ok(updated)
    }

    async fn update_game_status(
        &self,
        id: Uuid,
        expected: GameStatus,
        patch: GameStatusPatch,
    ) -> RestResult<Option<GameEntity>> {
        let query = vec![("id", eq(id)), ("status", eq(expected.as_str()))];
        let updated: Option<GameEntity> = self.update(Table::Games, query, &patch).await?;
        if let Some(game) = &updated {
            self.bus.publish(ChangeKind::Update, Row::Game(game.clone()));
        }
        Ok(updated)
    }

    async fn update_participant_result(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        final_score: i32,
        final_rank: u32,
    ) -> RestResult<Option<ParticipantEntity>> {
        let query = vec![("game_id", eq(game_id)), ("player_id", eq(player_id))];
        let body = json!({ "final_score": final_score, "final_rank": final_rank });
        let updated: Option<ParticipantEntity> =
            self.update(Table::GameParticipants, query, &body).await?;
        if let Some(participant) = &updated {
            self.bus
                .publish(ChangeKind::Update, Row::Participant(participant.clone()));
        }
        Ok(updated)
    }
}

impl GameStore for RestGameStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_row(Row::Player(player.clone()), Table::Players, &player)
                .await?;
            Ok(player)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .select_one::<PlayerEntity>(Table::Players, vec![("id", eq(id))])
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
                .select_one::<PlayerEntity>(Table::Players, vec![("username", eq(username))])
                .await
                .map_err(Into::into)
        })
    }

    fn find_players(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let list = ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(",");
            store
                .select::<PlayerEntity>(Table::Players, vec![("id", format!("in.({list})"))])
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
            store
                .insert_row(Row::Game(game.clone()), Table::Games, &game)
                .await?;
            Ok(game)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .select_one::<GameEntity>(Table::Games, vec![("id", eq(id))])
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
            let mut query: Query = vec![("order", "created_at.desc".to_string())];
            if let Some(status) = status {
                query.push(("status", eq(status.as_str())));
            }
            store
                .select::<GameEntity>(Table::Games, query)
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
                .insert_row(Row::Question(question.clone()), Table::Questions, &question)
                .await?;
            Ok(question)
        })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .select_one::<QuestionEntity>(Table::Questions, vec![("id", eq(id))])
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
            let query = vec![
                ("game_id", eq(game_id)),
                ("order", "display_order.asc".to_string()),
            ];
            store
                .select::<QuestionEntity>(Table::Questions, query)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_row(Row::Score(score.clone()), Table::Scores, &score)
                .await?;
            Ok(score)
        })
    }

    fn list_scores(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![
                ("game_id", eq(game_id)),
                ("order", "created_at.asc,id.asc".to_string()),
            ];
            store
                .select::<ScoreEntity>(Table::Scores, query)
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
            let query = vec![
                ("game_id", eq(game_id)),
                ("player_id", eq(player_id)),
                ("order", "created_at.asc,id.asc".to_string()),
            ];
            store
                .select::<ScoreEntity>(Table::Scores, query)
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
                .insert_row(
                    Row::Participant(participant.clone()),
                    Table::GameParticipants,
                    &participant,
                )
                .await?;
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
            let query = vec![("game_id", eq(game_id)), ("player_id", eq(player_id))];
            store
                .select_one::<ParticipantEntity>(Table::GameParticipants, query)
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
            let query = vec![
                ("game_id", eq(game_id)),
                ("order", "final_score.desc.nullslast,joined_at.asc".to_string()),
            ];
            store
                .select::<ParticipantEntity>(Table::GameParticipants, query)
                .await
                .map_err(Into::into)
        })
    }

    fn count_participants(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let rows: Vec<ParticipantEntity> = store
                .select(Table::GameParticipants, vec![("game_id", eq(game_id))])
                .await?;
            Ok(rows.len() as u64)
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
        self.bus.subscribe(filter)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // Stateless HTTP: reconnecting is the same as reaching the endpoint again.
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
