use std::collections::HashMap;

use futures::future::try_join_all;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameEntity, GameStatus, ParticipantEntity, QuestionEntity},
        storage::StorageResult,
    },
    dto::game::{CreateGameRequest, QuestionInput},
    error::ServiceError,
    services::lifecycle_service,
    state::{SharedState, snapshot::ParticipantView},
};

const DEFAULT_TIME_LIMIT_SECONDS: u32 = 30;

/// Create a pending game and its questions, numbered from 1 in request order.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<(GameEntity, Vec<QuestionEntity>), ServiceError> {
    let store = state.require_game_store().await?;
    let CreateGameRequest {
        title,
        description,
        questions,
    } = request;

    let title = title.trim().to_owned();
    if title.is_empty() {
        return Err(ServiceError::InvalidInput("game title must not be blank".into()));
    }

    let now = OffsetDateTime::now_utc();
    let game = store
        .insert_game(GameEntity {
            id: Uuid::new_v4(),
            title,
            description: description.filter(|text| !text.trim().is_empty()),
            status: GameStatus::Pending,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let inserts = questions
        .into_iter()
        .zip(1u32..)
        .map(|(input, display_order)| build_question(game.id, input, display_order, now))
        .map(|question| store.insert_question(question));
    let questions = try_join_all(inserts).await?;

    info!(game_id = %game.id, questions = questions.len(), "game created");
    Ok((game, questions))
}

fn build_question(
    game_id: Uuid,
    input: QuestionInput,
    display_order: u32,
    now: OffsetDateTime,
) -> QuestionEntity {
    QuestionEntity {
        id: Uuid::new_v4(),
        game_id,
        question_text: input.question_text,
        images: input.images,
        correct_answer: input.correct_answer.trim().to_owned(),
        display_order,
        time_limit_seconds: input
            .time_limit_seconds
            .unwrap_or(DEFAULT_TIME_LIMIT_SECONDS),
        created_at: now,
    }
}

/// Fetch a game by id.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    require_game(store.as_ref(), id).await
}

/// Games newest first, optionally filtered by status.
pub async fn list_games(
    state: &SharedState,
    status: Option<GameStatus>,
) -> Result<Vec<GameEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    Ok(store.list_games(status).await?)
}

/// Questions of a game in play order.
pub async fn list_questions(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<QuestionEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    require_game(store.as_ref(), game_id).await?;
    Ok(store.list_questions(game_id).await?)
}

/// Participants of a game joined with the players' profiles, in store order.
pub async fn load_participants(
    store: &dyn GameStore,
    game_id: Uuid,
) -> StorageResult<Vec<ParticipantView>> {
    let participants = store.list_participants(game_id).await?;
    if participants.is_empty() {
        return Ok(Vec::new());
    }

    let ids = participants
        .iter()
        .map(|participant| participant.player_id)
        .collect();
    let mut profiles: HashMap<Uuid, _> = store
        .find_players(ids)
        .await?
        .into_iter()
        .map(|player| (player.id, player))
        .collect();

    Ok(participants
        .into_iter()
        .map(|participant| {
            let profile = profiles.remove(&participant.player_id);
            ParticipantView {
                username: profile.as_ref().map(|player| player.username.clone()),
                avatar_url: profile.and_then(|player| player.avatar_url),
                participant,
            }
        })
        .collect())
}

/// Participants of an existing game.
pub async fn list_participants(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<ParticipantView>, ServiceError> {
    let store = state.require_game_store().await?;
    require_game(store.as_ref(), game_id).await?;
    Ok(load_participants(store.as_ref(), game_id).await?)
}

/// Add `player_id` to a pending game.
///
/// Joining a game the player is already in returns the existing row. A full
/// lobby or a game that already started is rejected. The join that fills the
/// lobby starts the game.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<ParticipantView, ServiceError> {
    let store = state.require_game_store().await?;
    let lobby = state.config().lobby;

    let game = require_game(store.as_ref(), game_id).await?;
    let Some(player) = store.find_player(player_id).await? else {
        return Err(ServiceError::NotFound(format!("player `{player_id}` not found")));
    };

    let view = |participant: ParticipantEntity| ParticipantView {
        participant,
        username: Some(player.username.clone()),
        avatar_url: player.avatar_url.clone(),
    };

    if let Some(existing) = store.find_participant(game_id, player_id).await? {
        return Ok(view(existing));
    }
    if game.status != GameStatus::Pending {
        return Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is {} and no longer accepts players",
            game.status.as_str()
        )));
    }
    let count = store.count_participants(game_id).await?;
    if count >= lobby.capacity {
        return Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is full ({count}/{})",
            lobby.capacity
        )));
    }

    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        game_id,
        player_id,
        joined_at: OffsetDateTime::now_utc(),
        final_score: None,
        final_rank: None,
    };
    let joined = match store.insert_participant(participant).await {
        Ok(joined) => joined,
        Err(err) if err.is_conflict() => store
            .find_participant(game_id, player_id)
            .await?
            .ok_or_else(|| ServiceError::Conflict(format!("player `{player_id}` already joined")))?,
        Err(err) => return Err(err.into()),
    };
    info!(game_id = %game_id, player_id = %player_id, "player joined game");

    if let Err(err) = lifecycle_service::ensure_started(store.as_ref(), &lobby, game_id).await {
        warn!(game_id = %game_id, error = %err, "capacity check after join failed");
    }

    Ok(view(joined))
}

async fn require_game(store: &dyn GameStore, id: Uuid) -> Result<GameEntity, ServiceError> {
    store
        .find_game(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))
}
