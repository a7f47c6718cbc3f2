//! Game lifecycle controller: lobby capacity trigger, manual start and question progression.

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::LobbyConfig,
    dao::{
        game_store::GameStore,
        models::{GameEntity, GameStatus, QuestionEntity},
    },
    error::ServiceError,
    services::finalization_service::{self, FinalizationReport},
    state::{
        SharedState,
        lifecycle::{LifecycleEvent, compute_transition},
    },
};

/// Result of a capacity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call moved the game to active.
    Started(GameEntity),
    /// The lobby is not full yet.
    BelowCapacity { participants: u64 },
    /// The game already left the lobby, possibly through a concurrent call.
    AlreadyTransitioned,
}

/// What follows a closed question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionProgress {
    /// Next question in display order.
    Next(QuestionEntity),
    /// That was the last question; the game has been finalized.
    Finished(FinalizationReport),
}

/// Start the game once its lobby is full.
///
/// Safe to call any number of times concurrently: the status write is
/// conditional on `pending`, so exactly one caller observes
/// [`StartOutcome::Started`].
pub async fn ensure_started(
    store: &dyn GameStore,
    lobby: &LobbyConfig,
    game_id: Uuid,
) -> Result<StartOutcome, ServiceError> {
    let Some(game) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    if game.status != GameStatus::Pending {
        return Ok(StartOutcome::AlreadyTransitioned);
    }

    let participants = store.count_participants(game_id).await?;
    if participants < lobby.capacity {
        debug!(game_id = %game_id, participants, capacity = lobby.capacity, "lobby not full");
        return Ok(StartOutcome::BelowCapacity { participants });
    }

    let plan = compute_transition(game.status, LifecycleEvent::CapacityReached)?;
    match store
        .update_game_status(game_id, plan.from, plan.patch(OffsetDateTime::now_utc()))
        .await?
    {
        Some(started) => {
            info!(game_id = %game_id, participants, "lobby full; game started");
            Ok(StartOutcome::Started(started))
        }
        None => Ok(StartOutcome::AlreadyTransitioned),
    }
}

/// Start a pending game before its lobby is full.
pub async fn start(state: &SharedState, game_id: Uuid) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    let Some(game) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    let plan = compute_transition(game.status, LifecycleEvent::ManualStart)?;

    let min_players = state.config().lobby.min_players;
    let participants = store.count_participants(game_id).await?;
    if participants < min_players {
        return Err(ServiceError::InvalidState(format!(
            "game `{game_id}` needs at least {min_players} players to start, has {participants}"
        )));
    }

    match store
        .update_game_status(game_id, plan.from, plan.patch(OffsetDateTime::now_utc()))
        .await?
    {
        Some(started) => {
            info!(game_id = %game_id, participants, "game started manually");
            Ok(started)
        }
        None => Err(ServiceError::InvalidState(format!(
            "game `{game_id}` already left the lobby"
        ))),
    }
}

/// Close `question_id` and either hand out the next question or finalize the game.
pub async fn close_question(
    state: &SharedState,
    game_id: Uuid,
    question_id: Uuid,
) -> Result<QuestionProgress, ServiceError> {
    let store = state.require_game_store().await?;
    let Some(game) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    if game.status != GameStatus::Active {
        return Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is {}, questions can only be closed while active",
            game.status.as_str()
        )));
    }

    let questions = store.list_questions(game_id).await?;
    let Some(current) = questions.iter().find(|question| question.id == question_id) else {
        return Err(ServiceError::NotFound(format!(
            "question `{question_id}` not found in game `{game_id}`"
        )));
    };

    let next = questions
        .iter()
        .find(|question| question.display_order > current.display_order);
    match next {
        Some(next) => {
            debug!(game_id = %game_id, display_order = next.display_order, "next question");
            Ok(QuestionProgress::Next(next.clone()))
        }
        None => {
            let report = finalization_service::finalize(store.as_ref(), game_id).await?;
            Ok(QuestionProgress::Finished(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        services::test_support::{
            Fault, FlakyStore, seed_game, seed_participant, seed_question,
        },
        state::AppState,
    };

    async fn fill(store: &dyn GameStore, game_id: Uuid, count: usize) {
        for _ in 0..count {
            seed_participant(store, game_id, OffsetDateTime::now_utc()).await;
        }
    }

    #[tokio::test]
    async fn concurrent_triggers_start_the_game_exactly_once() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Pending).await;
        fill(&*store, game.id, 8).await;
        let lobby = LobbyConfig::default();
        let game_id = game.id;

        let outcomes = join_all((0..16).map(|_| {
            let store = store.clone();
            async move { ensure_started(&*store, &lobby, game_id).await }
        }))
        .await;

        let started = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Ok(StartOutcome::Started(_))))
            .count();
        assert_eq!(started, 1);
        assert!(outcomes.iter().all(Result::is_ok));

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert!(game.started_at.is_some());
    }

    #[tokio::test]
    async fn seven_participants_keep_the_lobby_open() {
        let store = MemoryGameStore::new();
        let game = seed_game(&store, GameStatus::Pending).await;
        fill(&store, game.id, 7).await;

        let outcome = ensure_started(&store, &LobbyConfig::default(), game.id)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::BelowCapacity { participants: 7 });
        let game = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Pending);
    }

    #[tokio::test]
    async fn active_game_is_left_alone() {
        let store = MemoryGameStore::new();
        let game = seed_game(&store, GameStatus::Active).await;
        fill(&store, game.id, 9).await;

        let outcome = ensure_started(&store, &LobbyConfig::default(), game.id)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyTransitioned);
    }

    #[tokio::test]
    async fn failed_count_leaves_the_game_pending() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Pending).await;
        fill(&memory, game.id, 8).await;
        let store = FlakyStore::new(memory.clone());
        store.fail(Fault::CountParticipants);

        assert!(ensure_started(&store, &LobbyConfig::default(), game.id).await.is_err());
        let pending = memory.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(pending.status, GameStatus::Pending);

        store.heal(Fault::CountParticipants);
        let outcome = ensure_started(&store, &LobbyConfig::default(), game.id)
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)));
    }

    #[tokio::test]
    async fn manual_start_requires_minimum_players() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = seed_game(&*store, GameStatus::Pending).await;
        fill(&*store, game.id, 1).await;

        let err = start(&state, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        fill(&*store, game.id, 1).await;
        let started = start(&state, game.id).await.unwrap();
        assert_eq!(started.status, GameStatus::Active);

        let again = start(&state, game.id).await.unwrap_err();
        assert!(matches!(again, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn closing_questions_walks_display_order_then_finalizes() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = seed_game(&*store, GameStatus::Active).await;
        let first = seed_question(&*store, game.id, 1).await;
        let second = seed_question(&*store, game.id, 2).await;

        let progress = close_question(&state, game.id, first.id).await.unwrap();
        assert_eq!(progress, QuestionProgress::Next(second.clone()));

        let progress = close_question(&state, game.id, second.id).await.unwrap();
        assert!(matches!(progress, QuestionProgress::Finished(_)));
        let game = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn closing_a_foreign_question_is_not_found() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = seed_game(&*store, GameStatus::Active).await;
        let other = seed_game(&*store, GameStatus::Active).await;
        let foreign = seed_question(&*store, other.id, 1).await;

        let err = close_question(&state, game.id, foreign.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
