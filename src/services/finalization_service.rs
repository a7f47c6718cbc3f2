//! Freezes final scores and ranks, then closes the game.

use std::{cmp::Reverse, collections::HashMap};

use futures::future::join_all;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameStatus, ParticipantEntity, ScoreEntity},
    },
    error::ServiceError,
    state::{
        SharedState,
        lifecycle::{LifecycleEvent, compute_transition},
    },
};

/// Final standing of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalRanking {
    /// Ranked player.
    pub player_id: Uuid,
    /// Sum of every score record of the player.
    pub total_score: i32,
    /// Distinct 1-based rank.
    pub rank: u32,
}

/// Outcome of a finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationReport {
    /// Finalized game.
    pub game_id: Uuid,
    /// Always [`GameStatus::Finished`] on success.
    pub status: GameStatus,
    /// Rankings in rank order.
    pub rankings: Vec<FinalRanking>,
}

/// Sum scores per player and assign strictly sequential ranks.
///
/// Every participant is ranked, with 0 when they never answered. Equal
/// totals are ordered by join time, players without a participant row after
/// those with one, then by player id.
pub fn rank_players(scores: &[ScoreEntity], participants: &[ParticipantEntity]) -> Vec<FinalRanking> {
    let mut totals: HashMap<Uuid, i32> = participants
        .iter()
        .map(|participant| (participant.player_id, 0))
        .collect();
    for score in scores {
        *totals.entry(score.player_id).or_insert(0) += score.points_earned;
    }

    let joined_at: HashMap<Uuid, OffsetDateTime> = participants
        .iter()
        .map(|participant| (participant.player_id, participant.joined_at))
        .collect();

    let mut ordered: Vec<(Uuid, i32)> = totals.into_iter().collect();
    ordered.sort_by_key(|(player_id, total)| {
        let joined = joined_at.get(player_id);
        (Reverse(*total), joined.is_none(), joined.copied(), *player_id)
    });

    ordered
        .into_iter()
        .zip(1u32..)
        .map(|((player_id, total_score), rank)| FinalRanking {
            player_id,
            total_score,
            rank,
        })
        .collect()
}

/// Finalize `game_id` against `store`.
///
/// A finished game is reported again without any write. For an active game
/// every participant row is updated concurrently; the status only moves to
/// finished once all of them succeeded.
pub async fn finalize(
    store: &dyn GameStore,
    game_id: Uuid,
) -> Result<FinalizationReport, ServiceError> {
    let Some(game) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };

    let (scores, participants) =
        tokio::try_join!(store.list_scores(game_id), store.list_participants(game_id))?;
    let rankings = rank_players(&scores, &participants);
    let report = FinalizationReport {
        game_id,
        status: GameStatus::Finished,
        rankings,
    };

    if game.status == GameStatus::Finished {
        return Ok(report);
    }
    let plan = compute_transition(game.status, LifecycleEvent::LastQuestionClosed)?;

    let updates = report
        .rankings
        .iter()
        .filter(|ranking| {
            let joined = participants
                .iter()
                .any(|participant| participant.player_id == ranking.player_id);
            if !joined {
                warn!(
                    game_id = %game_id,
                    player_id = %ranking.player_id,
                    "scored player has no participant row; skipping final score update"
                );
            }
            joined
        })
        .map(|ranking| {
            store.update_participant_result(
                game_id,
                ranking.player_id,
                ranking.total_score,
                ranking.rank,
            )
        });

    for result in join_all(updates).await {
        if result?.is_none() {
            warn!(game_id = %game_id, "participant row vanished during finalization");
        }
    }

    match store
        .update_game_status(game_id, plan.from, plan.patch(OffsetDateTime::now_utc()))
        .await?
    {
        Some(_) => {
            info!(
                game_id = %game_id,
                players = report.rankings.len(),
                "game finalized"
            );
            Ok(report)
        }
        None => match store.find_game(game_id).await? {
            Some(current) if current.status == GameStatus::Finished => Ok(report),
            Some(current) => Err(ServiceError::InvalidState(format!(
                "game `{game_id}` changed to {} during finalization",
                current.status.as_str()
            ))),
            None => Err(ServiceError::NotFound(format!("game `{game_id}` not found"))),
        },
    }
}

/// Finalize a game through the installed store.
pub async fn finalize_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<FinalizationReport, ServiceError> {
    let store = state.require_game_store().await?;
    finalize(store.as_ref(), game_id).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;
    use crate::{
        dao::{game_store::memory::MemoryGameStore, models::GameEntity},
        services::test_support::{Fault, FlakyStore, seed_game, seed_participant, seed_score},
    };

    #[tokio::test]
    async fn ties_get_distinct_sequential_ranks() {
        let store = MemoryGameStore::new();
        let game = seed_game(&store, GameStatus::Active).await;
        let t0 = OffsetDateTime::now_utc();
        let p1 = seed_participant(&store, game.id, t0).await;
        let p2 = seed_participant(&store, game.id, t0 + Duration::seconds(1)).await;
        let p3 = seed_participant(&store, game.id, t0 + Duration::seconds(2)).await;
        seed_score(&store, game.id, p1.player_id, 130).await;
        seed_score(&store, game.id, p2.player_id, 130).await;
        seed_score(&store, game.id, p3.player_id, 50).await;

        let report = finalize(&store, game.id).await.unwrap();

        let ranks: Vec<(Uuid, i32, u32)> = report
            .rankings
            .iter()
            .map(|r| (r.player_id, r.total_score, r.rank))
            .collect();
        assert_eq!(
            ranks,
            vec![
                (p1.player_id, 130, 1),
                (p2.player_id, 130, 2),
                (p3.player_id, 50, 3),
            ]
        );

        let finished = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(finished.status, GameStatus::Finished);
        assert!(finished.ended_at.is_some());

        let frozen = store.find_participant(game.id, p3.player_id).await.unwrap().unwrap();
        assert_eq!((frozen.final_score, frozen.final_rank), (Some(50), Some(3)));
    }

    #[tokio::test]
    async fn silent_participants_are_ranked_with_zero() {
        let store = MemoryGameStore::new();
        let game = seed_game(&store, GameStatus::Active).await;
        let t0 = OffsetDateTime::now_utc();
        let talker = seed_participant(&store, game.id, t0 + Duration::seconds(1)).await;
        let silent = seed_participant(&store, game.id, t0).await;
        seed_score(&store, game.id, talker.player_id, -25).await;

        let report = finalize(&store, game.id).await.unwrap();

        assert_eq!(report.rankings[0].player_id, silent.player_id);
        assert_eq!(report.rankings[0].total_score, 0);
        assert_eq!(report.rankings[1].total_score, -25);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found_and_nothing_is_written() {
        let store = MemoryGameStore::new();

        let err = finalize(&store, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(store.list_games(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_game_cannot_be_finalized() {
        let store = MemoryGameStore::new();
        let game = seed_game(&store, GameStatus::Pending).await;

        let err = finalize(&store, game.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidState(_)));
        let current = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(current.status, GameStatus::Pending);
    }

    #[tokio::test]
    async fn failed_participant_update_keeps_the_game_active() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Active).await;
        let player = seed_participant(&memory, game.id, OffsetDateTime::now_utc()).await;
        seed_score(&memory, game.id, player.player_id, 100).await;
        let store = FlakyStore::new(memory.clone());
        store.fail(Fault::ParticipantResult);

        let err = finalize(&store, game.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        let current = memory.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(current.status, GameStatus::Active);
        assert!(current.ended_at.is_none());
    }

    #[tokio::test]
    async fn finished_game_is_reported_without_rewriting() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Active).await;
        let player = seed_participant(&*store, game.id, OffsetDateTime::now_utc()).await;
        seed_score(&*store, game.id, player.player_id, 130).await;

        let first = finalize(&*store, game.id).await.unwrap();
        let ended_at = store.find_game(game.id).await.unwrap().unwrap().ended_at;
        let second = finalize(&*store, game.id).await.unwrap();

        assert_eq!(first, second);
        let after: GameEntity = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(after.ended_at, ended_at);
    }
}
