//! Derived scoreboard: totals and ranks recomputed from raw score records.

use std::collections::HashMap;

use indexmap::IndexMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{PlayerEntity, ScoreEntity},
        storage::StorageResult,
    },
    error::ServiceError,
    state::SharedState,
};

/// One ranked row of the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreboardEntry {
    /// Player the row belongs to.
    pub player_id: Uuid,
    /// Username, when the profile is known.
    pub username: Option<String>,
    /// Avatar, when the profile is known and has one.
    pub avatar_url: Option<String>,
    /// Sum of points over every answer.
    pub total_points: i32,
    /// Number of correct answers.
    pub correct_answers: u32,
    /// Number of answers.
    pub total_answers: u32,
    /// 1-based position.
    pub rank: u32,
}

/// Totals for a single player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScoreSummary {
    /// Player the summary belongs to.
    pub player_id: Uuid,
    /// Sum of points.
    pub total_points: i32,
    /// Number of correct answers.
    pub correct_answers: u32,
    /// Number of answers.
    pub total_answers: u32,
    /// Rounded percentage of correct answers, 0 when nothing was answered.
    pub accuracy: u32,
}

struct Tally {
    total_points: i32,
    correct_answers: u32,
    total_answers: u32,
    first_answer_at: OffsetDateTime,
}

/// Rank players by total points.
///
/// Ties go to the player who answered first, then to the smaller player id,
/// so the result does not depend on the order of `records`.
pub fn aggregate(
    records: &[ScoreEntity],
    profiles: &HashMap<Uuid, PlayerEntity>,
) -> Vec<ScoreboardEntry> {
    let mut tallies: IndexMap<Uuid, Tally> = IndexMap::new();
    for record in records {
        let tally = tallies.entry(record.player_id).or_insert(Tally {
            total_points: 0,
            correct_answers: 0,
            total_answers: 0,
            first_answer_at: record.created_at,
        });
        tally.total_points += record.points_earned;
        tally.total_answers += 1;
        if record.is_correct {
            tally.correct_answers += 1;
        }
        tally.first_answer_at = tally.first_answer_at.min(record.created_at);
    }

    let mut ordered: Vec<(Uuid, Tally)> = tallies.into_iter().collect();
    ordered.sort_by(|(a_id, a), (b_id, b)| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.first_answer_at.cmp(&b.first_answer_at))
            .then(a_id.cmp(b_id))
    });

    ordered
        .into_iter()
        .zip(1u32..)
        .map(|((player_id, tally), rank)| {
            let profile = profiles.get(&player_id);
            ScoreboardEntry {
                player_id,
                username: profile.map(|player| player.username.clone()),
                avatar_url: profile.and_then(|player| player.avatar_url.clone()),
                total_points: tally.total_points,
                correct_answers: tally.correct_answers,
                total_answers: tally.total_answers,
                rank,
            }
        })
        .collect()
}

/// Summarize one player's records.
pub fn summarize(player_id: Uuid, records: &[ScoreEntity]) -> PlayerScoreSummary {
    let total_answers = records.len() as u32;
    let correct_answers = records.iter().filter(|record| record.is_correct).count() as u32;
    let accuracy = if total_answers == 0 {
        0
    } else {
        (f64::from(correct_answers) * 100.0 / f64::from(total_answers)).round() as u32
    };

    PlayerScoreSummary {
        player_id,
        total_points: records.iter().map(|record| record.points_earned).sum(),
        correct_answers,
        total_answers,
        accuracy,
    }
}

/// Fetch the score records of a game and rank them with player profiles attached.
pub async fn load_scoreboard(
    store: &dyn GameStore,
    game_id: Uuid,
) -> StorageResult<Vec<ScoreboardEntry>> {
    let records = store.list_scores(game_id).await?;
    let mut player_ids: Vec<Uuid> = records.iter().map(|record| record.player_id).collect();
    player_ids.sort_unstable();
    player_ids.dedup();

    let profiles = if player_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .find_players(player_ids)
            .await?
            .into_iter()
            .map(|player| (player.id, player))
            .collect()
    };

    Ok(aggregate(&records, &profiles))
}

/// Scoreboard of an existing game.
pub async fn scoreboard(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<ScoreboardEntry>, ServiceError> {
    let store = state.require_game_store().await?;
    if store.find_game(game_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    }
    Ok(load_scoreboard(store.as_ref(), game_id).await?)
}

/// Totals of one player in an existing game.
pub async fn player_score(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<PlayerScoreSummary, ServiceError> {
    let store = state.require_game_store().await?;
    if store.find_game(game_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    }
    let records = store.list_player_scores(game_id, player_id).await?;
    Ok(summarize(player_id, &records))
}
