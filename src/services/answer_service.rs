//! Submit-and-score: evaluates one answer and appends the score record.

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{GameStatus, ScoreEntity},
    error::ServiceError,
    services::scoring::AnswerOutcome,
    state::SharedState,
};

/// A complete answer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    /// Game being played.
    pub game_id: Uuid,
    /// Answering player.
    pub player_id: Uuid,
    /// Answered question.
    pub question_id: Uuid,
    /// Raw answer, stored as typed.
    pub user_answer: String,
    /// Expected word.
    pub correct_answer: String,
    /// Client-measured latency.
    pub response_time_ms: Option<u64>,
}

/// Outcome returned to the submitting player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// Correctness and points of this answer.
    pub outcome: AnswerOutcome,
    /// Player total in the game after this answer.
    pub player_total_score: i32,
    /// Persisted record.
    pub score: ScoreEntity,
}

/// Score `submission` and persist the record.
///
/// Answers are only accepted while the game is active, so finalized rankings
/// never drift from the stored scores.
pub async fn verify_answer(
    state: &SharedState,
    submission: AnswerSubmission,
) -> Result<AnswerReceipt, ServiceError> {
    if submission.user_answer.trim().is_empty() {
        return Err(ServiceError::InvalidInput("userAnswer must not be blank".into()));
    }
    if submission.correct_answer.trim().is_empty() {
        return Err(ServiceError::InvalidInput("correctAnswer must not be blank".into()));
    }

    let store = state.require_game_store().await?;
    let game_id = submission.game_id;
    let Some(game) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    if game.status != GameStatus::Active {
        return Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is {}, answers are only accepted while active",
            game.status.as_str()
        )));
    }

    let outcome = state.config().scoring.evaluate(
        &submission.user_answer,
        &submission.correct_answer,
        submission.response_time_ms,
    );
    debug!(
        game_id = %game_id,
        player_id = %submission.player_id,
        is_correct = outcome.is_correct,
        points = outcome.total_points,
        "answer evaluated"
    );

    let score = store
        .insert_score(ScoreEntity {
            id: Uuid::new_v4(),
            game_id,
            player_id: submission.player_id,
            question_id: submission.question_id,
            answer_text: submission.user_answer,
            is_correct: outcome.is_correct,
            points_earned: outcome.total_points,
            response_time_ms: submission.response_time_ms,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    let player_total_score: i32 = store
        .list_player_scores(game_id, submission.player_id)
        .await?
        .iter()
        .map(|record| record.points_earned)
        .sum();
    info!(
        game_id = %game_id,
        player_id = %submission.player_id,
        points = outcome.total_points,
        total = player_total_score,
        "score recorded"
    );

    Ok(AnswerReceipt {
        outcome,
        player_total_score,
        score,
    })
}
