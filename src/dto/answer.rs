use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::ScoreEntity,
    dto::format_timestamp,
    services::answer_service::{AnswerReceipt, AnswerSubmission},
};

/// Answer submitted by a player for one question.
///
/// Every field except `responseTimeMs` is mandatory; a missing or empty one
/// is rejected with 400 before anything is stored.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAnswerRequest {
    #[serde(default)]
    #[validate(required)]
    #[schema(value_type = Uuid)]
    pub game_id: Option<Uuid>,
    #[serde(default)]
    #[validate(required)]
    #[schema(value_type = Uuid)]
    pub player_id: Option<Uuid>,
    #[serde(default)]
    #[validate(required)]
    #[schema(value_type = Uuid)]
    pub question_id: Option<Uuid>,
    #[serde(default)]
    #[validate(required, length(min = 1))]
    #[schema(value_type = String)]
    pub user_answer: Option<String>,
    #[serde(default)]
    #[validate(required, length(min = 1))]
    #[schema(value_type = String)]
    pub correct_answer: Option<String>,
    /// Milliseconds between question display and submission; no speed bonus when omitted.
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

impl VerifyAnswerRequest {
    /// Narrow a validated request into a typed submission.
    pub fn into_submission(self) -> Option<AnswerSubmission> {
        Some(AnswerSubmission {
            game_id: self.game_id?,
            player_id: self.player_id?,
            question_id: self.question_id?,
            user_answer: self.user_answer?,
            correct_answer: self.correct_answer?,
            response_time_ms: self.response_time_ms,
        })
    }
}

/// Points before and after the speed bonus.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base_points: i32,
    pub bonus: i32,
}

/// Persisted score record.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecordDto {
    pub id: Uuid,
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub question_id: Uuid,
    pub answer_text: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub response_time_ms: Option<u64>,
    pub created_at: String,
}

impl From<ScoreEntity> for ScoreRecordDto {
    fn from(value: ScoreEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            player_id: value.player_id,
            question_id: value.question_id,
            answer_text: value.answer_text,
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            response_time_ms: value.response_time_ms,
            created_at: format_timestamp(value.created_at),
        }
    }
}

/// Response of `POST /verify-answer`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAnswerResponse {
    pub is_correct: bool,
    pub points_earned: i32,
    pub breakdown: ScoreBreakdown,
    /// Sum of every score record of the player in this game, this one included.
    pub player_total_score: i32,
    pub score: ScoreRecordDto,
}

impl From<AnswerReceipt> for VerifyAnswerResponse {
    fn from(value: AnswerReceipt) -> Self {
        Self {
            is_correct: value.outcome.is_correct,
            points_earned: value.outcome.total_points,
            breakdown: ScoreBreakdown {
                base_points: value.outcome.base_points,
                bonus: value.outcome.bonus,
            },
            player_total_score: value.player_total_score,
            score: value.score.into(),
        }
    }
}
