use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameEntity, GameStatus, QuestionEntity},
    dto::{finalize::FinalRankingDto, format_timestamp, validation::validate_not_blank},
    services::{
        lifecycle_service::QuestionProgress,
        scoreboard::{PlayerScoreSummary, ScoreboardEntry},
    },
    state::snapshot::ParticipantView,
};

/// Payload used to create a game together with its question sequence.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[validate(custom(function = "validate_not_blank"), length(max = 120))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Questions in play order; display order is assigned from their position.
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
}

/// One "4 images, 1 word" puzzle.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[serde(default)]
    pub question_text: Option<String>,
    #[validate(length(min = 1, max = 4))]
    pub images: Vec<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub correct_answer: String,
    /// Seconds allowed to answer; defaults to 30.
    #[serde(default)]
    #[validate(range(min = 5, max = 600))]
    pub time_limit_seconds: Option<u32>,
}

/// Optional status filter for game listings.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameListQuery {
    /// Only return games in this status.
    pub status: Option<GameStatus>,
}

/// Request body for joining a game.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub player_id: Uuid,
}

/// Public projection of a game row.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: GameStatus,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<GameEntity> for GameResponse {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            status: value.status,
            started_at: value.started_at.map(format_timestamp),
            ended_at: value.ended_at.map(format_timestamp),
            created_at: format_timestamp(value.created_at),
            updated_at: format_timestamp(value.updated_at),
        }
    }
}

/// Game created together with its questions.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    pub game: GameResponse,
    pub questions: Vec<QuestionResponse>,
}

/// Public projection of a question.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub question_text: Option<String>,
    pub images: Vec<String>,
    pub correct_answer: String,
    pub display_order: u32,
    pub time_limit_seconds: u32,
}

impl From<QuestionEntity> for QuestionResponse {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            question_text: value.question_text,
            images: value.images,
            correct_answer: value.correct_answer,
            display_order: value.display_order,
            time_limit_seconds: value.time_limit_seconds,
        }
    }
}

/// Participant joined with the player's public profile.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub joined_at: String,
    pub final_score: Option<i32>,
    pub final_rank: Option<u32>,
}

impl From<ParticipantView> for ParticipantResponse {
    fn from(value: ParticipantView) -> Self {
        let ParticipantView {
            participant,
            username,
            avatar_url,
        } = value;
        Self {
            id: participant.id,
            game_id: participant.game_id,
            player_id: participant.player_id,
            username,
            avatar_url,
            joined_at: format_timestamp(participant.joined_at),
            final_score: participant.final_score,
            final_rank: participant.final_rank,
        }
    }
}

/// One ranked scoreboard row.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEntryDto {
    pub player_id: Uuid,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: i32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub rank: u32,
}

impl From<ScoreboardEntry> for ScoreboardEntryDto {
    fn from(value: ScoreboardEntry) -> Self {
        Self {
            player_id: value.player_id,
            username: value.username,
            avatar_url: value.avatar_url,
            total_points: value.total_points,
            correct_answers: value.correct_answers,
            total_answers: value.total_answers,
            rank: value.rank,
        }
    }
}

/// Totals of one player in one game.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScoreResponse {
    pub player_id: Uuid,
    pub total_points: i32,
    pub correct_answers: u32,
    pub total_answers: u32,
    /// Rounded percentage of correct answers.
    pub accuracy: u32,
}

impl From<PlayerScoreSummary> for PlayerScoreResponse {
    fn from(value: PlayerScoreSummary) -> Self {
        Self {
            player_id: value.player_id,
            total_points: value.total_points,
            correct_answers: value.correct_answers,
            total_answers: value.total_answers,
            accuracy: value.accuracy,
        }
    }
}

/// Outcome of closing a question.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseQuestionResponse {
    /// True when the closed question was the last one and the game is finalized.
    pub finished: bool,
    pub next_question: Option<QuestionResponse>,
    pub final_rankings: Option<Vec<FinalRankingDto>>,
}

impl From<QuestionProgress> for CloseQuestionResponse {
    fn from(value: QuestionProgress) -> Self {
        match value {
            QuestionProgress::Next(question) => Self {
                finished: false,
                next_question: Some(question.into()),
                final_rankings: None,
            },
            QuestionProgress::Finished(report) => Self {
                finished: true,
                next_question: None,
                final_rankings: Some(report.rankings.into_iter().map(Into::into).collect()),
            },
        }
    }
}
