use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    GameEntity, GameStatus, ParticipantEntity, PlayerEntity, QuestionEntity, ScoreEntity,
};

pub const PLAYERS: &str = "players";
pub const GAMES: &str = "games";
pub const QUESTIONS: &str = "questions";
pub const SCORES: &str = "scores";
pub const PARTICIPANTS: &str = "game_participants";

pub fn to_bson(value: OffsetDateTime) -> DateTime {
    DateTime::from_system_time(value.into())
}

fn from_bson(value: DateTime) -> OffsetDateTime {
    OffsetDateTime::from(value.to_system_time())
}

fn parse_id(collection: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|source| MongoDaoError::Decode { collection, source })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    email: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<&PlayerEntity> for PlayerDocument {
    fn from(value: &PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            username: value.username.clone(),
            email: value.email.clone(),
            avatar_url: value.avatar_url.clone(),
            created_at: to_bson(value.created_at),
            updated_at: to_bson(value.updated_at),
        }
    }
}

impl TryFrom<PlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: PlayerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PLAYERS, &value.id)?,
            username: value.username,
            email: value.email,
            avatar_url: value.avatar_url,
            created_at: from_bson(value.created_at),
            updated_at: from_bson(value.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    description: Option<String>,
    status: GameStatus,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<&GameEntity> for GameDocument {
    fn from(value: &GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title.clone(),
            description: value.description.clone(),
            status: value.status,
            started_at: value.started_at.map(to_bson),
            ended_at: value.ended_at.map(to_bson),
            created_at: to_bson(value.created_at),
            updated_at: to_bson(value.updated_at),
        }
    }
}

impl TryFrom<GameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: GameDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(GAMES, &value.id)?,
            title: value.title,
            description: value.description,
            status: value.status,
            started_at: value.started_at.map(from_bson),
            ended_at: value.ended_at.map(from_bson),
            created_at: from_bson(value.created_at),
            updated_at: from_bson(value.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    question_text: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    correct_answer: String,
    display_order: u32,
    time_limit_seconds: u32,
    created_at: DateTime,
}

impl From<&QuestionEntity> for QuestionDocument {
    fn from(value: &QuestionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            question_text: value.question_text.clone(),
            images: value.images.clone(),
            correct_answer: value.correct_answer.clone(),
            display_order: value.display_order,
            time_limit_seconds: value.time_limit_seconds,
            created_at: to_bson(value.created_at),
        }
    }
}

impl TryFrom<QuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: QuestionDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(QUESTIONS, &value.id)?,
            game_id: parse_id(QUESTIONS, &value.game_id)?,
            question_text: value.question_text,
            images: value.images,
            correct_answer: value.correct_answer,
            display_order: value.display_order,
            time_limit_seconds: value.time_limit_seconds,
            created_at: from_bson(value.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    player_id: String,
    question_id: String,
    answer_text: String,
    is_correct: bool,
    points_earned: i32,
    // bson has no unsigned 64-bit integer
    response_time_ms: Option<i64>,
    created_at: DateTime,
}

impl From<&ScoreEntity> for ScoreDocument {
    fn from(value: &ScoreEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            player_id: value.player_id.to_string(),
            question_id: value.question_id.to_string(),
            answer_text: value.answer_text.clone(),
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            response_time_ms: value
                .response_time_ms
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
            created_at: to_bson(value.created_at),
        }
    }
}

impl TryFrom<ScoreDocument> for ScoreEntity {
    type Error = MongoDaoError;

    fn try_from(value: ScoreDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(SCORES, &value.id)?,
            game_id: parse_id(SCORES, &value.game_id)?,
            player_id: parse_id(SCORES, &value.player_id)?,
            question_id: parse_id(SCORES, &value.question_id)?,
            answer_text: value.answer_text,
            is_correct: value.is_correct,
            points_earned: value.points_earned,
            response_time_ms: value
                .response_time_ms
                .and_then(|ms| u64::try_from(ms).ok()),
            created_at: from_bson(value.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    player_id: String,
    joined_at: DateTime,
    final_score: Option<i32>,
    final_rank: Option<u32>,
}

impl From<&ParticipantEntity> for ParticipantDocument {
    fn from(value: &ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            player_id: value.player_id.to_string(),
            joined_at: to_bson(value.joined_at),
            final_score: value.final_score,
            final_rank: value.final_rank,
        }
    }
}

impl TryFrom<ParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: ParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANTS, &value.id)?,
            game_id: parse_id(PARTICIPANTS, &value.game_id)?,
            player_id: parse_id(PARTICIPANTS, &value.player_id)?,
            joined_at: from_bson(value.joined_at),
            final_score: value.final_score,
            final_rank: value.final_rank,
        })
    }
}
