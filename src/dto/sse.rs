use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::game::{GameResponse, ParticipantResponse, ScoreboardEntryDto},
    state::snapshot::GameSnapshot,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: &'static str,
    pub data: String,
}

impl ServerEvent {
    /// Serialise `payload` into the SSE data field.
    pub fn json<T: Serialize>(event: &'static str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Live view of a game pushed on every change.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshotDto {
    pub game_id: Uuid,
    /// `null` until loaded, or when the game does not exist.
    pub game: Option<GameResponse>,
    pub participants: Vec<ParticipantResponse>,
    pub scoreboard: Vec<ScoreboardEntryDto>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl From<GameSnapshot> for GameSnapshotDto {
    fn from(value: GameSnapshot) -> Self {
        Self {
            game_id: value.game_id,
            game: value.game.map(Into::into),
            participants: value.participants.into_iter().map(Into::into).collect(),
            scoreboard: value.scoreboard.into_iter().map(Into::into).collect(),
            is_loading: value.is_loading,
            error: value.error,
        }
    }
}
