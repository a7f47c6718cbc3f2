use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, ParticipantEntity},
    services::scoreboard::ScoreboardEntry,
};

/// Participant row joined with the player's public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantView {
    /// Membership row.
    pub participant: ParticipantEntity,
    /// Player username, when the profile could be loaded.
    pub username: Option<String>,
    /// Player avatar.
    pub avatar_url: Option<String>,
}

/// Live view of one game kept current by its synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    /// Game being watched.
    pub game_id: Uuid,
    /// Latest game row, `None` until loaded or when the game does not exist.
    pub game: Option<GameEntity>,
    /// Participants in store order.
    pub participants: Vec<ParticipantView>,
    /// Scoreboard derived from every score record.
    pub scoreboard: Vec<ScoreboardEntry>,
    /// True until the initial fetch settles.
    pub is_loading: bool,
    /// Message of the last failed initial fetch.
    pub error: Option<String>,
}

impl GameSnapshot {
    /// Empty snapshot published before the initial fetch completes.
    pub fn loading(game_id: Uuid) -> Self {
        Self {
            game_id,
            game: None,
            participants: Vec::new(),
            scoreboard: Vec::new(),
            is_loading: true,
            error: None,
        }
    }
}
