use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status persisted on every game row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Lobby is open and players are joining.
    Pending,
    /// Questions are being played.
    Active,
    /// Final rankings are frozen.
    Finished,
}

impl GameStatus {
    /// Wire name used by the storage backends for equality filters.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Pending => "pending",
            GameStatus::Active => "active",
            GameStatus::Finished => "finished",
        }
    }
}

/// Player identity, created once per unique username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Unique username used for idempotent joins.
    pub username: String,
    /// Optional contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Optional avatar reference shown on the scoreboard.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last time the profile was updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Mutable profile fields of a player. `None` leaves the field untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PlayerPatch {
    /// New contact email.
    pub email: Option<String>,
    /// New avatar reference.
    pub avatar_url: Option<String>,
}

impl PlayerPatch {
    /// Whether the patch would change anything.
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.avatar_url.is_none()
    }
}

/// One trivia session and its lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Set when the game leaves the lobby.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// Set when the game is finalized.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last time the row was updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields written together with a status transition.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct GameStatusPatch {
    /// Status after the transition.
    pub status: GameStatus,
    /// Start timestamp, written when entering `active`.
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<OffsetDateTime>,
    /// End timestamp, written when entering `finished`.
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<OffsetDateTime>,
    /// Update timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GameStatusPatch {
    /// Apply the patch onto an in-memory game row.
    pub fn apply_to(&self, game: &mut GameEntity) {
        game.status = self.status;
        if let Some(started_at) = self.started_at {
            game.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            game.ended_at = Some(ended_at);
        }
        game.updated_at = self.updated_at;
    }
}

/// One "4 images, 1 word" puzzle within a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Optional hint text.
    #[serde(default)]
    pub question_text: Option<String>,
    /// Image references shown for the puzzle.
    #[serde(default)]
    pub images: Vec<String>,
    /// Expected word.
    pub correct_answer: String,
    /// Position in the game's sequence, unique per game.
    pub display_order: u32,
    /// Time allowed to answer.
    pub time_limit_seconds: u32,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Append-only outcome of one answer attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Primary key of the record.
    pub id: Uuid,
    /// Game the answer belongs to.
    pub game_id: Uuid,
    /// Answering player.
    pub player_id: Uuid,
    /// Answered question.
    pub question_id: Uuid,
    /// Raw submitted answer.
    pub answer_text: String,
    /// Whether the answer matched.
    pub is_correct: bool,
    /// Points awarded, possibly negative.
    pub points_earned: i32,
    /// Latency between question display and submission, when the client measured it.
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    /// Insertion timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Membership of a player in a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the membership row.
    pub id: Uuid,
    /// Game joined.
    pub game_id: Uuid,
    /// Joining player.
    pub player_id: Uuid,
    /// Join timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    /// Frozen total, set by finalization.
    #[serde(default)]
    pub final_score: Option<i32>,
    /// Frozen 1-based rank, set by finalization.
    #[serde(default)]
    pub final_rank: Option<u32>,
}
