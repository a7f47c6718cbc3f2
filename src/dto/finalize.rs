use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::GameStatus,
    services::finalization_service::{FinalRanking, FinalizationReport},
};

/// Request body of `POST /finalize-game`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeGameRequest {
    #[serde(default)]
    #[validate(required)]
    #[schema(value_type = Uuid)]
    pub game_id: Option<Uuid>,
}

/// Frozen standing of one player.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalRankingDto {
    pub player_id: Uuid,
    pub total_score: i32,
    pub rank: u32,
}

impl From<FinalRanking> for FinalRankingDto {
    fn from(value: FinalRanking) -> Self {
        Self {
            player_id: value.player_id,
            total_score: value.total_score,
            rank: value.rank,
        }
    }
}

/// Response of `POST /finalize-game`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeGameResponse {
    pub game_id: Uuid,
    pub status: GameStatus,
    pub final_rankings: Vec<FinalRankingDto>,
}

impl From<FinalizationReport> for FinalizeGameResponse {
    fn from(value: FinalizationReport) -> Self {
        Self {
            game_id: value.game_id,
            status: value.status,
            final_rankings: value.rankings.into_iter().map(Into::into).collect(),
        }
    }
}
