use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{PlayerEntity, PlayerPatch},
    dto::{format_timestamp, validation::validate_username},
};

/// Payload used to join as a player. Joining twice with the same username
/// returns the existing player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinPlayerRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    /// Avatar reference; a random one from the configured pool is assigned when omitted.
    #[serde(default)]
    #[validate(length(min = 1, max = 512))]
    pub avatar_url: Option<String>,
}

/// Profile fields to change. Omitted fields are left untouched.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerRequest {
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 512))]
    pub avatar_url: Option<String>,
}

impl From<UpdatePlayerRequest> for PlayerPatch {
    fn from(value: UpdatePlayerRequest) -> Self {
        Self {
            email: value.email,
            avatar_url: value.avatar_url,
        }
    }
}

/// Public projection of a player.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PlayerEntity> for PlayerResponse {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            avatar_url: value.avatar_url,
            created_at: format_timestamp(value.created_at),
            updated_at: format_timestamp(value.updated_at),
        }
    }
}
