//! Player identities: idempotent join by username and profile updates.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, PlayerPatch},
    dto::player::{JoinPlayerRequest, UpdatePlayerRequest},
    error::ServiceError,
    state::SharedState,
};

/// Return the player named `request.username`, creating it on first use.
///
/// Two concurrent first joins race on the unique username; the loser reads
/// back the winner's row.
pub async fn join(state: &SharedState, request: JoinPlayerRequest) -> Result<PlayerEntity, ServiceError> {
    let store = state.require_game_store().await?;
    let username = request.username.trim().to_owned();

    if let Some(existing) = store.find_player_by_username(username.clone()).await? {
        return Ok(existing);
    }

    let now = OffsetDateTime::now_utc();
    let avatar_url = request
        .avatar_url
        .or_else(|| state.config().random_avatar());
    let player = PlayerEntity {
        id: Uuid::new_v4(),
        username: username.clone(),
        email: request.email,
        avatar_url,
        created_at: now,
        updated_at: now,
    };

    match store.insert_player(player).await {
        Ok(created) => {
            info!(player_id = %created.id, username = %created.username, "player created");
            Ok(created)
        }
        Err(err) if err.is_conflict() => store
            .find_player_by_username(username.clone())
            .await?
            .ok_or_else(|| ServiceError::Conflict(format!("username `{username}` is taken"))),
        Err(err) => Err(err.into()),
    }
}

/// Fetch a player by id.
pub async fn get(state: &SharedState, id: Uuid) -> Result<PlayerEntity, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_player(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{id}` not found")))
}

/// Update the mutable profile fields of a player.
pub async fn update(
    state: &SharedState,
    id: Uuid,
    request: UpdatePlayerRequest,
) -> Result<PlayerEntity, ServiceError> {
    let patch = PlayerPatch::from(request);
    if patch.is_empty() {
        return get(state, id).await;
    }

    let store = state.require_game_store().await?;
    store
        .update_player(id, patch)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{id}` not found")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        state::AppState,
    };

    fn join_request(username: &str) -> JoinPlayerRequest {
        JoinPlayerRequest {
            username: username.into(),
            email: None,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn joining_twice_returns_the_same_player() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;

        let first = join(&state, join_request("alice")).await.unwrap();
        let second = join(&state, join_request(" alice ")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.player_count().await, 1);
        let by_name = store.find_player_by_username("alice".into()).await.unwrap();
        assert_eq!(by_name.map(|player| player.id), Some(first.id));
    }

    #[tokio::test]
    async fn missing_avatar_is_drawn_from_the_pool() {
        let store = Arc::new(MemoryGameStore::new());
        let config = AppConfig::default().with_avatars(vec!["/avatars/owl.svg".into()]);
        let state = AppState::with_store(config, store).await;

        let player = join(&state, join_request("bob")).await.unwrap();

        assert_eq!(player.avatar_url.as_deref(), Some("/avatars/owl.svg"));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store).await;
        let player = join(
            &state,
            JoinPlayerRequest {
                username: "carol".into(),
                email: Some("carol@example.com".into()),
                avatar_url: Some("/avatars/fox.svg".into()),
            },
        )
        .await
        .unwrap();

        let updated = update(
            &state,
            player.id,
            UpdatePlayerRequest {
                email: None,
                avatar_url: Some("/avatars/koala.svg".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.email.as_deref(), Some("carol@example.com"));
        assert_eq!(updated.avatar_url.as_deref(), Some("/avatars/koala.svg"));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryGameStore::new())).await;

        let err = get(&state, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn degraded_state_rejects_joins() {
        let state = AppState::new(AppConfig::default());

        let err = join(&state, join_request("dave")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Degraded));
    }
}
