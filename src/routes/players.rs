use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::player::{JoinPlayerRequest, PlayerResponse, UpdatePlayerRequest},
    error::AppError,
    routes::json::AppJson,
    services::player_service,
    state::SharedState,
};

/// Player identity routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(join_player))
        .route("/players/{id}", get(get_player).patch(update_player))
}

/// Join as a player, reusing the existing identity when the username is known.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = JoinPlayerRequest,
    responses(
        (status = 200, description = "Player created or found", body = PlayerResponse),
        (status = 400, description = "Invalid username")
    )
)]
pub async fn join_player(
    State(state): State<SharedState>,
    Valid(AppJson(payload)): Valid<AppJson<JoinPlayerRequest>>,
) -> Result<Json<PlayerResponse>, AppError> {
    let player = player_service::join(&state, payload).await?;
    Ok(Json(player.into()))
}

/// Fetch a player by id.
#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = Uuid, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Player", body = PlayerResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerResponse>, AppError> {
    Ok(Json(player_service::get(&state, id).await?.into()))
}

/// Update the email or avatar of a player.
#[utoipa::path(
    patch,
    path = "/players/{id}",
    tag = "players",
    params(("id" = Uuid, Path, description = "Player identifier")),
    request_body = UpdatePlayerRequest,
    responses(
        (status = 200, description = "Updated player", body = PlayerResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn update_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(AppJson(payload)): Valid<AppJson<UpdatePlayerRequest>>,
) -> Result<Json<PlayerResponse>, AppError> {
    let player = player_service::update(&state, id, payload).await?;
    Ok(Json(player.into()))
}
