use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        CloseQuestionResponse, CreateGameRequest, GameDetails, GameListQuery, GameResponse,
        JoinGameRequest, ParticipantResponse, PlayerScoreResponse, QuestionResponse,
        ScoreboardEntryDto,
    },
    error::AppError,
    routes::json::AppJson,
    services::{game_service, lifecycle_service, scoreboard},
    state::SharedState,
};

/// Game management, lobby and progression routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/questions", get(list_questions))
        .route(
            "/games/{id}/participants",
            get(list_participants).post(join_game),
        )
        .route("/games/{id}/scoreboard", get(get_scoreboard))
        .route("/games/{id}/players/{player_id}/score", get(get_player_score))
        .route("/games/{id}/start", post(start_game))
        .route(
            "/games/{id}/questions/{question_id}/close",
            post(close_question),
        )
}

/// Create a pending game with its question sequence.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameDetails),
        (status = 400, description = "Invalid game definition")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(AppJson(payload)): Valid<AppJson<CreateGameRequest>>,
) -> Result<Json<GameDetails>, AppError> {
    let (game, questions) = game_service::create_game(&state, payload).await?;
    Ok(Json(GameDetails {
        game: game.into(),
        questions: questions.into_iter().map(Into::into).collect(),
    }))
}

/// List games, newest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(GameListQuery),
    responses((status = 200, description = "Games", body = [GameResponse]))
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<GameListQuery>,
) -> Result<Json<Vec<GameResponse>>, AppError> {
    let games = game_service::list_games(&state, query.status).await?;
    Ok(Json(games.into_iter().map(Into::into).collect()))
}

/// Fetch a game by id.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?.into()))
}

/// Questions of a game in play order.
#[utoipa::path(
    get,
    path = "/games/{id}/questions",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Questions", body = [QuestionResponse]))
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QuestionResponse>>, AppError> {
    let questions = game_service::list_questions(&state, id).await?;
    Ok(Json(questions.into_iter().map(Into::into).collect()))
}

/// Participants of a game with their profiles.
#[utoipa::path(
    get,
    path = "/games/{id}/participants",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Participants", body = [ParticipantResponse]))
)]
pub async fn list_participants(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ParticipantResponse>>, AppError> {
    let participants = game_service::list_participants(&state, id).await?;
    Ok(Json(participants.into_iter().map(Into::into).collect()))
}

/// Join a pending game; the join that fills the lobby starts it.
#[utoipa::path(
    post,
    path = "/games/{id}/participants",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Participant row", body = ParticipantResponse),
        (status = 404, description = "Unknown game or player"),
        (status = 409, description = "Game full or already started")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<JoinGameRequest>,
) -> Result<Json<ParticipantResponse>, AppError> {
    let participant = game_service::join_game(&state, id, payload.player_id).await?;
    Ok(Json(participant.into()))
}

/// Scoreboard derived from every score record of the game.
#[utoipa::path(
    get,
    path = "/games/{id}/scoreboard",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Ranked scoreboard", body = [ScoreboardEntryDto]))
)]
pub async fn get_scoreboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScoreboardEntryDto>>, AppError> {
    let board = scoreboard::scoreboard(&state, id).await?;
    Ok(Json(board.into_iter().map(Into::into).collect()))
}

/// Totals of one player in a game.
#[utoipa::path(
    get,
    path = "/games/{id}/players/{player_id}/score",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    responses((status = 200, description = "Player totals", body = PlayerScoreResponse))
)]
pub async fn get_player_score(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PlayerScoreResponse>, AppError> {
    let summary = scoreboard::player_score(&state, id, player_id).await?;
    Ok(Json(summary.into()))
}

/// Start a pending game before its lobby is full.
#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game started", body = GameResponse),
        (status = 409, description = "Not enough players or not pending")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(lifecycle_service::start(&state, id).await?.into()))
}

/// Close a question; returns the next one or the final rankings.
#[utoipa::path(
    post,
    path = "/games/{id}/questions/{question_id}/close",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("question_id" = Uuid, Path, description = "Question being closed")
    ),
    responses(
        (status = 200, description = "Next question or final rankings", body = CloseQuestionResponse),
        (status = 409, description = "Game not active")
    )
)]
pub async fn close_question(
    State(state): State<SharedState>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CloseQuestionResponse>, AppError> {
    let progress = lifecycle_service::close_question(&state, id, question_id).await?;
    Ok(Json(progress.into()))
}
