use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::players::join_player,
        crate::routes::players::get_player,
        crate::routes::players::update_player,
        crate::routes::game::create_game,
        crate::routes::game::list_games,
        crate::routes::game::get_game,
        crate::routes::game::list_questions,
        crate::routes::game::list_participants,
        crate::routes::game::join_game,
        crate::routes::game::get_scoreboard,
        crate::routes::game::get_player_score,
        crate::routes::game::start_game,
        crate::routes::game::close_question,
        crate::routes::scoring::verify_answer,
        crate::routes::scoring::finalize_game,
        crate::routes::sse::game_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::GameSnapshotDto,
            crate::dao::models::GameStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "players", description = "Player identities"),
        (name = "games", description = "Games, lobby and question progression"),
        (name = "scoring", description = "Answer scoring and game finalization"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
