use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::{
        answer::{VerifyAnswerRequest, VerifyAnswerResponse},
        finalize::{FinalizeGameRequest, FinalizeGameResponse},
    },
    error::AppError,
    routes::json::AppJson,
    services::{answer_service, finalization_service},
    state::SharedState,
};

/// Submit-and-score and finalization endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/verify-answer", post(verify_answer))
        .route("/finalize-game", post(finalize_game))
}

/// Score an answer and append it to the game's score records.
#[utoipa::path(
    post,
    path = "/verify-answer",
    tag = "scoring",
    request_body = VerifyAnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = VerifyAnswerResponse),
        (status = 400, description = "Missing or blank field"),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game not active"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn verify_answer(
    State(state): State<SharedState>,
    Valid(AppJson(payload)): Valid<AppJson<VerifyAnswerRequest>>,
) -> Result<Json<VerifyAnswerResponse>, AppError> {
    let submission = payload
        .into_submission()
        .ok_or_else(|| AppError::BadRequest("missing required fields".into()))?;
    let receipt = answer_service::verify_answer(&state, submission).await?;
    Ok(Json(receipt.into()))
}

/// Freeze final scores and ranks, then mark the game finished.
#[utoipa::path(
    post,
    path = "/finalize-game",
    tag = "scoring",
    request_body = FinalizeGameRequest,
    responses(
        (status = 200, description = "Final rankings", body = FinalizeGameResponse),
        (status = 400, description = "Missing gameId"),
        (status = 404, description = "Unknown game"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn finalize_game(
    State(state): State<SharedState>,
    Valid(AppJson(payload)): Valid<AppJson<FinalizeGameRequest>>,
) -> Result<Json<FinalizeGameResponse>, AppError> {
    let game_id = payload
        .game_id
        .ok_or_else(|| AppError::BadRequest("gameId is required".into()))?;
    let report = finalization_service::finalize_game(&state, game_id).await?;
    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, StatusCode, header::CONTENT_TYPE},
        response::{IntoResponse, Response},
    };
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::GameStatus,
        },
        services::test_support::{Fault, FlakyStore, seed_game},
        state::AppState,
    };

    fn json_request(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn post_finalize(state: SharedState, body: String) -> Response {
        match Valid::<AppJson<FinalizeGameRequest>>::from_request(
            json_request("/finalize-game", body),
            &state,
        )
        .await
        {
            Ok(payload) => finalize_game(State(state), payload).await.into_response(),
            Err(rejection) => rejection.into_response(),
        }
    }

    async fn post_verify(state: SharedState, body: String) -> Response {
        match Valid::<AppJson<VerifyAnswerRequest>>::from_request(
            json_request("/verify-answer", body),
            &state,
        )
        .await
        {
            Ok(payload) => verify_answer(State(state), payload).await.into_response(),
            Err(rejection) => rejection.into_response(),
        }
    }

    fn answer_body(game_id: Uuid) -> String {
        json!({
            "gameId": game_id,
            "playerId": Uuid::new_v4(),
            "questionId": Uuid::new_v4(),
            "userAnswer": "Bridge",
            "correctAnswer": "bridge",
            "responseTimeMs": 4000
        })
        .to_string()
    }

    async fn memory_state() -> (SharedState, Arc<MemoryGameStore>) {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        (state, store)
    }

    #[tokio::test]
    async fn finalize_without_game_id_is_rejected() {
        let (state, _) = memory_state().await;
        let response = post_finalize(state, "{}".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn finalize_with_malformed_game_id_is_rejected() {
        let (state, _) = memory_state().await;
        let response = post_finalize(state, r#"{"gameId":"abc"}"#.into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn finalize_with_broken_json_is_rejected() {
        let (state, _) = memory_state().await;
        let response = post_finalize(state, r#"{"gameId":"#.into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn finalize_unknown_game_is_not_found() {
        let (state, _) = memory_state().await;
        let body = json!({ "gameId": Uuid::new_v4() }).to_string();
        let response = post_finalize(state, body).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn finalize_active_game_succeeds() {
        let (state, store) = memory_state().await;
        let game = seed_game(&*store, GameStatus::Active).await;
        let body = json!({ "gameId": game.id }).to_string();

        let response = post_finalize(state, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        let stored = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn finalize_store_failure_is_internal() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Active).await;
        let store = FlakyStore::new(memory);
        store.fail(Fault::ListScores);
        let state = AppState::with_store(AppConfig::default(), Arc::new(store)).await;

        let response = post_finalize(state, json!({ "gameId": game.id }).to_string()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn verify_with_missing_fields_is_rejected() {
        let (state, _) = memory_state().await;
        let body = json!({ "gameId": Uuid::new_v4(), "userAnswer": "bridge" }).to_string();
        let response = post_verify(state, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_with_malformed_player_id_is_rejected() {
        let (state, _) = memory_state().await;
        let mut body = serde_json::from_str::<serde_json::Value>(&answer_body(Uuid::new_v4())).unwrap();
        body["playerId"] = json!("not-a-uuid");
        let response = post_verify(state, body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_unknown_game_is_not_found() {
        let (state, _) = memory_state().await;
        let response = post_verify(state, answer_body(Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn verify_scores_an_answer_in_an_active_game() {
        let (state, store) = memory_state().await;
        let game = seed_game(&*store, GameStatus::Active).await;

        let response = post_verify(state, answer_body(game.id)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.list_scores(game.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn verify_store_failure_is_internal() {
        let memory = MemoryGameStore::new();
        let game = seed_game(&memory, GameStatus::Active).await;
        let store = FlakyStore::new(memory);
        store.fail(Fault::InsertScore);
        let state = AppState::with_store(AppConfig::default(), Arc::new(store)).await;

        let response = post_verify(state, answer_body(game.id)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
