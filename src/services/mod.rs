/// Submit-and-score flow.
pub mod answer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Final rankings and game closing.
pub mod finalization_service;
/// Game creation, lookup and lobby joins.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Lifecycle triggers: capacity start, manual start, question progression.
pub mod lifecycle_service;
/// Player identities.
pub mod player_service;
/// Scoreboard aggregation.
pub mod scoreboard;
/// Answer evaluation rules.
pub mod scoring;
/// Server-Sent Events streaming of game snapshots.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Per-game snapshot synchronizer.
pub mod sync_service;
#[cfg(test)]
pub(crate) mod test_support;
