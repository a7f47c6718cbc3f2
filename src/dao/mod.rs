/// Row-level change notifications.
pub mod feed;
/// Storage backends and the trait they implement.
pub mod game_store;
/// Persisted rows.
pub mod models;
/// Backend-neutral storage errors.
pub mod storage;
