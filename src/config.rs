//! Application-level configuration loading: scoring constants, lobby limits and avatar pool.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};

use crate::services::scoring::ScoringRules;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FOUR_PICS_BACK_CONFIG_PATH";

/// Lobby limits applied while a game is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyConfig {
    /// Participant count that starts the game automatically.
    pub capacity: u64,
    /// Minimum participants required for a manual start.
    pub min_players: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            min_players: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Points awarded per answer.
    pub scoring: ScoringRules,
    /// Lobby limits.
    pub lobby: LobbyConfig,
    avatars: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        threshold_ms = app_config.scoring.speed_bonus_threshold_ms,
                        capacity = app_config.lobby.capacity,
                        avatars = app_config.avatars.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Pick an avatar from the configured pool, if any.
    pub fn random_avatar(&self) -> Option<String> {
        self.avatars.choose(&mut rand::rng()).cloned()
    }

    /// Replace the avatar pool.
    pub fn with_avatars(mut self, avatars: Vec<String>) -> Self {
        self.avatars = avatars;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    scoring: RawScoring,
    lobby: RawLobby,
    avatars: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScoring {
    correct_points: Option<i32>,
    incorrect_penalty: Option<i32>,
    speed_bonus: Option<i32>,
    speed_bonus_threshold_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLobby {
    capacity: Option<u64>,
    min_players: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let scoring_defaults = ScoringRules::default();
        let lobby_defaults = LobbyConfig::default();
        Self {
            scoring: ScoringRules {
                correct_points: value
                    .scoring
                    .correct_points
                    .unwrap_or(scoring_defaults.correct_points),
                incorrect_penalty: value
                    .scoring
                    .incorrect_penalty
                    .unwrap_or(scoring_defaults.incorrect_penalty),
                speed_bonus: value
                    .scoring
                    .speed_bonus
                    .unwrap_or(scoring_defaults.speed_bonus),
                speed_bonus_threshold_ms: value
                    .scoring
                    .speed_bonus_threshold_ms
                    .unwrap_or(scoring_defaults.speed_bonus_threshold_ms),
            },
            lobby: LobbyConfig {
                capacity: value
                    .lobby
                    .capacity
                    .filter(|capacity| *capacity > 0)
                    .unwrap_or(lobby_defaults.capacity),
                min_players: value
                    .lobby
                    .min_players
                    .unwrap_or(lobby_defaults.min_players),
            },
            avatars: value.avatars,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "scoring": { "speed_bonus_threshold_ms": 20000 }, "avatars": ["a.png"] }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.scoring.speed_bonus_threshold_ms, 20_000);
        assert_eq!(config.scoring.correct_points, 100);
        assert_eq!(config.lobby, LobbyConfig::default());
        assert_eq!(config.random_avatar().as_deref(), Some("a.png"));
    }

    #[test]
    fn zero_capacity_is_ignored() {
        let raw: RawConfig = serde_json::from_str(r#"{ "lobby": { "capacity": 0 } }"#).unwrap();
        assert_eq!(AppConfig::from(raw).lobby.capacity, 8);
    }

    #[test]
    fn empty_pool_yields_no_avatar() {
        assert_eq!(AppConfig::default().random_avatar(), None);
    }
}
