use super::error::{RestDaoError, RestResult};

/// How to reach the PostgREST endpoint exposing the game tables.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RestConfig {
    /// Configuration for an endpoint that needs no key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Send `key` both as `apikey` and as a bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Read `REST_BASE_URL` (required) and `REST_API_KEY` (optional).
    pub fn from_env() -> RestResult<Self> {
        let base_url = std::env::var("REST_BASE_URL").map_err(|_| RestDaoError::MissingEnvVar {
            var: "REST_BASE_URL",
        })?;

        let config = Self::new(base_url);
        Ok(match std::env::var("REST_API_KEY") {
            Ok(key) if !key.is_empty() => config.with_api_key(key),
            _ => config,
        })
    }
}
