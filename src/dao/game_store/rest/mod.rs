mod config;
mod error;
mod store;

pub use config::RestConfig;
pub use error::RestDaoError;
pub use store::RestGameStore;

use crate::dao::storage::StorageError;

impl From<RestDaoError> for StorageError {
    fn from(err: RestDaoError) -> Self {
        match err {
            RestDaoError::Conflict { .. } => StorageError::conflict(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
