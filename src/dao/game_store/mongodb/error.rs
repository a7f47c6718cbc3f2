use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert into `{collection}`")]
    Insert {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to query `{collection}`")]
    Query {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to update `{collection}`")]
    Update {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("malformed identifier in `{collection}`")]
    Decode {
        collection: &'static str,
        #[source]
        source: uuid::Error,
    },
}

impl MongoDaoError {
    /// Whether the server rejected a write because of a unique index.
    pub fn is_duplicate_key(&self) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};

        const DUPLICATE_KEY: i32 = 11000;
        match self {
            MongoDaoError::Insert { source, .. } | MongoDaoError::Update { source, .. } => {
                matches!(
                    source.kind.as_ref(),
                    ErrorKind::Write(WriteFailure::WriteError(write_error))
                        if write_error.code == DUPLICATE_KEY
                )
            }
            _ => false,
        }
    }
}
