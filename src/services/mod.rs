pub mod auth;
pub mod books;
pub mod password;
pub mod users;

use thiserror::Error;

use crate::db::DbError;
use crate::errors::ApiError;
use password::HashError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the input; the message is shown to the client.
    #[error("{0}")]
    Rule(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ServiceError {
    pub(crate) fn rule(message: impl Into<String>) -> Self {
        ServiceError::Rule(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rule(message) => ApiError::BadRequest(message),
            ServiceError::Db(db) => db.into(),
            ServiceError::Hash(e) => ApiError::Internal(e.to_string()),
        }
    }
}
