use async_trait::async_trait;

use super::domain::{Application, ApplicationId};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations insert exactly one row per successful call and never retry.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn insert(&self, application: &Application) -> Result<ApplicationId, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
