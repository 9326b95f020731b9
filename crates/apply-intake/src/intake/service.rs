use std::net::IpAddr;
use std::sync::Arc;

use tracing::{error, info};

use super::domain::{Application, ApplicationId, Submission};
use super::repository::{ApplicationRepository, RepositoryError};
use super::validation::ValidationErrors;

/// Service composing validation, normalization, and the repository insert.
pub struct IntakeService<R> {
    repository: Arc<R>,
}

impl<R> IntakeService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Validate a submission and store it, returning the identifier assigned by storage.
    ///
    /// Invalid submissions never reach the repository. Storage failures are logged here
    /// and returned without retrying.
    pub async fn submit(
        &self,
        submission: Submission,
        peer_address: Option<IpAddr>,
        forwarded_for: Option<&str>,
    ) -> Result<ApplicationId, IntakeError> {
        let ip_address = resolve_client_address(forwarded_for, peer_address);
        let application = Application::from_submission(submission, ip_address)?;

        match self.repository.insert(&application).await {
            Ok(id) => {
                info!(%id, "application stored");
                Ok(id)
            }
            Err(err) => {
                error!(error = %err, "failed to store application");
                Err(IntakeError::Storage(err))
            }
        }
    }
}

/// Picks the address recorded with an application: the forwarding header verbatim when
/// present and non-empty, otherwise the transport peer.
pub fn resolve_client_address(
    forwarded_for: Option<&str>,
    peer_address: Option<IpAddr>,
) -> Option<String> {
    forwarded_for
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer_address.map(|ip| ip.to_canonical().to_string()))
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}
