//! Application form intake: payload parsing, field validation, and persistence.

pub mod domain;
pub mod postgres;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{Application, ApplicationId, Submission};
pub use postgres::{lazy_pool, PgApplicationRepository};
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::{intake_router, SubmitResponse, SERVER_ERROR_MESSAGE, SUBMIT_PATH};
pub use service::{resolve_client_address, IntakeError, IntakeService};
pub use validation::{validate, FieldError, ValidationErrors};
