use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::domain::{Application, ApplicationId};
use super::repository::{ApplicationRepository, RepositoryError};
use crate::config::DatabaseConfig;

const CREATE_APPLICATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS applications (
    id SERIAL PRIMARY KEY,
    name TEXT,
    email TEXT,
    gender TEXT,
    age INTEGER,
    current_occupation TEXT,
    ip_address TEXT
)
"#;

const INSERT_APPLICATION: &str = "INSERT INTO applications \
     (name, email, gender, age, current_occupation, ip_address) \
     VALUES ($1, $2, $3, $4, $5, $6) RETURNING id";

/// Builds the shared connection pool. Connections are opened on first use, so an
/// unreachable database surfaces as a per-request storage error rather than a
/// startup failure.
pub fn lazy_pool(config: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_lazy_with(config.connect_options())
}

/// `applications` table adapter backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `applications` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_APPLICATIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn insert(&self, application: &Application) -> Result<ApplicationId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(INSERT_APPLICATION)
            .bind(application.name())
            .bind(application.email())
            .bind(application.gender())
            .bind(application.age())
            .bind(application.current_occupation())
            .bind(application.ip_address())
            .fetch_one(&self.pool)
            .await?;
        Ok(ApplicationId(id))
    }
}
