use sea_orm::DbErr;

/// Failures of pool management. Query errors inside a domain stay `DbErr`.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("PostgreSQL unreachable after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: DbErr,
    },

    #[error("Readiness query failed: {0}")]
    Unhealthy(#[source] DbErr),

    #[error("Migrations for {app} failed: {source}")]
    Migration {
        app: String,
        #[source]
        source: DbErr,
    },
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
