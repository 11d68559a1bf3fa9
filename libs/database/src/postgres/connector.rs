use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Connects with exponential backoff, for processes that start before the database.
///
/// ```ignore
/// let db = connect_from_config_with_retry(
///     PostgresConfig::from_env()?,
///     Some(RetryConfig::new().with_max_retries(10)),
/// )
/// .await?;
/// ```
pub async fn connect_from_config_with_retry(
    config: PostgresConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<DatabaseConnection> {
    let retry_config = retry_config.unwrap_or_default();
    let attempts = retry_config.max_retries + 1;
    let options = config.into_connect_options();

    let db = retry_with_backoff(|| Database::connect(options.clone()), retry_config)
        .await
        .map_err(|source| DatabaseError::Unreachable { attempts, source })?;

    info!("Connected to PostgreSQL");
    Ok(db)
}

/// Applies every pending migration of `M`.
pub async fn run_migrations<M: MigratorTrait>(
    db: &DatabaseConnection,
    app_name: &str,
) -> DatabaseResult<()> {
    info!(app = app_name, "Running database migrations");
    M::up(db, None).await.map_err(|source| DatabaseError::Migration {
        app: app_name.to_string(),
        source,
    })?;
    info!(app = app_name, "Database migrations complete");
    Ok(())
}
