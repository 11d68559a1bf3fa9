use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use database::postgres::PostgresConfig;
use domain_inventory::MonitorConfig;

pub use core_config::Environment;

/// Process configuration, composed from the shared config pieces.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DATABASE_URL is required
        let server = ServerConfig::from_env()?; // HOST, PORT, GRPC_PORT
        let monitor = MonitorConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            monitor,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_only_database_url() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/inventory")),
                ("HOST", None),
                ("PORT", None),
                ("GRPC_PORT", None),
                ("STOCK_MONITOR_INTERVAL_SECS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.app.name, "inventory_api");
                assert_eq!(config.server.grpc_address(), "0.0.0.0:50051");
                assert_eq!(config.monitor, MonitorConfig::default());
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_var_unset("DATABASE_URL", || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_invalid_monitor_interval_fails() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/inventory")),
                ("STOCK_MONITOR_INTERVAL_SECS", Some("0")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
