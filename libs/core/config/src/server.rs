use crate::{env_or_default, parse_env_or, ConfigError, FromEnv};
use std::net::Ipv4Addr;

/// Listener settings for a process that serves HTTP and gRPC side by side.
///
/// Both listeners bind to the same host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub grpc_port: u16,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_GRPC_PORT: u16 = 50051;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            grpc_port: Self::DEFAULT_GRPC_PORT,
        }
    }

    pub fn with_grpc_port(mut self, grpc_port: u16) -> Self {
        self.grpc_port = grpc_port;
        self
    }

    /// HTTP `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }
}

impl FromEnv for ServerConfig {
    /// `HOST` (0.0.0.0), `PORT` (8080), `GRPC_PORT` (50051)
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = parse_env_or("PORT", Self::DEFAULT_PORT)?;
        let grpc_port = parse_env_or("GRPC_PORT", Self::DEFAULT_GRPC_PORT)?;

        if port == grpc_port {
            return Err(ConfigError::ParseError {
                key: "GRPC_PORT".to_string(),
                details: format!("must differ from PORT ({port})"),
            });
        }

        Ok(Self::new(host, port).with_grpc_port(grpc_port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED.to_string(), Self::DEFAULT_PORT)
    }
}
