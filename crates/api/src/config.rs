// API server configuration

use std::net::SocketAddr;

use calendar_core::config::env_or;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GRPC_ADDR: &str = "0.0.0.0:9090";

/// Listen addresses for the two transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl ApiConfig {
    /// Read HTTP_ADDR and GRPC_ADDR.
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            http_addr: env_or("HTTP_ADDR", DEFAULT_HTTP_ADDR.to_string()).parse()?,
            grpc_addr: env_or("GRPC_ADDR", DEFAULT_GRPC_ADDR.to_string()).parse()?,
        })
    }

    pub fn with_http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    pub fn with_grpc_addr(mut self, addr: SocketAddr) -> Self {
        self.grpc_addr = addr;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_addresses() {
        let config = ApiConfig::default();
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR.parse().unwrap());
        assert_eq!(config.grpc_addr, DEFAULT_GRPC_ADDR.parse().unwrap());
    }

    #[test]
    fn test_builders() {
        let config = ApiConfig::default()
            .with_http_addr("127.0.0.1:3000".parse().unwrap())
            .with_grpc_addr("127.0.0.1:3001".parse().unwrap());
        assert_eq!(config.http_addr.port(), 3000);
        assert_eq!(config.grpc_addr.port(), 3001);
    }
}
