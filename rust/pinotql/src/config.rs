use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
const DEFAULT_LISTEN_PORT: u16 = 8490;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Upper bound applied to row and series limits of outgoing requests.
    pub max_limit: i64,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    pinotql_listen_addr: Option<String>,
    #[serde(default)]
    pinotql_listen_host: Option<String>,
    #[serde(default)]
    pinotql_listen_port: Option<u16>,
    #[serde(default = "default_max_limit")]
    pinotql_max_limit: i64,
    #[serde(default = "default_timeout_secs")]
    pinotql_request_timeout_secs: u64,
}

const fn default_max_limit() -> i64 {
    100_000
}

const fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse PINOTQL_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.pinotql_listen_addr,
            raw.pinotql_listen_host,
            raw.pinotql_listen_port,
        )?;

        Ok(Self {
            listen_addr,
            max_limit: raw.pinotql_max_limit.max(1),
            request_timeout: Duration::from_secs(raw.pinotql_request_timeout_secs.max(1)),
        })
    }

    /// Configuration for in-process use where nothing is read from the environment.
    pub fn embedded() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_limit: default_max_limit(),
            request_timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid PINOTQL_LISTEN_ADDR value")?
            .next()
            .context("PINOTQL_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    let port = port.unwrap_or(DEFAULT_LISTEN_PORT);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid PINOTQL listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 5] = [
        "PINOTQL_LISTEN_ADDR",
        "PINOTQL_LISTEN_HOST",
        "PINOTQL_LISTEN_PORT",
        "PINOTQL_MAX_LIMIT",
        "PINOTQL_REQUEST_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_when_environment_is_empty() {
        clear_env();
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.listen_addr.port(), DEFAULT_LISTEN_PORT);
        assert_eq!(config.max_limit, 100_000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn reads_host_port_and_limits() {
        clear_env();
        env::set_var("PINOTQL_LISTEN_HOST", "127.0.0.1");
        env::set_var("PINOTQL_LISTEN_PORT", "9100");
        env::set_var("PINOTQL_MAX_LIMIT", "0");
        env::set_var("PINOTQL_REQUEST_TIMEOUT_SECS", "5");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.max_limit, 1, "max limit is floored at one");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_addr_wins_over_host_and_port() {
        clear_env();
        env::set_var("PINOTQL_LISTEN_ADDR", "127.0.0.1:7000");
        env::set_var("PINOTQL_LISTEN_PORT", "9100");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.listen_addr.port(), 7000);
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unparseable_port() {
        clear_env();
        env::set_var("PINOTQL_LISTEN_PORT", "not-a-port");
        assert!(AppConfig::from_env().is_err());
        clear_env();
    }
}
