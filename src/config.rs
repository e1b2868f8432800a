//! Runtime configuration for the client core: the bootstrap broker list,
//! the client id advertised on every request, and the default port applied
//! to bootstrap entries that don't name one. Loaded from environment
//! variables, optionally via a `.env` file.

use std::env;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::Endpoint;
use crate::error::{ClientError, ClientResult};

const DEFAULT_PORT: u16 = 9092;

/// Configuration for a [`crate::manager::ConnectionManager`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Non-empty ordered list of bootstrap endpoints, tried in order by
    /// `connect`.
    pub bootstrap_servers: Vec<Endpoint>,
    /// Opaque identifier sent with every request. Generated if not
    /// configured.
    pub client_id: String,
    /// Port applied to any bootstrap entry that didn't embed one.
    pub default_port: u16,
}

impl Config {
    /// Loads configuration by attempting to read environment variables from
    /// a `.env` file (if present). If `.env` is missing, a warning is
    /// logged and defaults are used. If `.env` is found but cannot be
    /// parsed, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a `.env` file is found but cannot
    /// be parsed, or if `KAFKA_BOOTSTRAP_SERVERS` is set but contains no
    /// valid entries.
    pub fn from_env() -> ClientResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => {
                info!("Loaded environment variables from {:?}", path);
            }
            Err(e) if e.not_found() => {
                warn!("No .env file found; relying on environment variables or defaults.");
            }
            Err(e) => return Err(ClientError::Config(e.to_string())),
        }

        let default_port: u16 = env::var("KAFKA_DEFAULT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let bootstrap_servers = match env::var("KAFKA_BOOTSTRAP_SERVERS") {
            Ok(raw) => parse_bootstrap_list(&raw, default_port)?,
            Err(_) => {
                warn!("KAFKA_BOOTSTRAP_SERVERS not set; defaulting to 127.0.0.1:{default_port}");
                vec![Endpoint {
                    host: "127.0.0.1".to_string(),
                    port: default_port,
                }]
            }
        };

        let client_id = env::var("KAFKA_CLIENT_ID").unwrap_or_else(|_| {
            let generated = format!("kafka-client-rs-{}", Uuid::new_v4());
            info!("KAFKA_CLIENT_ID not set; generated {generated}");
            generated
        });

        debug!(
            "Loaded config: bootstrap_servers={:?} client_id={client_id}",
            bootstrap_servers
        );

        Ok(Self {
            bootstrap_servers,
            client_id,
            default_port,
        })
    }
}

/// Parses a comma-separated `host[:port]` list, applying `default_port` to
/// entries that omit one.
fn parse_bootstrap_list(raw: &str, default_port: u16) -> ClientResult<Vec<Endpoint>> {
    let mut endpoints = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (host, port) = match entry.rsplit_once(':') {
            Some((host, port_str)) => (
                host.to_string(),
                port_str
                    .parse::<u16>()
                    .map_err(|e| ClientError::Config(format!("invalid port {port_str:?}: {e}")))?,
            ),
            None => (entry.to_string(), default_port),
        };
        endpoints.push(Endpoint { host, port });
    }

    if endpoints.is_empty() {
        return Err(ClientError::Config(
            "KAFKA_BOOTSTRAP_SERVERS was set but contained no usable entries".to_string(),
        ));
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_port_and_default_port_entries() {
        let endpoints = parse_bootstrap_list("broker1:9093, broker2", 9092).unwrap();
        assert_eq!(
            endpoints,
            vec![
                Endpoint {
                    host: "broker1".into(),
                    port: 9093
                },
                Endpoint {
                    host: "broker2".into(),
                    port: 9092
                },
            ]
        );
    }

    #[test]
    fn rejects_empty_list() {
        assert!(parse_bootstrap_list("  , ,", 9092).is_err());
    }
}
