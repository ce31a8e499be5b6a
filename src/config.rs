//! Bus configuration: connection parameters, validation, and defaulting
//!
//! A [`BusConfig`] is a plain value object describing the desired connection.
//! It carries no behavior of its own; [`crate::connect`] validates it and
//! applies defaults to an internal copy, never mutating caller state.

use crate::error::{BusError, Result};
use crate::transport::ConnectOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Capacity of a reader's internal message queue
pub const MSG_QUEUE_MAX_LEN: usize = 1000;

/// Conventional broker port, used when the configured port is zero
pub const DEFAULT_PORT: u16 = 9092;

/// Retry budget sentinel meaning "retry indefinitely"
pub const RETRY_FOREVER: u32 = 1_000_000;

/// Delay between connection attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bus technology selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusTech {
    /// The built-in framed TCP transport
    Tcp,
}

impl FromStr for BusTech {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            _ => Err(BusError::UnknownTechnology(s.to_string())),
        }
    }
}

/// Whether a write waits for broker acknowledgment before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingMode {
    /// Writes return as soon as the payload is submitted to the transport
    NonBlocking,
    /// Writes return only after the broker acknowledges delivery
    Blocking,
}

impl FromStr for BlockingMode {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nonblocking" => Ok(Self::NonBlocking),
            "blocking" => Ok(Self::Blocking),
            _ => Err(BusError::InvalidBlockingMode(s.to_string())),
        }
    }
}

/// Role of a bus connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusDirection {
    /// Producer: publishes messages to the topic
    Writer,
    /// Consumer: receives messages from the topic
    Reader,
}

impl FromStr for BusDirection {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "writer" => Ok(Self::Writer),
            "reader" => Ok(Self::Reader),
            _ => Err(BusError::InvalidDirection(s.to_string())),
        }
    }
}

/// Connection status of a binding.
///
/// Monotonic: once a binding reports `Closed` it never reports `Open` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusStatus {
    /// The connection is open and usable
    Open,
    /// The connection has been closed; terminal
    Closed,
}

/// Connection parameters for a message bus client.
///
/// Unset optional fields are defaulted during validation: host falls back to
/// `localhost`, a zero port to [`DEFAULT_PORT`], blocking mode to
/// [`BlockingMode::NonBlocking`], a zero retry budget to [`RETRY_FOREVER`],
/// and an unset group id to a random UUID. Technology, topic, and direction
/// have no defaults and must be provided.
///
/// ```
/// use msgbus::{BusConfig, BusDirection, BusTech};
///
/// let config = BusConfig {
///     technology: Some(BusTech::Tcp),
///     topic: "telemetry".to_string(),
///     direction: Some(BusDirection::Reader),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus technology to connect with
    pub technology: Option<BusTech>,
    /// Broker hostname; empty means `localhost`
    pub host: String,
    /// Broker port; zero means [`DEFAULT_PORT`]
    pub port: u16,
    /// Write blocking mode; `None` means [`BlockingMode::NonBlocking`]
    pub blocking: Option<BlockingMode>,
    /// Connection role
    pub direction: Option<BusDirection>,
    /// Maximum initial-connection attempts; zero means [`RETRY_FOREVER`]
    pub retry_budget: u32,
    /// Topic to publish to or subscribe to
    pub topic: String,
    /// Consumer group identity; `None` means a random UUID per connection
    pub group_id: Option<String>,
}

impl BusConfig {
    /// Validate this configuration and produce a fully-defaulted copy.
    ///
    /// Fail-fast: the first violated rule wins, in the order technology,
    /// topic, direction.
    pub(crate) fn resolve(&self) -> Result<ResolvedConfig> {
        let technology = self.technology.ok_or(BusError::MissingTechnology)?;
        if self.topic.is_empty() {
            return Err(BusError::MissingTopic);
        }
        let direction = self.direction.ok_or(BusError::MissingDirection)?;
        let blocking = self.blocking.unwrap_or(BlockingMode::NonBlocking);

        let host = if self.host.is_empty() {
            "localhost".to_string()
        } else {
            self.host.clone()
        };
        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };
        let retry_budget = if self.retry_budget == 0 {
            RETRY_FOREVER
        } else {
            self.retry_budget
        };
        let group_id = self
            .group_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(ResolvedConfig {
            technology,
            direction,
            retry_budget,
            options: ConnectOptions {
                host,
                port,
                topic: self.topic.clone(),
                group_id,
                blocking,
            },
        })
    }
}

/// A validated, fully-defaulted configuration
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub technology: BusTech,
    pub direction: BusDirection,
    pub retry_budget: u32,
    pub options: ConnectOptions,
}

/// Parse a `host:port:topic` spec string into its parts.
///
/// This is the flat endpoint form services typically take on their command
/// line or environment for the telemetry bus.
pub fn parse_host_spec(spec: &str) -> Result<(String, u16, String)> {
    let toks: Vec<&str> = spec.split(':').collect();
    if toks.len() != 3 {
        return Err(BusError::InvalidHostSpec(spec.to_string()));
    }
    let port: u16 = toks[1]
        .parse()
        .map_err(|_| BusError::InvalidHostSpec(spec.to_string()))?;
    if toks[0].is_empty() || toks[2].is_empty() {
        return Err(BusError::InvalidHostSpec(spec.to_string()));
    }
    Ok((toks[0].to_string(), port, toks[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_config() -> BusConfig {
        BusConfig {
            technology: Some(BusTech::Tcp),
            topic: "events".to_string(),
            direction: Some(BusDirection::Reader),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let resolved = reader_config().resolve().unwrap();
        assert_eq!(resolved.options.host, "localhost");
        assert_eq!(resolved.options.port, DEFAULT_PORT);
        assert_eq!(resolved.options.blocking, BlockingMode::NonBlocking);
        assert_eq!(resolved.retry_budget, RETRY_FOREVER);
        assert!(!resolved.options.group_id.is_empty());
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let config = BusConfig {
            host: "broker.example.com".to_string(),
            port: 9999,
            blocking: Some(BlockingMode::Blocking),
            retry_budget: 5,
            group_id: Some("group-1".to_string()),
            ..reader_config()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.options.host, "broker.example.com");
        assert_eq!(resolved.options.port, 9999);
        assert_eq!(resolved.options.blocking, BlockingMode::Blocking);
        assert_eq!(resolved.retry_budget, 5);
        assert_eq!(resolved.options.group_id, "group-1");
    }

    #[test]
    fn test_validation_order_fail_fast() {
        // Everything missing: technology is reported first.
        let err = BusConfig::default().resolve().unwrap_err();
        assert!(matches!(err, BusError::MissingTechnology));

        // Technology set, topic empty: topic is reported before direction.
        let err = BusConfig {
            technology: Some(BusTech::Tcp),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, BusError::MissingTopic));

        let err = BusConfig {
            technology: Some(BusTech::Tcp),
            topic: "events".to_string(),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, BusError::MissingDirection));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("tcp".parse::<BusTech>().unwrap(), BusTech::Tcp);
        assert!(matches!(
            "kafka".parse::<BusTech>(),
            Err(BusError::UnknownTechnology(_))
        ));

        assert_eq!(
            "Blocking".parse::<BlockingMode>().unwrap(),
            BlockingMode::Blocking
        );
        assert!(matches!(
            "sometimes".parse::<BlockingMode>(),
            Err(BusError::InvalidBlockingMode(_))
        ));

        assert_eq!(
            "reader".parse::<BusDirection>().unwrap(),
            BusDirection::Reader
        );
        assert!(matches!(
            "sideways".parse::<BusDirection>(),
            Err(BusError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_parse_host_spec() {
        let (host, port, topic) = parse_host_spec("broker:9092:telemetry").unwrap();
        assert_eq!(host, "broker");
        assert_eq!(port, 9092);
        assert_eq!(topic, "telemetry");

        assert!(matches!(
            parse_host_spec("broker:9092"),
            Err(BusError::InvalidHostSpec(_))
        ));
        assert!(matches!(
            parse_host_spec("broker:nine:telemetry"),
            Err(BusError::InvalidHostSpec(_))
        ));
        assert!(matches!(
            parse_host_spec("broker:9092:"),
            Err(BusError::InvalidHostSpec(_))
        ));
    }
}
