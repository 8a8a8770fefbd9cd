use std::str::FromStr;
use crate::hub::{HubConfig, DEFAULT_MAILBOX_CAPACITY, DEFAULT_QUEUE_CAPACITY};

pub const STORE_KEY: &str = "POLL_STORE";
pub const QUEUE_CAPACITY_KEY: &str = "SUBSCRIBER_QUEUE_CAPACITY";
pub const MAILBOX_CAPACITY_KEY: &str = "HUB_MAILBOX_CAPACITY";
pub const ALLOWED_ORIGIN_KEY: &str = "ALLOWED_ORIGIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    Memory,
    #[default]
    Document,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mock" => Ok(StoreKind::Memory),
            "document" | "postgres" => Ok(StoreKind::Document),
            other => Err(ConfigError::UnknownStore(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown poll store '{0}' (expected 'memory' or 'document')")]
    UnknownStore(String),
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidCapacity { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreKind,
    pub hub: HubConfig,
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            hub: HubConfig::default(),
            allowed_origin: "*".into(),
        }
    }
}

fn capacity(key: &'static str, raw: Option<String>, default: usize) -> Result<usize, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidCapacity { key, value }),
        },
    }
}

impl ServerConfig {
    /// Builds the config from a key lookup such as the deployment's secret store.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup(STORE_KEY) {
            Some(raw) => raw.parse()?,
            None => StoreKind::default(),
        };

        Ok(Self {
            store,
            hub: HubConfig {
                queue_capacity: capacity(QUEUE_CAPACITY_KEY, lookup(QUEUE_CAPACITY_KEY), DEFAULT_QUEUE_CAPACITY)?,
                mailbox_capacity: capacity(MAILBOX_CAPACITY_KEY, lookup(MAILBOX_CAPACITY_KEY), DEFAULT_MAILBOX_CAPACITY)?,
            },
            allowed_origin: lookup(ALLOWED_ORIGIN_KEY).unwrap_or_else(|| "*".into()),
        })
    }
}
