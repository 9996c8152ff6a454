use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StoreBackend {
    Fs,
    Redis,
    Memory,
}

/// Read from `TOILETS_*` environment variables, after loading `.env` if present.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_store")]
    pub store: StoreBackend,

    // root directory of the fs store
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();
        envy::prefixed("TOILETS_").from_env::<Config>()
    }

    pub(crate) fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_owned()
}

fn default_store() -> StoreBackend {
    StoreBackend::Fs
}

fn default_data_dir() -> String {
    ".data".to_owned()
}

fn default_redis_url() -> String {
    "redis://localhost".to_owned()
}

fn default_store_timeout_ms() -> u64 {
    5000
}
