use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Durable log under `data_dir`.
    Wal,
    /// Nothing survives a restart.
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wal" => Ok(StorageKind::Wal),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage kind: {other} (expected wal or memory)")),
        }
    }
}

/// Process settings, read once from `ROOMSYNC_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage: StorageKind,
    pub store_timeout: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
            data_dir: PathBuf::from("./data"),
            storage: StorageKind::Wal,
            store_timeout: Duration::from_millis(5000),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            bind: lookup("ROOMSYNC_BIND").unwrap_or(defaults.bind),
            port: parse(&lookup, "ROOMSYNC_PORT")?.unwrap_or(defaults.port),
            data_dir: lookup("ROOMSYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            storage: parse(&lookup, "ROOMSYNC_STORAGE")?.unwrap_or(defaults.storage),
            store_timeout: parse(&lookup, "ROOMSYNC_STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            compact_threshold: parse(&lookup, "ROOMSYNC_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parse(&lookup, "ROOMSYNC_METRICS_PORT")?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| raw.parse::<T>().map_err(|e| format!("{key}={raw:?}: {e}")))
        .transpose()
}
