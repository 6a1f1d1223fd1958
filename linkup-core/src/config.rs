use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct LinkupConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

fn default_connect_retries() -> usize {
    3
}

/// Eligibility rules for new connection requests.
#[derive(Debug, Deserialize, Clone)]
pub struct ReachabilityConfig {
    /// Largest hop distance at which a target may still be solicited.
    pub max_hops: u32,
    /// Requesters with fewer accepted connections than this skip the hop check.
    /// Zero disables the allowance.
    pub bootstrap_min_connections: usize,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            bootstrap_min_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl LinkupConfig {
    /// Load from a TOML file. `DATABASE_URL` in the environment overrides
    /// `database.url`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if let (Ok(url), Some(db)) = (std::env::var("DATABASE_URL"), config.database.as_mut()) {
            db.url = url;
        }

        Ok(config)
    }

    /// Config for an in-memory deployment; used by tests and local runs.
    pub fn in_memory(socket_path: &str) -> Self {
        Self {
            service: ServiceConfig {
                socket_path: socket_path.to_string(),
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            database: None,
            reachability: ReachabilityConfig::default(),
            http: HttpConfig::default(),
        }
    }
}
