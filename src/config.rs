use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "memory://users".to_string(),
                max_connections: 5,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.database.max_connections),
            },
        })
    }

    /// Uri scheme of the configured database, e.g. `memory` or `sqlite`
    pub fn database_scheme(&self) -> &str {
        self.database
            .url
            .split(':')
            .next()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_memory_store() {
        let config = Config::default();
        assert_eq!(config.database.url, "memory://users");
        assert_eq!(config.database_scheme(), "memory");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_sqlite_scheme() {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        assert_eq!(config.database_scheme(), "sqlite");
    }
}
