use anyhow::Context;
use config::{Config, Environment};
use serde::Deserialize;

use crate::books_repository::PostgresBooksRepositoryConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Service settings read from environment variables, e.g. `DB_HOST` or `PORT`
pub struct Settings {
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub db_name: String,
    pub bind_address: String,
    pub port: u16,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> anyhow::Result<Self> {
        Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("db_name", "postgres")?
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 8080)?
            .add_source(environment.try_parsing(true))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn postgres_config(&self) -> PostgresBooksRepositoryConfig {
        PostgresBooksRepositoryConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
        }
    }
}
