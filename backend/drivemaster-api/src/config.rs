use serde::Deserialize;
use std::env;

use crate::rules::GameRules;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub bind_addr: String,
    /// Lifetime of a saved checkpoint in Redis.
    pub checkpoint_ttl_seconds: u64,
    /// Run on in-process stores instead of MongoDB/Redis.
    pub in_memory: bool,
    pub rules: GameRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "drivemaster".to_string(),
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            checkpoint_ttl_seconds: 86_400,
            in_memory: false,
            rules: GameRules::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        // Extract values with fallbacks to plain ENV or defaults
        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or(defaults.redis_uri);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let checkpoint_ttl_seconds = match settings.get_int("checkpoint.ttl_seconds") {
            Ok(ttl) => u64::try_from(ttl).map_err(|_| {
                config::ConfigError::Message(format!(
                    "checkpoint.ttl_seconds must not be negative, got {}",
                    ttl
                ))
            })?,
            Err(config::ConfigError::NotFound(_)) => env::var("CHECKPOINT_TTL_SECONDS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.checkpoint_ttl_seconds),
            Err(e) => return Err(e),
        };

        let in_memory = settings
            .get_bool("storage.in_memory")
            .unwrap_or(defaults.in_memory);

        // Partial tables are merged over the built-in rules
        let rules = match settings.get::<GameRules>("rules") {
            Ok(rules) => rules,
            Err(config::ConfigError::NotFound(_)) => defaults.rules,
            Err(e) => return Err(e),
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            bind_addr,
            checkpoint_ttl_seconds,
            in_memory,
            rules,
        })
    }
}
