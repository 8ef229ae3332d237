use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::engine::EngineOptions;
use crate::core::matcher::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::models::CategoryWeights;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub profiles: ProfileSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub verification: VerificationSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

/// Where a piece of state lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileBackend {
    #[default]
    Memory,
    Appwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileSettings {
    #[serde(default)]
    pub backend: ProfileBackend,
    /// JSON array of profiles loaded into the in-memory store at startup
    pub seed_file: Option<String>,
    pub appwrite: Option<AppwriteSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
    #[serde(default = "default_profile_collection")]
    pub collection_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_profile_collection() -> String { "profiles".to_string() }
fn default_request_timeout_secs() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: MatchBackend,
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: MatchBackend::default(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_acquire_timeout_secs() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    #[serde(default)]
    pub backend: CodeBackend,
    pub redis_url: Option<String>,
    #[serde(default = "default_code_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_code_capacity")]
    pub capacity: u64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            backend: CodeBackend::default(),
            redis_url: None,
            ttl_secs: default_code_ttl_secs(),
            capacity: default_code_capacity(),
        }
    }
}

fn default_code_ttl_secs() -> u64 { 600 }
fn default_code_capacity() -> u64 { 100_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: max_limit(),
            storage_timeout_ms: default_storage_timeout_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_limit() -> u32 { DEFAULT_PAGE_LIMIT }
fn max_limit() -> u32 { MAX_PAGE_LIMIT }
fn default_storage_timeout_ms() -> u64 { 2000 }
fn default_lock_timeout_ms() -> u64 { 2000 }

impl MatchingSettings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            storage_timeout: Duration::from_millis(self.storage_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_music_weight")]
    pub music: f64,
    #[serde(default = "default_sport_weight")]
    pub sport: f64,
    #[serde(default = "default_film_weight")]
    pub film: f64,
    #[serde(default = "default_hobby_weight")]
    pub hobby: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            music: default_music_weight(),
            sport: default_sport_weight(),
            film: default_film_weight(),
            hobby: default_hobby_weight(),
        }
    }
}

fn default_music_weight() -> f64 { 0.30 }
fn default_sport_weight() -> f64 { 0.25 }
fn default_film_weight() -> f64 { 0.25 }
fn default_hobby_weight() -> f64 { 0.20 }

impl WeightsConfig {
    /// Validated category weights
    pub fn category_weights(&self) -> Result<CategoryWeights, ConfigError> {
        let weights = CategoryWeights {
            music: self.music,
            sport: self.sport,
            film: self.film,
            hobby: self.hobby,
        };
        weights.validate().map_err(ConfigError::Message)?;
        Ok(weights)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with KINDRED__)
    /// 4. DATABASE_URL and REDIS_URL
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., KINDRED__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        finish(apply_url_overrides(settings)?)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        finish(apply_url_overrides(settings)?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("KINDRED")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Deserialize and reject settings the engine cannot run with
fn finish(config: Config) -> Result<Settings, ConfigError> {
    let settings: Settings = config.try_deserialize()?;

    settings.scoring.weights.category_weights()?;

    if settings.matching.default_limit == 0 || settings.matching.default_limit > settings.matching.max_limit {
        return Err(ConfigError::Message(format!(
            "matching.default_limit must be in 1..={}",
            settings.matching.max_limit
        )));
    }
    if settings.profiles.backend == ProfileBackend::Appwrite && settings.profiles.appwrite.is_none() {
        return Err(ConfigError::Message(
            "profiles.appwrite must be set when profiles.backend = \"appwrite\"".to_string(),
        ));
    }

    Ok(settings)
}

/// The conventional DATABASE_URL and REDIS_URL variables win over files
fn apply_url_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(url) = env::var("REDIS_URL") {
        builder = builder.set_override("verification.redis_url", url)?;
    }

    builder.build()
}
