use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "data/isir.sqlite";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const DEFAULT_DOCUMENT_BASE: &str = "https://isir.justice.cz/isir/doc/dokument.PDF?id=";

/// Runtime settings. Defaults first, then `ISIR_*` environment variables;
/// CLI flags are applied on top by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub user_agent: String,
    /// Prefix for attachment URLs synthesized from inline document ids.
    pub document_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: DEFAULT_DB_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            document_base: DEFAULT_DOCUMENT_BASE.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder(Environment::with_prefix("ISIR").try_parsing(true))
    }

    fn builder(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("interval_secs", DEFAULT_INTERVAL_SECS)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("document_base", DEFAULT_DOCUMENT_BASE)?
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
