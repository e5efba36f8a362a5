//! Server configuration, read once from the environment at startup

use std::time::Duration;

use switchboard_core::ai::AiClientConfig;
use switchboard_core::engine::DEFAULT_MAX_TURNS;
use switchboard_core::SessionStoreConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_IDLE_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Configuration for starting the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HMAC secret for session tokens; `None` disables auth
    pub api_secret: Option<String>,
    /// Model credential; `None` leaves chat unavailable
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub max_turns: usize,
    /// Cap on generated tokens per model call; `None` leaves it to the provider
    pub max_tokens: Option<usize>,
    /// `None` disables idle expiry
    pub session_idle_ttl: Option<Duration>,
    /// `None` disables the capacity bound
    pub session_max_entries: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ai = AiClientConfig::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_secret: None,
            openai_api_key: None,
            openai_base_url: ai.base_url,
            model: ai.model,
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: None,
            session_idle_ttl: Some(Duration::from_secs(DEFAULT_IDLE_TTL_SECS)),
            session_max_entries: Some(DEFAULT_MAX_ENTRIES),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let numeric = |key: &str| var(key).map(|raw| (key.to_string(), raw));

        let idle_ttl_secs = parse_or(numeric("SESSION_IDLE_TTL_SECS"), DEFAULT_IDLE_TTL_SECS);
        let max_entries = parse_or(numeric("SESSION_MAX_ENTRIES"), DEFAULT_MAX_ENTRIES);
        let max_tokens = parse_or(numeric("SWITCHBOARD_MAX_TOKENS"), 0usize);
        let max_turns = match parse_or(numeric("SWITCHBOARD_MAX_TURNS"), DEFAULT_MAX_TURNS) {
            0 => {
                tracing::warn!(
                    "SWITCHBOARD_MAX_TURNS must be positive, using {}",
                    DEFAULT_MAX_TURNS
                );
                DEFAULT_MAX_TURNS
            }
            n => n,
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(numeric("PORT"), DEFAULT_PORT),
            api_secret: var("API_SECRET"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            model: var("SWITCHBOARD_MODEL").unwrap_or(defaults.model),
            max_turns,
            max_tokens: (max_tokens > 0).then_some(max_tokens),
            session_idle_ttl: (idle_ttl_secs > 0).then(|| Duration::from_secs(idle_ttl_secs)),
            session_max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    /// Listen address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            idle_ttl: self.session_idle_ttl.unwrap_or(Duration::MAX),
            max_entries: self.session_max_entries.unwrap_or(usize::MAX),
        }
    }

    pub fn ai_client_config(&self) -> AiClientConfig {
        AiClientConfig::default()
            .with_model(self.model.clone())
            .with_base_url(self.openai_base_url.clone())
            .with_max_tokens(self.max_tokens)
    }
}

/// Parse a `(key, raw)` pair, warning and falling back on bad input.
fn parse_or<T>(value: Option<(String, String)>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match value {
        None => default,
        Some((key, raw)) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
            default
        }),
    }
}
