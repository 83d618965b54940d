use serde_json::{Map, Value};
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors encountered while loading or updating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable or admin field contained a value that could not be parsed.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending variable or field.
        field: String,
        /// Parser message describing the failure.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// How often the log file rolls over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRotation {
    /// Single file, never rotated.
    Never,
    /// New file every hour.
    Hourly,
    /// New file every day.
    Daily,
}

impl LogRotation {
    /// Length of one rotation period, `None` when the file never rolls.
    pub fn period(self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::Hourly => Some(Duration::from_secs(60 * 60)),
            Self::Daily => Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

impl std::str::FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" | "none" | "" => Ok(Self::Never),
            "hourly" | "1 hour" | "hour" => Ok(Self::Hourly),
            "daily" | "1 day" | "day" => Ok(Self::Daily),
            other => Err(format!("unsupported rotation '{other}'")),
        }
    }
}

/// Runtime configuration for the relay server.
///
/// A `Settings` value is immutable once built; runtime changes go through
/// [`SettingsStore::apply`], which swaps in a fresh snapshot.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Debug mode flag reported to admins.
    pub debug: bool,
    /// OpenAI API key; empty disables the LLM adapter.
    pub openai_api_key: String,
    /// Chat model used for summaries.
    pub openai_model: String,
    /// Completion token limit.
    pub openai_max_tokens: u32,
    /// Sampling temperature.
    pub openai_temperature: f32,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Transport timeout for provider calls.
    pub openai_timeout: Duration,
    /// Shared secret for the messenger app (reported, not enforced).
    pub webhook_secret: String,
    /// Origins allowed to call the API.
    pub allowed_origins: Vec<String>,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Path of the log file.
    pub log_file: PathBuf,
    /// Raw rotation setting as configured.
    pub log_rotation: String,
    /// Raw retention setting as configured.
    pub log_retention: String,
    /// Admin username for HTTP Basic auth.
    pub admin_username: String,
    /// Admin password for HTTP Basic auth.
    pub admin_password: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            debug: true,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".into(),
            openai_max_tokens: 500,
            openai_temperature: 0.7,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            openai_timeout: Duration::from_secs(600),
            webhook_secret: String::new(),
            allowed_origins: vec!["*".into()],
            log_level: "INFO".into(),
            log_file: PathBuf::from("logs").join("app.log"),
            log_rotation: "1 day".into(),
            log_retention: "7 days".into(),
            admin_username: "admin".into(),
            admin_password: "password123".into(),
        }
    }
}

impl Settings {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let env = EnvSource { lookup };

        let timeout = base.openai_timeout.as_secs();
        let timeout = env.parse("OPENAI_TIMEOUT_SECS", timeout)?;
        let allowed_origins = match env.optional("ALLOWED_ORIGINS") {
            Some(value) => parse_origins(&value)?,
            None => base.allowed_origins,
        };

        let settings = Self {
            host: env.string_or("HOST", base.host),
            port: env.parse("PORT", base.port)?,
            debug: env.flag("DEBUG", base.debug)?,
            openai_api_key: env.raw("OPENAI_API_KEY").trim().to_string(),
            openai_model: env.string_or("OPENAI_MODEL", base.openai_model),
            openai_max_tokens: env.parse("OPENAI_MAX_TOKENS", base.openai_max_tokens)?,
            openai_temperature: env.parse("OPENAI_TEMPERATURE", base.openai_temperature)?,
            openai_base_url: env.url_or("OPENAI_BASE_URL", base.openai_base_url),
            openai_timeout: Duration::from_secs(timeout),
            webhook_secret: env.raw("MESSENGER_BOT_WEBHOOK_SECRET"),
            allowed_origins,
            log_level: env.string_or("LOG_LEVEL", base.log_level),
            log_file: env.path_or("LOG_FILE", base.log_file),
            log_rotation: env.string_or("LOG_ROTATION", base.log_rotation),
            log_retention: env.string_or("LOG_RETENTION", base.log_retention),
            admin_username: env.string_or("ADMIN_USERNAME", base.admin_username),
            admin_password: env.string_or("ADMIN_PASSWORD", base.admin_password),
        };

        // Reject unusable log settings at startup rather than at first write.
        settings.rotation()?;
        settings.max_log_files()?;
        Ok(settings)
    }

    /// Whether a non-empty API key is configured.
    pub fn api_key_set(&self) -> bool {
        !self.openai_api_key.is_empty()
    }

    /// Parsed log rotation policy.
    pub fn rotation(&self) -> Result<LogRotation, ConfigError> {
        self.log_rotation
            .parse()
            .map_err(|reason| ConfigError::invalid("LOG_ROTATION", reason))
    }

    /// Number of rotated log files to keep, `None` when the file never rolls.
    pub fn max_log_files(&self) -> Result<Option<usize>, ConfigError> {
        let Some(period) = self.rotation()?.period() else {
            return Ok(None);
        };
        let retention = parse_duration(&self.log_retention)
            .map_err(|reason| ConfigError::invalid("LOG_RETENTION", reason))?;
        let files = retention.as_secs().div_ceil(period.as_secs()).max(1);
        Ok(Some(files as usize))
    }

    /// Base URL clients use to reach this server.
    pub fn public_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Reads settings keys through a lookup function; blank values count as unset.
struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn raw(&self, key: &str) -> String {
        (self.lookup)(key).unwrap_or_default()
    }

    fn string_or(&self, key: &str, default: String) -> String {
        self.optional(key).unwrap_or(default)
    }

    fn url_or(&self, key: &str, default: String) -> String {
        let url = self.string_or(key, default);
        url.trim_end_matches('/').to_string()
    }

    fn path_or(&self, key: &str, default: PathBuf) -> PathBuf {
        self.optional(key).map_or(default, PathBuf::from)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key) {
            Some(value) => parse_bool(&value).map_err(|reason| ConfigError::invalid(key, reason)),
            None => Ok(default),
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|err| ConfigError::invalid(key, err)),
            None => Ok(default),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

/// Accepts either a JSON list (`["a","b"]`) or a comma separated list.
fn parse_origins(value: &str) -> Result<Vec<String>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|err| ConfigError::invalid("ALLOWED_ORIGINS", err));
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parse durations written as `"<n> <unit>"`, e.g. `"7 days"` or `"12 hours"`.
fn parse_duration(value: &str) -> Result<Duration, String> {
    let mut parts = value.split_whitespace();
    let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected '<number> <unit>', got '{value}'"));
    };
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("'{amount}' is not a whole number"))?;
    let unit_secs = match unit.trim_end_matches('s').to_lowercase().as_str() {
        "hour" => 60 * 60,
        "day" => 24 * 60 * 60,
        "week" => 7 * 24 * 60 * 60,
        other => return Err(format!("unsupported unit '{other}'")),
    };
    Ok(Duration::from_secs(amount * unit_secs))
}

/// Validated set of LLM settings changes submitted through the admin API.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LlmSettingsUpdate {
    /// Replacement API key.
    pub api_key: Option<String>,
    /// Replacement model name.
    pub model: Option<String>,
    /// Replacement token limit.
    pub max_tokens: Option<u32>,
    /// Replacement temperature.
    pub temperature: Option<f32>,
}

impl LlmSettingsUpdate {
    /// Parse every recognised field up front; unknown keys are ignored.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: parse_field(fields, "api_key", json_api_key)?,
            model: parse_field(fields, "model", json_string)?,
            max_tokens: parse_field(fields, "max_tokens", json_max_tokens)?,
            temperature: parse_field(fields, "temperature", json_temperature)?,
        })
    }

    /// Whether applying this update replaces the API key.
    pub fn changes_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn apply_to(&self, settings: &mut Settings) {
        if let Some(api_key) = &self.api_key {
            settings.openai_api_key = api_key.clone();
        }
        if let Some(model) = &self.model {
            settings.openai_model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.openai_max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            settings.openai_temperature = temperature;
        }
    }
}

fn parse_field<T>(
    fields: &Map<String, Value>,
    name: &str,
    parse: fn(&Value, &str) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    fields.get(name).map(|raw| parse(raw, name)).transpose()
}

fn json_string(value: &Value, field: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => {
            let reason = format!("expected a string, got {other}");
            Err(ConfigError::invalid(field, reason))
        }
    }
}

fn json_api_key(value: &Value, field: &str) -> Result<String, ConfigError> {
    json_string(value, field).map(|key| key.trim().to_string())
}

fn json_max_tokens(value: &Value, field: &str) -> Result<u32, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| format!("'{number}' is not a positive integer")),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("'{text}': {err}")),
        other => Err(format!("expected an integer, got {other}")),
    }
    .map_err(|reason| ConfigError::invalid(field, reason))?;
    u32::try_from(parsed).map_err(|err| ConfigError::invalid(field, err))
}

fn json_temperature(value: &Value, field: &str) -> Result<f32, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| format!("'{number}' is not a float")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("'{text}': {err}")),
        other => Err(format!("expected a number, got {other}")),
    }
    .map_err(|reason| ConfigError::invalid(field, reason))?;
    if !parsed.is_finite() {
        return Err(ConfigError::invalid(field, "must be finite"));
    }
    Ok(parsed as f32)
}

/// Shared owner of the current settings snapshot.
///
/// Readers receive an `Arc<Settings>` that never changes underneath them. Writers build a
/// complete replacement and swap it in, so a multi-field update is observed all at once.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    /// Wrap the startup settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Current settings snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a validated update and return the resulting snapshot.
    pub fn apply(&self, update: &LlmSettingsUpdate) -> Arc<Settings> {
        self.apply_with(update, |_| {})
    }

    /// Apply an update and run `on_applied` on the new snapshot before the write lock is
    /// released.
    ///
    /// Concurrent callers run `on_applied` in the same order their snapshots are swapped in,
    /// so state derived from the settings (the adapter's bound key) ends up matching the
    /// final snapshot. The settings lock is always taken before any lock `on_applied` takes.
    pub fn apply_with<F>(&self, update: &LlmSettingsUpdate, on_applied: F) -> Arc<Settings>
    where
        F: FnOnce(&Settings),
    {
        let lock = self.current.write();
        let mut guard = lock.unwrap_or_else(PoisonError::into_inner);
        let mut next = Settings::clone(&guard);
        update.apply_to(&mut next);
        let next = Arc::new(next);
        on_applied(&next);
        *guard = next.clone();
        next
    }
}

/// Load `.env` if present, then read settings from the environment.
pub fn init_config() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    tracing::debug!(
        host = %settings.host,
        port = settings.port,
        model = %settings.openai_model,
        api_key_set = settings.api_key_set(),
        log_file = %settings.log_file.display(),
        "Loaded configuration"
    );
    Ok(settings)
}
