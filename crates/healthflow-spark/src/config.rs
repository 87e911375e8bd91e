//! Client configuration
//!
//! Credentials and generation parameters are loaded once at process start,
//! from `~/.config/healthflow/config.toml` and `SPARK_*` environment
//! variables, then validated into an immutable [`SparkConfig`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SparkError};

pub const DEFAULT_HOST_URL: &str = "wss://spark-api.xf-yun.com/v1.1/chat";
pub const DEFAULT_DOMAIN: &str = "lite";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const ANONYMOUS_USER_TAG: &str = "anonymous_user";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "你是一个专业的健康顾问和助手，请根据用户的健康信息和问题，提供专业、有益的健康建议。";
pub const DEFAULT_CONTEXT_DELIMITER: &str = "\n以下是用户的健康数据：";

const ENV_APP_ID: &str = "SPARK_APP_ID";
const ENV_API_KEY: &str = "SPARK_API_KEY";
const ENV_API_SECRET: &str = "SPARK_API_SECRET";
const ENV_HOST_URL: &str = "SPARK_HOST_URL";
const ENV_DOMAIN: &str = "SPARK_DOMAIN";

/// Application identity, signing key pair and endpoint.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    api_key: String,
    api_secret: String,
    endpoint: Url,
}

impl Credentials {
    /// Validate and build credentials. Every field is required.
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        endpoint: &str,
    ) -> Result<Self> {
        let app_id = required("app_id", app_id.into())?;
        let api_key = present("api_key", api_key.into())?;
        let api_secret = present("api_secret", api_secret.into())?;
        let endpoint = parse_endpoint(endpoint)?;

        Ok(Self {
            app_id,
            api_key,
            api_secret,
            endpoint,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

fn required(field: &str, value: String) -> Result<String> {
    present(field, value).map(|v| v.trim().to_string())
}

/// Like [`required`], but keeps the value byte-for-byte; signing material
/// must not be altered.
fn present(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(SparkError::Config(format!("missing required field: {field}")));
    }
    Ok(value)
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let raw = required("host_url", raw.to_string())?;
    let url = Url::parse(&raw)
        .map_err(|e| SparkError::Config(format!("invalid endpoint URL '{raw}': {e}")))?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(SparkError::Config(format!(
            "endpoint must use ws:// or wss://, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(SparkError::Config(format!("endpoint has no host: '{raw}'")));
    }

    Ok(url)
}

/// Generation parameters sent in the `parameter.chat` block of every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    pub domain: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl GenerationParameters {
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(SparkError::Config("missing required field: domain".into()));
        }
        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return Err(SparkError::Config(format!(
                "temperature must be in (0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(SparkError::Config("max_tokens must be positive".into()));
        }
        Ok(())
    }
}

/// Per-session behaviour shared by every call of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Wall-clock budget for one exchange, connect included.
    pub timeout_secs: u64,
    /// `header.uid` used when the caller supplies no user tag.
    pub default_user_tag: String,
    /// System-role priming text.
    pub system_prompt: String,
    /// Placed between the priming text and a non-empty context.
    pub context_delimiter: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_user_tag: ANONYMOUS_USER_TAG.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_delimiter: DEFAULT_CONTEXT_DELIMITER.to_string(),
        }
    }
}

impl SessionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(SparkError::Config("timeout_secs must be positive".into()));
        }
        if self.default_user_tag.trim().is_empty() {
            return Err(SparkError::Config(
                "missing required field: default_user_tag".into(),
            ));
        }
        Ok(())
    }
}

/// Validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct SparkConfig {
    pub credentials: Credentials,
    pub generation: GenerationParameters,
    pub session: SessionOptions,
}

impl SparkConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            generation: GenerationParameters::default(),
            session: SessionOptions::default(),
        }
    }

    pub fn with_generation(mut self, generation: GenerationParameters) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.session.validate()
    }
}

/// Credential section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSettings {
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub host_url: Option<String>,
}

/// Unvalidated configuration as read from disk and environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparkSettings {
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub generation: GenerationParameters,
    #[serde(default)]
    pub session: SessionOptions,
}

impl SparkSettings {
    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("healthflow").join("config.toml"))
    }

    /// Load settings from a file. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SparkError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
            .map_err(|e| SparkError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SparkError::Config(e.to_string()))
    }

    /// Apply `SPARK_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `SPARK_*` overrides from an arbitrary lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |slot: &mut Option<String>, name: &str| {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *slot = Some(value);
            }
        };
        set(&mut self.credentials.app_id, ENV_APP_ID);
        set(&mut self.credentials.api_key, ENV_API_KEY);
        set(&mut self.credentials.api_secret, ENV_API_SECRET);
        set(&mut self.credentials.host_url, ENV_HOST_URL);

        if let Some(domain) = lookup(ENV_DOMAIN).filter(|v| !v.trim().is_empty()) {
            self.generation.domain = domain;
        }
    }

    /// Validate into an immutable [`SparkConfig`].
    pub fn into_config(self) -> Result<SparkConfig> {
        let creds = self.credentials;
        let credentials = Credentials::new(
            creds.app_id.unwrap_or_default(),
            creds.api_key.unwrap_or_default(),
            creds.api_secret.unwrap_or_default(),
            creds.host_url.as_deref().unwrap_or(DEFAULT_HOST_URL),
        )?;

        let config = SparkConfig {
            credentials,
            generation: self.generation,
            session: self.session,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_settings() -> SparkSettings {
        SparkSettings::from_toml_str(
            r#"
            [credentials]
            app_id = "app-1"
            api_key = "key-1"
            api_secret = "secret-1"
            host_url = "wss://spark.example.com/v3.5/chat"

            [generation]
            domain = "generalv3.5"
            temperature = 0.7
            max_tokens = 1024
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_full_config() {
        let config = full_settings().into_config().unwrap();
        assert_eq!(config.credentials.app_id(), "app-1");
        assert_eq!(config.credentials.endpoint().path(), "/v3.5/chat");
        assert_eq!(config.generation.domain, "generalv3.5");
        assert_eq!(config.generation.max_tokens, 1024);
        assert_eq!(config.session, SessionOptions::default());
        assert_eq!(config.session.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_secret_fails_fast() {
        let mut settings = full_settings();
        settings.credentials.api_secret = None;
        let err = settings.into_config().unwrap_err();
        assert!(matches!(err, SparkError::Config(msg) if msg.contains("api_secret")));
    }

    #[test]
    fn test_signing_material_kept_verbatim() {
        let creds =
            Credentials::new(" app-1 ", " key-1", "secret-1 ", DEFAULT_HOST_URL).unwrap();
        assert_eq!(creds.app_id(), "app-1");
        assert_eq!(creds.api_key(), " key-1");
        assert_eq!(creds.api_secret(), "secret-1 ");

        let blank = Credentials::new("app-1", "key-1", " \t", DEFAULT_HOST_URL);
        assert!(matches!(blank, Err(SparkError::Config(msg)) if msg.contains("api_secret")));
    }

    #[test]
    fn test_default_endpoint_used_when_absent() {
        let mut settings = full_settings();
        settings.credentials.host_url = None;
        let config = settings.into_config().unwrap();
        assert_eq!(config.credentials.endpoint().as_str(), DEFAULT_HOST_URL);
    }

    #[test]
    fn test_rejects_http_endpoint() {
        let result = Credentials::new("a", "k", "s", "https://spark.example.com/v1.1/chat");
        assert!(matches!(result, Err(SparkError::Config(_))));
        let result = Credentials::new("a", "k", "s", "not a url");
        assert!(matches!(result, Err(SparkError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_generation_parameters() {
        let mut settings = full_settings();
        settings.generation.temperature = 1.5;
        assert!(settings.clone().into_config().is_err());

        settings.generation.temperature = 0.5;
        settings.generation.max_tokens = 0;
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SPARK_API_KEY", "env-key"),
            ("SPARK_DOMAIN", "4.0Ultra"),
            ("SPARK_APP_ID", "  "),
        ]);
        let mut settings = full_settings();
        settings.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        let config = settings.into_config().unwrap();
        assert_eq!(config.credentials.api_key(), "env-key");
        assert_eq!(config.credentials.app_id(), "app-1");
        assert_eq!(config.generation.domain, "4.0Ultra");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("app", "key", "top-secret", DEFAULT_HOST_URL).unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SparkSettings::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert!(settings.credentials.app_id.is_none());
        assert_eq!(settings.generation, GenerationParameters::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[credentials\napp_id = 1").unwrap();
        assert!(matches!(
            SparkSettings::load_from_path(&path),
            Err(SparkError::Config(_))
        ));
    }
}
