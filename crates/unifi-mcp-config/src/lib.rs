//! Configuration for the UniFi MCP adapter.
//!
//! Layers built-in defaults, an optional TOML file and `UNIFI_*`
//! environment variables, then validates the result into
//! `unifi_mcp_api::Credentials`. Nothing here talks to the controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use unifi_mcp_api::Credentials;

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "UNIFI_";

/// Keys whose environment values are taken byte for byte. Figment's `Env`
/// provider parses values (`007` becomes `7`, `[abc]` an array), which
/// would corrupt hosts and passwords.
const VERBATIM_KEYS: [&str; 3] = ["router_ip", "username", "password"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is required (set {env})")]
    Missing { field: &'static str, env: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for unifi_mcp_api::Error {
    fn from(err: ConfigError) -> Self {
        let field = match &err {
            ConfigError::Missing { field, .. } => (*field).to_owned(),
            ConfigError::Validation { field, .. } => field.clone(),
            ConfigError::Figment(_) => "config".to_owned(),
        };
        Self::Configuration {
            field,
            reason: err.to_string(),
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Raw connection settings as read from file and environment.
///
/// Keys match the environment variables without the `UNIFI_` prefix:
/// `UNIFI_ROUTER_IP` → `router_ip`, `UNIFI_API_TIMEOUT` → `api_timeout`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Controller host or IP (optionally with scheme).
    #[serde(default, deserialize_with = "lossy_string")]
    pub router_ip: Option<String>,

    #[serde(default, deserialize_with = "lossy_string")]
    pub username: Option<String>,

    /// Plaintext here; wrapped in `SecretString` by [`Settings::credentials`].
    #[serde(default, deserialize_with = "lossy_string", skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub verify_ssl: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub api_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            router_ip: None,
            username: None,
            password: None,
            port: default_port(),
            verify_ssl: false,
            api_timeout: default_timeout(),
        }
    }
}

fn default_port() -> u16 {
    443
}
fn default_timeout() -> u64 {
    30
}

/// TOML values like `password = 1234` arrive as numbers; every string
/// field accepts them.
fn lossy_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lossy {
        Str(String),
        Int(i64),
        Uint(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Lossy>::deserialize(deserializer)?.map(|value| match value {
        Lossy::Str(s) => s,
        Lossy::Int(n) => n.to_string(),
        Lossy::Uint(n) => n.to_string(),
        Lossy::Float(n) => n.to_string(),
        Lossy::Bool(b) => b.to_string(),
    }))
}

impl Settings {
    /// Validate and convert into session credentials.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let router_ip = required(self.router_ip.as_deref(), "router_ip", "ROUTER_IP")?;
        let username = required(self.username.as_deref(), "username", "USERNAME")?;
        let password = required(self.password.as_deref(), "password", "PASSWORD")?;

        if self.port == 0 {
            return Err(ConfigError::Validation {
                field: "port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        if self.api_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "api_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }

        Ok(Credentials::new(
            router_ip,
            username,
            SecretString::from(password.to_owned()),
        )
        .with_port(self.port)
        .with_verify_tls(self.verify_ssl)
        .with_timeout(Duration::from_secs(self.api_timeout)))
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    env_suffix: &str,
) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing {
            field,
            env: format!("{ENV_PREFIX}{env_suffix}"),
        })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unifi-mcp", "unifi-mcp").map_or_else(
        || PathBuf::from("unifi-mcp.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults, then the TOML file (if present), then the environment.
pub fn figment(config_file: Option<&Path>) -> Figment {
    let path = config_file.map_or_else(config_path, Path::to_path_buf);
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&VERBATIM_KEYS));

    VERBATIM_KEYS.into_iter().fold(figment, |figment, key| {
        let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        match std::env::var(var) {
            Ok(value) => figment.merge(Serialized::default(key, value)),
            Err(_) => figment,
        }
    })
}

/// Extract settings from any figment (tests build their own).
pub fn load_settings_from(figment: &Figment) -> Result<Settings, ConfigError> {
    Ok(figment.extract()?)
}

/// Load settings from the standard sources.
pub fn load_settings(config_file: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_from(&figment(config_file))
}

/// Load and validate credentials from the standard sources.
pub fn load_credentials(config_file: Option<&Path>) -> Result<Credentials, ConfigError> {
    load_settings(config_file)?.credentials()
}
