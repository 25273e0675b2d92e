//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use unifi_mcp_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Configuration is incomplete")]
    #[diagnostic(
        code(unifi_mcp::config),
        help(
            "Set UNIFI_ROUTER_IP, UNIFI_USERNAME and UNIFI_PASSWORD in the environment\n\
             or a .env file, or pass --config with a TOML file holding the same keys."
        )
    )]
    Config(#[source] ConfigError),

    #[error("Authentication failed against {url}")]
    #[diagnostic(
        code(unifi_mcp::auth_failed),
        help("Neither the UniFi OS nor the standalone controller login accepted the credentials.")
    )]
    AuthFailed { url: String },

    #[error("Invalid JSON body")]
    #[diagnostic(code(unifi_mcp::invalid_body))]
    InvalidBody(#[source] serde_json::Error),

    #[error("Controller request failed")]
    #[diagnostic(code(unifi_mcp::request_failed))]
    Request(#[source] unifi_mcp_api::Error),

    #[error("Could not write output")]
    #[diagnostic(code(unifi_mcp::output))]
    Output(#[source] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidBody(_) => exit_code::USAGE,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Request(err) => match err {
                unifi_mcp_api::Error::Configuration { .. } => exit_code::USAGE,
                unifi_mcp_api::Error::Authentication { .. }
                | unifi_mcp_api::Error::SessionExpired { .. } => exit_code::AUTH,
                unifi_mcp_api::Error::Transport(_) | unifi_mcp_api::Error::Tls(_) => {
                    exit_code::CONNECTION
                }
                _ => exit_code::GENERAL,
            },
            Self::Output(_) => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<unifi_mcp_api::Error> for CliError {
    fn from(err: unifi_mcp_api::Error) -> Self {
        match err {
            unifi_mcp_api::Error::Configuration { .. } => {
                Self::Config(ConfigError::Validation {
                    field: "credentials".into(),
                    reason: err.to_string(),
                })
            }
            other => Self::Request(other),
        }
    }
}
