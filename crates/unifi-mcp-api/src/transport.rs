// Transport configuration for building the session's reqwest::Client.
//
// Session auth is cookie based, so every client built here carries its
// own cookie jar. TLS verification and the per-request timeout come from
// the credentials.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;

use crate::credentials::{Credentials, DEFAULT_TIMEOUT};
use crate::error::Error;

const USER_AGENT: &str = concat!("unifi-mcp/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Reject self-signed or otherwise invalid certificates.
    pub verify_tls: bool,
    pub timeout: Duration,
    pub cookie_jar: Arc<Jar>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: DEFAULT_TIMEOUT,
            cookie_jar: Arc::new(Jar::default()),
        }
    }
}

impl TransportConfig {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            verify_tls: credentials.verify_tls,
            timeout: credentials.timeout,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!self.verify_tls)
            .cookie_provider(Arc::clone(&self.cookie_jar))
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
