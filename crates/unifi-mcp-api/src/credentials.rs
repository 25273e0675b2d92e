// ── Controller connection credentials ──
//
// Loaded once at startup and never mutated. The session derives its base
// URL and transport settings from these; the password stays wrapped in
// `SecretString` until the login body is built.

use std::borrow::Cow;
use std::net::Ipv6Addr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Default HTTPS port of a UniFi OS gateway.
pub const DEFAULT_PORT: u16 = 443;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to reach and authenticate against one controller.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Controller host or IP. May carry an explicit `http://`/`https://` scheme.
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Verify the controller's TLS certificate. Local controllers are
    /// usually self-signed, so this defaults to `false`.
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            verify_tls: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject credentials a session cannot possibly log in with.
    pub fn validate(&self) -> Result<(), Error> {
        let missing = |field: &str| Error::Configuration {
            field: field.into(),
            reason: "value is required".into(),
        };

        if self.host.trim().is_empty() {
            return Err(missing("host"));
        }
        if self.username.trim().is_empty() {
            return Err(missing("username"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(missing("password"));
        }
        if self.port == 0 {
            return Err(Error::Configuration {
                field: "port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        if self.timeout.is_zero() {
            return Err(Error::Configuration {
                field: "timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Controller root URL.
    ///
    /// Port 443 implies HTTPS, any other port plain HTTP, unless the host
    /// already names a scheme.
    pub fn base_url(&self) -> Result<Url, Error> {
        let host = self.host.trim().trim_end_matches('/');
        let raw = if host.contains("://") {
            host.to_owned()
        } else {
            let scheme = if self.port == DEFAULT_PORT {
                "https"
            } else {
                "http"
            };
            format!("{scheme}://{}:{}", bracket_host(host)?, self.port)
        };
        let url = Url::parse(&raw)?;
        if url.host_str().is_none() {
            return Err(Error::Configuration {
                field: "host".into(),
                reason: format!("'{}' has no host component", self.host),
            });
        }
        Ok(url)
    }
}

/// Wrap a bare IPv6 literal in brackets so it can carry a port.
///
/// Any other host containing `:` is a `host:port` pair, which belongs in
/// the separate port setting.
fn bracket_host(host: &str) -> Result<Cow<'_, str>, Error> {
    if host.starts_with('[') || !host.contains(':') {
        return Ok(Cow::Borrowed(host));
    }
    if host.parse::<Ipv6Addr>().is_ok() {
        return Ok(Cow::Owned(format!("[{host}]")));
    }
    Err(Error::Configuration {
        field: "host".into(),
        reason: format!("'{host}' looks like host:port; set the port separately"),
    })
}
