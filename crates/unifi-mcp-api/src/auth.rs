use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

/// The platform type of the UniFi controller.
///
/// Decided by whichever [`LoginStrategy`] succeeded; determines whether
/// legacy paths are routed through the gateway's network proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPlatform {
    /// UniFi OS device (UDM, UDR, UCG, etc.) -- `/proxy/network/` prefix.
    UnifiOs,
    /// Standalone Network Application -- legacy API served directly.
    ClassicController,
}

impl ControllerPlatform {
    /// The path prefix under which legacy API endpoints are served.
    pub fn legacy_prefix(&self) -> &'static str {
        match self {
            Self::UnifiOs => "/proxy/network",
            Self::ClassicController => "",
        }
    }
}

/// One way of logging in to a controller.
///
/// Strategies are tried in [`LoginStrategy::ORDERED`] order; the first
/// whose response passes [`accepts`](Self::accepts) wins. Supporting
/// another controller shape means adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStrategy {
    /// `POST /api/auth/login` on a UniFi OS gateway.
    UnifiOs,
    /// `POST /api/login` on a standalone controller.
    Legacy,
}

impl LoginStrategy {
    pub const ORDERED: [Self; 2] = [Self::UnifiOs, Self::Legacy];

    /// The login endpoint path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::UnifiOs => "/api/auth/login",
            Self::Legacy => "/api/login",
        }
    }

    /// JSON login body. The password is exposed only here.
    pub fn body(&self, username: &str, password: &SecretString) -> Value {
        match self {
            Self::UnifiOs => json!({
                "username": username,
                "password": password.expose_secret(),
            }),
            Self::Legacy => json!({
                "username": username,
                "password": password.expose_secret(),
                "remember": false,
            }),
        }
    }

    /// Whether a login response means we are now authenticated.
    ///
    /// UniFi OS answers with the user object, so we look for its id.
    /// Standalone controllers answer with the `{meta: {rc}}` envelope.
    pub fn accepts(&self, status: StatusCode, body: &Value) -> bool {
        if status != StatusCode::OK {
            return false;
        }
        match self {
            Self::UnifiOs => ["unique_id", "_id"].iter().any(|key| {
                body.get(key)
                    .is_some_and(|id| !id.is_null() && id.as_str() != Some(""))
            }),
            Self::Legacy => body.pointer("/meta/rc").and_then(Value::as_str) == Some("ok"),
        }
    }

    /// The platform implied by a successful login.
    pub fn platform(&self) -> ControllerPlatform {
        match self {
            Self::UnifiOs => ControllerPlatform::UnifiOs,
            Self::Legacy => ControllerPlatform::ClassicController,
        }
    }
}
