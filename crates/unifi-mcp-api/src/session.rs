// Controller session
//
// Owns login state, CSRF handling, path rewriting and request dispatch for
// one controller. A single session is shared by every tool call; the state
// mutex is held across the login exchange so concurrent callers never run
// a second login or read a half-written token.
//
// Each call goes through two wrappers, outermost first:
//   RetryPolicy::run → dispatch_with_reauth → dispatch
// The retry policy knows nothing about auth, and the re-auth wrapper
// never loops on its own.

use std::sync::{PoisonError, RwLock};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{ControllerPlatform, LoginStrategy};
use crate::credentials::Credentials;
use crate::error::{Error, body_snippet};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Header carrying the anti-forgery token on requests and login responses.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Header UniFi OS uses to hand out a rotated CSRF token.
pub const UPDATED_CSRF_HEADER: &str = "x-updated-csrf-token";

/// Logout endpoint, shared by both controller shapes.
pub const LOGOUT_PATH: &str = "/api/logout";

/// Per-call request options: JSON body, query pairs and extra headers.
///
/// Extra headers override the default `Content-Type: application/json`
/// for the keys they set.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Default)]
struct SessionState {
    authenticated: bool,
    csrf_token: Option<String>,
    platform: Option<ControllerPlatform>,
    /// Bumped on every successful login. Lets a caller that saw a 401
    /// tell whether someone else already logged in again.
    generation: u64,
    closed: bool,
}

impl SessionState {
    fn snapshot(&self) -> Option<AuthSnapshot> {
        if !self.authenticated {
            return None;
        }
        Some(AuthSnapshot {
            platform: self.platform?,
            csrf_token: self.csrf_token.clone(),
            generation: self.generation,
        })
    }

    fn clear(&mut self) {
        self.authenticated = false;
        self.csrf_token = None;
        self.platform = None;
    }
}

/// What a single dispatch needs to know about the login it runs under.
#[derive(Debug, Clone)]
struct AuthSnapshot {
    platform: ControllerPlatform,
    csrf_token: Option<String>,
    generation: u64,
}

struct LoginGrant {
    csrf_token: Option<String>,
}

/// Authenticated, rate-limited session against one UniFi controller.
///
/// Construct once at startup, share by reference (or `Arc`) with every
/// caller, and call [`shutdown`](Self::shutdown) before exit.
pub struct ControllerSession {
    base_url: Url,
    credentials: Credentials,
    /// `None` once the session has been shut down.
    http: RwLock<Option<reqwest::Client>>,
    state: Mutex<SessionState>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ControllerSession {
    /// Validate the credentials and build the HTTP transport.
    ///
    /// No network traffic happens here; the first call logs in.
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        credentials.validate()?;
        let base_url = credentials.base_url()?;
        let transport = TransportConfig::from_credentials(&credentials);
        let http = transport.build_client()?;

        debug!(%base_url, verify_tls = credentials.verify_tls, "session created");

        Ok(Self {
            base_url,
            credentials,
            http: RwLock::new(Some(http)),
            state: Mutex::new(SessionState::default()),
            limiter: RateLimiter::default(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    pub async fn csrf_token(&self) -> Option<String> {
        self.state.lock().await.csrf_token.clone()
    }

    /// The platform detected by the last successful login.
    pub async fn platform(&self) -> Option<ControllerPlatform> {
        self.state.lock().await.platform
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    fn http(&self) -> Result<reqwest::Client, Error> {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in, trying each [`LoginStrategy`] in order.
    ///
    /// Returns `false` when every strategy is rejected or the session is
    /// closed. Never fails with an error.
    pub async fn login(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.closed {
            return false;
        }
        self.login_locked(&mut state).await
    }

    async fn login_locked(&self, state: &mut SessionState) -> bool {
        let Ok(http) = self.http() else {
            return false;
        };

        for strategy in LoginStrategy::ORDERED {
            match self.attempt_login(&http, strategy).await {
                Ok(Some(grant)) => {
                    state.authenticated = true;
                    state.csrf_token = grant.csrf_token;
                    state.platform = Some(strategy.platform());
                    state.generation += 1;
                    debug!(
                        ?strategy,
                        csrf = state.csrf_token.is_some(),
                        "login successful"
                    );
                    return true;
                }
                Ok(None) => debug!(?strategy, "login rejected"),
                Err(e) => debug!(?strategy, error = %e, "login attempt failed"),
            }
        }

        state.clear();
        warn!(base_url = %self.base_url, "all login strategies failed");
        false
    }

    async fn attempt_login(
        &self,
        http: &reqwest::Client,
        strategy: LoginStrategy,
    ) -> Result<Option<LoginGrant>, Error> {
        let url = self.base_url.join(strategy.path())?;
        debug!("logging in at {}", url);

        let body = strategy.body(&self.credentials.username, &self.credentials.password);
        let resp = http.post(url).json(&body).send().await?;

        let status = resp.status();
        let csrf_token = header_string(resp.headers(), CSRF_HEADER);
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        Ok(strategy
            .accepts(status, &body)
            .then_some(LoginGrant { csrf_token }))
    }

    /// Make sure a login is in place and return what dispatch needs from it.
    async fn ensure_authenticated(&self) -> Result<AuthSnapshot, Error> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::Closed);
        }
        if !state.authenticated && !self.login_locked(&mut state).await {
            return Err(Error::Authentication {
                message: format!("could not log in to controller at {}", self.base_url),
            });
        }
        state.snapshot().ok_or_else(|| Error::Authentication {
            message: "session has no detected platform".into(),
        })
    }

    /// Drop the login seen by a request that got a 401 and log in again.
    ///
    /// If another caller already replaced that login, reuse theirs.
    async fn reauthenticate(&self, stale_generation: u64) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::Closed);
        }
        if state.generation == stale_generation {
            state.clear();
        }
        if !state.authenticated && !self.login_locked(&mut state).await {
            return Err(Error::Authentication {
                message: "re-authentication after session expiry failed".into(),
            });
        }
        Ok(())
    }

    /// End the current session.
    ///
    /// Best effort: a failed logout request is logged and ignored. Local
    /// auth state is cleared either way.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        self.logout_locked(&mut state).await;
    }

    async fn logout_locked(&self, state: &mut SessionState) {
        if state.authenticated {
            if let Err(e) = self.send_logout(state.csrf_token.as_deref()).await {
                debug!(error = %e, "logout failed (ignored)");
            }
        }
        state.clear();
    }

    async fn send_logout(&self, csrf_token: Option<&str>) -> Result<(), Error> {
        let http = self.http()?;
        let url = self.base_url.join(LOGOUT_PATH)?;
        debug!("logging out at {}", url);

        let resp = http
            .post(url)
            .headers(request_headers(&HeaderMap::new(), csrf_token))
            .send()
            .await?;
        debug!(status = %resp.status(), "logout complete");
        Ok(())
    }

    /// Log out and release the HTTP client. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        self.logout_locked(&mut state).await;
        state.closed = true;
        self.http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("session shut down");
    }

    // ── Request API ──────────────────────────────────────────────────

    pub async fn get(&self, path: &str, opts: RequestOptions) -> Result<Value, Error> {
        self.request(Method::GET, path, opts).await
    }

    pub async fn post(&self, path: &str, opts: RequestOptions) -> Result<Value, Error> {
        self.request(Method::POST, path, opts).await
    }

    pub async fn put(&self, path: &str, opts: RequestOptions) -> Result<Value, Error> {
        self.request(Method::PUT, path, opts).await
    }

    pub async fn delete(&self, path: &str, opts: RequestOptions) -> Result<Value, Error> {
        self.request(Method::DELETE, path, opts).await
    }

    /// Issue a request with login, rate limiting, re-auth on 401 and
    /// bounded retries. Returns the parsed JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions,
    ) -> Result<Value, Error> {
        self.retry
            .run(|attempt| {
                trace!(attempt, %method, path, "dispatch attempt");
                self.dispatch_with_reauth(&method, path, &opts)
            })
            .await
    }

    /// One attempt. A 401 drops the stale login and logs in again before
    /// failing with the retryable [`Error::SessionExpired`]; if that login
    /// fails the call aborts with [`Error::Authentication`].
    async fn dispatch_with_reauth(
        &self,
        method: &Method,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<Value, Error> {
        let auth = self.ensure_authenticated().await?;
        match self.dispatch(&auth, method, path, opts).await {
            Err(err) if err.is_auth_expired() => {
                warn!(%method, path, "session expired, re-authenticating");
                self.reauthenticate(auth.generation).await?;
                Err(err)
            }
            other => other,
        }
    }

    /// Rate-limit, rewrite, send and classify a single HTTP exchange.
    async fn dispatch(
        &self,
        auth: &AuthSnapshot,
        method: &Method,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<Value, Error> {
        let http = self.http()?;
        self.limiter.acquire().await;

        let path = normalize_path(path, auth.platform);
        let url = self.base_url.join(&path)?;
        debug!("{method} {url}");

        let mut builder = http
            .request(method.clone(), url)
            .headers(request_headers(&opts.headers, auth.csrf_token.as_deref()));
        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }
        if let Some(ref body) = opts.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if let Some(token) = rotated_csrf(resp.headers()) {
            self.rotate_csrf(token, auth.generation).await;
        }

        let body = resp.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired {
                body: body_snippet(&body),
            });
        }
        if !status.is_success() {
            return Err(Error::Request {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", body_snippet(&body)),
            body: body.clone(),
        })
    }

    /// Store a rotated token, unless the login it belongs to is gone.
    async fn rotate_csrf(&self, token: String, generation: u64) {
        let mut state = self.state.lock().await;
        if state.authenticated && state.generation == generation {
            trace!("CSRF token rotated");
            state.csrf_token = Some(token);
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Route legacy API paths through the UniFi OS network proxy.
///
/// On UniFi OS, `/api/s/{site}/...` and every other `/api/...` path except
/// the `/api/auth/...` family gain the `/proxy/network` prefix. A standalone
/// controller serves legacy paths directly, so nothing changes there.
pub fn normalize_path(path: &str, platform: ControllerPlatform) -> String {
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };

    let prefix = platform.legacy_prefix();
    if prefix.is_empty() {
        return path;
    }

    let site_scoped = path.starts_with("/api/s/");
    let other_api = path.starts_with("/api/") && !is_auth_path(&path);
    if site_scoped || other_api {
        format!("{prefix}{path}")
    } else {
        path
    }
}

fn is_auth_path(path: &str) -> bool {
    path == "/api/auth" || path.starts_with("/api/auth/")
}

/// Default JSON content type, caller overrides, then the CSRF token.
fn request_headers(extra: &HeaderMap, csrf_token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.extend(extra.clone());

    if let Some(token) = csrf_token {
        match HeaderValue::from_str(token) {
            Ok(value) => {
                headers.insert(CSRF_HEADER, value);
            }
            Err(_) => warn!("CSRF token is not a valid header value, not sending it"),
        }
    }
    headers
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// UniFi OS may rotate tokens -- prefer the updated one.
fn rotated_csrf(headers: &HeaderMap) -> Option<String> {
    header_string(headers, UPDATED_CSRF_HEADER).or_else(|| header_string(headers, CSRF_HEADER))
}
