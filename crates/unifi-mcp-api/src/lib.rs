// unifi-mcp-api: authenticated, rate-limited session client for the local UniFi controller API

pub mod auth;
pub mod credentials;
pub mod error;
pub mod payload;
pub mod rate_limit;
pub mod retry;
pub mod session;
pub mod transport;

pub use auth::{ControllerPlatform, LoginStrategy};
pub use credentials::Credentials;
pub use error::Error;
pub use payload::{ToolPayload, envelope_data};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use session::{ControllerSession, RequestOptions, normalize_path};
pub use transport::TransportConfig;
