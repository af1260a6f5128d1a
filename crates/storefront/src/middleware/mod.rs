//! HTTP middleware for the storefront.

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use session::create_session_layer;
