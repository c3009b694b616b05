//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, framing, referrer)
//! 5. Session layer (tower-sessions with in-memory store)
//! 6. Session Store (restore and persist the signed-in user)
//! 7. Rate limiting on `/auth` (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    CurrentSession, DocumentCaller, OptionalAuth, RequireAuth, session_store_middleware,
    take_flash_error,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
