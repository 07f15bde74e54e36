/// Authentication module for the voice gateway
///
/// Callers present a short-lived HMAC JWT as a bearer token. Protected routes
/// run [`middleware::require_bearer`] before their handler; the verified
/// [`AuthContext`] is placed in request and response extensions so audit
/// logging can name the caller without ever touching the raw token.
pub mod middleware;
pub mod tokens;

pub use middleware::{extract_bearer, require_bearer, AuthContext, AuthMethod};
pub use tokens::{JwtService, TokenClaims, TokenError};
