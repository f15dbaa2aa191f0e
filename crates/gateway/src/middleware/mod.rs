//! Request middleware
//!
//! Layer order, outermost first: rate limit, session, authentication.
//! Routes that need a logged-in user add [`auth::require_authentication`]
//! as a route layer.

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod session;
