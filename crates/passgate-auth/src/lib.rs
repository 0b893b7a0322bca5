//! passgate-auth
//!
//! Authentication guard for HTTP resource servers. Given an inbound request it
//! works out the calling user and client application from one of:
//!
//! - **a bearer token**, validated by an OAuth2 [`ResourceServer`](passgate_api::ResourceServer)
//!   and checked against the token and client repositories
//! - **an encrypted session cookie** holding an HS256 token, with CSRF header
//!   matching and expiry enforcement
//!
//! The entry point is [`TokenGuard`]. Sessions authenticate with a
//! [`TransientToken`], which grants every scope:
//!
//! ```
//! use passgate_auth::{Scopes, TransientToken};
//!
//! assert!(TransientToken.can("orders:write"));
//! assert!(!TransientToken.cant("orders:write"));
//! ```
//!
//! [`JwtResourceServer`] is a ready-made resource server for JWT access tokens.

#![forbid(unsafe_code)]

mod bearer;
mod cookie;
mod credential;
mod csrf;
mod error;
mod guard;
mod jwt;
mod principal;
mod revocation;

pub use bearer::{BearerClaims, BearerRejection, BearerValidator};
pub use cookie::{CookieClaims, CookieDecoder, CookieError, request_cookie};
pub use credential::{Credential, Scopes, TransientToken};
pub use csrf::csrf_valid;
pub use error::{AuthError, KeyError, Result};
pub use guard::TokenGuard;
pub use jwt::{Jwk, JwksSet, JwtResourceServer};
pub use principal::Principal;
pub use revocation::RevocationChecker;
