//! Error types.

use http::StatusCode;
use passgate_api::{IncomingRequest, RepositoryError};
use thiserror::Error;

use crate::cookie::CookieError;

/// Crate result type.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why an authentication attempt failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential was presented, or the session cookie could not be read.
    #[error("unauthenticated")]
    NoCredential,

    /// The bearer token failed resource-server validation.
    ///
    /// `sanitized` is the request without its `Authorization` header; hand it
    /// downstream instead of the original.
    #[error("invalid token: {reason}")]
    TokenInvalid {
        reason: String,
        sanitized: Box<IncomingRequest>,
    },

    /// Session token past its expiry, or its CSRF value did not match.
    #[error("token is invalid or already expired")]
    TokenExpired,

    /// The client that issued the token has been revoked.
    #[error("token revoked")]
    TokenRevoked,

    /// The bearer token names a user that does not exist.
    #[error("user not found")]
    UserNotFound,

    /// A collaborator failed; passed through untouched.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// HTTP status the caller should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::TokenInvalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// True for every kind that means "treat the request as unauthenticated".
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, AuthError::Repository(_))
    }

    pub fn sanitized_request(&self) -> Option<&IncomingRequest> {
        match self {
            AuthError::TokenInvalid { sanitized, .. } => Some(sanitized),
            _ => None,
        }
    }
}

impl From<CookieError> for AuthError {
    fn from(err: CookieError) -> Self {
        match err {
            CookieError::Expired => AuthError::TokenExpired,
            CookieError::Missing | CookieError::Decrypt(_) | CookieError::Decode(_) => {
                AuthError::NoCredential
            }
        }
    }
}

/// Errors building verification keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Unable to parse or use a JWKS.
    #[error("JWKS error: {0}")]
    Jwks(String),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// jsonwebtoken error.
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
