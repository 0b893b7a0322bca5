//! Bearer token validation through the resource server.

use std::sync::Arc;

use passgate_api::{
    ATTR_ACCESS_TOKEN_ID, ATTR_CLIENT_ID, ATTR_SCOPES, ATTR_USER_ID, AttributedRequest, ClientId,
    IncomingRequest, ResourceServer, TokenId, UserId,
};
use serde_json::Value;
use tracing::warn;

use crate::error::AuthError;

/// Identifiers the resource server attached to a validated request.
/// Missing attributes read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerClaims {
    pub user_id: Option<UserId>,
    pub client_id: Option<ClientId>,
    pub access_token_id: Option<TokenId>,
    pub scopes: Vec<String>,
}

impl BearerClaims {
    pub fn from_attributes(request: &AttributedRequest) -> Self {
        Self {
            user_id: request.attribute_id(ATTR_USER_ID),
            client_id: request.attribute_id(ATTR_CLIENT_ID),
            access_token_id: request.attribute_id(ATTR_ACCESS_TOKEN_ID),
            scopes: request
                .attribute(ATTR_SCOPES)
                .and_then(Value::as_array)
                .map(|scopes| {
                    scopes
                        .iter()
                        .filter_map(|s| s.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// A bearer token the resource server refused.
#[derive(Debug)]
pub struct BearerRejection {
    pub reason: String,
    /// The request without its `Authorization` header.
    pub sanitized: IncomingRequest,
}

impl From<BearerRejection> for AuthError {
    fn from(rejection: BearerRejection) -> Self {
        AuthError::TokenInvalid {
            reason: rejection.reason,
            sanitized: Box::new(rejection.sanitized),
        }
    }
}

pub struct BearerValidator {
    server: Arc<dyn ResourceServer>,
}

impl BearerValidator {
    pub fn new(server: Arc<dyn ResourceServer>) -> Self {
        Self { server }
    }

    pub fn validate(&self, request: &IncomingRequest) -> Result<BearerClaims, BearerRejection> {
        match self.server.validate_authenticated_request(request) {
            Ok(attributed) => Ok(BearerClaims::from_attributes(&attributed)),
            Err(e) => {
                warn!(reason = %e, "bearer token rejected");
                Err(BearerRejection {
                    reason: e.to_string(),
                    sanitized: request.without_authorization(),
                })
            }
        }
    }
}
