use std::collections::BTreeMap;

use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type UserId = String;
pub type ClientId = String;
pub type TokenId = String;

/// Attribute set by the resource server: access token identifier (`jti`).
pub const ATTR_ACCESS_TOKEN_ID: &str = "oauth_access_token_id";
/// Attribute set by the resource server: issuing client (`aud`).
pub const ATTR_CLIENT_ID: &str = "oauth_client_id";
/// Attribute set by the resource server: token owner (`sub`).
pub const ATTR_USER_ID: &str = "oauth_user_id";
/// Attribute set by the resource server: granted scopes.
pub const ATTR_SCOPES: &str = "oauth_scopes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub revoked: bool,
}

/// A persisted access token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: TokenId,
    pub user_id: Option<UserId>,
    pub client_id: ClientId,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub revoked: bool,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("the payload is invalid: {0}")]
    InvalidPayload(String),
    #[error("the MAC is invalid")]
    InvalidMac,
    #[error("could not decrypt the data: {0}")]
    Decrypt(String),
}

/// Failure reported by an OAuth2 resource server while validating a request.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("server error: {0}")]
    Server(String),
}

/// Protocol-normalized view of an inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl IncomingRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }

    pub fn from_http<B: AsRef<[u8]>>(request: &http::Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            body: request.body().as_ref().to_vec(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// First value of `name`, if present and visible ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token carried as `Authorization: Bearer <token>`.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
        let token = value.strip_prefix("Bearer ")?.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Iterate over every `Cookie` header value.
    pub fn cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Copy of this request with the `Authorization` header removed.
    #[must_use]
    pub fn without_authorization(&self) -> Self {
        let mut copy = self.clone();
        copy.headers.remove(AUTHORIZATION);
        copy
    }
}

/// A request that passed resource-server validation, with the attributes
/// the validator attached to it.
#[derive(Debug, Clone, Default)]
pub struct AttributedRequest {
    request: IncomingRequest,
    attributes: BTreeMap<String, Value>,
}

impl AttributedRequest {
    pub fn new(request: IncomingRequest) -> Self {
        Self {
            request,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn request(&self) -> &IncomingRequest {
        &self.request
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute read as an identifier; see [`id_from_value`].
    pub fn attribute_id(&self, key: &str) -> Option<String> {
        self.attribute(key).and_then(id_from_value)
    }
}

/// Read an identifier from a JSON value. Strings and integers are accepted;
/// empty strings, `null` and anything else read as absent.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub trait UserProvider: Send + Sync {
    type User;

    fn retrieve_by_id(&self, id: &str) -> Result<Option<Self::User>, RepositoryError>;
}

pub trait TokenRepository: Send + Sync {
    fn find(&self, id: &str) -> Result<Option<AccessToken>, RepositoryError>;
}

pub trait ClientRepository: Send + Sync {
    fn revoked(&self, id: &str) -> Result<bool, RepositoryError>;
    fn find_active(&self, id: &str) -> Result<Option<Client>, RepositoryError>;
}

/// Symmetric encryption service protecting session cookies.
pub trait Encrypter: Send + Sync {
    fn decrypt(&self, payload: &str, unserialize: bool) -> Result<Vec<u8>, EncryptionError>;

    /// Raw key; doubles as the HMAC secret for cookie tokens.
    fn key(&self) -> &[u8];
}

pub trait ResourceServer: Send + Sync {
    fn validate_authenticated_request(
        &self,
        request: &IncomingRequest,
    ) -> Result<AttributedRequest, OAuthError>;
}
