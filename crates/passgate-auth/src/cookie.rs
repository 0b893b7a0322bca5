//! Session cookie decoding.
//!
//! The cookie value is encrypted by the [`Encrypter`]; the plaintext is an
//! HS256 JWT signed with the encrypter's key. A decoded token is only accepted
//! while `now < expiry` and when its `csrf` claim matches the `X-CSRF-TOKEN`
//! header, unless CSRF checking is switched off in [`GuardConfig`].

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use passgate_api::{EncryptionError, Encrypter, IncomingRequest, id_from_value};
use passgate_core::GuardConfig;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::csrf::csrf_valid;

/// Claims carried by a session cookie token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieClaims {
    /// User identifier.
    pub sub: Option<String>,
    /// Client identifier.
    pub aud: Option<String>,
    pub csrf: Option<String>,
    /// Unix seconds.
    pub expiry: Option<i64>,
}

impl CookieClaims {
    fn from_value(claims: &Value) -> Option<Self> {
        let map = claims.as_object()?;
        Some(Self {
            sub: map.get("sub").and_then(id_from_value),
            aud: map.get("aud").and_then(id_from_value),
            csrf: map.get("csrf").and_then(Value::as_str).map(ToString::to_string),
            expiry: map.get("expiry").and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            }),
        })
    }

    /// A token without an expiry counts as expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry.is_none_or(|expiry| now >= expiry)
    }
}

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("session cookie missing")]
    Missing,

    #[error("cookie decryption failed: {0}")]
    Decrypt(#[from] EncryptionError),

    #[error("malformed cookie token: {0}")]
    Decode(String),

    #[error("token is invalid or already expired")]
    Expired,
}

/// Value of the cookie called `name`, looked up across all `Cookie` headers.
/// Percent-encoded values are decoded; a value that does not decode to UTF-8
/// is returned as sent.
pub fn request_cookie<'a>(request: &'a IncomingRequest, name: &str) -> Option<Cow<'a, str>> {
    let raw = request
        .cookie_headers()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| {
            let v = v.trim();
            v.strip_prefix('"')
                .and_then(|inner| inner.strip_suffix('"'))
                .unwrap_or(v)
        })
        .filter(|v| !v.is_empty())?;
    Some(urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw)))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

pub struct CookieDecoder {
    config: Arc<GuardConfig>,
    encrypter: Arc<dyn Encrypter>,
    clock: fn() -> i64,
}

impl CookieDecoder {
    pub fn new(config: Arc<GuardConfig>, encrypter: Arc<dyn Encrypter>) -> Self {
        Self {
            config,
            encrypter,
            clock: unix_now,
        }
    }

    /// Replace the clock used for expiry checks (unix seconds).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn has_cookie(&self, request: &IncomingRequest) -> bool {
        request_cookie(request, &self.config.cookie_name).is_some()
    }

    pub fn decode(&self, request: &IncomingRequest) -> Result<CookieClaims, CookieError> {
        self.decode_at(request, (self.clock)())
    }

    /// [`decode`](Self::decode) with an explicit current time (unix seconds).
    pub fn decode_at(
        &self,
        request: &IncomingRequest,
        now: i64,
    ) -> Result<CookieClaims, CookieError> {
        let raw = request_cookie(request, &self.config.cookie_name).ok_or(CookieError::Missing)?;

        let payload = self
            .encrypter
            .decrypt(&raw, self.config.unserialize_cookies)
            .inspect_err(|e| debug!(error = %e, "session cookie did not decrypt"))?;
        let claims = decode_token(&payload, self.encrypter.key())?;

        if !self.config.ignore_csrf
            && (!csrf_valid(&claims, request) || claims.is_expired_at(now))
        {
            debug!(sub = ?claims.sub, "session token failed csrf/expiry check");
            return Err(CookieError::Expired);
        }

        Ok(claims)
    }
}

fn decode_token(payload: &[u8], key: &[u8]) -> Result<CookieClaims, CookieError> {
    let token = std::str::from_utf8(payload)
        .map_err(|e| CookieError::Decode(format!("payload is not UTF-8: {e}")))?;

    let mut validation = Validation::new(Algorithm::HS256);
    // Cookie tokens carry `expiry`, not `exp`; `exp`/`nbf` are still honoured when present.
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Value>(
        token.trim(),
        &DecodingKey::from_secret(key),
        &validation,
    )
    .map_err(|e| CookieError::Decode(e.to_string()))?;

    CookieClaims::from_value(&data.claims)
        .ok_or_else(|| CookieError::Decode("claims are not an object".to_string()))
}
