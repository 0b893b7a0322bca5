//! Bearer JWT verification: a [`ResourceServer`] backed by local keys or a JWKS.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use passgate_api::{
    ATTR_ACCESS_TOKEN_ID, ATTR_CLIENT_ID, ATTR_SCOPES, ATTR_USER_ID, AttributedRequest,
    IncomingRequest, OAuthError, ResourceServer, TokenRepository, id_from_value,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::KeyError;

/// A JWKS (JSON Web Key Set).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwksSet {
    /// Keys.
    pub keys: Vec<Jwk>,
}

/// Minimal JWK structure for RSA/EC/OKP/oct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", "OKP", "oct").
    pub kty: String,

    /// Key id.
    pub kid: Option<String>,

    // RSA
    /// RSA modulus.
    pub n: Option<String>,
    /// RSA exponent.
    pub e: Option<String>,

    // EC / OKP
    /// Curve name.
    pub crv: Option<String>,
    /// EC x coordinate, or OKP public key.
    pub x: Option<String>,
    /// EC y coordinate.
    pub y: Option<String>,

    // Symmetric
    /// Symmetric key (base64url).
    pub k: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn allows(self, alg: Algorithm) -> bool {
        use Algorithm::{
            ES256, ES384, EdDSA, HS256, HS384, HS512, PS256, PS384, PS512, RS256, RS384, RS512,
        };
        match self {
            KeyFamily::Hmac => matches!(alg, HS256 | HS384 | HS512),
            KeyFamily::Rsa => matches!(alg, RS256 | RS384 | RS512 | PS256 | PS384 | PS512),
            KeyFamily::Ec => matches!(alg, ES256 | ES384),
            KeyFamily::Ed => alg == EdDSA,
        }
    }
}

struct ServerKey {
    kid: Option<String>,
    family: KeyFamily,
    key: DecodingKey,
}

/// Validates bearer JWTs and exposes their claims as request attributes
/// (`jti`, `aud`, `sub` and `scopes` map to the `oauth_*` attributes).
pub struct JwtResourceServer {
    keys: Vec<ServerKey>,
    leeway_seconds: u64,
    tokens: Option<Arc<dyn TokenRepository>>,
}

impl fmt::Debug for JwtResourceServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtResourceServer")
            .field("keys", &self.keys.len())
            .field("leeway_seconds", &self.leeway_seconds)
            .field("checks_revocation", &self.tokens.is_some())
            .finish()
    }
}

impl JwtResourceServer {
    fn with_keys(keys: Vec<ServerKey>) -> Self {
        Self {
            keys,
            leeway_seconds: 60,
            tokens: None,
        }
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_keys(vec![ServerKey {
            kid: None,
            family: KeyFamily::Hmac,
            key: DecodingKey::from_secret(secret),
        }])
    }

    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, KeyError> {
        Ok(Self::with_keys(vec![ServerKey {
            kid: None,
            family: KeyFamily::Rsa,
            key: DecodingKey::from_rsa_pem(pem)?,
        }]))
    }

    pub fn from_ec_pem(pem: &[u8]) -> Result<Self, KeyError> {
        Ok(Self::with_keys(vec![ServerKey {
            kid: None,
            family: KeyFamily::Ec,
            key: DecodingKey::from_ec_pem(pem)?,
        }]))
    }

    /// Use every usable key of the set. Fails only when none is usable.
    pub fn from_jwks(set: &JwksSet) -> Result<Self, KeyError> {
        let mut keys = Vec::new();
        let mut last_err = None;
        for jwk in &set.keys {
            match server_key_from_jwk(jwk) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    debug!(kid = ?jwk.kid, error = %e, "skipping unusable JWK");
                    last_err = Some(e);
                }
            }
        }
        if keys.is_empty() {
            return Err(last_err.unwrap_or_else(|| KeyError::Jwks("empty key set".to_string())));
        }
        Ok(Self::with_keys(keys))
    }

    pub fn from_jwks_json(json: &str) -> Result<Self, KeyError> {
        let set: JwksSet = serde_json::from_str(json)?;
        Self::from_jwks(&set)
    }

    /// Clock skew allowed on `exp`/`nbf`, in seconds. Defaults to 60.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Reject tokens whose record is revoked or missing.
    #[must_use]
    pub fn with_token_repository(mut self, tokens: Arc<dyn TokenRepository>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    fn verify(&self, token: &str) -> Result<Value, OAuthError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| OAuthError::AccessDenied(format!("failed to decode header: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // `aud` names the client; it is read, not checked.
        validation.validate_aud = false;

        let mut last_err = None;
        for key in self.candidates(&header) {
            match jsonwebtoken::decode::<Value>(token, &key.key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(e) => Err(OAuthError::AccessDenied(e.to_string())),
            None => Err(OAuthError::AccessDenied(format!(
                "no key accepts algorithm {:?}",
                header.alg
            ))),
        }
    }

    // Prefer kid match when present.
    fn candidates(&self, header: &Header) -> Vec<&ServerKey> {
        let usable = |k: &&ServerKey| k.family.allows(header.alg);
        if let Some(kid) = header.kid.as_deref() {
            let matched: Vec<&ServerKey> = self
                .keys
                .iter()
                .filter(|k| k.kid.as_deref() == Some(kid))
                .filter(usable)
                .collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        self.keys.iter().filter(usable).collect()
    }

    fn ensure_not_revoked(&self, token_id: &str) -> Result<(), OAuthError> {
        let Some(tokens) = &self.tokens else {
            return Ok(());
        };
        match tokens.find(token_id) {
            Ok(Some(record)) if !record.revoked => Ok(()),
            Ok(_) => Err(OAuthError::AccessDenied(
                "access token has been revoked".to_string(),
            )),
            Err(e) => Err(OAuthError::Server(e.to_string())),
        }
    }
}

impl ResourceServer for JwtResourceServer {
    fn validate_authenticated_request(
        &self,
        request: &IncomingRequest,
    ) -> Result<AttributedRequest, OAuthError> {
        let token = request.bearer_token().ok_or_else(|| {
            OAuthError::AccessDenied("missing \"Authorization\" header".to_string())
        })?;

        let claims = self.verify(token)?;

        let token_id = claims
            .get("jti")
            .and_then(id_from_value)
            .ok_or_else(|| OAuthError::AccessDenied("token has no jti claim".to_string()))?;
        self.ensure_not_revoked(&token_id)?;

        let client_id = match claims.get("aud") {
            Some(Value::Array(aud)) => aud.first().and_then(id_from_value),
            Some(aud) => id_from_value(aud),
            None => None,
        };
        let user_id = claims.get("sub").and_then(id_from_value);
        let scopes = claims
            .get("scopes")
            .filter(|v| v.is_array())
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        Ok(AttributedRequest::new(request.clone())
            .with_attribute(ATTR_ACCESS_TOKEN_ID, token_id)
            .with_attribute(ATTR_CLIENT_ID, client_id)
            .with_attribute(ATTR_USER_ID, user_id)
            .with_attribute(ATTR_SCOPES, scopes))
    }
}

fn server_key_from_jwk(jwk: &Jwk) -> Result<ServerKey, KeyError> {
    let (family, key) = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("RSA JWK missing n".to_string()))?;
            let e = jwk
                .e
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("RSA JWK missing e".to_string()))?;
            (KeyFamily::Rsa, DecodingKey::from_rsa_components(n, e)?)
        }
        "EC" => {
            let x = jwk
                .x
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("EC JWK missing x".to_string()))?;
            let y = jwk
                .y
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("EC JWK missing y".to_string()))?;
            (KeyFamily::Ec, DecodingKey::from_ec_components(x, y)?)
        }
        "OKP" => {
            let crv = jwk.crv.as_deref().unwrap_or("");
            if crv != "Ed25519" {
                return Err(KeyError::Jwks(format!("unsupported OKP curve: {crv}")));
            }
            let x = jwk
                .x
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("OKP JWK missing x".to_string()))?;
            let pubkey = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(x)
                .map_err(|e| KeyError::Jwks(format!("invalid okp x: {e}")))?;
            if pubkey.len() != 32 {
                return Err(KeyError::Jwks(format!(
                    "Ed25519 key must be 32 bytes, got {}",
                    pubkey.len()
                )));
            }
            // Ed25519 verification takes the raw 32-byte key, not an SPKI wrapper.
            (KeyFamily::Ed, DecodingKey::from_ed_components(x)?)
        }
        "oct" => {
            let k = jwk
                .k
                .as_deref()
                .ok_or_else(|| KeyError::Jwks("oct JWK missing k".to_string()))?;
            let secret = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(k.trim_end_matches('='))
                .map_err(|e| KeyError::Jwks(format!("invalid oct k: {e}")))?;
            (KeyFamily::Hmac, DecodingKey::from_secret(&secret))
        }
        other => return Err(KeyError::Jwks(format!("unsupported kty: {other}"))),
    };
    Ok(ServerKey {
        kid: jwk.kid.clone(),
        family,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::AUTHORIZATION;
    use jsonwebtoken::EncodingKey;
    use passgate_api::AccessToken;
    use passgate_memory::MemoryTokens;
    use serde_json::json;

    const SECRET: &[u8] = b"resource-server-test-secret";

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap())
            .unwrap()
    }

    fn mint(header: Header, claims: &Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn bearer(token: &str) -> IncomingRequest {
        IncomingRequest::default().with_header(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
    }

    fn claims() -> Value {
        json!({
            "jti": "t1",
            "aud": "c1",
            "sub": 7,
            "scopes": ["read"],
            "exp": now() + 600,
        })
    }

    #[test]
    fn claims_become_attributes() {
        let server = JwtResourceServer::from_secret(SECRET);
        let token = mint(Header::new(Algorithm::HS256), &claims(), SECRET);
        let attributed = server.validate_authenticated_request(&bearer(&token)).unwrap();

        assert_eq!(attributed.attribute_id(ATTR_ACCESS_TOKEN_ID).as_deref(), Some("t1"));
        assert_eq!(attributed.attribute_id(ATTR_CLIENT_ID).as_deref(), Some("c1"));
        assert_eq!(attributed.attribute_id(ATTR_USER_ID).as_deref(), Some("7"));
        assert_eq!(attributed.attribute(ATTR_SCOPES), Some(&json!(["read"])));
    }

    #[test]
    fn expired_or_forged_tokens_are_denied() {
        let server = JwtResourceServer::from_secret(SECRET).with_leeway(0);

        let mut expired = claims();
        expired["exp"] = json!(now() - 120);
        let token = mint(Header::new(Algorithm::HS256), &expired, SECRET);
        assert!(matches!(
            server.validate_authenticated_request(&bearer(&token)),
            Err(OAuthError::AccessDenied(_))
        ));

        let forged = mint(Header::new(Algorithm::HS256), &claims(), b"someone else");
        assert!(server.validate_authenticated_request(&bearer(&forged)).is_err());

        assert!(server.validate_authenticated_request(&bearer("not.a.jwt")).is_err());
        assert!(
            server
                .validate_authenticated_request(&IncomingRequest::default())
                .is_err()
        );
    }

    #[test]
    fn missing_jti_is_denied() {
        let server = JwtResourceServer::from_secret(SECRET);
        let mut no_jti = claims();
        no_jti.as_object_mut().unwrap().remove("jti");
        let token = mint(Header::new(Algorithm::HS256), &no_jti, SECRET);
        assert!(server.validate_authenticated_request(&bearer(&token)).is_err());
    }

    #[test]
    fn revoked_records_are_denied() {
        let tokens = Arc::new(MemoryTokens::new());
        let server =
            JwtResourceServer::from_secret(SECRET).with_token_repository(tokens.clone());
        let token = mint(Header::new(Algorithm::HS256), &claims(), SECRET);

        // No record at all.
        assert!(server.validate_authenticated_request(&bearer(&token)).is_err());

        let mut record = AccessToken {
            id: "t1".to_string(),
            user_id: Some("7".to_string()),
            client_id: "c1".to_string(),
            scopes: vec!["read".to_string()],
            revoked: false,
            expires_at: None,
        };
        tokens.insert(record.clone()).unwrap();
        assert!(server.validate_authenticated_request(&bearer(&token)).is_ok());

        record.revoked = true;
        tokens.insert(record).unwrap();
        assert!(server.validate_authenticated_request(&bearer(&token)).is_err());
    }

    #[test]
    fn jwks_selects_key_by_kid() {
        let encode = |s: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s);
        let jwks = json!({
            "keys": [
                {"kty": "oct", "kid": "old", "k": encode(b"old-secret")},
                {"kty": "oct", "kid": "new", "k": encode(SECRET)},
                {"kty": "unknown", "kid": "skip"}
            ]
        })
        .to_string();
        let server = JwtResourceServer::from_jwks_json(&jwks).unwrap();

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("new".to_string());
        let token = mint(header, &claims(), SECRET);
        assert!(server.validate_authenticated_request(&bearer(&token)).is_ok());
    }

    #[test]
    fn empty_or_unusable_jwks_is_an_error() {
        assert!(JwtResourceServer::from_jwks_json(r#"{"keys": []}"#).is_err());
        assert!(JwtResourceServer::from_jwks_json(r#"{"keys": [{"kty": "RSA"}]}"#).is_err());
    }

    #[test]
    fn okp_keys_must_be_ed25519_and_32_bytes() {
        let short = r#"{"keys": [{"kty": "OKP", "crv": "Ed25519", "x": "AAAA"}]}"#;
        assert!(matches!(
            JwtResourceServer::from_jwks_json(short),
            Err(KeyError::Jwks(msg)) if msg.contains("32 bytes")
        ));
        let x448 = r#"{"keys": [{"kty": "OKP", "crv": "X448", "x": "AAAA"}]}"#;
        assert!(JwtResourceServer::from_jwks_json(x448).is_err());
    }

    #[test]
    fn algorithm_must_match_key_family() {
        assert!(KeyFamily::Hmac.allows(Algorithm::HS256));
        assert!(!KeyFamily::Hmac.allows(Algorithm::RS256));
        assert!(KeyFamily::Rsa.allows(Algorithm::PS256));
        assert!(!KeyFamily::Ec.allows(Algorithm::EdDSA));
    }
}
