use http::HeaderValue;
use http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use passgate_api::{ATTR_ACCESS_TOKEN_ID, ATTR_USER_ID, IncomingRequest, ResourceServer};
use passgate_auth::JwtResourceServer;
use serde_json::{Value, json};

const RSA_PRIVATE: &str = include_str!("fixtures/rsa_private.pem");
const RSA_PUBLIC: &str = include_str!("fixtures/rsa_public.pem");
const EC_PRIVATE: &str = include_str!("fixtures/ec_private.pem");
const EC_PUBLIC: &str = include_str!("fixtures/ec_public.pem");
const ED_PRIVATE: &str = include_str!("fixtures/ed25519_private.pem");
const JWKS: &str = include_str!("fixtures/jwks.json");
const JWKS_SECRET: &[u8] = b"jwks-shared-secret";

fn claims() -> Value {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    json!({"jti": "t1", "aud": "c1", "sub": "7", "exp": exp})
}

fn mint(alg: Algorithm, kid: Option<&str>, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(ToString::to_string);
    jsonwebtoken::encode(&header, &claims(), key).unwrap()
}

fn rsa_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(RSA_PRIVATE.as_bytes()).unwrap()
}

fn ec_key() -> EncodingKey {
    EncodingKey::from_ec_pem(EC_PRIVATE.as_bytes()).unwrap()
}

fn ed_key() -> EncodingKey {
    EncodingKey::from_ed_pem(ED_PRIVATE.as_bytes()).unwrap()
}

fn accepts(server: &JwtResourceServer, token: &str) -> bool {
    let request = IncomingRequest::default().with_header(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    match server.validate_authenticated_request(&request) {
        Ok(attributed) => {
            assert_eq!(attributed.attribute_id(ATTR_USER_ID).as_deref(), Some("7"));
            assert_eq!(attributed.attribute_id(ATTR_ACCESS_TOKEN_ID).as_deref(), Some("t1"));
            true
        }
        Err(_) => false,
    }
}

#[test]
fn rsa_pem_verifies_rs256() {
    let server = JwtResourceServer::from_rsa_pem(RSA_PUBLIC.as_bytes()).unwrap();
    assert!(accepts(&server, &mint(Algorithm::RS256, None, &rsa_key())));
    assert!(accepts(&server, &mint(Algorithm::PS256, None, &rsa_key())));
    assert!(!accepts(&server, &mint(Algorithm::ES256, None, &ec_key())));
}

#[test]
fn ec_pem_verifies_es256() {
    let server = JwtResourceServer::from_ec_pem(EC_PUBLIC.as_bytes()).unwrap();
    assert!(accepts(&server, &mint(Algorithm::ES256, None, &ec_key())));
    assert!(!accepts(&server, &mint(Algorithm::RS256, None, &rsa_key())));
}

#[test]
fn garbage_pem_is_a_key_error() {
    assert!(JwtResourceServer::from_rsa_pem(b"-----BEGIN PUBLIC KEY-----\nnope\n").is_err());
    assert!(JwtResourceServer::from_ec_pem(b"not a pem").is_err());
}

#[test]
fn hmac_token_signed_with_public_key_is_rejected() {
    let server = JwtResourceServer::from_rsa_pem(RSA_PUBLIC.as_bytes()).unwrap();
    let forged = mint(
        Algorithm::HS256,
        None,
        &EncodingKey::from_secret(RSA_PUBLIC.as_bytes()),
    );
    assert!(!accepts(&server, &forged));
}

#[test]
fn jwks_verifies_every_key_family() {
    let server = JwtResourceServer::from_jwks_json(JWKS).unwrap();

    assert!(accepts(&server, &mint(Algorithm::RS256, Some("rsa-1"), &rsa_key())));
    assert!(accepts(&server, &mint(Algorithm::ES256, Some("ec-1"), &ec_key())));
    assert!(accepts(&server, &mint(Algorithm::EdDSA, Some("ed-1"), &ed_key())));
    let hmac = EncodingKey::from_secret(JWKS_SECRET);
    assert!(accepts(&server, &mint(Algorithm::HS256, Some("hmac-1"), &hmac)));
}

#[test]
fn jwks_falls_back_to_family_when_kid_is_absent_or_mismatched() {
    let server = JwtResourceServer::from_jwks_json(JWKS).unwrap();

    assert!(accepts(&server, &mint(Algorithm::EdDSA, None, &ed_key())));
    // kid points at a key of another family; only same-family keys are tried.
    assert!(accepts(&server, &mint(Algorithm::RS256, Some("ec-1"), &rsa_key())));
    let hmac = EncodingKey::from_secret(JWKS_SECRET);
    assert!(accepts(&server, &mint(Algorithm::HS256, Some("rsa-1"), &hmac)));
}

#[test]
fn jwks_rejects_foreign_signatures() {
    let server = JwtResourceServer::from_jwks_json(JWKS).unwrap();
    let stranger = EncodingKey::from_secret(b"not in the key set");
    assert!(!accepts(&server, &mint(Algorithm::HS256, Some("hmac-1"), &stranger)));

    let rsa_only = JwtResourceServer::from_rsa_pem(RSA_PUBLIC.as_bytes()).unwrap();
    assert!(!accepts(&rsa_only, &mint(Algorithm::EdDSA, None, &ed_key())));
}
