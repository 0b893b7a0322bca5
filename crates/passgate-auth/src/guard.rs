//! Request authentication.

use std::sync::Arc;

use passgate_api::{
    Client, ClientRepository, Encrypter, IncomingRequest, ResourceServer, TokenRepository,
    UserProvider,
};
use passgate_core::GuardConfig;
use tracing::{debug, warn};

use crate::bearer::{BearerClaims, BearerValidator};
use crate::cookie::CookieDecoder;
use crate::credential::{Credential, TransientToken};
use crate::error::{AuthError, Result};
use crate::principal::Principal;
use crate::revocation::RevocationChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialSource {
    Bearer,
    Cookie,
    None,
}

/// Authenticates requests by bearer token or session cookie.
///
/// A bearer token always wins over a cookie; a request carrying neither fails
/// with [`AuthError::NoCredential`]. The guard holds no per-request state and
/// can be shared across threads.
pub struct TokenGuard<U> {
    bearer: BearerValidator,
    cookies: CookieDecoder,
    users: Arc<dyn UserProvider<User = U>>,
    tokens: Arc<dyn TokenRepository>,
    clients: RevocationChecker,
}

impl<U> TokenGuard<U> {
    pub fn new(
        config: Arc<GuardConfig>,
        server: Arc<dyn ResourceServer>,
        users: Arc<dyn UserProvider<User = U>>,
        tokens: Arc<dyn TokenRepository>,
        clients: Arc<dyn ClientRepository>,
        encrypter: Arc<dyn Encrypter>,
    ) -> Self {
        Self {
            cookies: CookieDecoder::new(config, encrypter),
            bearer: BearerValidator::new(server),
            users,
            tokens,
            clients: RevocationChecker::new(clients),
        }
    }

    /// Replace the clock used for session expiry checks (unix seconds).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.cookies = self.cookies.with_clock(clock);
        self
    }

    fn source(&self, request: &IncomingRequest) -> CredentialSource {
        let source = if request.bearer_token().is_some() {
            CredentialSource::Bearer
        } else if self.cookies.has_cookie(request) {
            CredentialSource::Cookie
        } else {
            CredentialSource::None
        };
        debug!(?source, "credential source selected");
        source
    }

    /// Resolve the calling user.
    ///
    /// `Ok(None)` means the credential was sound but no principal could be
    /// built: the bearer token's record is gone, or the session's user no
    /// longer exists.
    pub fn authenticate_user(&self, request: &IncomingRequest) -> Result<Option<Principal<U>>> {
        match self.source(request) {
            CredentialSource::Bearer => self.user_via_bearer(request),
            CredentialSource::Cookie => self.user_via_cookie(request),
            CredentialSource::None => Err(AuthError::NoCredential),
        }
    }

    /// Resolve the client application the credential was issued to.
    pub fn authenticate_client(&self, request: &IncomingRequest) -> Result<Option<Client>> {
        let client_id = match self.source(request) {
            CredentialSource::Bearer => self.bearer.validate(request)?.client_id,
            CredentialSource::Cookie => self.cookies.decode(request)?.aud,
            CredentialSource::None => return Ok(None),
        };
        Ok(self.clients.find_active(client_id.as_deref())?)
    }

    fn user_via_bearer(&self, request: &IncomingRequest) -> Result<Option<Principal<U>>> {
        let BearerClaims {
            user_id,
            client_id,
            access_token_id,
            ..
        } = self.bearer.validate(request)?;

        let user = match user_id.as_deref() {
            Some(id) => self.users.retrieve_by_id(id)?,
            None => None,
        }
        .ok_or(AuthError::UserNotFound)?;

        let token = match access_token_id.as_deref() {
            Some(id) => self.tokens.find(id)?,
            None => None,
        };

        if self.clients.revoked(client_id.as_deref())? {
            warn!(
                client_id = ?client_id,
                token_id = ?access_token_id,
                "token issued by revoked client"
            );
            return Err(AuthError::TokenRevoked);
        }

        match token {
            Some(token) => Ok(Some(Principal::new(user, Credential::AccessToken(token)))),
            None => {
                debug!(token_id = ?access_token_id, "access token record not found");
                Ok(None)
            }
        }
    }

    fn user_via_cookie(&self, request: &IncomingRequest) -> Result<Option<Principal<U>>> {
        let claims = self.cookies.decode(request)?;

        let user = match claims.sub.as_deref() {
            Some(id) => self.users.retrieve_by_id(id)?,
            None => None,
        };
        Ok(user.map(|user| Principal::new(user, Credential::Transient(TransientToken))))
    }
}
