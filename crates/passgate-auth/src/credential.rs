//! Credentials attached to an authenticated user.

use passgate_api::AccessToken;

/// Scope checks.
pub trait Scopes {
    fn can(&self, scope: &str) -> bool;

    fn cant(&self, scope: &str) -> bool {
        !self.can(scope)
    }
}

/// Marker for a first-party session: every scope is granted and none are tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientToken;

impl Scopes for TransientToken {
    fn can(&self, _scope: &str) -> bool {
        true
    }

    fn cant(&self, _scope: &str) -> bool {
        false
    }
}

impl Scopes for AccessToken {
    fn can(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == "*" || s == scope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Transient(TransientToken),
    AccessToken(AccessToken),
}

impl Credential {
    pub fn is_transient(&self) -> bool {
        matches!(self, Credential::Transient(_))
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        match self {
            Credential::AccessToken(token) => Some(token),
            Credential::Transient(_) => None,
        }
    }
}

impl Scopes for Credential {
    fn can(&self, scope: &str) -> bool {
        match self {
            Credential::Transient(t) => t.can(scope),
            Credential::AccessToken(t) => t.can(scope),
        }
    }
}
