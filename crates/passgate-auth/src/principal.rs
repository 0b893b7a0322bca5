use crate::credential::{Credential, Scopes};

/// A user together with the credential it authenticated with.
///
/// There is no way to build one without a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal<U> {
    user: U,
    credential: Credential,
}

impl<U> Principal<U> {
    pub fn new(user: U, credential: Credential) -> Self {
        Self { user, credential }
    }

    pub fn user(&self) -> &U {
        &self.user
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl<U> Scopes for Principal<U> {
    fn can(&self, scope: &str) -> bool {
        self.credential.can(scope)
    }
}
