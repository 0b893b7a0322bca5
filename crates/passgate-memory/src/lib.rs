use std::collections::BTreeMap;
use std::sync::RwLock;

use passgate_api::{
    AccessToken, Client, ClientId, ClientRepository, RepositoryError, TokenId, TokenRepository,
    UserId, UserProvider,
};

fn poisoned(what: &str) -> RepositoryError {
    RepositoryError::Internal(format!("{what} store poisoned"))
}

pub struct MemoryUsers<U> {
    users: RwLock<BTreeMap<UserId, U>>,
}

impl<U> Default for MemoryUsers<U> {
    fn default() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<U> MemoryUsers<U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<UserId>, user: U) -> Result<(), RepositoryError> {
        self.users
            .write()
            .map_err(|_| poisoned("user"))?
            .insert(id.into(), user);
        Ok(())
    }
}

impl<U: Clone + Send + Sync> UserProvider for MemoryUsers<U> {
    type User = U;

    fn retrieve_by_id(&self, id: &str) -> Result<Option<U>, RepositoryError> {
        let guard = self.users.read().map_err(|_| poisoned("user"))?;
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryTokens {
    tokens: RwLock<BTreeMap<TokenId, AccessToken>>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: AccessToken) -> Result<(), RepositoryError> {
        self.tokens
            .write()
            .map_err(|_| poisoned("token"))?
            .insert(token.id.clone(), token);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Option<AccessToken>, RepositoryError> {
        Ok(self.tokens.write().map_err(|_| poisoned("token"))?.remove(id))
    }
}

impl TokenRepository for MemoryTokens {
    fn find(&self, id: &str) -> Result<Option<AccessToken>, RepositoryError> {
        let guard = self.tokens.read().map_err(|_| poisoned("token"))?;
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryClients {
    clients: RwLock<BTreeMap<ClientId, Client>>,
}

impl MemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client: Client) -> Result<(), RepositoryError> {
        self.clients
            .write()
            .map_err(|_| poisoned("client"))?
            .insert(client.id.clone(), client);
        Ok(())
    }

    /// Mark a client revoked. Returns false when the client is unknown.
    pub fn revoke(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut guard = self.clients.write().map_err(|_| poisoned("client"))?;
        Ok(guard.get_mut(id).map(|c| c.revoked = true).is_some())
    }
}

impl ClientRepository for MemoryClients {
    /// Unknown clients count as revoked.
    fn revoked(&self, id: &str) -> Result<bool, RepositoryError> {
        let guard = self.clients.read().map_err(|_| poisoned("client"))?;
        Ok(guard.get(id).is_none_or(|c| c.revoked))
    }

    fn find_active(&self, id: &str) -> Result<Option<Client>, RepositoryError> {
        let guard = self.clients.read().map_err(|_| poisoned("client"))?;
        Ok(guard.get(id).filter(|c| !c.revoked).cloned())
    }
}
