use std::sync::Arc;

use passgate_api::{Client, ClientRepository, RepositoryError};

/// Client lookups on behalf of the guard. No caching; repository errors propagate.
pub struct RevocationChecker {
    clients: Arc<dyn ClientRepository>,
}

impl RevocationChecker {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    /// A token that names no client cannot be vouched for and counts as revoked.
    pub fn revoked(&self, client_id: Option<&str>) -> Result<bool, RepositoryError> {
        match client_id {
            Some(id) => self.clients.revoked(id),
            None => Ok(true),
        }
    }

    pub fn find_active(&self, client_id: Option<&str>) -> Result<Option<Client>, RepositoryError> {
        match client_id {
            Some(id) => self.clients.find_active(id),
            None => Ok(None),
        }
    }
}
