//! Port for durable session storage.
use async_trait::async_trait;

use crate::domain::{OwnerId, Session};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by session store adapters.
    pub enum SessionStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "session store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "session store query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the persisted session for an owner.
    async fn load(&self, owner_id: &OwnerId) -> Result<Option<Session>, SessionStoreError>;

    /// Insert or replace the session for its owner.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Remove the owner's session. Removing an absent session succeeds.
    async fn delete(&self, owner_id: &OwnerId) -> Result<(), SessionStoreError>;
}
