//! Session lifecycle: login, proactive and reactive refresh, logout.
//!
//! Each owner has one slot guarded by an async mutex. Every read or refresh
//! of the owner's token pair happens under that lock, so concurrent callers
//! observing a mid-refresh session wait for the in-flight refresh instead of
//! starting a second one. A renewed pair is persisted through the
//! [`SessionStore`] before it is placed in the slot or returned.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mockable::Clock;
use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::Error;
use crate::domain::ports::{
    RemoteRepository, RemoteRepositoryError, SessionStore, SessionStoreError,
};
use crate::domain::{LoginCredentials, OwnerId, Session};

/// Default age after which a session is refreshed before use.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(900);

/// Tuning for [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionManagerConfig {
    /// Age at which a session is proactively refreshed.
    pub staleness_threshold: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
        }
    }
}

/// Failures raised by [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SessionError {
    /// No session exists for the owner.
    #[error("no session for owner {owner_id}")]
    Unauthenticated { owner_id: OwnerId },
    /// Login credentials were refused.
    #[error("login refused: {message}")]
    InvalidCredentials { message: String },
    /// The refresh token was rejected; the session has been destroyed.
    #[error("session for owner {owner_id} expired: {message}")]
    RefreshExpired { owner_id: OwnerId, message: String },
    /// The remote could not be reached; the session is kept.
    #[error("session service unreachable: {message}")]
    Unreachable { message: String },
    /// The remote answered with something unusable.
    #[error("session request rejected: {message}")]
    Rejected { message: String },
    /// Durable session storage failed.
    #[error("session storage failed: {message}")]
    Storage { message: String },
}

impl From<SessionStoreError> for SessionError {
    fn from(value: SessionStoreError) -> Self {
        Self::Storage {
            message: value.to_string(),
        }
    }
}

impl From<SessionError> for Error {
    fn from(value: SessionError) -> Self {
        let message = value.to_string();
        match value {
            SessionError::Unauthenticated { .. }
            | SessionError::InvalidCredentials { .. }
            | SessionError::RefreshExpired { .. } => Error::unauthenticated(message),
            SessionError::Unreachable { .. } => Error::unreachable(message),
            SessionError::Rejected { .. } => Error::remote_rejected(message),
            SessionError::Storage { .. } => Error::internal(message),
        }
    }
}

type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Owns the bearer-token pair of every logged-in owner.
pub struct SessionManager {
    remote: Arc<dyn RemoteRepository>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SessionManagerConfig,
    slots: DashMap<OwnerId, SessionSlot>,
}

impl SessionManager {
    /// Build a manager over the remote repository and durable store.
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            remote,
            store,
            clock,
            config,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, owner_id: &OwnerId) -> SessionSlot {
        Arc::clone(&self.slots.entry(owner_id.clone()).or_default())
    }

    /// Exchange credentials for a session, persist it, and return it.
    pub async fn login(
        &self,
        owner_id: &OwnerId,
        credentials: &LoginCredentials,
    ) -> Result<Session, SessionError> {
        let slot = self.slot(owner_id);
        let mut current = slot.lock().await;

        let tokens = self
            .remote
            .create_session(credentials)
            .await
            .map_err(|err| match err {
                RemoteRepositoryError::Unauthorized { message } => {
                    SessionError::InvalidCredentials { message }
                }
                RemoteRepositoryError::Unreachable { message } => {
                    SessionError::Unreachable { message }
                }
                other => SessionError::Rejected {
                    message: other.to_string(),
                },
            })?;
        let session = Session::from_issued(owner_id.clone(), tokens, self.clock.utc());
        self.store.save(&session).await?;

        info!(
            owner_id = %owner_id,
            repository = %session.repository,
            token = %session.access_token.fingerprint(),
            "session created"
        );
        *current = Some(session.clone());
        Ok(session)
    }

    /// Destroy the owner's session in memory and in storage.
    pub async fn logout(&self, owner_id: &OwnerId) -> Result<(), SessionError> {
        let slot = self.slot(owner_id);
        let mut current = slot.lock().await;
        *current = None;
        self.store.delete(owner_id).await?;
        info!(owner_id = %owner_id, "session destroyed");
        Ok(())
    }

    /// Return a session fresh enough for one remote call, refreshing it first
    /// when it has outlived the staleness threshold.
    pub async fn get_valid_session(&self, owner_id: &OwnerId) -> Result<Session, SessionError> {
        let slot = self.slot(owner_id);
        let mut current = slot.lock().await;
        let session = self.load_into(owner_id, &mut current).await?;

        if session.is_stale(self.clock.utc(), self.config.staleness_threshold) {
            debug!(owner_id = %owner_id, "session stale, refreshing before use");
            return self.refresh_locked(&mut current, &session).await;
        }
        Ok(session)
    }

    /// Exchange the session's refresh token for a new pair.
    ///
    /// When another caller already replaced `session` while this one waited
    /// for the lock, the replacement is returned without a second exchange.
    pub async fn refresh(&self, session: &Session) -> Result<Session, SessionError> {
        let slot = self.slot(&session.owner_id);
        let mut current = slot.lock().await;
        let latest = self.load_into(&session.owner_id, &mut current).await?;

        if latest.access_token != session.access_token {
            debug!(owner_id = %session.owner_id, "session already renewed by a concurrent caller");
            return Ok(latest);
        }
        self.refresh_locked(&mut current, &latest).await
    }

    /// Handle an authorisation failure reported for `session`: one refresh,
    /// never a loop. The caller retries its operation once with the result.
    pub async fn on_unauthorized(&self, session: &Session) -> Result<Session, SessionError> {
        info!(
            owner_id = %session.owner_id,
            token = %session.access_token.fingerprint(),
            "remote rejected access token"
        );
        self.refresh(session).await
    }

    async fn load_into(
        &self,
        owner_id: &OwnerId,
        current: &mut Option<Session>,
    ) -> Result<Session, SessionError> {
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }
        let loaded = self
            .store
            .load(owner_id)
            .await?
            .ok_or_else(|| SessionError::Unauthenticated {
                owner_id: owner_id.clone(),
            })?;
        *current = Some(loaded.clone());
        Ok(loaded)
    }

    async fn refresh_locked(
        &self,
        current: &mut Option<Session>,
        session: &Session,
    ) -> Result<Session, SessionError> {
        let owner_id = &session.owner_id;
        match self.remote.refresh_session(&session.refresh_token).await {
            Ok(tokens) => {
                let renewed = Session::from_issued(owner_id.clone(), tokens, self.clock.utc());
                if let Err(err) = self.store.save(&renewed).await {
                    // The previous pair may already be revoked remotely, and the
                    // new one is not durable, so neither may be handed out.
                    *current = None;
                    warn!(owner_id = %owner_id, error = %err, "failed to persist refreshed session");
                    return Err(err.into());
                }
                info!(
                    owner_id = %owner_id,
                    token = %renewed.access_token.fingerprint(),
                    "session refreshed"
                );
                *current = Some(renewed.clone());
                Ok(renewed)
            }
            Err(RemoteRepositoryError::Unreachable { message }) => {
                warn!(owner_id = %owner_id, %message, "session refresh unreachable");
                Err(SessionError::Unreachable { message })
            }
            Err(RemoteRepositoryError::Decode { message }) => {
                warn!(owner_id = %owner_id, %message, "session refresh response undecodable");
                Err(SessionError::Rejected { message })
            }
            Err(
                RemoteRepositoryError::Unauthorized { message }
                | RemoteRepositoryError::Rejected { message }
                | RemoteRepositoryError::NotFound { message },
            ) => {
                *current = None;
                if let Err(err) = self.store.delete(owner_id).await {
                    warn!(owner_id = %owner_id, error = %err, "failed to delete expired session");
                }
                info!(owner_id = %owner_id, "refresh token rejected, session destroyed");
                Err(SessionError::RefreshExpired {
                    owner_id: owner_id.clone(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "session_manager_tests.rs"]
mod tests;
