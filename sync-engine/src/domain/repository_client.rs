//! Remote repository client: bounded calls with one re-authentication.
//!
//! Wraps the [`RemoteRepository`] port. Every call is bounded by the request
//! timeout (surfaced as `Unreachable`). An `Unauthorized` answer triggers
//! exactly one [`SessionManager::on_unauthorized`] cycle and one retry with
//! the renewed session; a second `Unauthorized` is terminal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::ports::{
    CreateRecordRequest, CreatedRecord, RemoteRepository, RemoteRepositoryError,
};
use crate::domain::session_manager::SessionManager;
use crate::domain::{Error, Nsid, RecordKey, Session};

/// Default bound on a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a remote delete that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed and was removed.
    Deleted,
    /// The remote reported the record missing; deletes are idempotent.
    AlreadyGone,
}

fn map_remote_error(error: RemoteRepositoryError) -> Error {
    match error {
        RemoteRepositoryError::Unauthorized { message } => {
            Error::unauthenticated(format!("remote repository refused renewed session: {message}"))
        }
        RemoteRepositoryError::Unreachable { message } => Error::unreachable(message),
        RemoteRepositoryError::Rejected { message }
        | RemoteRepositoryError::NotFound { message }
        | RemoteRepositoryError::Decode { message } => Error::remote_rejected(message),
    }
}

/// Client used by the write agent for all remote record operations.
pub struct RemoteRepositoryClient {
    remote: Arc<dyn RemoteRepository>,
    sessions: Arc<SessionManager>,
    request_timeout: Duration,
}

impl RemoteRepositoryClient {
    /// Build a client that bounds every remote call by `request_timeout`
    /// and renews sessions through `sessions`.
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        sessions: Arc<SessionManager>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            sessions,
            request_timeout,
        }
    }

    /// Create a record, returning its address and content hash.
    pub async fn create_record(
        &self,
        session: &Session,
        request: &CreateRecordRequest,
    ) -> Result<CreatedRecord, Error> {
        let created = self
            .with_reauth(session, |current| async move {
                self.remote.create_record(&current, request).await
            })
            .await?;
        info!(
            collection = %request.collection,
            rkey = %request.rkey,
            uri = %created.uri,
            "remote record created"
        );
        Ok(created)
    }

    /// Delete a record. A remote "not found" is reported as
    /// [`DeleteOutcome::AlreadyGone`], not as an error.
    pub async fn delete_record(
        &self,
        session: &Session,
        collection: &Nsid,
        rkey: &RecordKey,
    ) -> Result<DeleteOutcome, Error> {
        let outcome = self
            .with_reauth(session, |current| async move {
                match self.remote.delete_record(&current, collection, rkey).await {
                    Ok(()) => Ok(DeleteOutcome::Deleted),
                    Err(RemoteRepositoryError::NotFound { .. }) => Ok(DeleteOutcome::AlreadyGone),
                    Err(err) => Err(err),
                }
            })
            .await?;
        info!(%collection, %rkey, ?outcome, "remote record deleted");
        Ok(outcome)
    }

    async fn with_reauth<T, F, Fut>(&self, session: &Session, call: F) -> Result<T, Error>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = Result<T, RemoteRepositoryError>>,
    {
        match self.bounded(call(session.clone())).await {
            Err(RemoteRepositoryError::Unauthorized { message }) => {
                debug!(%message, "remote call unauthorised, renewing session once");
                let renewed = self.sessions.on_unauthorized(session).await?;
                self.bounded(call(renewed)).await.map_err(map_remote_error)
            }
            other => other.map_err(map_remote_error),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteRepositoryError>>,
    ) -> Result<T, RemoteRepositoryError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteRepositoryError::unreachable(format!(
                "remote call exceeded {} ms",
                self.request_timeout.as_millis()
            ))),
        }
    }
}
