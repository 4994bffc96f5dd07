//! Federated write agent: one handler per action kind.
//!
//! Every handler follows the same two-phase shape. The remote write happens
//! first and is the source of truth; the local mirror is updated afterwards
//! and its failures are logged, never surfaced. Removals look up the
//! previously mirrored rkey and degrade to a local-only delete when none is
//! recorded.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{MirrorStore, MirrorStoreError};
use crate::domain::repository_client::RemoteRepositoryClient;
use crate::domain::session_manager::SessionManager;
use crate::domain::{
    ActionIntent, ContentHash, Error, OwnerId, RecordKeyGenerator, RemoteRecordRef,
    ValidatedAction,
};

mod posts;
mod relations;

/// Remote-side result of a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// The remote record was deleted.
    Deleted,
    /// The remote reported the record already missing.
    AlreadyGone,
    /// No mirrored rkey was known, so only local references were removed.
    NotMirrored,
}

/// Successful result of one federated write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A record was created remotely.
    Created {
        uri: RemoteRecordRef,
        content_hash: ContentHash,
        /// Local id of an authored post, when its mirror row was written.
        local_post_id: Option<Uuid>,
    },
    /// A record (or its local references) was removed.
    Removed { remote: RemovalOutcome },
}

/// Orchestrates remote writes and their local mirror.
pub struct FederatedWriteAgent {
    sessions: Arc<SessionManager>,
    client: Arc<RemoteRepositoryClient>,
    mirror: Arc<dyn MirrorStore>,
    keys: Arc<RecordKeyGenerator>,
    clock: Arc<dyn Clock>,
}

impl FederatedWriteAgent {
    /// Wire the agent over its session, remote, mirror and key sources.
    pub fn new(
        sessions: Arc<SessionManager>,
        client: Arc<RemoteRepositoryClient>,
        mirror: Arc<dyn MirrorStore>,
        keys: Arc<RecordKeyGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            client,
            mirror,
            keys,
            clock,
        }
    }

    /// Validate and execute one intent.
    ///
    /// Validation failures return `InvalidIntent` before any session or
    /// network activity.
    pub async fn execute(&self, intent: &ActionIntent) -> Result<WriteOutcome, Error> {
        let action = intent.validate()?;
        self.execute_validated(&intent.owner_id, &action).await
    }

    /// Execute an already validated action for `owner_id`.
    pub async fn execute_validated(
        &self,
        owner_id: &OwnerId,
        action: &ValidatedAction,
    ) -> Result<WriteOutcome, Error> {
        let session = self.sessions.get_valid_session(owner_id).await?;
        info!(owner_id = %owner_id, kind = %action.kind(), "executing federated write");

        match action {
            ValidatedAction::Like(subject) => self.like(&session, subject).await,
            ValidatedAction::Repost(subject) => self.repost(&session, subject).await,
            ValidatedAction::Follow(actor) => self.follow(&session, actor).await,
            ValidatedAction::Unlike(subject) => self.unlike(&session, subject).await,
            ValidatedAction::Unrepost(subject) => self.unrepost(&session, subject).await,
            ValidatedAction::Unfollow(actor) => self.unfollow(&session, actor).await,
            ValidatedAction::Post { text } => self.post(&session, text).await,
            ValidatedAction::Reply { text, parent, root } => {
                self.reply(&session, text, parent, root).await
            }
            ValidatedAction::Quote { text, quoted } => self.quote(&session, text, quoted).await,
            ValidatedAction::Delete(uri) => self.delete_post(&session, uri).await,
        }
    }

    /// Resolve an optional local id, treating lookup failures as unknown.
    async fn resolve_local<F>(&self, what: &str, lookup: F) -> Option<Uuid>
    where
        F: std::future::Future<Output = Result<Option<Uuid>, MirrorStoreError>>,
    {
        match lookup.await {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, what, "local id lookup failed");
                None
            }
        }
    }
}

fn log_mirror_failure(operation: &str, uri: &str, err: &MirrorStoreError) {
    warn!(operation, uri, error = %err, "mirror write failed; remote write stands");
}
