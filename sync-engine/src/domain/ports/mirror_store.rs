//! Port for the local relational mirror of remote writes.
//!
//! Rows are keyed by `(owner_id, relation, subject)` and are also addressable
//! by remote URI. Posts additionally record thread linkage against local ids.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Collection, Did, MirrorRow, MirroredPost, OwnerId, RemoteRecordRef, SubjectKey,
};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by mirror store adapters.
    pub enum MirrorStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "mirror store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "mirror store query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Insert or update a like, repost, or follow row.
    async fn upsert(&self, row: &MirrorRow) -> Result<(), MirrorStoreError>;

    /// Insert or update an authored post with its linkage.
    async fn upsert_post(&self, post: &MirroredPost) -> Result<(), MirrorStoreError>;

    /// Find the owner's row for a subject within one relation.
    async fn find(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<Option<MirrorRow>, MirrorStoreError>;

    /// Hard-delete the owner's row for a subject. Returns whether a row existed.
    async fn delete(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<bool, MirrorStoreError>;

    /// Local id of a mirrored post by remote URI.
    async fn resolve_post_id(&self, uri: &RemoteRecordRef)
    -> Result<Option<Uuid>, MirrorStoreError>;

    /// Local id of a known actor by DID.
    async fn resolve_actor_id(&self, did: &Did) -> Result<Option<Uuid>, MirrorStoreError>;
}
