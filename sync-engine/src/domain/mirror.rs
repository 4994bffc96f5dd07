//! Local mirror rows recording the effect of successful remote writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::OwnerId;
use super::record_key::RecordKey;
use super::record_ref::{Collection, ContentHash, RemoteRecordRef, SubjectKey};

/// Mirrored like, repost, follow, or post.
///
/// Keyed by `(owner_id, relation, subject)`. `local_subject_id` is a weak
/// back-reference to a locally known post or actor and is only ever used for
/// querying; the subject may be purely external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub owner_id: OwnerId,
    pub relation: Collection,
    pub subject: SubjectKey,
    pub remote_uri: RemoteRecordRef,
    pub remote_content_hash: ContentHash,
    pub rkey: RecordKey,
    pub local_subject_id: Option<Uuid>,
    pub federated_at: DateTime<Utc>,
}

/// Remote URI of a linked post plus its local id when the mirror knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSubject {
    pub remote_uri: RemoteRecordRef,
    pub local_id: Option<Uuid>,
}

/// Thread and quote linkage of a mirrored post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadLinkage {
    pub reply_parent: Option<LinkedSubject>,
    pub reply_root: Option<LinkedSubject>,
    pub quoted: Option<LinkedSubject>,
}

/// Post authored by the owner, mirrored with its linkage.
///
/// The row's `subject` is the post's own URI, so a later delete finds it by
/// the same key it was written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredPost {
    pub local_id: Uuid,
    pub row: MirrorRow,
    pub text: String,
    pub linkage: ThreadLinkage,
}
