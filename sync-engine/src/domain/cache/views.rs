//! Cached view models shown by the client.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ContentHash, Did, RemoteRecordRef, SubjectKey};

/// Viewer state for a like, repost, or follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerMark {
    /// Applied locally, remote write not yet confirmed.
    Pending,
    /// Confirmed by the remote under this record.
    Confirmed(RemoteRecordRef),
}

impl ViewerMark {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Viewer-specific state of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostViewer {
    pub like: Option<ViewerMark>,
    pub repost: Option<ViewerMark>,
}

/// One post as shown in a feed or thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub uri: RemoteRecordRef,
    pub cid: ContentHash,
    pub author: Did,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_count: u64,
    pub quote_count: u64,
    pub viewer: PostViewer,
    /// Markers of replies applied locally and not yet confirmed.
    #[serde(default)]
    pub pending_replies: BTreeSet<Uuid>,
    /// Markers of quotes applied locally and not yet confirmed.
    #[serde(default)]
    pub pending_quotes: BTreeSet<Uuid>,
}

impl PostView {
    /// Post with zero counts and no viewer state.
    pub fn new(uri: RemoteRecordRef, cid: ContentHash) -> Self {
        let author = uri.repository().clone();
        Self {
            uri,
            cid,
            author,
            like_count: 0,
            repost_count: 0,
            reply_count: 0,
            quote_count: 0,
            viewer: PostViewer::default(),
            pending_replies: BTreeSet::new(),
            pending_quotes: BTreeSet::new(),
        }
    }
}

/// Viewer-specific state of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileViewer {
    pub following: Option<ViewerMark>,
}

/// One actor profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub did: Did,
    pub handle: Option<String>,
    pub followers_count: u64,
    pub viewer: ProfileViewer,
}

impl ProfileView {
    pub fn new(did: Did) -> Self {
        Self {
            did,
            handle: None,
            followers_count: 0,
            viewer: ProfileViewer::default(),
        }
    }
}

/// Any item held in a cached collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CachedView {
    Post(PostView),
    Profile(ProfileView),
}

impl CachedView {
    /// Key of the subject this view displays.
    pub fn subject_key(&self) -> SubjectKey {
        match self {
            Self::Post(post) => SubjectKey::from(&post.uri),
            Self::Profile(profile) => SubjectKey::from(&profile.did),
        }
    }

    /// Whether this view is the given post or profile.
    pub fn matches(&self, subject: &SubjectKey) -> bool {
        match self {
            Self::Post(post) => post.uri.to_string() == subject.as_str(),
            Self::Profile(profile) => profile.did.as_str() == subject.as_str(),
        }
    }
}
