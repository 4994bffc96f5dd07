//! Remote record bodies written to the user's repository.
//!
//! Each body serialises to the lexicon JSON shape the remote expects,
//! including the `$type` discriminator and an RFC 3339 `createdAt`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Did;
use super::record_ref::{Collection, StrongRef};

const EMBED_RECORD_TYPE: &str = "app.bsky.embed.record";

fn created_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{ uri, cid }` pair as it appears inside record bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRefBody {
    pub uri: String,
    pub cid: String,
}

impl From<&StrongRef> for StrongRefBody {
    fn from(value: &StrongRef) -> Self {
        Self {
            uri: value.uri.to_string(),
            cid: value.cid.to_string(),
        }
    }
}

/// Like or repost body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub subject: StrongRefBody,
    pub created_at: String,
}

/// Follow body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub subject: String,
    pub created_at: String,
}

/// Reply linkage inside a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRefBody {
    pub root: StrongRefBody,
    pub parent: StrongRefBody,
}

/// Embedded record (quote) inside a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRecordBody {
    #[serde(rename = "$type")]
    pub embed_type: String,
    pub record: StrongRefBody,
}

/// Post body; replies carry `reply`, quotes carry `embed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reply: Option<ReplyRefBody>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embed: Option<EmbedRecordBody>,
    pub created_at: String,
}

/// Any record body this engine writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordBody {
    Subject(SubjectRecord),
    Follow(FollowRecord),
    Post(PostRecord),
}

impl RecordBody {
    /// Like of a specific record version.
    pub fn like(subject: &StrongRef, at: DateTime<Utc>) -> Self {
        Self::subject(Collection::Like, subject, at)
    }

    /// Repost of a specific record version.
    pub fn repost(subject: &StrongRef, at: DateTime<Utc>) -> Self {
        Self::subject(Collection::Repost, subject, at)
    }

    fn subject(collection: Collection, subject: &StrongRef, at: DateTime<Utc>) -> Self {
        Self::Subject(SubjectRecord {
            record_type: collection.nsid_str().to_owned(),
            subject: subject.into(),
            created_at: created_at(at),
        })
    }

    /// Follow of an actor.
    pub fn follow(actor: &Did, at: DateTime<Utc>) -> Self {
        Self::Follow(FollowRecord {
            record_type: Collection::Follow.nsid_str().to_owned(),
            subject: actor.to_string(),
            created_at: created_at(at),
        })
    }

    /// Top-level post.
    pub fn post(text: &str, at: DateTime<Utc>) -> Self {
        Self::Post(PostRecord {
            record_type: Collection::Post.nsid_str().to_owned(),
            text: text.to_owned(),
            reply: None,
            embed: None,
            created_at: created_at(at),
        })
    }

    /// Reply within a thread.
    pub fn reply(text: &str, parent: &StrongRef, root: &StrongRef, at: DateTime<Utc>) -> Self {
        Self::Post(PostRecord {
            record_type: Collection::Post.nsid_str().to_owned(),
            text: text.to_owned(),
            reply: Some(ReplyRefBody {
                root: root.into(),
                parent: parent.into(),
            }),
            embed: None,
            created_at: created_at(at),
        })
    }

    /// Post embedding another record.
    pub fn quote(text: &str, quoted: &StrongRef, at: DateTime<Utc>) -> Self {
        Self::Post(PostRecord {
            record_type: Collection::Post.nsid_str().to_owned(),
            text: text.to_owned(),
            reply: None,
            embed: Some(EmbedRecordBody {
                embed_type: EMBED_RECORD_TYPE.to_owned(),
                record: quoted.into(),
            }),
            created_at: created_at(at),
        })
    }

    /// `$type` discriminator of the body.
    pub fn record_type(&self) -> &str {
        match self {
            Self::Subject(body) => &body.record_type,
            Self::Follow(body) => &body.record_type,
            Self::Post(body) => &body.record_type,
        }
    }
}
