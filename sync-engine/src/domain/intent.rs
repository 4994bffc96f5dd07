//! Action intents: the transient request describing one user action.
//!
//! Intents arrive loosely shaped from the UI layer. [`ActionIntent::validate`]
//! checks the fields each kind requires and yields a [`ValidatedAction`]
//! before any network call is attempted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::Error;
use super::identity::{Did, OwnerId};
use super::record_ref::{Collection, ContentHash, RemoteRecordRef, StrongRef, SubjectKey};

/// Maximum post text length in characters.
pub const MAX_POST_CHARS: usize = 300;

/// Kind of social action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Like,
    Unlike,
    Repost,
    Unrepost,
    Follow,
    Unfollow,
    Post,
    Reply,
    Quote,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Repost => "repost",
            Self::Unrepost => "unrepost",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Post => "post",
            Self::Reply => "reply",
            Self::Quote => "quote",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Loosely-typed subject reference as supplied by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDraft {
    /// Record URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// Record content hash.
    #[serde(default)]
    pub cid: Option<String>,
}

impl SubjectDraft {
    /// Draft with both fields set.
    pub fn strong(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            cid: Some(cid.into()),
        }
    }

    /// Draft naming only a URI.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            cid: None,
        }
    }
}

/// Reply linkage as supplied by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    /// Post being replied to directly.
    #[serde(default)]
    pub parent: Option<SubjectDraft>,
    /// Root post of the thread.
    #[serde(default)]
    pub root: Option<SubjectDraft>,
}

/// Request describing one user action. Lives only for the duration of the
/// write; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionIntent {
    /// Local user performing the action.
    pub owner_id: OwnerId,
    /// Kind of action.
    pub kind: ActionKind,
    /// Record acted upon (like, repost, their inverses, delete).
    #[serde(default)]
    pub subject: Option<SubjectDraft>,
    /// Actor acted upon (follow, unfollow).
    #[serde(default)]
    pub actor: Option<String>,
    /// Post text (post, reply, quote).
    #[serde(default)]
    pub text: Option<String>,
    /// Thread linkage (reply).
    #[serde(default)]
    pub reply: Option<ReplyDraft>,
    /// Quoted record (quote).
    #[serde(default)]
    pub quote: Option<SubjectDraft>,
}

impl ActionIntent {
    /// Empty intent of the given kind; populate with the builder methods.
    pub fn new(owner_id: OwnerId, kind: ActionKind) -> Self {
        Self {
            owner_id,
            kind,
            subject: None,
            actor: None,
            text: None,
            reply: None,
            quote: None,
        }
    }

    /// Attach a subject record.
    pub fn with_subject(mut self, subject: SubjectDraft) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attach a subject actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attach post text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach reply linkage.
    pub fn with_reply(mut self, parent: SubjectDraft, root: SubjectDraft) -> Self {
        self.reply = Some(ReplyDraft {
            parent: Some(parent),
            root: Some(root),
        });
        self
    }

    /// Attach a quoted record.
    pub fn with_quote(mut self, quoted: SubjectDraft) -> Self {
        self.quote = Some(quoted);
        self
    }

    /// Check the fields this kind requires.
    ///
    /// # Examples
    /// ```
    /// use sync_engine::domain::{ActionIntent, ActionKind, OwnerId, SubjectDraft};
    ///
    /// let intent = ActionIntent::new(OwnerId::random(), ActionKind::Like)
    ///     .with_subject(SubjectDraft::uri("at://did:plc:bob/app.bsky.feed.post/3k"));
    /// // Likes pin a content hash as well as a URI.
    /// assert!(intent.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<ValidatedAction, IntentValidationError> {
        match self.kind {
            ActionKind::Like => Ok(ValidatedAction::Like(strong_ref(
                self.subject.as_ref(),
                "subject",
            )?)),
            ActionKind::Repost => Ok(ValidatedAction::Repost(strong_ref(
                self.subject.as_ref(),
                "subject",
            )?)),
            ActionKind::Unlike => Ok(ValidatedAction::Unlike(record_uri(
                self.subject.as_ref(),
                "subject",
            )?)),
            ActionKind::Unrepost => Ok(ValidatedAction::Unrepost(record_uri(
                self.subject.as_ref(),
                "subject",
            )?)),
            ActionKind::Follow => Ok(ValidatedAction::Follow(actor(self.actor.as_deref())?)),
            ActionKind::Unfollow => Ok(ValidatedAction::Unfollow(actor(self.actor.as_deref())?)),
            ActionKind::Post => Ok(ValidatedAction::Post {
                text: post_text(self.text.as_deref(), false)?,
            }),
            ActionKind::Reply => {
                let reply = self
                    .reply
                    .as_ref()
                    .ok_or(IntentValidationError::MissingField { field: "reply" })?;
                Ok(ValidatedAction::Reply {
                    text: post_text(self.text.as_deref(), false)?,
                    parent: strong_ref(reply.parent.as_ref(), "reply.parent")?,
                    root: strong_ref(reply.root.as_ref(), "reply.root")?,
                })
            }
            ActionKind::Quote => Ok(ValidatedAction::Quote {
                text: post_text(self.text.as_deref(), true)?,
                quoted: strong_ref(self.quote.as_ref(), "quote")?,
            }),
            ActionKind::Delete => {
                let uri = record_uri(self.subject.as_ref(), "subject")?;
                if !uri.is_in(Collection::Post) {
                    return Err(IntentValidationError::InvalidField {
                        field: "subject.uri",
                        reason: "only posts can be deleted".to_owned(),
                    });
                }
                Ok(ValidatedAction::Delete(uri))
            }
        }
    }
}

fn record_uri(
    draft: Option<&SubjectDraft>,
    field: &'static str,
) -> Result<RemoteRecordRef, IntentValidationError> {
    let raw = draft
        .and_then(|d| d.uri.as_deref())
        .ok_or(IntentValidationError::MissingField { field })?;
    RemoteRecordRef::parse(raw).map_err(|err| IntentValidationError::InvalidField {
        field,
        reason: err.to_string(),
    })
}

fn strong_ref(
    draft: Option<&SubjectDraft>,
    field: &'static str,
) -> Result<StrongRef, IntentValidationError> {
    let uri = record_uri(draft, field)?;
    let raw_cid = draft
        .and_then(|d| d.cid.as_deref())
        .ok_or(IntentValidationError::MissingField { field })?;
    let cid = ContentHash::new(raw_cid).map_err(|err| IntentValidationError::InvalidField {
        field,
        reason: err.to_string(),
    })?;
    Ok(StrongRef { uri, cid })
}

fn actor(raw: Option<&str>) -> Result<Did, IntentValidationError> {
    let raw = raw.ok_or(IntentValidationError::MissingField { field: "actor" })?;
    Did::new(raw).map_err(|err| IntentValidationError::InvalidField {
        field: "actor",
        reason: err.to_string(),
    })
}

fn post_text(raw: Option<&str>, allow_blank: bool) -> Result<String, IntentValidationError> {
    let text = match raw {
        Some(text) => text,
        None if allow_blank => "",
        None => return Err(IntentValidationError::MissingField { field: "text" }),
    };
    if !allow_blank && text.trim().is_empty() {
        return Err(IntentValidationError::BlankText);
    }
    if text.chars().count() > MAX_POST_CHARS {
        return Err(IntentValidationError::TextTooLong {
            max: MAX_POST_CHARS,
        });
    }
    Ok(text.to_owned())
}

/// Reasons an intent fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentValidationError {
    /// The action kind needs a field the intent did not carry.
    MissingField { field: &'static str },
    /// A field was present but malformed.
    InvalidField { field: &'static str, reason: String },
    /// Post text was empty or only whitespace.
    BlankText,
    /// Post text exceeded [`MAX_POST_CHARS`] characters.
    TextTooLong { max: usize },
}

impl IntentValidationError {
    fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => field,
            Self::BlankText | Self::TextTooLong { .. } => "text",
        }
    }
}

impl fmt::Display for IntentValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required field `{field}`"),
            Self::InvalidField { field, reason } => write!(f, "invalid `{field}`: {reason}"),
            Self::BlankText => write!(f, "post text must not be blank"),
            Self::TextTooLong { max } => write!(f, "post text must be at most {max} characters"),
        }
    }
}

impl std::error::Error for IntentValidationError {}

impl From<IntentValidationError> for Error {
    fn from(value: IntentValidationError) -> Self {
        Error::invalid_intent(value.to_string()).with_details(json!({ "field": value.field() }))
    }
}

/// An intent whose required fields are present and well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    Like(StrongRef),
    Unlike(RemoteRecordRef),
    Repost(StrongRef),
    Unrepost(RemoteRecordRef),
    Follow(Did),
    Unfollow(Did),
    Post {
        text: String,
    },
    Reply {
        text: String,
        parent: StrongRef,
        root: StrongRef,
    },
    Quote {
        text: String,
        quoted: StrongRef,
    },
    Delete(RemoteRecordRef),
}

impl ValidatedAction {
    /// Kind of the original intent.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Like(_) => ActionKind::Like,
            Self::Unlike(_) => ActionKind::Unlike,
            Self::Repost(_) => ActionKind::Repost,
            Self::Unrepost(_) => ActionKind::Unrepost,
            Self::Follow(_) => ActionKind::Follow,
            Self::Unfollow(_) => ActionKind::Unfollow,
            Self::Post { .. } => ActionKind::Post,
            Self::Reply { .. } => ActionKind::Reply,
            Self::Quote { .. } => ActionKind::Quote,
            Self::Delete(_) => ActionKind::Delete,
        }
    }

    /// Subject whose cached views the action touches, if any.
    pub fn subject_key(&self) -> Option<SubjectKey> {
        match self {
            Self::Like(subject) | Self::Repost(subject) => Some(SubjectKey::from(&subject.uri)),
            Self::Unlike(uri) | Self::Unrepost(uri) | Self::Delete(uri) => {
                Some(SubjectKey::from(uri))
            }
            Self::Follow(did) | Self::Unfollow(did) => Some(SubjectKey::from(did)),
            Self::Reply { parent, .. } => Some(SubjectKey::from(&parent.uri)),
            Self::Quote { quoted, .. } => Some(SubjectKey::from(&quoted.uri)),
            Self::Post { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    const POST_URI: &str = "at://did:plc:bob/app.bsky.feed.post/3jzfcijpj2z2a";
    const ROOT_URI: &str = "at://did:plc:carol/app.bsky.feed.post/3jzfcijpj2z2b";

    fn intent(kind: ActionKind) -> ActionIntent {
        ActionIntent::new(OwnerId::random(), kind)
    }

    #[rstest]
    fn like_requires_subject_and_content_hash() {
        let missing = intent(ActionKind::Like).validate();
        assert_eq!(
            missing,
            Err(IntentValidationError::MissingField { field: "subject" })
        );

        let uri_only = intent(ActionKind::Like)
            .with_subject(SubjectDraft::uri(POST_URI))
            .validate();
        assert_eq!(
            uri_only,
            Err(IntentValidationError::MissingField { field: "subject" })
        );

        let valid = intent(ActionKind::Like)
            .with_subject(SubjectDraft::strong(POST_URI, "bafycid"))
            .validate()
            .expect("like validates");
        assert_eq!(valid.kind(), ActionKind::Like);
    }

    #[rstest]
    fn unlike_needs_only_the_subject_uri() {
        let action = intent(ActionKind::Unlike)
            .with_subject(SubjectDraft::uri(POST_URI))
            .validate()
            .expect("unlike validates");
        assert_eq!(
            action.subject_key().map(|k| k.as_str().to_owned()),
            Some(POST_URI.to_owned())
        );
    }

    #[rstest]
    fn follow_requires_a_valid_did() {
        let invalid = intent(ActionKind::Follow).with_actor("bob.test").validate();
        assert!(matches!(
            invalid,
            Err(IntentValidationError::InvalidField { field: "actor", .. })
        ));
    }

    #[rstest]
    fn reply_requires_parent_and_root() {
        let mut partial = intent(ActionKind::Reply).with_text("hi");
        partial.reply = Some(ReplyDraft {
            parent: Some(SubjectDraft::strong(POST_URI, "bafyparent")),
            root: None,
        });
        assert_eq!(
            partial.validate(),
            Err(IntentValidationError::MissingField {
                field: "reply.root"
            })
        );

        let complete = intent(ActionKind::Reply)
            .with_text("hi")
            .with_reply(
                SubjectDraft::strong(POST_URI, "bafyparent"),
                SubjectDraft::strong(ROOT_URI, "bafyroot"),
            )
            .validate()
            .expect("reply validates");
        assert_eq!(
            complete.subject_key().map(|k| k.as_str().to_owned()),
            Some(POST_URI.to_owned())
        );
    }

    #[rstest]
    #[case::blank(Some("   "), IntentValidationError::BlankText)]
    #[case::missing(None, IntentValidationError::MissingField { field: "text" })]
    fn post_text_must_be_present(
        #[case] text: Option<&str>,
        #[case] expected: IntentValidationError,
    ) {
        let mut post = intent(ActionKind::Post);
        post.text = text.map(str::to_owned);
        assert_eq!(post.validate(), Err(expected));
    }

    #[rstest]
    fn overlong_text_is_rejected() {
        let text = "a".repeat(MAX_POST_CHARS + 1);
        let result = intent(ActionKind::Post).with_text(text).validate();
        assert_eq!(
            result,
            Err(IntentValidationError::TextTooLong {
                max: MAX_POST_CHARS
            })
        );
    }

    #[rstest]
    fn quote_allows_blank_text() {
        let action = intent(ActionKind::Quote)
            .with_quote(SubjectDraft::strong(POST_URI, "bafyquoted"))
            .validate()
            .expect("quote validates");
        assert!(matches!(action, ValidatedAction::Quote { ref text, .. } if text.is_empty()));
    }

    #[rstest]
    fn delete_only_accepts_posts() {
        let result = intent(ActionKind::Delete)
            .with_subject(SubjectDraft::uri(
                "at://did:plc:bob/app.bsky.feed.like/3jzfcijpj2z2a",
            ))
            .validate();
        assert!(matches!(
            result,
            Err(IntentValidationError::InvalidField {
                field: "subject.uri",
                ..
            })
        ));
    }

    #[rstest]
    fn validation_errors_map_to_invalid_intent() {
        let error: Error = IntentValidationError::MissingField { field: "actor" }.into();
        assert_eq!(error.code(), ErrorCode::InvalidIntent);
        assert_eq!(
            error.details(),
            Some(&serde_json::json!({ "field": "actor" }))
        );
    }

    #[rstest]
    fn intents_deserialise_from_camel_case_json() {
        let owner = OwnerId::random();
        let raw = serde_json::json!({
            "ownerId": owner.to_string(),
            "kind": "like",
            "subject": { "uri": POST_URI, "cid": "bafycid" }
        });
        let intent: ActionIntent = serde_json::from_value(raw).expect("intent decodes");
        assert_eq!(intent.kind, ActionKind::Like);
        assert!(intent.validate().is_ok());
    }
}
