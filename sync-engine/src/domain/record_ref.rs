//! Addressing for remote records: collections, URIs, and strong references.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::{Did, IdentityValidationError, Nsid};
use super::record_key::{RecordKey, RecordKeyValidationError};

const URI_SCHEME: &str = "at://";

/// Collections this engine writes to and mirrors locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// `app.bsky.feed.like`
    Like,
    /// `app.bsky.feed.repost`
    Repost,
    /// `app.bsky.graph.follow`
    Follow,
    /// `app.bsky.feed.post`
    Post,
}

impl Collection {
    /// Every mirrored collection.
    pub const ALL: [Self; 4] = [Self::Like, Self::Repost, Self::Follow, Self::Post];

    /// Remote collection name.
    pub fn nsid_str(self) -> &'static str {
        match self {
            Self::Like => "app.bsky.feed.like",
            Self::Repost => "app.bsky.feed.repost",
            Self::Follow => "app.bsky.graph.follow",
            Self::Post => "app.bsky.feed.post",
        }
    }

    /// Remote collection name as a validated [`Nsid`].
    pub fn nsid(self) -> Nsid {
        match Nsid::new(self.nsid_str()) {
            Ok(nsid) => nsid,
            Err(err) => panic!("static collection names must be valid: {err}"),
        }
    }

    /// Match a remote collection name back to a known collection.
    pub fn from_nsid(nsid: &Nsid) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.nsid_str() == nsid.as_str())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nsid_str())
    }
}

/// Validation errors returned when parsing remote URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRefValidationError {
    MissingScheme,
    MissingSegment,
    Identity(IdentityValidationError),
    RecordKey(RecordKeyValidationError),
    EmptyContentHash,
}

impl fmt::Display for RecordRefValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme => write!(f, "record uri must start with `{URI_SCHEME}`"),
            Self::MissingSegment => {
                write!(f, "record uri must contain repository, collection and record key")
            }
            Self::Identity(err) => write!(f, "{err}"),
            Self::RecordKey(err) => write!(f, "{err}"),
            Self::EmptyContentHash => write!(f, "content hash must not be empty"),
        }
    }
}

impl std::error::Error for RecordRefValidationError {}

impl From<IdentityValidationError> for RecordRefValidationError {
    fn from(value: IdentityValidationError) -> Self {
        Self::Identity(value)
    }
}

impl From<RecordKeyValidationError> for RecordRefValidationError {
    fn from(value: RecordKeyValidationError) -> Self {
        Self::RecordKey(value)
    }
}

/// Globally addressable reference to one remote record.
///
/// Immutable once created; the only lifecycle event is deletion.
///
/// # Examples
/// ```
/// use sync_engine::domain::RemoteRecordRef;
///
/// let uri = "at://did:plc:abc123/app.bsky.feed.post/3jzfcijpj2z2a";
/// let record = RemoteRecordRef::parse(uri).expect("valid uri");
/// assert_eq!(record.rkey().as_str(), "3jzfcijpj2z2a");
/// assert_eq!(record.to_string(), uri);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteRecordRef {
    repository: Did,
    collection: Nsid,
    rkey: RecordKey,
}

impl RemoteRecordRef {
    /// Compose a reference from its parts.
    pub fn new(repository: Did, collection: Nsid, rkey: RecordKey) -> Self {
        Self {
            repository,
            collection,
            rkey,
        }
    }

    /// Parse an `at://<did>/<collection>/<rkey>` URI.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, RecordRefValidationError> {
        let rest = raw
            .as_ref()
            .strip_prefix(URI_SCHEME)
            .ok_or(RecordRefValidationError::MissingScheme)?;
        let mut segments = rest.split('/');
        let (Some(repository), Some(collection), Some(rkey), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(RecordRefValidationError::MissingSegment);
        };
        Ok(Self {
            repository: Did::new(repository)?,
            collection: Nsid::new(collection)?,
            rkey: RecordKey::parse(rkey)?,
        })
    }

    /// Repository (actor) holding the record.
    pub fn repository(&self) -> &Did {
        &self.repository
    }

    /// Collection the record lives in.
    pub fn collection(&self) -> &Nsid {
        &self.collection
    }

    /// Record key within the collection.
    pub fn rkey(&self) -> &RecordKey {
        &self.rkey
    }

    /// Whether the record lives in the given known collection.
    pub fn is_in(&self, collection: Collection) -> bool {
        self.collection.as_str() == collection.nsid_str()
    }
}

impl fmt::Display for RemoteRecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URI_SCHEME}{}/{}/{}",
            self.repository, self.collection, self.rkey
        )
    }
}

impl From<RemoteRecordRef> for String {
    fn from(value: RemoteRecordRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RemoteRecordRef {
    type Error = RecordRefValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Content hash (CID) of a specific record version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Validate and construct a [`ContentHash`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self, RecordRefValidationError> {
        Self::from_owned(raw.as_ref().to_owned())
    }

    fn from_owned(raw: String) -> Result<Self, RecordRefValidationError> {
        if raw.trim().is_empty() || raw.trim() != raw {
            return Err(RecordRefValidationError::EmptyContentHash);
        }
        Ok(Self(raw))
    }

    /// Borrow the hash as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = RecordRefValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Reference pinning both a record's URI and the exact version liked,
/// reposted, replied to, or quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrongRef {
    /// Record address.
    pub uri: RemoteRecordRef,
    /// Record version.
    pub cid: ContentHash,
}

/// Key identifying the subject of an action for mirror lookups, cache
/// matching, and per-subject serialisation: a record URI or an actor DID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&RemoteRecordRef> for SubjectKey {
    fn from(value: &RemoteRecordRef) -> Self {
        Self(value.to_string())
    }
}

impl From<&Did> for SubjectKey {
    fn from(value: &Did) -> Self {
        Self(value.as_str().to_owned())
    }
}

impl From<String> for SubjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
