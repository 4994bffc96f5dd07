//! Identity primitives: local owners and remote repository identities.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned by identity constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    EmptyOwnerId,
    InvalidOwnerId,
    EmptyDid,
    InvalidDid,
    InvalidNsid,
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyOwnerId => write!(f, "owner id must not be empty"),
            Self::InvalidOwnerId => write!(f, "owner id must be a valid UUID"),
            Self::EmptyDid => write!(f, "repository identity must not be empty"),
            Self::InvalidDid => write!(f, "repository identity must look like `did:<method>:<id>`"),
            Self::InvalidNsid => {
                write!(f, "collection name must be a dotted name with at least three segments")
            }
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Stable identifier of the local user owning a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(Uuid, String);

impl OwnerId {
    /// Validate and construct an [`OwnerId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Generate a new random [`OwnerId`].
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, uuid.to_string())
    }

    fn from_owned(id: String) -> Result<Self, IdentityValidationError> {
        if id.is_empty() {
            return Err(IdentityValidationError::EmptyOwnerId);
        }
        if id.trim() != id {
            return Err(IdentityValidationError::InvalidOwnerId);
        }

        let parsed = Uuid::parse_str(&id).map_err(|_| IdentityValidationError::InvalidOwnerId)?;
        Ok(Self(parsed, id))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        let OwnerId(_, raw) = value;
        raw
    }
}

impl TryFrom<String> for OwnerId {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Stable actor identity of a remote repository (`did:<method>:<id>`).
///
/// # Examples
/// ```
/// use sync_engine::domain::Did;
///
/// let did = Did::new("did:plc:ewvi7nxzyoun6zhxrhs64oiz").expect("valid did");
/// assert_eq!(did.method(), "plc");
/// assert!(Did::new("plc:missing-scheme").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Validate and construct a [`Did`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(raw.as_ref().to_owned())
    }

    fn from_owned(raw: String) -> Result<Self, IdentityValidationError> {
        if raw.is_empty() {
            return Err(IdentityValidationError::EmptyDid);
        }
        let mut parts = raw.splitn(3, ':');
        let scheme = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        let identifier = parts.next().unwrap_or_default();
        let method_ok = !method.is_empty() && method.bytes().all(|b| b.is_ascii_lowercase());
        let identifier_ok = !identifier.is_empty()
            && !identifier.ends_with(':')
            && identifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '%' | '-'));
        if scheme != "did" || !method_ok || !identifier_ok {
            return Err(IdentityValidationError::InvalidDid);
        }
        Ok(Self(raw))
    }

    /// DID method segment, e.g. `plc` or `web`.
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Borrow the DID as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Did> for String {
    fn from(value: Did) -> Self {
        value.0
    }
}

impl TryFrom<String> for Did {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Namespaced identifier naming a remote collection (e.g. `app.bsky.feed.like`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nsid(String);

impl Nsid {
    /// Validate and construct an [`Nsid`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(raw.as_ref().to_owned())
    }

    fn from_owned(raw: String) -> Result<Self, IdentityValidationError> {
        let segments: Vec<&str> = raw.split('.').collect();
        let valid = segments.len() >= 3
            && segments.iter().all(|segment| {
                !segment.is_empty()
                    && segment.len() <= 63
                    && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid {
            return Err(IdentityValidationError::InvalidNsid);
        }
        Ok(Self(raw))
    }

    /// Borrow the NSID as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Nsid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Nsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Nsid> for String {
    fn from(value: Nsid) -> Self {
        value.0
    }
}

impl TryFrom<String> for Nsid {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("did:plc:ewvi7nxzyoun6zhxrhs64oiz")]
    #[case("did:web:example.com")]
    #[case("did:web:localhost%3A8080")]
    fn accepts_well_formed_dids(#[case] raw: &str) {
        let did = Did::new(raw).expect("valid did");
        assert_eq!(did.as_str(), raw);
    }

    #[rstest]
    #[case("", IdentityValidationError::EmptyDid)]
    #[case("did:plc", IdentityValidationError::InvalidDid)]
    #[case("did:PLC:abc", IdentityValidationError::InvalidDid)]
    #[case("dad:plc:abc", IdentityValidationError::InvalidDid)]
    #[case("did:plc:abc:", IdentityValidationError::InvalidDid)]
    fn rejects_malformed_dids(#[case] raw: &str, #[case] expected: IdentityValidationError) {
        assert_eq!(Did::new(raw), Err(expected));
    }

    #[rstest]
    #[case("app.bsky.feed.like", true)]
    #[case("app.bsky", false)]
    #[case("app..feed", false)]
    #[case("app.bsky.feed/like", false)]
    fn nsid_validation(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(Nsid::new(raw).is_ok(), valid);
    }

    #[rstest]
    fn owner_id_round_trips_through_serde() {
        let owner = OwnerId::random();
        let json = serde_json::to_string(&owner).expect("serialise owner");
        let decoded: OwnerId = serde_json::from_str(&json).expect("deserialise owner");
        assert_eq!(decoded, owner);
    }

    #[rstest]
    fn owner_id_rejects_padded_input() {
        let padded = format!(" {}", uuid::Uuid::new_v4());
        assert_eq!(OwnerId::new(padded), Err(IdentityValidationError::InvalidOwnerId));
    }
}
