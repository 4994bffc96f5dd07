//! Session state for one authenticated local user.
//!
//! Token strings are held in zeroizing buffers, never appear in `Debug`
//! output, and are correlated in logs through a truncated SHA-256
//! fingerprint instead.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::identity::{Did, OwnerId};

/// Length of a token fingerprint in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 8;

fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..FINGERPRINT_BYTES])
}

macro_rules! define_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Zeroizing<String>);

        impl $name {
            /// Wrap a token string.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(Zeroizing::new(raw.into()))
            }

            /// Expose the raw token for an outbound request header.
            pub fn expose(&self) -> &str {
                self.0.as_str()
            }

            /// Truncated SHA-256 fingerprint, safe to log.
            pub fn fingerprint(&self) -> String {
                fingerprint(self.expose())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.fingerprint())
            }
        }
    };
}

define_token! {
    /// Short-lived bearer token authorising repository writes.
    AccessToken
}

define_token! {
    /// Long-lived token exchanged for a new access/refresh pair.
    RefreshToken
}

/// Token pair and identity issued by the remote repository on login or
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    /// Actor identity the tokens belong to.
    pub repository: Did,
    /// Handle reported by the remote, if any.
    pub handle: Option<String>,
    /// New access token.
    pub access_token: AccessToken,
    /// New refresh token.
    pub refresh_token: RefreshToken,
}

/// Bearer-token session for one local user.
///
/// Created on login, replaced wholesale on refresh, destroyed on logout or an
/// irrecoverable refresh failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Local user owning the session.
    pub owner_id: OwnerId,
    /// Remote repository (actor) the tokens authorise.
    pub repository: Did,
    /// Handle reported by the remote, if any.
    pub handle: Option<String>,
    /// Current access token.
    pub access_token: AccessToken,
    /// Current refresh token.
    pub refresh_token: RefreshToken,
    /// When the token pair was last issued.
    pub last_refreshed_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from freshly issued tokens.
    pub fn from_issued(owner_id: OwnerId, tokens: IssuedTokens, issued_at: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            repository: tokens.repository,
            handle: tokens.handle,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            last_refreshed_at: issued_at,
        }
    }

    /// Time elapsed since the token pair was issued. Negative spans (clock
    /// skew) count as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_refreshed_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the session has outlived the staleness window.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) >= threshold
    }
}

/// Validation errors for login payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Identifier was missing or blank once trimmed.
    EmptyIdentifier,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "identifier must not be empty"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated credentials exchanged for a first token pair.
///
/// ## Invariants
/// - `identifier` (handle, email, or DID) is trimmed and non-empty.
/// - `password` is non-empty and retains caller-provided whitespace.
///
/// # Examples
/// ```
/// use sync_engine::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts(" alice.example.com ", "app-password")
///     .expect("valid credentials");
/// assert_eq!(creds.identifier(), "alice.example.com");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    identifier: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw identifier/password inputs.
    pub fn try_from_parts(identifier: &str, password: &str) -> Result<Self, LoginValidationError> {
        let normalized = identifier.trim();
        if normalized.is_empty() {
            return Err(LoginValidationError::EmptyIdentifier);
        }
        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }

        Ok(Self {
            identifier: normalized.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Identifier sent to the remote repository.
    pub fn identifier(&self) -> &str {
        self.identifier.as_str()
    }

    /// Password sent to the remote repository.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}
