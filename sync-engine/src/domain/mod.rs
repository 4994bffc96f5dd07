//! Domain primitives, ports, and services.
//!
//! Purpose: model user intents, remote record references, sessions and the
//! local mirror, and orchestrate federated writes behind the port traits in
//! [`ports`]. Adapters live in `crate::outbound`.
//!
//! Public surface:
//! - [`SocialActionService`] runs one user action through the optimistic
//!   cache and the [`FederatedWriteAgent`].
//! - [`SessionManager`] owns per-user sessions and their renewal.
//! - [`RemoteRepositoryClient`] wraps remote writes with one re-auth retry.
//! - [`Error`] and [`ErrorCode`] are the failure taxonomy shown to callers.

pub mod cache;
pub mod error;
pub mod identity;
pub mod intent;
pub mod mirror;
pub mod ports;
pub mod record_key;
pub mod record_ref;
pub mod records;
pub mod repository_client;
pub mod session;
pub mod session_manager;
pub mod social_actions;
pub mod write_agent;

pub use self::error::{Error, ErrorCode, ErrorValidationError, UserNotice};
pub use self::identity::{Did, IdentityValidationError, Nsid, OwnerId};
pub use self::intent::{
    ActionIntent, ActionKind, IntentValidationError, MAX_POST_CHARS, ReplyDraft, SubjectDraft,
    ValidatedAction,
};
pub use self::mirror::{LinkedSubject, MirrorRow, MirroredPost, ThreadLinkage};
pub use self::record_key::{RecordKey, RecordKeyGenerator, RecordKeyValidationError};
pub use self::record_ref::{
    Collection, ContentHash, RecordRefValidationError, RemoteRecordRef, StrongRef, SubjectKey,
};
pub use self::records::{
    EmbedRecordBody, FollowRecord, PostRecord, RecordBody, ReplyRefBody, StrongRefBody,
    SubjectRecord,
};
pub use self::repository_client::{DeleteOutcome, RemoteRepositoryClient};
pub use self::session::{
    AccessToken, IssuedTokens, LoginCredentials, LoginValidationError, RefreshToken, Session,
};
pub use self::session_manager::{SessionError, SessionManager, SessionManagerConfig};
pub use self::social_actions::{ActionReport, SocialActionService};
pub use self::write_agent::{FederatedWriteAgent, RemovalOutcome, WriteOutcome};
