//! Driven port for the remote authoritative repository.
//!
//! The domain owns the request and response shapes; adapters translate
//! transport failures into [`RemoteRepositoryError`] variants so the
//! repository client can decide between re-authentication, idempotent
//! success, and surfacing a failure.

use async_trait::async_trait;

use crate::domain::{
    ContentHash, IssuedTokens, LoginCredentials, Nsid, RecordBody, RecordKey, RefreshToken,
    RemoteRecordRef, Session,
};

use super::define_port_error;

/// Request to create one record in the session owner's repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRecordRequest {
    /// Target collection.
    pub collection: Nsid,
    /// Key the record is written under.
    pub rkey: RecordKey,
    /// Record body.
    pub record: RecordBody,
}

/// Address and version of a record the remote accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecord {
    pub uri: RemoteRecordRef,
    pub cid: ContentHash,
}

define_port_error! {
    /// Failures surfaced by remote repository adapters.
    pub enum RemoteRepositoryError {
        /// Bearer token expired or was rejected.
        Unauthorized { message: String } =>
            "remote repository rejected credentials: {message}",
        /// Request was structurally invalid (including rkey collisions).
        Rejected { message: String } =>
            "remote repository rejected request: {message}",
        /// Record does not exist remotely.
        NotFound { message: String } =>
            "remote record not found: {message}",
        /// Host could not be reached, timed out, or failed transiently.
        Unreachable { message: String } =>
            "remote repository unreachable: {message}",
        /// Success response could not be decoded.
        Decode { message: String } =>
            "remote repository response could not be decoded: {message}",
    }
}

/// RPC surface of the remote repository consumed by this engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Exchange credentials for a first token pair.
    async fn create_session(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IssuedTokens, RemoteRepositoryError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_session(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<IssuedTokens, RemoteRepositoryError>;

    /// Create a record in the session owner's repository.
    async fn create_record(
        &self,
        session: &Session,
        request: &CreateRecordRequest,
    ) -> Result<CreatedRecord, RemoteRepositoryError>;

    /// Delete a record from the session owner's repository.
    async fn delete_record(
        &self,
        session: &Session,
        collection: &Nsid,
        rkey: &RecordKey,
    ) -> Result<(), RemoteRepositoryError>;
}
