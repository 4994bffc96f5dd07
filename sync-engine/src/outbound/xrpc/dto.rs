//! Wire shapes for the XRPC procedures used by the adapter.
//!
//! Requests serialise straight from borrowed domain values. Responses decode
//! into these DTOs first and are then validated into domain types.

use serde::{Deserialize, Serialize};

use crate::domain::ports::CreatedRecord;
use crate::domain::{
    AccessToken, ContentHash, Did, IssuedTokens, RecordBody, RefreshToken, RemoteRecordRef,
};

#[derive(Debug, Serialize)]
pub(super) struct CreateSessionInput<'a> {
    pub(super) identifier: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRecordInput<'a> {
    pub(super) repo: &'a str,
    pub(super) collection: &'a str,
    pub(super) rkey: &'a str,
    pub(super) record: &'a RecordBody,
}

#[derive(Debug, Serialize)]
pub(super) struct DeleteRecordInput<'a> {
    pub(super) repo: &'a str,
    pub(super) collection: &'a str,
    pub(super) rkey: &'a str,
}

/// Body of `createSession` and `refreshSession` responses.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionOutput {
    pub(super) did: String,
    pub(super) handle: Option<String>,
    pub(super) access_jwt: String,
    pub(super) refresh_jwt: String,
}

impl SessionOutput {
    pub(super) fn into_issued_tokens(self) -> Result<IssuedTokens, String> {
        let repository =
            Did::new(&self.did).map_err(|err| format!("invalid did {:?}: {err}", self.did))?;
        if self.access_jwt.is_empty() || self.refresh_jwt.is_empty() {
            return Err("session response carried an empty token".to_owned());
        }
        Ok(IssuedTokens {
            repository,
            handle: self.handle,
            access_token: AccessToken::new(self.access_jwt),
            refresh_token: RefreshToken::new(self.refresh_jwt),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateRecordOutput {
    pub(super) uri: String,
    pub(super) cid: String,
}

impl CreateRecordOutput {
    pub(super) fn into_created_record(self) -> Result<CreatedRecord, String> {
        let uri = RemoteRecordRef::parse(&self.uri)
            .map_err(|err| format!("invalid record uri {:?}: {err}", self.uri))?;
        let cid = ContentHash::new(&self.cid)
            .map_err(|err| format!("invalid record cid {:?}: {err}", self.cid))?;
        Ok(CreatedRecord { uri, cid })
    }
}

/// Error envelope returned by XRPC endpoints.
#[derive(Debug, Default, Deserialize)]
pub(super) struct XrpcErrorBody {
    pub(super) error: Option<String>,
    pub(super) message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn session_output_decodes_into_tokens() {
        let body = r#"{
            "did": "did:plc:alice",
            "handle": "alice.example.com",
            "accessJwt": "access",
            "refreshJwt": "refresh"
        }"#;
        let decoded: SessionOutput = serde_json::from_str(body).expect("json decodes");

        let tokens = decoded.into_issued_tokens().expect("tokens validate");
        assert_eq!(tokens.repository.as_str(), "did:plc:alice");
        assert_eq!(tokens.access_token.expose(), "access");
        assert_eq!(tokens.refresh_token.expose(), "refresh");
    }

    #[rstest]
    fn created_record_with_bad_uri_is_rejected() {
        let output = CreateRecordOutput {
            uri: "https://not-an-at-uri".to_owned(),
            cid: "bafyrecord".to_owned(),
        };
        assert!(output.into_created_record().is_err());
    }
}
