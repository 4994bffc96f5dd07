//! Reqwest-backed remote repository adapter.
//!
//! This adapter owns transport details only: request serialisation, bearer
//! headers, timeout and HTTP error mapping, and JSON decoding into domain
//! values. Re-authentication decisions stay in the domain client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::dto::{
    CreateRecordInput, CreateRecordOutput, CreateSessionInput, DeleteRecordInput, SessionOutput,
    XrpcErrorBody,
};
use crate::domain::ports::{
    CreateRecordRequest, CreatedRecord, RemoteRepository, RemoteRepositoryError,
};
use crate::domain::{IssuedTokens, LoginCredentials, Nsid, RecordKey, RefreshToken, Session};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const DELETE_RECORD: &str = "com.atproto.repo.deleteRecord";
const DEFAULT_USER_AGENT: &str = "sync-engine/0.1";

/// XRPC error names that mean the bearer token is no longer accepted.
const TOKEN_ERRORS: [&str; 3] = ["ExpiredToken", "InvalidToken", "AuthenticationRequired"];

/// Failure to build the adapter.
#[derive(Debug, thiserror::Error)]
pub enum XrpcSetupError {
    #[error("invalid service url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

struct Endpoints {
    create_session: Url,
    refresh_session: Url,
    create_record: Url,
    delete_record: Url,
}

impl Endpoints {
    fn new(service: &Url) -> Result<Self, url::ParseError> {
        let mut base = service.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let xrpc = base.join("xrpc/")?;
        Ok(Self {
            create_session: xrpc.join(CREATE_SESSION)?,
            refresh_session: xrpc.join(REFRESH_SESSION)?,
            create_record: xrpc.join(CREATE_RECORD)?,
            delete_record: xrpc.join(DELETE_RECORD)?,
        })
    }
}

/// Remote repository adapter that calls XRPC procedures on one service.
pub struct XrpcRemoteRepository {
    client: Client,
    endpoints: Endpoints,
}

impl XrpcRemoteRepository {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the service URL cannot host XRPC endpoints or the
    /// reqwest client cannot be constructed.
    pub fn new(service: &Url, timeout: Duration) -> Result<Self, XrpcSetupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoints: Endpoints::new(service)?,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, RemoteRepositoryError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn post_json<I: Serialize + Sync, O: DeserializeOwned>(
        &self,
        endpoint: &Url,
        bearer: Option<&str>,
        input: &I,
    ) -> Result<O, RemoteRepositoryError> {
        let mut request = self.client.post(endpoint.clone()).json(input);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let body = self.send(request).await?;
        decode(&body)
    }
}

#[async_trait]
impl RemoteRepository for XrpcRemoteRepository {
    async fn create_session(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IssuedTokens, RemoteRepositoryError> {
        let input = CreateSessionInput {
            identifier: credentials.identifier(),
            password: credentials.password(),
        };
        let output: SessionOutput = self
            .post_json(&self.endpoints.create_session, None, &input)
            .await?;
        output
            .into_issued_tokens()
            .map_err(RemoteRepositoryError::decode)
    }

    async fn refresh_session(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<IssuedTokens, RemoteRepositoryError> {
        let request = self
            .client
            .post(self.endpoints.refresh_session.clone())
            .bearer_auth(refresh_token.expose());
        let body = self.send(request).await?;
        let output: SessionOutput = decode(&body)?;
        output
            .into_issued_tokens()
            .map_err(RemoteRepositoryError::decode)
    }

    async fn create_record(
        &self,
        session: &Session,
        request: &CreateRecordRequest,
    ) -> Result<CreatedRecord, RemoteRepositoryError> {
        let input = CreateRecordInput {
            repo: session.repository.as_str(),
            collection: request.collection.as_str(),
            rkey: request.rkey.as_str(),
            record: &request.record,
        };
        let output: CreateRecordOutput = self
            .post_json(
                &self.endpoints.create_record,
                Some(session.access_token.expose()),
                &input,
            )
            .await?;
        debug!(collection = %request.collection, rkey = %request.rkey, "remote record created");
        output
            .into_created_record()
            .map_err(RemoteRepositoryError::decode)
    }

    async fn delete_record(
        &self,
        session: &Session,
        collection: &Nsid,
        rkey: &RecordKey,
    ) -> Result<(), RemoteRepositoryError> {
        let input = DeleteRecordInput {
            repo: session.repository.as_str(),
            collection: collection.as_str(),
            rkey: rkey.as_str(),
        };
        let request = self
            .client
            .post(self.endpoints.delete_record.clone())
            .bearer_auth(session.access_token.expose())
            .json(&input);
        self.send(request).await?;
        debug!(%collection, %rkey, "remote record deleted");
        Ok(())
    }
}

fn decode<O: DeserializeOwned>(body: &[u8]) -> Result<O, RemoteRepositoryError> {
    serde_json::from_slice(body).map_err(|error| {
        RemoteRepositoryError::decode(format!("invalid XRPC JSON payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> RemoteRepositoryError {
    RemoteRepositoryError::unreachable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> RemoteRepositoryError {
    let envelope: XrpcErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let error_name = envelope.error.as_deref().unwrap_or_default();
    let detail = match (&envelope.error, &envelope.message) {
        (Some(name), Some(message)) => format!("{name}: {message}"),
        (Some(name), None) => name.clone(),
        _ => body_preview(body),
    };
    let message = if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {detail}", status.as_u16())
    };

    match status {
        StatusCode::UNAUTHORIZED => RemoteRepositoryError::unauthorized(message),
        _ if TOKEN_ERRORS.contains(&error_name) => RemoteRepositoryError::unauthorized(message),
        StatusCode::NOT_FOUND => RemoteRepositoryError::not_found(message),
        _ if error_name == "RecordNotFound" => RemoteRepositoryError::not_found(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteRepositoryError::unreachable(message)
        }
        _ if status.is_client_error() => RemoteRepositoryError::rejected(message),
        _ => RemoteRepositoryError::unreachable(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for the non-network mapping helpers.

    use super::*;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Kind {
        Unauthorized,
        NotFound,
        Rejected,
        Unreachable,
    }

    fn kind(error: &RemoteRepositoryError) -> Kind {
        match error {
            RemoteRepositoryError::Unauthorized { .. } => Kind::Unauthorized,
            RemoteRepositoryError::NotFound { .. } => Kind::NotFound,
            RemoteRepositoryError::Rejected { .. } => Kind::Rejected,
            RemoteRepositoryError::Unreachable { .. } => Kind::Unreachable,
            RemoteRepositoryError::Decode { .. } => panic!("status errors never decode-fail"),
        }
    }

    #[rstest]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, "", Kind::Unauthorized)]
    #[case::expired_token(
        StatusCode::BAD_REQUEST,
        r#"{"error":"ExpiredToken","message":"Token has expired"}"#,
        Kind::Unauthorized
    )]
    #[case::invalid_token(
        StatusCode::BAD_REQUEST,
        r#"{"error":"InvalidToken"}"#,
        Kind::Unauthorized
    )]
    #[case::not_found(StatusCode::NOT_FOUND, "", Kind::NotFound)]
    #[case::record_not_found(
        StatusCode::BAD_REQUEST,
        r#"{"error":"RecordNotFound","message":"Could not locate record"}"#,
        Kind::NotFound
    )]
    #[case::invalid_record(
        StatusCode::BAD_REQUEST,
        r#"{"error":"InvalidRequest","message":"Record/text must not be longer than 300 graphemes"}"#,
        Kind::Rejected
    )]
    #[case::conflict(StatusCode::CONFLICT, "", Kind::Rejected)]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, "", Kind::Unreachable)]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, "", Kind::Unreachable)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, "<html>upstream</html>", Kind::Unreachable)]
    fn maps_http_statuses_to_port_errors(
        #[case] status: StatusCode,
        #[case] body: &str,
        #[case] expected: Kind,
    ) {
        let error = map_status_error(status, body.as_bytes());
        assert_eq!(kind(&error), expected, "unexpected mapping for {error}");
    }

    #[rstest]
    fn status_message_carries_xrpc_error_name() {
        let error = map_status_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":"InvalidSwap","message":"Record was at bafyold"}"#,
        );
        assert!(
            error.to_string().contains("InvalidSwap: Record was at bafyold"),
            "message should keep the XRPC error: {error}"
        );
    }

    #[rstest]
    #[case::bare_host("https://pds.example.test")]
    #[case::trailing_slash("https://pds.example.test/")]
    fn endpoints_are_rooted_at_xrpc(#[case] service: &str) {
        let service = Url::parse(service).expect("valid url");
        let endpoints = Endpoints::new(&service).expect("endpoints build");
        assert_eq!(
            endpoints.create_record.as_str(),
            "https://pds.example.test/xrpc/com.atproto.repo.createRecord"
        );
    }

    #[rstest]
    fn endpoints_keep_a_service_path_prefix() {
        let service = Url::parse("https://gateway.example.test/pds").expect("valid url");
        let endpoints = Endpoints::new(&service).expect("endpoints build");
        assert_eq!(
            endpoints.delete_record.as_str(),
            "https://gateway.example.test/pds/xrpc/com.atproto.repo.deleteRecord"
        );
    }

    #[rstest]
    fn undecodable_success_body_is_a_decode_error() {
        let error = decode::<CreateRecordOutput>(b"not json").expect_err("decode fails");
        assert!(matches!(error, RemoteRepositoryError::Decode { .. }));
    }
}
