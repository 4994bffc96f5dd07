//! Scripted remote repository.
//!
//! Each operation pops the next scripted result; when its script is empty the
//! call succeeds with a synthesised response. Calls are counted and recorded.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    CreateRecordRequest, CreatedRecord, RemoteRepository, RemoteRepositoryError,
};
use crate::domain::{
    AccessToken, ContentHash, Did, IssuedTokens, LoginCredentials, Nsid, RecordKey, RefreshToken,
    RemoteRecordRef, Session,
};

use super::lock;

type Script<T> = Mutex<VecDeque<Result<T, RemoteRepositoryError>>>;

/// Token pair for `did` with a numbered suffix.
pub fn issued_tokens(did: &str, generation: usize) -> IssuedTokens {
    let repository = match Did::new(did) {
        Ok(did) => did,
        Err(err) => panic!("fixture did must be valid: {err}"),
    };
    IssuedTokens {
        repository,
        handle: None,
        access_token: AccessToken::new(format!("access-{generation}")),
        refresh_token: RefreshToken::new(format!("refresh-{generation}")),
    }
}

pub struct ScriptedRemoteRepository {
    repository: String,
    sessions: Script<IssuedTokens>,
    refreshes: Script<IssuedTokens>,
    creates: Script<CreatedRecord>,
    deletes: Script<()>,
    refresh_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    created: Mutex<Vec<CreateRecordRequest>>,
    deleted: Mutex<Vec<(Nsid, RecordKey)>>,
    tokens_used: Mutex<Vec<String>>,
    refresh_delay: Option<Duration>,
    write_delay: Option<Duration>,
}

impl ScriptedRemoteRepository {
    /// Remote issuing tokens for the given repository DID.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            sessions: Mutex::default(),
            refreshes: Mutex::default(),
            creates: Mutex::default(),
            deletes: Mutex::default(),
            refresh_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            created: Mutex::default(),
            deleted: Mutex::default(),
            tokens_used: Mutex::default(),
            refresh_delay: None,
            write_delay: None,
        }
    }

    /// Hold every refresh for `delay` before answering.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Hold every create and delete for `delay` before answering.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn push_login(&self, result: Result<IssuedTokens, RemoteRepositoryError>) {
        lock(&self.sessions, "login script").push_back(result);
    }

    pub fn push_refresh(&self, result: Result<IssuedTokens, RemoteRepositoryError>) {
        lock(&self.refreshes, "refresh script").push_back(result);
    }

    pub fn push_create(&self, result: Result<CreatedRecord, RemoteRepositoryError>) {
        lock(&self.creates, "create script").push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), RemoteRepositoryError>) {
        lock(&self.deletes, "delete script").push_back(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn created_requests(&self) -> Vec<CreateRecordRequest> {
        lock(&self.created, "created log").clone()
    }

    pub fn deleted_keys(&self) -> Vec<(Nsid, RecordKey)> {
        lock(&self.deleted, "deleted log").clone()
    }

    /// Access tokens presented on create and delete calls, in order.
    pub fn access_tokens_used(&self) -> Vec<String> {
        lock(&self.tokens_used, "token log").clone()
    }

    fn pop<T>(script: &Script<T>, name: &str) -> Option<Result<T, RemoteRepositoryError>> {
        lock(script, name).pop_front()
    }

    async fn hold(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteRepository for ScriptedRemoteRepository {
    async fn create_session(
        &self,
        _credentials: &LoginCredentials,
    ) -> Result<IssuedTokens, RemoteRepositoryError> {
        Self::pop(&self.sessions, "login script")
            .unwrap_or_else(|| Ok(issued_tokens(&self.repository, 0)))
    }

    async fn refresh_session(
        &self,
        _refresh_token: &RefreshToken,
    ) -> Result<IssuedTokens, RemoteRepositoryError> {
        let generation = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Self::hold(self.refresh_delay).await;
        Self::pop(&self.refreshes, "refresh script")
            .unwrap_or_else(|| Ok(issued_tokens(&self.repository, generation)))
    }

    async fn create_record(
        &self,
        session: &Session,
        request: &CreateRecordRequest,
    ) -> Result<CreatedRecord, RemoteRepositoryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tokens_used, "token log").push(session.access_token.expose().to_owned());
        Self::hold(self.write_delay).await;
        let scripted = Self::pop(&self.creates, "create script");
        if !matches!(scripted, Some(Err(_))) {
            lock(&self.created, "created log").push(request.clone());
        }
        scripted.unwrap_or_else(|| {
            let uri = RemoteRecordRef::new(
                session.repository.clone(),
                request.collection.clone(),
                request.rkey.clone(),
            );
            let cid = ContentHash::new(format!("bafy{}", request.rkey))
                .map_err(|err| RemoteRepositoryError::decode(err.to_string()))?;
            Ok(CreatedRecord { uri, cid })
        })
    }

    async fn delete_record(
        &self,
        session: &Session,
        collection: &Nsid,
        rkey: &RecordKey,
    ) -> Result<(), RemoteRepositoryError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tokens_used, "token log").push(session.access_token.expose().to_owned());
        Self::hold(self.write_delay).await;
        let scripted = Self::pop(&self.deletes, "delete script").unwrap_or(Ok(()));
        if scripted.is_ok() {
            lock(&self.deleted, "deleted log").push((collection.clone(), rkey.clone()));
        }
        scripted
    }
}
