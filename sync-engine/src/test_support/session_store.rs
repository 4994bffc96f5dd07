//! In-memory session store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::ports::{SessionStore, SessionStoreError};
use crate::domain::{OwnerId, Session};

use super::lock;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<OwnerId, Session>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemorySessionStore {
    pub fn with_session(session: Session) -> Self {
        let store = Self::default();
        store.insert(session);
        store
    }

    pub fn insert(&self, session: Session) {
        lock(&self.sessions, "session store").insert(session.owner_id.clone(), session);
    }

    pub fn get(&self, owner_id: &OwnerId) -> Option<Session> {
        lock(&self.sessions, "session store").get(owner_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, owner_id: &OwnerId) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.get(owner_id))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SessionStoreError::query("session store unavailable"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(session.clone());
        Ok(())
    }

    async fn delete(&self, owner_id: &OwnerId) -> Result<(), SessionStoreError> {
        lock(&self.sessions, "session store").remove(owner_id);
        Ok(())
    }
}
