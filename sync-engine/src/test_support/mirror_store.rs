//! In-memory mirror store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ports::{MirrorStore, MirrorStoreError};
use crate::domain::{
    Collection, Did, MirrorRow, MirroredPost, OwnerId, RemoteRecordRef, SubjectKey,
};

use super::lock;

type RowKey = (OwnerId, Collection, SubjectKey);

/// Mirror store backed by hash maps, with switches for injecting failures.
#[derive(Default)]
pub struct InMemoryMirrorStore {
    rows: Mutex<HashMap<RowKey, MirrorRow>>,
    posts: Mutex<HashMap<String, MirroredPost>>,
    known_posts: Mutex<HashMap<String, Uuid>>,
    actors: Mutex<HashMap<Did, Uuid>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryMirrorStore {
    pub fn insert_row(&self, row: MirrorRow) {
        let key = (row.owner_id.clone(), row.relation, row.subject.clone());
        lock(&self.rows, "mirror rows").insert(key, row);
    }

    pub fn row(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Option<MirrorRow> {
        if relation == Collection::Post {
            return self.post(subject.as_str()).map(|post| post.row);
        }
        lock(&self.rows, "mirror rows")
            .get(&(owner_id.clone(), relation, subject.clone()))
            .cloned()
    }

    pub fn row_count(&self) -> usize {
        lock(&self.rows, "mirror rows").len() + lock(&self.posts, "mirror posts").len()
    }

    pub fn insert_post(&self, post: MirroredPost) {
        lock(&self.posts, "mirror posts").insert(post.row.remote_uri.to_string(), post);
    }

    pub fn post(&self, uri: &str) -> Option<MirroredPost> {
        lock(&self.posts, "mirror posts").get(uri).cloned()
    }

    /// Register a locally known post not authored through this engine.
    pub fn register_post(&self, uri: &RemoteRecordRef, local_id: Uuid) {
        lock(&self.known_posts, "known posts").insert(uri.to_string(), local_id);
    }

    pub fn register_actor(&self, did: Did, local_id: Uuid) {
        lock(&self.actors, "actors").insert(did, local_id);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), MirrorStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MirrorStoreError::connection("mirror store offline"));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), MirrorStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MirrorStoreError::connection("mirror store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn upsert(&self, row: &MirrorRow) -> Result<(), MirrorStoreError> {
        self.check_write()?;
        self.insert_row(row.clone());
        Ok(())
    }

    async fn upsert_post(&self, post: &MirroredPost) -> Result<(), MirrorStoreError> {
        self.check_write()?;
        self.insert_post(post.clone());
        Ok(())
    }

    async fn find(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<Option<MirrorRow>, MirrorStoreError> {
        self.check_read()?;
        Ok(self
            .row(owner_id, relation, subject)
            .filter(|row| &row.owner_id == owner_id))
    }

    async fn delete(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<bool, MirrorStoreError> {
        self.check_write()?;
        if relation == Collection::Post {
            let mut posts = lock(&self.posts, "mirror posts");
            let owned = posts
                .get(subject.as_str())
                .is_some_and(|post| &post.row.owner_id == owner_id);
            return Ok(owned && posts.remove(subject.as_str()).is_some());
        }
        Ok(lock(&self.rows, "mirror rows")
            .remove(&(owner_id.clone(), relation, subject.clone()))
            .is_some())
    }

    async fn resolve_post_id(
        &self,
        uri: &RemoteRecordRef,
    ) -> Result<Option<Uuid>, MirrorStoreError> {
        self.check_read()?;
        let key = uri.to_string();
        if let Some(post) = self.post(&key) {
            return Ok(Some(post.local_id));
        }
        Ok(lock(&self.known_posts, "known posts").get(&key).copied())
    }

    async fn resolve_actor_id(&self, did: &Did) -> Result<Option<Uuid>, MirrorStoreError> {
        self.check_read()?;
        Ok(lock(&self.actors, "actors").get(did).copied())
    }
}
