//! Post, reply, quote, and delete handlers.

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FederatedWriteAgent, RemovalOutcome, WriteOutcome, log_mirror_failure};
use crate::domain::ports::CreateRecordRequest;
use crate::domain::repository_client::DeleteOutcome;
use crate::domain::{
    Collection, Error, LinkedSubject, MirrorRow, MirroredPost, RecordBody, RemoteRecordRef,
    Session, StrongRef, SubjectKey, ThreadLinkage,
};

impl FederatedWriteAgent {
    pub(super) async fn post(&self, session: &Session, text: &str) -> Result<WriteOutcome, Error> {
        let body = RecordBody::post(text, self.clock.utc());
        self.create_post(session, text, body, ThreadLinkage::default())
            .await
    }

    pub(super) async fn reply(
        &self,
        session: &Session,
        text: &str,
        parent: &StrongRef,
        root: &StrongRef,
    ) -> Result<WriteOutcome, Error> {
        let linkage = ThreadLinkage {
            reply_parent: Some(self.link(&parent.uri).await),
            reply_root: Some(self.link(&root.uri).await),
            quoted: None,
        };
        let body = RecordBody::reply(text, parent, root, self.clock.utc());
        self.create_post(session, text, body, linkage).await
    }

    pub(super) async fn quote(
        &self,
        session: &Session,
        text: &str,
        quoted: &StrongRef,
    ) -> Result<WriteOutcome, Error> {
        let linkage = ThreadLinkage {
            reply_parent: None,
            reply_root: None,
            quoted: Some(self.link(&quoted.uri).await),
        };
        let body = RecordBody::quote(text, quoted, self.clock.utc());
        self.create_post(session, text, body, linkage).await
    }

    /// Delete one of the owner's own posts.
    ///
    /// The remote delete uses the mirrored rkey; without one only the local
    /// row is removed.
    pub(super) async fn delete_post(
        &self,
        session: &Session,
        uri: &RemoteRecordRef,
    ) -> Result<WriteOutcome, Error> {
        if uri.repository() != &session.repository {
            return Err(Error::invalid_intent("only your own posts can be deleted")
                .with_details(json!({ "field": "subject.uri" })));
        }

        let owner_id = &session.owner_id;
        let subject = SubjectKey::from(uri);
        let mirrored = match self.mirror.find(owner_id, Collection::Post, &subject).await {
            Ok(row) => row,
            Err(err) => {
                warn!(%uri, error = %err, "mirror lookup failed; removing local post only");
                None
            }
        };

        let remote = match mirrored {
            Some(row) => {
                match self
                    .client
                    .delete_record(session, &Collection::Post.nsid(), &row.rkey)
                    .await?
                {
                    DeleteOutcome::Deleted => RemovalOutcome::Deleted,
                    DeleteOutcome::AlreadyGone => RemovalOutcome::AlreadyGone,
                }
            }
            None => {
                debug!(%uri, "post not mirrored; skipping remote delete");
                RemovalOutcome::NotMirrored
            }
        };

        if let Err(err) = self.mirror.delete(owner_id, Collection::Post, &subject).await {
            log_mirror_failure("delete_post", subject.as_str(), &err);
        }
        Ok(WriteOutcome::Removed { remote })
    }

    async fn link(&self, uri: &RemoteRecordRef) -> LinkedSubject {
        LinkedSubject {
            remote_uri: uri.clone(),
            local_id: self
                .resolve_local("linked post", self.mirror.resolve_post_id(uri))
                .await,
        }
    }

    async fn create_post(
        &self,
        session: &Session,
        text: &str,
        record: RecordBody,
        linkage: ThreadLinkage,
    ) -> Result<WriteOutcome, Error> {
        let request = CreateRecordRequest {
            collection: Collection::Post.nsid(),
            rkey: self.keys.next_key(),
            record,
        };
        let created = self.client.create_record(session, &request).await?;

        let local_subject_id = linkage
            .reply_parent
            .as_ref()
            .or(linkage.quoted.as_ref())
            .and_then(|linked| linked.local_id);
        let post = MirroredPost {
            local_id: Uuid::new_v4(),
            row: MirrorRow {
                owner_id: session.owner_id.clone(),
                relation: Collection::Post,
                subject: SubjectKey::from(&created.uri),
                remote_uri: created.uri.clone(),
                remote_content_hash: created.cid.clone(),
                rkey: request.rkey,
                local_subject_id,
                federated_at: self.clock.utc(),
            },
            text: text.to_owned(),
            linkage,
        };

        let local_post_id = match self.mirror.upsert_post(&post).await {
            Ok(()) => Some(post.local_id),
            Err(err) => {
                log_mirror_failure("upsert_post", &created.uri.to_string(), &err);
                None
            }
        };

        Ok(WriteOutcome::Created {
            uri: created.uri,
            content_hash: created.cid,
            local_post_id,
        })
    }
}
