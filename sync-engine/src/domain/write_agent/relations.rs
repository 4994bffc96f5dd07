//! Like, repost, and follow handlers and their inverses.

use uuid::Uuid;

use tracing::{debug, warn};

use super::{FederatedWriteAgent, RemovalOutcome, WriteOutcome, log_mirror_failure};
use crate::domain::ports::CreateRecordRequest;
use crate::domain::repository_client::DeleteOutcome;
use crate::domain::{
    Collection, Did, Error, MirrorRow, RecordBody, RemoteRecordRef, Session, StrongRef,
    SubjectKey,
};

impl FederatedWriteAgent {
    pub(super) async fn like(
        &self,
        session: &Session,
        subject: &StrongRef,
    ) -> Result<WriteOutcome, Error> {
        let local_subject_id = self
            .resolve_local("liked post", self.mirror.resolve_post_id(&subject.uri))
            .await;
        let body = RecordBody::like(subject, self.clock.utc());
        self.create_relation(
            session,
            Collection::Like,
            SubjectKey::from(&subject.uri),
            body,
            local_subject_id,
        )
        .await
    }

    pub(super) async fn repost(
        &self,
        session: &Session,
        subject: &StrongRef,
    ) -> Result<WriteOutcome, Error> {
        let local_subject_id = self
            .resolve_local("reposted post", self.mirror.resolve_post_id(&subject.uri))
            .await;
        let body = RecordBody::repost(subject, self.clock.utc());
        self.create_relation(
            session,
            Collection::Repost,
            SubjectKey::from(&subject.uri),
            body,
            local_subject_id,
        )
        .await
    }

    pub(super) async fn follow(&self, session: &Session, actor: &Did) -> Result<WriteOutcome, Error> {
        let local_subject_id = self
            .resolve_local("followed actor", self.mirror.resolve_actor_id(actor))
            .await;
        let body = RecordBody::follow(actor, self.clock.utc());
        self.create_relation(
            session,
            Collection::Follow,
            SubjectKey::from(actor),
            body,
            local_subject_id,
        )
        .await
    }

    pub(super) async fn unlike(
        &self,
        session: &Session,
        subject: &RemoteRecordRef,
    ) -> Result<WriteOutcome, Error> {
        self.remove_relation(session, Collection::Like, SubjectKey::from(subject))
            .await
    }

    pub(super) async fn unrepost(
        &self,
        session: &Session,
        subject: &RemoteRecordRef,
    ) -> Result<WriteOutcome, Error> {
        self.remove_relation(session, Collection::Repost, SubjectKey::from(subject))
            .await
    }

    pub(super) async fn unfollow(
        &self,
        session: &Session,
        actor: &Did,
    ) -> Result<WriteOutcome, Error> {
        self.remove_relation(session, Collection::Follow, SubjectKey::from(actor))
            .await
    }

    async fn create_relation(
        &self,
        session: &Session,
        relation: Collection,
        subject: SubjectKey,
        record: RecordBody,
        local_subject_id: Option<Uuid>,
    ) -> Result<WriteOutcome, Error> {
        // One remote record per (owner, subject): a second record would be
        // unreachable by the inverse action once the mirror row is replaced.
        match self.mirror.find(&session.owner_id, relation, &subject).await {
            Ok(Some(existing)) => {
                debug!(%subject, %relation, uri = %existing.remote_uri, "already mirrored; skipping remote create");
                return Ok(WriteOutcome::Created {
                    uri: existing.remote_uri,
                    content_hash: existing.remote_content_hash,
                    local_post_id: None,
                });
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%subject, %relation, error = %err, "mirror lookup failed; creating remote record");
            }
        }

        let request = CreateRecordRequest {
            collection: relation.nsid(),
            rkey: self.keys.next_key(),
            record,
        };
        let created = self.client.create_record(session, &request).await?;

        let row = MirrorRow {
            owner_id: session.owner_id.clone(),
            relation,
            subject,
            remote_uri: created.uri.clone(),
            remote_content_hash: created.cid.clone(),
            rkey: request.rkey,
            local_subject_id,
            federated_at: self.clock.utc(),
        };
        if let Err(err) = self.mirror.upsert(&row).await {
            log_mirror_failure("upsert", &row.remote_uri.to_string(), &err);
        }

        Ok(WriteOutcome::Created {
            uri: created.uri,
            content_hash: created.cid,
            local_post_id: None,
        })
    }

    /// Delete the mirrored remote record for `subject`, then its local row.
    ///
    /// Without a mirrored rkey no remote call is made. A failed lookup is
    /// treated the same way.
    async fn remove_relation(
        &self,
        session: &Session,
        relation: Collection,
        subject: SubjectKey,
    ) -> Result<WriteOutcome, Error> {
        let owner_id = &session.owner_id;
        let mirrored = match self.mirror.find(owner_id, relation, &subject).await {
            Ok(row) => row,
            Err(err) => {
                warn!(%subject, %relation, error = %err, "mirror lookup failed; removing local references only");
                None
            }
        };

        let remote = match mirrored {
            Some(row) => {
                match self
                    .client
                    .delete_record(session, &relation.nsid(), &row.rkey)
                    .await?
                {
                    DeleteOutcome::Deleted => RemovalOutcome::Deleted,
                    DeleteOutcome::AlreadyGone => RemovalOutcome::AlreadyGone,
                }
            }
            None => {
                debug!(%subject, %relation, "no mirrored record; skipping remote delete");
                RemovalOutcome::NotMirrored
            }
        };

        if let Err(err) = self.mirror.delete(owner_id, relation, &subject).await {
            log_mirror_failure("delete", subject.as_str(), &err);
        }
        Ok(WriteOutcome::Removed { remote })
    }
}
