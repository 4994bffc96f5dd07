//! PostgreSQL-backed `MirrorStore` implementation using Diesel ORM.
//!
//! Likes, reposts, and follows live in three tables with the same layout;
//! the query helpers for each are generated by `relation_table!`. Authored
//! posts live in `posts` alongside other locally known posts.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{MirrorStore, MirrorStoreError};
use crate::domain::{
    Collection, ContentHash, Did, MirrorRow, MirroredPost, OwnerId, RecordKey, RemoteRecordRef,
    SubjectKey,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{
    AuthoredPostRow, AuthoredPostUpdate, NewPostRow, NewRelationRow, RelationRow,
};
use super::pool::DbPool;
use super::schema::{actors, posts};

macro_rules! relation_table {
    ($module:ident, $table:ident) => {
        mod $module {
            use diesel::prelude::*;
            use diesel::upsert::excluded;
            use diesel_async::{AsyncPgConnection, RunQueryDsl};
            use uuid::Uuid;

            use crate::outbound::persistence::models::{NewRelationRow, RelationRow};
            use crate::outbound::persistence::schema::$table;

            pub(super) async fn upsert(
                conn: &mut AsyncPgConnection,
                row: NewRelationRow<'_>,
            ) -> QueryResult<()> {
                diesel::insert_into($table::table)
                    .values((
                        $table::owner_id.eq(row.owner_id),
                        $table::subject.eq(row.subject),
                        $table::remote_uri.eq(row.remote_uri),
                        $table::remote_cid.eq(row.remote_cid),
                        $table::rkey.eq(row.rkey),
                        $table::local_subject_id.eq(row.local_subject_id),
                        $table::federated_at.eq(row.federated_at),
                    ))
                    .on_conflict(($table::owner_id, $table::subject))
                    .do_update()
                    .set((
                        $table::remote_uri.eq(excluded($table::remote_uri)),
                        $table::remote_cid.eq(excluded($table::remote_cid)),
                        $table::rkey.eq(excluded($table::rkey)),
                        $table::local_subject_id.eq(excluded($table::local_subject_id)),
                        $table::federated_at.eq(excluded($table::federated_at)),
                    ))
                    .execute(conn)
                    .await
                    .map(|_| ())
            }

            pub(super) async fn find(
                conn: &mut AsyncPgConnection,
                owner_id: Uuid,
                subject: &str,
            ) -> QueryResult<Option<RelationRow>> {
                $table::table
                    .filter($table::owner_id.eq(owner_id).and($table::subject.eq(subject)))
                    .select((
                        $table::owner_id,
                        $table::subject,
                        $table::remote_uri,
                        $table::remote_cid,
                        $table::rkey,
                        $table::local_subject_id,
                        $table::federated_at,
                    ))
                    .first::<RelationRow>(conn)
                    .await
                    .optional()
            }

            pub(super) async fn delete(
                conn: &mut AsyncPgConnection,
                owner_id: Uuid,
                subject: &str,
            ) -> QueryResult<usize> {
                diesel::delete(
                    $table::table
                        .filter($table::owner_id.eq(owner_id).and($table::subject.eq(subject))),
                )
                .execute(conn)
                .await
            }
        }
    };
}

relation_table!(likes_table, likes);
relation_table!(reposts_table, reposts);
relation_table!(follows_table, follows);

/// Diesel-backed mirror store.
#[derive(Clone)]
pub struct DieselMirrorStore {
    pool: DbPool,
}

impl DieselMirrorStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn diesel_error(operation: &'static str) -> impl Fn(diesel::result::Error) -> MirrorStoreError {
    move |error| {
        map_diesel_error(
            error,
            operation,
            MirrorStoreError::query,
            MirrorStoreError::connection,
        )
    }
}

fn posts_only_through_upsert_post() -> MirrorStoreError {
    MirrorStoreError::query("posts are mirrored through upsert_post")
}

fn stored<T, E: std::fmt::Display>(
    column: &str,
    parsed: Result<T, E>,
) -> Result<T, MirrorStoreError> {
    parsed.map_err(|err| MirrorStoreError::query(format!("stored {column}: {err}")))
}

fn relation_row_to_mirror(
    relation: Collection,
    row: RelationRow,
) -> Result<MirrorRow, MirrorStoreError> {
    Ok(MirrorRow {
        owner_id: OwnerId::from_uuid(row.owner_id),
        relation,
        subject: SubjectKey::from(row.subject),
        remote_uri: stored("remote_uri", RemoteRecordRef::parse(&row.remote_uri))?,
        remote_content_hash: stored("remote_cid", ContentHash::new(&row.remote_cid))?,
        rkey: stored("rkey", RecordKey::parse(&row.rkey))?,
        local_subject_id: row.local_subject_id,
        federated_at: row.federated_at,
    })
}

/// Convert a `posts` row into the owner's mirror row. Posts not authored
/// through the engine have no mirror row.
fn post_row_to_mirror(row: AuthoredPostRow) -> Result<Option<MirrorRow>, MirrorStoreError> {
    let (Some(owner_id), Some(cid), Some(rkey), Some(federated_at)) =
        (row.owner_id, row.remote_cid, row.rkey, row.federated_at)
    else {
        return Ok(None);
    };
    Ok(Some(MirrorRow {
        owner_id: OwnerId::from_uuid(owner_id),
        relation: Collection::Post,
        subject: SubjectKey::from(row.remote_uri.clone()),
        remote_uri: stored("remote_uri", RemoteRecordRef::parse(&row.remote_uri))?,
        remote_content_hash: stored("remote_cid", ContentHash::new(&cid))?,
        rkey: stored("rkey", RecordKey::parse(&rkey))?,
        local_subject_id: row.reply_parent_id.or(row.quoted_id),
        federated_at,
    }))
}

fn authored_columns(post: &MirroredPost) -> AuthoredPostUpdate<'_> {
    let linkage = &post.linkage;
    AuthoredPostUpdate {
        remote_cid: Some(post.row.remote_content_hash.as_str()),
        owner_id: Some(*post.row.owner_id.as_uuid()),
        rkey: Some(post.row.rkey.as_str()),
        body: Some(post.text.as_str()),
        reply_parent_uri: linkage.reply_parent.as_ref().map(|s| s.remote_uri.to_string()),
        reply_parent_id: linkage.reply_parent.as_ref().and_then(|s| s.local_id),
        reply_root_uri: linkage.reply_root.as_ref().map(|s| s.remote_uri.to_string()),
        reply_root_id: linkage.reply_root.as_ref().and_then(|s| s.local_id),
        quoted_uri: linkage.quoted.as_ref().map(|s| s.remote_uri.to_string()),
        quoted_id: linkage.quoted.as_ref().and_then(|s| s.local_id),
        federated_at: Some(post.row.federated_at),
    }
}

#[async_trait]
impl MirrorStore for DieselMirrorStore {
    async fn upsert(&self, row: &MirrorRow) -> Result<(), MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;
        let remote_uri = row.remote_uri.to_string();
        let new_row = NewRelationRow {
            owner_id: *row.owner_id.as_uuid(),
            subject: row.subject.as_str(),
            remote_uri: &remote_uri,
            remote_cid: row.remote_content_hash.as_str(),
            rkey: row.rkey.as_str(),
            local_subject_id: row.local_subject_id,
            federated_at: row.federated_at,
        };

        let written = match row.relation {
            Collection::Like => likes_table::upsert(&mut conn, new_row).await,
            Collection::Repost => reposts_table::upsert(&mut conn, new_row).await,
            Collection::Follow => follows_table::upsert(&mut conn, new_row).await,
            Collection::Post => return Err(posts_only_through_upsert_post()),
        };
        written.map_err(diesel_error("upsert relation"))
    }

    async fn upsert_post(&self, post: &MirroredPost) -> Result<(), MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;
        let remote_uri = post.row.remote_uri.to_string();
        let new_row = NewPostRow {
            id: post.local_id,
            remote_uri: &remote_uri,
            author_did: post.row.remote_uri.repository().as_str(),
            authored: authored_columns(post),
        };

        // A post already known locally keeps its id; only authored columns change.
        diesel::insert_into(posts::table)
            .values(&new_row)
            .on_conflict(posts::remote_uri)
            .do_update()
            .set(&new_row.authored)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error("upsert post"))
    }

    async fn find(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<Option<MirrorRow>, MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;
        let owner = *owner_id.as_uuid();
        let subject = subject.as_str();

        let row = match relation {
            Collection::Like => likes_table::find(&mut conn, owner, subject).await,
            Collection::Repost => reposts_table::find(&mut conn, owner, subject).await,
            Collection::Follow => follows_table::find(&mut conn, owner, subject).await,
            Collection::Post => {
                let post = posts::table
                    .filter(posts::remote_uri.eq(subject).and(posts::owner_id.eq(owner)))
                    .select(AuthoredPostRow::as_select())
                    .first::<AuthoredPostRow>(&mut conn)
                    .await
                    .optional()
                    .map_err(diesel_error("find post"))?;
                return Ok(post.map(post_row_to_mirror).transpose()?.flatten());
            }
        }
        .map_err(diesel_error("find relation"))?;

        row.map(|row| relation_row_to_mirror(relation, row))
            .transpose()
    }

    async fn delete(
        &self,
        owner_id: &OwnerId,
        relation: Collection,
        subject: &SubjectKey,
    ) -> Result<bool, MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;
        let owner = *owner_id.as_uuid();
        let subject = subject.as_str();

        let deleted = match relation {
            Collection::Like => likes_table::delete(&mut conn, owner, subject).await,
            Collection::Repost => reposts_table::delete(&mut conn, owner, subject).await,
            Collection::Follow => follows_table::delete(&mut conn, owner, subject).await,
            Collection::Post => {
                diesel::delete(
                    posts::table
                        .filter(posts::remote_uri.eq(subject).and(posts::owner_id.eq(owner))),
                )
                .execute(&mut conn)
                .await
            }
        }
        .map_err(diesel_error("delete mirror row"))?;

        Ok(deleted > 0)
    }

    async fn resolve_post_id(
        &self,
        uri: &RemoteRecordRef,
    ) -> Result<Option<Uuid>, MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;

        posts::table
            .filter(posts::remote_uri.eq(uri.to_string()))
            .select(posts::id)
            .first::<Uuid>(&mut conn)
            .await
            .optional()
            .map_err(diesel_error("resolve post id"))
    }

    async fn resolve_actor_id(&self, did: &Did) -> Result<Option<Uuid>, MirrorStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, MirrorStoreError::connection))?;

        actors::table
            .filter(actors::did.eq(did.as_str()))
            .select(actors::id)
            .first::<Uuid>(&mut conn)
            .await
            .optional()
            .map_err(diesel_error("resolve actor id"))
    }
}
