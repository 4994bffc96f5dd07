//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{posts, sessions};

/// Row read from `sessions`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SessionRow {
    pub owner_id: Uuid,
    pub did: String,
    pub handle: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Insertable and changeset form of a session.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = sessions)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct NewSessionRow<'a> {
    pub owner_id: Uuid,
    pub did: &'a str,
    pub handle: Option<&'a str>,
    pub access_token: &'a str,
    pub refresh_token: &'a str,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Row read from any of the `likes`, `reposts`, and `follows` tables.
///
/// The three tables share one column layout, so rows are selected with an
/// explicit column tuple rather than `Selectable`.
#[derive(Debug, Clone, Queryable)]
pub(crate) struct RelationRow {
    pub owner_id: Uuid,
    pub subject: String,
    pub remote_uri: String,
    pub remote_cid: String,
    pub rkey: String,
    pub local_subject_id: Option<Uuid>,
    pub federated_at: DateTime<Utc>,
}

/// Borrowed values written to a relation table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NewRelationRow<'a> {
    pub owner_id: Uuid,
    pub subject: &'a str,
    pub remote_uri: &'a str,
    pub remote_cid: &'a str,
    pub rkey: &'a str,
    pub local_subject_id: Option<Uuid>,
    pub federated_at: DateTime<Utc>,
}

/// Columns of `posts` needed to rebuild an authored post's mirror row.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AuthoredPostRow {
    pub remote_uri: String,
    pub remote_cid: Option<String>,
    pub owner_id: Option<Uuid>,
    pub rkey: Option<String>,
    pub reply_parent_id: Option<Uuid>,
    pub quoted_id: Option<Uuid>,
    pub federated_at: Option<DateTime<Utc>>,
}

/// Insertable form of an authored post.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub(crate) struct NewPostRow<'a> {
    pub id: Uuid,
    pub remote_uri: &'a str,
    pub author_did: &'a str,
    #[diesel(embed)]
    pub authored: AuthoredPostUpdate<'a>,
}

/// Columns overwritten when an authored post is upserted.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = posts)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct AuthoredPostUpdate<'a> {
    pub remote_cid: Option<&'a str>,
    pub owner_id: Option<Uuid>,
    pub rkey: Option<&'a str>,
    pub body: Option<&'a str>,
    pub reply_parent_uri: Option<String>,
    pub reply_parent_id: Option<Uuid>,
    pub reply_root_uri: Option<String>,
    pub reply_root_id: Option<Uuid>,
    pub quoted_uri: Option<String>,
    pub quoted_id: Option<Uuid>,
    pub federated_at: Option<DateTime<Utc>>,
}
