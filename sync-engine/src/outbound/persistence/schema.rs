//! Diesel table definitions for the mirror schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Durable session per local user.
    sessions (owner_id) {
        owner_id -> Uuid,
        did -> Text,
        handle -> Nullable<Text>,
        access_token -> Text,
        refresh_token -> Text,
        last_refreshed_at -> Timestamptz,
    }
}

diesel::table! {
    /// Actors known locally.
    actors (did) {
        did -> Text,
        id -> Uuid,
        handle -> Nullable<Text>,
    }
}

diesel::table! {
    /// Posts known locally.
    ///
    /// Rows with an `owner_id` were authored through the engine and carry
    /// their record key, content hash, and thread linkage.
    posts (id) {
        id -> Uuid,
        remote_uri -> Text,
        author_did -> Text,
        remote_cid -> Nullable<Text>,
        owner_id -> Nullable<Uuid>,
        rkey -> Nullable<Text>,
        body -> Nullable<Text>,
        reply_parent_uri -> Nullable<Text>,
        reply_parent_id -> Nullable<Uuid>,
        reply_root_uri -> Nullable<Text>,
        reply_root_id -> Nullable<Uuid>,
        quoted_uri -> Nullable<Text>,
        quoted_id -> Nullable<Uuid>,
        federated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Mirrored likes, keyed by owner and liked post URI.
    likes (owner_id, subject) {
        owner_id -> Uuid,
        subject -> Text,
        remote_uri -> Text,
        remote_cid -> Text,
        rkey -> Text,
        local_subject_id -> Nullable<Uuid>,
        federated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Mirrored reposts, keyed by owner and reposted post URI.
    reposts (owner_id, subject) {
        owner_id -> Uuid,
        subject -> Text,
        remote_uri -> Text,
        remote_cid -> Text,
        rkey -> Text,
        local_subject_id -> Nullable<Uuid>,
        federated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Mirrored follows, keyed by owner and followed DID.
    follows (owner_id, subject) {
        owner_id -> Uuid,
        subject -> Text,
        remote_uri -> Text,
        remote_cid -> Text,
        rkey -> Text,
        local_subject_id -> Nullable<Uuid>,
        federated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(sessions, actors, posts, likes, reposts, follows);
