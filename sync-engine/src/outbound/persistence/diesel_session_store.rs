//! PostgreSQL-backed `SessionStore` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SessionStore, SessionStoreError};
use crate::domain::{AccessToken, Did, OwnerId, RefreshToken, Session};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewSessionRow, SessionRow};
use super::pool::DbPool;
use super::schema::sessions;

/// Diesel-backed session store.
#[derive(Clone)]
pub struct DieselSessionStore {
    pool: DbPool,
}

impl DieselSessionStore {
    /// Store sessions in the pool's `sessions` table.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn diesel_error(operation: &'static str) -> impl Fn(diesel::result::Error) -> SessionStoreError {
    move |error| {
        map_diesel_error(
            error,
            operation,
            SessionStoreError::query,
            SessionStoreError::connection,
        )
    }
}

fn row_to_session(row: SessionRow) -> Result<Session, SessionStoreError> {
    let repository = Did::new(&row.did)
        .map_err(|err| SessionStoreError::query(format!("stored session did: {err}")))?;
    Ok(Session {
        owner_id: OwnerId::from_uuid(row.owner_id),
        repository,
        handle: row.handle,
        access_token: AccessToken::new(row.access_token),
        refresh_token: RefreshToken::new(row.refresh_token),
        last_refreshed_at: row.last_refreshed_at,
    })
}

#[async_trait]
impl SessionStore for DieselSessionStore {
    async fn load(&self, owner_id: &OwnerId) -> Result<Option<Session>, SessionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, SessionStoreError::connection))?;

        let row = sessions::table
            .filter(sessions::owner_id.eq(owner_id.as_uuid()))
            .select(SessionRow::as_select())
            .first::<SessionRow>(&mut conn)
            .await
            .optional()
            .map_err(diesel_error("load session"))?;

        row.map(row_to_session).transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, SessionStoreError::connection))?;

        let row = NewSessionRow {
            owner_id: *session.owner_id.as_uuid(),
            did: session.repository.as_str(),
            handle: session.handle.as_deref(),
            access_token: session.access_token.expose(),
            refresh_token: session.refresh_token.expose(),
            last_refreshed_at: session.last_refreshed_at,
        };

        diesel::insert_into(sessions::table)
            .values(&row)
            .on_conflict(sessions::owner_id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error("save session"))
    }

    async fn delete(&self, owner_id: &OwnerId) -> Result<(), SessionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, SessionStoreError::connection))?;

        diesel::delete(sessions::table.filter(sessions::owner_id.eq(owner_id.as_uuid())))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error("delete session"))
    }
}
