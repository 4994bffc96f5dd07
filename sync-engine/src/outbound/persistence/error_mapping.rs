//! Shared Diesel error mapping for the store adapters.

use tracing::debug;

use super::pool::PoolError;

/// Map a pool error through a store-specific connection constructor.
pub(crate) fn map_pool_error<E>(error: PoolError, connection: impl FnOnce(String) -> E) -> E {
    connection(error.into_message())
}

/// Map Diesel errors into store-specific query and connection constructors.
///
/// Database detail is logged at debug level; callers only see a short
/// category message.
pub(crate) fn map_diesel_error<E>(
    error: diesel::result::Error,
    operation: &str,
    query: impl Fn(String) -> E,
    connection: impl Fn(String) -> E,
) -> E {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(error = %error, %operation, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => query(format!("{operation}: record not found")),
        DieselError::QueryBuilderError(_) => query(format!("{operation}: database query error")),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection(format!("{operation}: database connection error"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            query(format!("{operation}: unique constraint violated"))
        }
        _ => query(format!("{operation}: database error")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MirrorStoreError;
    use rstest::rstest;

    fn map(error: diesel::result::Error) -> MirrorStoreError {
        map_diesel_error(
            error,
            "find like",
            MirrorStoreError::query,
            MirrorStoreError::connection,
        )
    }

    #[rstest]
    fn not_found_is_a_query_error() {
        let error = map(diesel::result::Error::NotFound);
        assert!(matches!(error, MirrorStoreError::Query { ref message } if message.contains("find like")));
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let error = map_pool_error(PoolError::checkout("timed out"), MirrorStoreError::connection);
        assert_eq!(error, MirrorStoreError::connection("timed out"));
    }
}
