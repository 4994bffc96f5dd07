//! Federated write synchronisation for a social client.
//!
//! User actions are written to the user's remote repository first and then
//! mirrored into a local store, while an optimistic cache shows the result
//! immediately and rolls back on failure.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
