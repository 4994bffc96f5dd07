//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **xrpc**: the user's remote repository over HTTP XRPC (reqwest)
//! - **persistence**: PostgreSQL mirror and session stores using Diesel ORM
//!
//! Adapters translate between domain types and wire or row representations.
//! They contain no business logic.

pub mod persistence;
pub mod xrpc;
