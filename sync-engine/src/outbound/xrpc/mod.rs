//! XRPC outbound adapter.
//!
//! This module provides a thin HTTP implementation of the
//! `RemoteRepository` port.

mod dto;
mod http_repository;

pub use http_repository::{XrpcRemoteRepository, XrpcSetupError};
