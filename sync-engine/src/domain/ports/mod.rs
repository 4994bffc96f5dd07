//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod feed_filter;
mod mirror_store;
mod remote_repository;
mod session_store;

#[cfg(test)]
pub use feed_filter::MockFeedFilter;
pub use feed_filter::{FeedFilter, PassthroughFeedFilter};
#[cfg(test)]
pub use mirror_store::MockMirrorStore;
pub use mirror_store::{MirrorStore, MirrorStoreError};
#[cfg(test)]
pub use remote_repository::MockRemoteRepository;
pub use remote_repository::{
    CreateRecordRequest, CreatedRecord, RemoteRepository, RemoteRepositoryError,
};
#[cfg(test)]
pub use session_store::MockSessionStore;
pub use session_store::{SessionStore, SessionStoreError};
