//! Named cached collections and their in-flight reads.
//!
//! A read is started with [`CacheRegistry::begin_read`] and lands with
//! [`CacheRegistry::complete_read`]. Cancelling a collection's read marks its
//! ticket so the late result is discarded instead of clobbering speculative
//! state. The cancellation check and the write happen under the same entry
//! lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::views::CachedView;
use crate::domain::SubjectKey;
use crate::domain::ports::FeedFilter;

#[derive(Default)]
struct CachedCollection {
    views: Vec<CachedView>,
    in_flight: Option<(u64, CancellationToken)>,
}

/// Handle for one in-flight read of a collection.
#[derive(Debug, Clone)]
pub struct ReadTicket {
    collection: String,
    id: u64,
    token: CancellationToken,
}

impl ReadTicket {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Token the reader may watch to abort its network call early.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Result of landing a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCompletion {
    /// The filtered items replaced the collection.
    Applied,
    /// The read was cancelled; its items were dropped.
    Discarded,
}

/// All cached collections visible to the client.
pub struct CacheRegistry {
    collections: DashMap<String, CachedCollection>,
    filter: Arc<dyn FeedFilter>,
    next_read: AtomicU64,
}

impl CacheRegistry {
    /// Empty registry whose reads pass through `filter`.
    pub fn new(filter: Arc<dyn FeedFilter>) -> Self {
        Self {
            collections: DashMap::new(),
            filter,
            next_read: AtomicU64::new(1),
        }
    }

    /// Seed or replace a collection with already filtered items.
    pub fn register(&self, name: impl Into<String>, views: Vec<CachedView>) {
        self.collections.entry(name.into()).or_default().views = views;
    }

    /// Copy of a collection's items.
    pub fn get(&self, name: &str) -> Option<Vec<CachedView>> {
        self.collections.get(name).map(|entry| entry.views.clone())
    }

    /// Names of every collection currently showing `subject`, sorted.
    pub fn names_containing(&self, subject: &SubjectKey) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| entry.views.iter().any(|view| view.matches(subject)))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Start a read of `name`, superseding any read already in flight.
    pub fn begin_read(&self, name: impl Into<String>) -> ReadTicket {
        let collection = name.into();
        let id = self.next_read.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let mut entry = self.collections.entry(collection.clone()).or_default();
        if let Some((_, previous)) = entry.in_flight.replace((id, token.clone())) {
            previous.cancel();
        }
        ReadTicket {
            collection,
            id,
            token,
        }
    }

    /// Land a read. Items pass through the feed filter before they replace
    /// the collection; cancelled reads are discarded.
    pub fn complete_read(&self, ticket: &ReadTicket, items: Vec<CachedView>) -> ReadCompletion {
        let mut entry = self
            .collections
            .entry(ticket.collection.clone())
            .or_default();
        if ticket.token.is_cancelled() {
            debug!(collection = %ticket.collection, "discarding cancelled read");
            return ReadCompletion::Discarded;
        }
        entry.views = self.filter.filter(items);
        if entry.in_flight.as_ref().is_some_and(|(id, _)| *id == ticket.id) {
            entry.in_flight = None;
        }
        ReadCompletion::Applied
    }

    /// Cancel in-flight reads against the named collections. Returns how
    /// many reads were cancelled.
    pub fn cancel_reads(&self, names: &[String]) -> usize {
        let mut cancelled = 0;
        for name in names {
            if let Some(mut entry) = self.collections.get_mut(name) {
                if let Some((_, token)) = entry.in_flight.take() {
                    token.cancel();
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    /// Mutate a collection in place. Returns `None` when it does not exist.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Vec<CachedView>) -> R) -> Option<R> {
        self.collections
            .get_mut(name)
            .map(|mut entry| f(&mut entry.views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::views::ProfileView;
    use crate::domain::ports::{MockFeedFilter, PassthroughFeedFilter};
    use crate::domain::Did;
    use rstest::rstest;

    fn profile(did: &str) -> CachedView {
        CachedView::Profile(ProfileView::new(Did::new(did).expect("valid did")))
    }

    #[rstest]
    fn cancelled_read_is_discarded() {
        let registry = CacheRegistry::new(Arc::new(PassthroughFeedFilter));
        registry.register("followers", vec![profile("did:plc:bob")]);
        let ticket = registry.begin_read("followers");

        assert_eq!(registry.cancel_reads(&["followers".to_owned()]), 1);
        let completion = registry.complete_read(&ticket, vec![]);

        assert_eq!(completion, ReadCompletion::Discarded);
        assert_eq!(registry.get("followers").map(|v| v.len()), Some(1));
    }

    #[rstest]
    fn newer_read_supersedes_older() {
        let registry = CacheRegistry::new(Arc::new(PassthroughFeedFilter));
        let older = registry.begin_read("timeline");
        let newer = registry.begin_read("timeline");

        assert!(older.is_cancelled());
        assert_eq!(
            registry.complete_read(&newer, vec![profile("did:plc:bob")]),
            ReadCompletion::Applied
        );
        assert_eq!(registry.cancel_reads(&["timeline".to_owned()]), 0);
    }

    #[rstest]
    fn completed_reads_pass_through_the_filter() {
        let mut filter = MockFeedFilter::new();
        filter
            .expect_filter()
            .times(1)
            .returning(|items| items.into_iter().take(1).collect());
        let registry = CacheRegistry::new(Arc::new(filter));
        let ticket = registry.begin_read("timeline");

        registry.complete_read(
            &ticket,
            vec![profile("did:plc:bob"), profile("did:plc:carol")],
        );

        assert_eq!(registry.get("timeline").map(|v| v.len()), Some(1));
    }

    #[rstest]
    fn names_containing_lists_every_overlapping_collection() {
        let registry = CacheRegistry::new(Arc::new(PassthroughFeedFilter));
        registry.register("b-search", vec![profile("did:plc:bob")]);
        registry.register("a-followers", vec![profile("did:plc:bob")]);
        registry.register("c-other", vec![profile("did:plc:carol")]);

        let subject = SubjectKey::from(&Did::new("did:plc:bob").expect("valid did"));
        assert_eq!(
            registry.names_containing(&subject),
            vec!["a-followers".to_owned(), "b-search".to_owned()]
        );
    }
}
