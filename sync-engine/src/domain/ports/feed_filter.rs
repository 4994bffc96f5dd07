//! Content-moderation collaborator consumed by feed reads.

use crate::domain::cache::CachedView;

/// Pure filter applied to freshly read feed items before they are cached.
#[cfg_attr(test, mockall::automock)]
pub trait FeedFilter: Send + Sync {
    /// Return the items that may be shown.
    fn filter(&self, items: Vec<CachedView>) -> Vec<CachedView>;
}

/// Filter that keeps every item.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFeedFilter;

impl FeedFilter for PassthroughFeedFilter {
    fn filter(&self, items: Vec<CachedView>) -> Vec<CachedView> {
        items
    }
}
