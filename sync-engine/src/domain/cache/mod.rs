//! Client-side cached views and their optimistic mutation.

mod controller;
mod registry;
mod speculation;
mod views;

pub use controller::{
    ActionPhase, CacheSnapshot, OptimisticAction, OptimisticCacheController, Settlement,
    SubjectLocks,
};
pub use registry::{CacheRegistry, ReadCompletion, ReadTicket};
pub use speculation::Speculation;
pub use views::{CachedView, PostView, PostViewer, ProfileView, ProfileViewer, ViewerMark};
