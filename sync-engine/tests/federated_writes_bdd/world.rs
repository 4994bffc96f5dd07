//! Scenario-world wiring for federated write BDD tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mockable::Clock;
use sync_engine::domain::cache::{
    CacheRegistry, CachedView, OptimisticCacheController, PostView, ViewerMark,
};
use sync_engine::domain::ports::PassthroughFeedFilter;
use sync_engine::domain::repository_client::DEFAULT_REQUEST_TIMEOUT;
use sync_engine::domain::{
    ActionIntent, ActionReport, ContentHash, FederatedWriteAgent, OwnerId, RecordKeyGenerator,
    RemoteRecordRef, RemoteRepositoryClient, Session, SessionManager, SessionManagerConfig,
    SocialActionService,
};
use sync_engine::test_support::{
    InMemoryMirrorStore, InMemorySessionStore, MutableClock, ScriptedRemoteRepository,
    issued_tokens,
};
use tokio::runtime::Runtime;

use crate::{CACHED_POST_CID, CACHED_POST_URI, FederatedWritesWorld, OWNER_DID};

/// Engine wired over in-memory adapters for one scenario.
pub struct Harness {
    runtime: Runtime,
    pub owner_id: OwnerId,
    pub remote: Arc<ScriptedRemoteRepository>,
    pub session_store: Arc<InMemorySessionStore>,
    pub mirror: Arc<InMemoryMirrorStore>,
    pub registry: Arc<CacheRegistry>,
    actions: SocialActionService,
}

impl Harness {
    fn new() -> Self {
        let runtime = Runtime::new().expect("create runtime");
        let owner_id = OwnerId::random();
        let clock = Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0)
                .single()
                .expect("valid fixed time"),
        ));
        let remote = Arc::new(ScriptedRemoteRepository::new(OWNER_DID));
        let session_store = Arc::new(InMemorySessionStore::with_session(Session::from_issued(
            owner_id.clone(),
            issued_tokens(OWNER_DID, 0),
            clock.utc(),
        )));
        let mirror = Arc::new(InMemoryMirrorStore::default());

        let sessions = Arc::new(SessionManager::new(
            remote.clone(),
            session_store.clone(),
            clock.clone(),
            SessionManagerConfig::default(),
        ));
        let client = Arc::new(RemoteRepositoryClient::new(
            remote.clone(),
            sessions.clone(),
            DEFAULT_REQUEST_TIMEOUT,
        ));
        let agent = Arc::new(FederatedWriteAgent::new(
            sessions,
            client,
            mirror.clone(),
            Arc::new(RecordKeyGenerator::new(clock.clone())),
            clock,
        ));

        let registry = Arc::new(CacheRegistry::new(Arc::new(PassthroughFeedFilter)));
        registry.register("timeline", vec![CachedView::Post(cached_post_view())]);
        let actions = SocialActionService::new(
            agent,
            Arc::new(OptimisticCacheController::new(registry.clone())),
        );

        Self {
            runtime,
            owner_id,
            remote,
            session_store,
            mirror,
            registry,
            actions,
        }
    }

    /// Run one action to completion on the scenario runtime.
    pub fn perform(&self, intent: &ActionIntent) -> ActionReport {
        self.runtime.block_on(self.actions.perform(intent))
    }

    /// Show the cached post as liked by the owner, with `like_count` likes.
    pub fn seed_liked_post(&self, like_count: u64) {
        let mut post = cached_post_view();
        post.like_count = like_count;
        post.viewer.like = Some(ViewerMark::Confirmed(
            RemoteRecordRef::parse(format!("at://{OWNER_DID}/app.bsky.feed.like/3jzfcijpj2z2c"))
                .expect("valid like uri"),
        ));
        self.registry.register("timeline", vec![CachedView::Post(post)]);
    }

    /// Cached timeline post, which every scenario registers.
    pub fn cached_post(&self) -> PostView {
        let timeline = self.registry.get("timeline").unwrap_or_default();
        match timeline.as_slice() {
            [CachedView::Post(post)] => post.clone(),
            other => panic!("timeline should hold one post, found {other:?}"),
        }
    }
}

fn cached_post_view() -> PostView {
    PostView::new(
        RemoteRecordRef::parse(CACHED_POST_URI).expect("valid uri"),
        ContentHash::new(CACHED_POST_CID).expect("valid cid"),
    )
}

impl FederatedWritesWorld {
    /// Wire a fresh engine and remember the timeline before any action.
    pub fn setup(&self) {
        let harness = Arc::new(Harness::new());
        self.timeline_snapshot.set(harness.registry.get("timeline"));
        self.harness.set(harness);
    }

    /// Seed an already-liked cached post and retake the timeline snapshot.
    pub fn seed_liked_post(&self, like_count: u64) {
        let harness = self.harness();
        harness.seed_liked_post(like_count);
        self.timeline_snapshot.set(harness.registry.get("timeline"));
    }

    pub fn harness(&self) -> Arc<Harness> {
        self.harness.get().expect("harness should be set")
    }

    /// Perform an action and keep its report for later assertions.
    pub fn perform(&self, intent: &ActionIntent) -> ActionReport {
        let report = self.harness().perform(intent);
        self.last_report.set(report.clone());
        report
    }

    pub fn report(&self) -> ActionReport {
        self.last_report.get().expect("an action should have run")
    }
}
