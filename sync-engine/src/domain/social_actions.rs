//! Entry point for user actions.
//!
//! A user action is speculated into the cache, written through the
//! [`FederatedWriteAgent`], and then committed or rolled back. Only the
//! action's outcome, how the cache was settled, and the notice the UI should
//! offer are reported; nothing is rendered here.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::cache::{OptimisticCacheController, Settlement, Speculation};
use crate::domain::write_agent::{FederatedWriteAgent, WriteOutcome};
use crate::domain::{ActionIntent, Error, UserNotice};

/// Discriminated result of one user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    /// Write outcome, or the failure surfaced to the user.
    pub outcome: Result<WriteOutcome, Error>,
    /// How speculative cache state was finalised.
    pub settlement: Settlement,
    /// Notification affordance for failures.
    pub notice: Option<UserNotice>,
}

impl ActionReport {
    fn succeeded(outcome: WriteOutcome, settlement: Settlement) -> Self {
        Self {
            outcome: Ok(outcome),
            settlement,
            notice: None,
        }
    }

    fn failed(error: Error, settlement: Settlement) -> Self {
        Self {
            notice: Some(error.notice()),
            outcome: Err(error),
            settlement,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs user actions through the cache controller and the write agent.
pub struct SocialActionService {
    agent: Arc<FederatedWriteAgent>,
    cache: Arc<OptimisticCacheController>,
}

impl SocialActionService {
    /// Pair the write agent with the cache it speculates on.
    pub fn new(agent: Arc<FederatedWriteAgent>, cache: Arc<OptimisticCacheController>) -> Self {
        Self { agent, cache }
    }

    /// Perform one action end to end.
    ///
    /// Invalid intents fail before the cache is touched. Failed writes roll
    /// the touched collections back to their snapshot.
    pub async fn perform(&self, intent: &ActionIntent) -> ActionReport {
        let action = match intent.validate() {
            Ok(action) => action,
            Err(err) => return ActionReport::failed(err.into(), Settlement::NotStarted),
        };
        let owner_id = &intent.owner_id;

        let Some((subject, speculation)) = Speculation::for_action(&action) else {
            return match self.agent.execute_validated(owner_id, &action).await {
                Ok(outcome) => ActionReport::succeeded(outcome, Settlement::NotStarted),
                Err(err) => ActionReport::failed(err, Settlement::NotStarted),
            };
        };

        let optimistic = match self.cache.begin(owner_id, subject, speculation).await {
            Ok(optimistic) => optimistic,
            Err(err) => return ActionReport::failed(err, Settlement::NotStarted),
        };

        match self.agent.execute_validated(owner_id, &action).await {
            Ok(outcome) => {
                let settlement = optimistic.commit(&outcome);
                ActionReport::succeeded(outcome, settlement)
            }
            Err(err) => {
                info!(owner_id = %owner_id, kind = %action.kind(), code = ?err.code(), "action failed, rolling back");
                let settlement = match optimistic.rollback() {
                    Ok(settlement) => settlement,
                    Err(restore_err) => {
                        warn!(error = %restore_err.message(), "cache rollback failed");
                        Settlement::NotStarted
                    }
                };
                ActionReport::failed(err, settlement)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheRegistry, CachedView, PostView, ViewerMark};
    use crate::domain::ports::{PassthroughFeedFilter, RemoteRepositoryError};
    use crate::domain::repository_client::{DEFAULT_REQUEST_TIMEOUT, RemoteRepositoryClient};
    use crate::domain::session_manager::{SessionManager, SessionManagerConfig};
    use crate::domain::{
        ActionKind, ContentHash, ErrorCode, OwnerId, RecordKeyGenerator, RemoteRecordRef,
        Session, SubjectDraft,
    };
    use crate::test_support::{
        InMemoryMirrorStore, InMemorySessionStore, MutableClock, ScriptedRemoteRepository,
        issued_tokens,
    };
    use chrono::Utc;
    use mockable::Clock;
    use rstest::rstest;

    const DID: &str = "did:plc:alice";
    const POST: &str = "at://did:plc:bob/app.bsky.feed.post/3jzfcijpj2z2a";

    struct World {
        owner_id: OwnerId,
        remote: Arc<ScriptedRemoteRepository>,
        registry: Arc<CacheRegistry>,
        service: SocialActionService,
    }

    fn world() -> World {
        let owner_id = OwnerId::random();
        let clock = Arc::new(MutableClock::new(Utc::now()));
        let remote = Arc::new(ScriptedRemoteRepository::new(DID));
        let store = Arc::new(InMemorySessionStore::with_session(Session::from_issued(
            owner_id.clone(),
            issued_tokens(DID, 0),
            clock.utc(),
        )));
        let sessions = Arc::new(SessionManager::new(
            remote.clone(),
            store,
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
            Arc::new(InMemoryMirrorStore::default()),
            Arc::new(RecordKeyGenerator::new(clock.clone())),
            clock,
        ));
        let registry = Arc::new(CacheRegistry::new(Arc::new(PassthroughFeedFilter)));
        registry.register(
            "timeline",
            vec![CachedView::Post(PostView::new(
                RemoteRecordRef::parse(POST).expect("valid uri"),
                ContentHash::new("bafypost").expect("valid cid"),
            ))],
        );
        let cache = Arc::new(OptimisticCacheController::new(registry.clone()));
        World {
            owner_id,
            remote,
            registry,
            service: SocialActionService::new(agent, cache),
        }
    }

    fn like(world: &World) -> ActionIntent {
        ActionIntent::new(world.owner_id.clone(), ActionKind::Like)
            .with_subject(SubjectDraft::strong(POST, "bafypost"))
    }

    #[rstest]
    #[tokio::test]
    async fn successful_like_commits_and_confirms() {
        let world = world();

        let report = world.service.perform(&like(&world)).await;

        assert!(report.is_success());
        assert_eq!(report.settlement, Settlement::Committed);
        assert_eq!(report.notice, None);
        let timeline = world.registry.get("timeline").unwrap_or_default();
        let [CachedView::Post(post)] = timeline.as_slice() else {
            panic!("timeline should hold one post");
        };
        assert_eq!(post.like_count, 1);
        assert!(matches!(post.viewer.like, Some(ViewerMark::Confirmed(_))));
    }

    #[rstest]
    #[case::rejected(RemoteRepositoryError::rejected("InvalidRecord"), ErrorCode::RemoteRejected, UserNotice::NonRetryable)]
    #[case::unreachable(RemoteRepositoryError::unreachable("reset"), ErrorCode::Unreachable, UserNotice::OfferRetry)]
    #[tokio::test]
    async fn failed_write_rolls_back_to_snapshot(
        #[case] failure: RemoteRepositoryError,
        #[case] code: ErrorCode,
        #[case] notice: UserNotice,
    ) {
        let world = world();
        let before = world.registry.get("timeline");
        world.remote.push_create(Err(failure));

        let report = world.service.perform(&like(&world)).await;

        assert_eq!(report.settlement, Settlement::RolledBack);
        assert_eq!(report.outcome.as_ref().map_err(Error::code).err(), Some(code));
        assert_eq!(report.notice, Some(notice));
        assert_eq!(world.registry.get("timeline"), before);
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_intent_never_touches_the_cache() {
        let world = world();
        let before = world.registry.get("timeline");
        let intent = ActionIntent::new(world.owner_id.clone(), ActionKind::Like);

        let report = world.service.perform(&intent).await;

        assert_eq!(report.settlement, Settlement::NotStarted);
        assert_eq!(report.notice, Some(UserNotice::NonRetryable));
        assert_eq!(world.registry.get("timeline"), before);
        assert_eq!(world.remote.create_calls(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn plain_post_skips_speculation() {
        let world = world();
        let intent =
            ActionIntent::new(world.owner_id.clone(), ActionKind::Post).with_text("hello world");

        let report = world.service.perform(&intent).await;

        assert!(report.is_success());
        assert_eq!(report.settlement, Settlement::NotStarted);
    }
}
