//! Step definitions for federated write BDD tests.

use rstest_bdd_macros::{given, then, when};
use sync_engine::domain::cache::{Settlement, ViewerMark};
use sync_engine::domain::ports::RemoteRepositoryError;
use sync_engine::domain::{
    ActionIntent, ActionKind, Collection, ErrorCode, RemovalOutcome, RemoteRecordRef, SubjectDraft,
    SubjectKey, UserNotice, WriteOutcome,
};

use crate::{CACHED_POST_CID, CACHED_POST_URI, FederatedWritesWorld};

fn cached_post_subject() -> SubjectKey {
    SubjectKey::from(&RemoteRecordRef::parse(CACHED_POST_URI).expect("valid uri"))
}

fn assert_failed_with(world: &FederatedWritesWorld, code: ErrorCode) {
    let report = world.report();
    let error = report.outcome.as_ref().expect_err("action should fail");
    assert_eq!(error.code(), code);
    assert_eq!(report.settlement, Settlement::RolledBack);
}

#[given("a signed-in owner with a cached timeline")]
fn a_signed_in_owner_with_a_cached_timeline(world: &FederatedWritesWorld) {
    world.setup();
}

#[given("the cached post shows three likes including the owner's")]
fn the_cached_post_shows_three_likes_including_the_owners(world: &FederatedWritesWorld) {
    world.seed_liked_post(3);
}

#[given("the owner has authored a post")]
fn the_owner_has_authored_a_post(world: &FederatedWritesWorld) {
    let harness = world.harness();
    let intent = ActionIntent::new(harness.owner_id.clone(), ActionKind::Post)
        .with_text("first light over the estuary");
    let report = harness.perform(&intent);
    let Ok(WriteOutcome::Created { uri, .. }) = report.outcome else {
        panic!("post should be created, got {:?}", report.outcome);
    };
    assert!(harness.mirror.post(&uri.to_string()).is_some());
    world.authored_uri.set(uri.to_string());
}

#[given("the remote no longer holds that post")]
fn the_remote_no_longer_holds_that_post(world: &FederatedWritesWorld) {
    world
        .harness()
        .remote
        .push_delete(Err(RemoteRepositoryError::not_found("RecordNotFound")));
}

#[given("the remote rejects both the access token and the refresh token")]
fn the_remote_rejects_both_tokens(world: &FederatedWritesWorld) {
    let harness = world.harness();
    harness
        .remote
        .push_create(Err(RemoteRepositoryError::unauthorized("ExpiredToken")));
    harness
        .remote
        .push_refresh(Err(RemoteRepositoryError::unauthorized("ExpiredToken")));
}

#[given("the remote rejects the next write")]
fn the_remote_rejects_the_next_write(world: &FederatedWritesWorld) {
    world
        .harness()
        .remote
        .push_create(Err(RemoteRepositoryError::rejected("InvalidRecord")));
}

#[when("the owner likes the cached post")]
fn the_owner_likes_the_cached_post(world: &FederatedWritesWorld) {
    let intent = ActionIntent::new(world.harness().owner_id.clone(), ActionKind::Like)
        .with_subject(SubjectDraft::strong(CACHED_POST_URI, CACHED_POST_CID));
    world.perform(&intent);
}

#[when("the owner unlikes the cached post")]
fn the_owner_unlikes_the_cached_post(world: &FederatedWritesWorld) {
    let intent = ActionIntent::new(world.harness().owner_id.clone(), ActionKind::Unlike)
        .with_subject(SubjectDraft::uri(CACHED_POST_URI));
    world.perform(&intent);
}

#[when("the owner deletes the authored post")]
fn the_owner_deletes_the_authored_post(world: &FederatedWritesWorld) {
    let uri = world.authored_uri.get().expect("authored post should be set");
    let intent = ActionIntent::new(world.harness().owner_id.clone(), ActionKind::Delete)
        .with_subject(SubjectDraft::uri(uri));
    world.perform(&intent);
}

#[then("the action succeeds")]
fn the_action_succeeds(world: &FederatedWritesWorld) {
    let report = world.report();
    assert!(report.is_success(), "unexpected failure: {:?}", report.outcome);
    assert_eq!(report.notice, None);
}

#[then("the like is mirrored locally")]
fn the_like_is_mirrored_locally(world: &FederatedWritesWorld) {
    let harness = world.harness();
    let row = harness
        .mirror
        .row(&harness.owner_id, Collection::Like, &cached_post_subject())
        .expect("like should be mirrored");
    let Ok(WriteOutcome::Created { uri, content_hash, .. }) = world.report().outcome else {
        panic!("like should have created a record");
    };
    assert_eq!(row.remote_uri, uri);
    assert_eq!(row.remote_content_hash, content_hash);
    assert_eq!(row.rkey, *uri.rkey());
}

#[then("the cached post shows a confirmed like")]
fn the_cached_post_shows_a_confirmed_like(world: &FederatedWritesWorld) {
    let post = world.harness().cached_post();
    assert_eq!(post.like_count, 1);
    assert!(matches!(post.viewer.like, Some(ViewerMark::Confirmed(_))));
    assert_eq!(world.report().settlement, Settlement::Committed);
}

#[then("the removal was local only")]
fn the_removal_was_local_only(world: &FederatedWritesWorld) {
    assert_eq!(
        world.report().outcome,
        Ok(WriteOutcome::Removed {
            remote: RemovalOutcome::NotMirrored
        })
    );
}

#[then("the cached post shows two likes and no viewer like")]
fn the_cached_post_shows_two_likes_and_no_viewer_like(world: &FederatedWritesWorld) {
    let post = world.harness().cached_post();
    assert_eq!(post.like_count, 2);
    assert_eq!(post.viewer.like, None);
    assert_eq!(world.report().settlement, Settlement::Committed);
}

#[then("no remote delete was attempted")]
fn no_remote_delete_was_attempted(world: &FederatedWritesWorld) {
    assert_eq!(world.harness().remote.delete_calls(), 0);
}

#[then("the remote reported the record already gone")]
fn the_remote_reported_the_record_already_gone(world: &FederatedWritesWorld) {
    assert_eq!(
        world.report().outcome,
        Ok(WriteOutcome::Removed {
            remote: RemovalOutcome::AlreadyGone
        })
    );
    assert_eq!(world.harness().remote.delete_calls(), 1);
}

#[then("the authored post is no longer mirrored")]
fn the_authored_post_is_no_longer_mirrored(world: &FederatedWritesWorld) {
    let uri = world.authored_uri.get().expect("authored post should be set");
    assert!(world.harness().mirror.post(&uri).is_none());
}

#[then("the action fails as unauthenticated")]
fn the_action_fails_as_unauthenticated(world: &FederatedWritesWorld) {
    assert_failed_with(world, ErrorCode::Unauthenticated);
    assert_eq!(world.harness().remote.refresh_calls(), 1);
}

#[then("the owner's session is removed")]
fn the_owners_session_is_removed(world: &FederatedWritesWorld) {
    let harness = world.harness();
    assert!(harness.session_store.get(&harness.owner_id).is_none());
}

#[then("nothing is mirrored")]
fn nothing_is_mirrored(world: &FederatedWritesWorld) {
    assert_eq!(world.harness().mirror.row_count(), 0);
}

#[then("the action fails as remotely rejected")]
fn the_action_fails_as_remotely_rejected(world: &FederatedWritesWorld) {
    assert_failed_with(world, ErrorCode::RemoteRejected);
    assert_eq!(world.report().notice, Some(UserNotice::NonRetryable));
}

#[then("the cached timeline matches its snapshot")]
fn the_cached_timeline_matches_its_snapshot(world: &FederatedWritesWorld) {
    let snapshot = world
        .timeline_snapshot
        .get()
        .expect("snapshot should be set");
    assert_eq!(world.harness().registry.get("timeline"), snapshot);
}
