//! Speculative transforms applied to cached views.
//!
//! Every transform is idempotent: applying it to a view that already shows
//! its effect leaves the view unchanged, so retried gestures cannot drift the
//! displayed counts away from server truth.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::views::{CachedView, ViewerMark};
use crate::domain::{RemoteRecordRef, SubjectKey, ValidatedAction, WriteOutcome};

/// Local, not-yet-confirmed change to a subject's cached views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Speculation {
    Like,
    Unlike,
    Repost,
    Unrepost,
    Follow,
    Unfollow,
    /// Reply to the subject, identified by a marker unique to the gesture.
    Reply { marker: Uuid },
    /// Quote of the subject, identified by a marker unique to the gesture.
    Quote { marker: Uuid },
    /// Deletion of the subject; matching views are removed.
    Remove,
}

impl Speculation {
    /// Subject and transform for a validated action. Plain posts have no
    /// existing subject to speculate on.
    pub fn for_action(action: &ValidatedAction) -> Option<(SubjectKey, Self)> {
        let speculation = match action {
            ValidatedAction::Like(_) => Self::Like,
            ValidatedAction::Unlike(_) => Self::Unlike,
            ValidatedAction::Repost(_) => Self::Repost,
            ValidatedAction::Unrepost(_) => Self::Unrepost,
            ValidatedAction::Follow(_) => Self::Follow,
            ValidatedAction::Unfollow(_) => Self::Unfollow,
            ValidatedAction::Reply { .. } => Self::Reply {
                marker: Uuid::new_v4(),
            },
            ValidatedAction::Quote { .. } => Self::Quote {
                marker: Uuid::new_v4(),
            },
            ValidatedAction::Delete(_) => Self::Remove,
            ValidatedAction::Post { .. } => return None,
        };
        action.subject_key().map(|subject| (subject, speculation))
    }

    /// Apply the transform to every view of `subject` in a collection.
    /// Returns whether anything changed.
    pub fn apply(&self, views: &mut Vec<CachedView>, subject: &SubjectKey) -> bool {
        if matches!(self, Self::Remove) {
            let before = views.len();
            views.retain(|view| !view.matches(subject));
            return views.len() != before;
        }
        let mut changed = false;
        for view in views.iter_mut().filter(|view| view.matches(subject)) {
            changed |= self.apply_to(view);
        }
        changed
    }

    fn apply_to(&self, view: &mut CachedView) -> bool {
        match (self, view) {
            (Self::Like, CachedView::Post(post)) => {
                mark(&mut post.viewer.like, &mut post.like_count)
            }
            (Self::Unlike, CachedView::Post(post)) => {
                unmark(&mut post.viewer.like, &mut post.like_count)
            }
            (Self::Repost, CachedView::Post(post)) => {
                mark(&mut post.viewer.repost, &mut post.repost_count)
            }
            (Self::Unrepost, CachedView::Post(post)) => {
                unmark(&mut post.viewer.repost, &mut post.repost_count)
            }
            (Self::Follow, CachedView::Profile(profile)) => mark(
                &mut profile.viewer.following,
                &mut profile.followers_count,
            ),
            (Self::Unfollow, CachedView::Profile(profile)) => unmark(
                &mut profile.viewer.following,
                &mut profile.followers_count,
            ),
            (Self::Reply { marker }, CachedView::Post(post)) => {
                let inserted = post.pending_replies.insert(*marker);
                if inserted {
                    post.reply_count += 1;
                }
                inserted
            }
            (Self::Quote { marker }, CachedView::Post(post)) => {
                let inserted = post.pending_quotes.insert(*marker);
                if inserted {
                    post.quote_count += 1;
                }
                inserted
            }
            _ => false,
        }
    }

    /// Finalise pending markers after the remote write succeeded. Counts are
    /// left as speculated.
    pub fn settle(&self, views: &mut [CachedView], subject: &SubjectKey, outcome: &WriteOutcome) {
        let confirmed = match outcome {
            WriteOutcome::Created { uri, .. } => Some(uri),
            WriteOutcome::Removed { .. } => None,
        };
        for view in views.iter_mut().filter(|view| view.matches(subject)) {
            match (self, view) {
                (Self::Like, CachedView::Post(post)) => confirm(&mut post.viewer.like, confirmed),
                (Self::Repost, CachedView::Post(post)) => {
                    confirm(&mut post.viewer.repost, confirmed);
                }
                (Self::Follow, CachedView::Profile(profile)) => {
                    confirm(&mut profile.viewer.following, confirmed);
                }
                (Self::Reply { marker }, CachedView::Post(post)) => {
                    post.pending_replies.remove(marker);
                }
                (Self::Quote { marker }, CachedView::Post(post)) => {
                    post.pending_quotes.remove(marker);
                }
                _ => {}
            }
        }
    }
}

fn mark(slot: &mut Option<ViewerMark>, count: &mut u64) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(ViewerMark::Pending);
    *count += 1;
    true
}

fn unmark(slot: &mut Option<ViewerMark>, count: &mut u64) -> bool {
    if slot.take().is_none() {
        return false;
    }
    *count = count.saturating_sub(1);
    true
}

fn confirm(slot: &mut Option<ViewerMark>, uri: Option<&RemoteRecordRef>) {
    if let (Some(mark), Some(uri)) = (slot.as_mut(), uri) {
        if mark.is_pending() {
            *mark = ViewerMark::Confirmed(uri.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::views::{PostView, ProfileView};
    use crate::domain::{ContentHash, Did};
    use rstest::rstest;

    const POST: &str = "at://did:plc:bob/app.bsky.feed.post/3jzfcijpj2z2a";

    fn post_views() -> Vec<CachedView> {
        let uri = RemoteRecordRef::parse(POST).expect("valid uri");
        let mut view = PostView::new(uri, ContentHash::new("bafypost").expect("valid cid"));
        view.like_count = 4;
        view.repost_count = 1;
        vec![CachedView::Post(view)]
    }

    fn subject() -> SubjectKey {
        SubjectKey::from(POST.to_owned())
    }

    fn post(views: &[CachedView]) -> &PostView {
        match &views[0] {
            CachedView::Post(post) => post,
            CachedView::Profile(_) => panic!("expected post view"),
        }
    }

    #[rstest]
    #[case::like(Speculation::Like)]
    #[case::unlike(Speculation::Unlike)]
    #[case::repost(Speculation::Repost)]
    #[case::reply(Speculation::Reply { marker: Uuid::from_u128(1) })]
    #[case::quote(Speculation::Quote { marker: Uuid::from_u128(2) })]
    #[case::remove(Speculation::Remove)]
    fn applying_twice_equals_applying_once(#[case] speculation: Speculation) {
        let mut once = post_views();
        speculation.apply(&mut once, &subject());

        let mut twice = once.clone();
        let changed = speculation.apply(&mut twice, &subject());

        assert!(!changed);
        assert_eq!(twice, once);
    }

    #[rstest]
    fn like_increments_and_marks_pending() {
        let mut views = post_views();
        assert!(Speculation::Like.apply(&mut views, &subject()));

        let view = post(&views);
        assert_eq!(view.like_count, 5);
        assert_eq!(view.viewer.like, Some(ViewerMark::Pending));
    }

    #[rstest]
    fn unlike_of_unliked_post_never_goes_negative() {
        let mut views = post_views();
        if let CachedView::Post(view) = &mut views[0] {
            view.like_count = 0;
        }
        assert!(!Speculation::Unlike.apply(&mut views, &subject()));
        assert_eq!(post(&views).like_count, 0);
    }

    #[rstest]
    fn settle_confirms_pending_like() {
        let mut views = post_views();
        Speculation::Like.apply(&mut views, &subject());
        let like_uri = RemoteRecordRef::parse("at://did:plc:alice/app.bsky.feed.like/3jzfcijpj2z2c")
            .expect("valid uri");
        let outcome = WriteOutcome::Created {
            uri: like_uri.clone(),
            content_hash: ContentHash::new("bafylike").expect("valid cid"),
            local_post_id: None,
        };

        Speculation::Like.settle(&mut views, &subject(), &outcome);

        let view = post(&views);
        assert_eq!(view.viewer.like, Some(ViewerMark::Confirmed(like_uri)));
        assert_eq!(view.like_count, 5);
    }

    #[rstest]
    fn settle_clears_reply_marker_but_keeps_count() {
        let mut views = post_views();
        let speculation = Speculation::Reply {
            marker: Uuid::from_u128(9),
        };
        speculation.apply(&mut views, &subject());
        let outcome = WriteOutcome::Created {
            uri: RemoteRecordRef::parse("at://did:plc:alice/app.bsky.feed.post/3jzfcijpj2z2c")
                .expect("valid uri"),
            content_hash: ContentHash::new("bafyreply").expect("valid cid"),
            local_post_id: None,
        };

        speculation.settle(&mut views, &subject(), &outcome);

        let view = post(&views);
        assert!(view.pending_replies.is_empty());
        assert_eq!(view.reply_count, 1);
    }

    #[rstest]
    fn follow_targets_profiles_only() {
        let did = Did::new("did:plc:bob").expect("valid did");
        let mut views = vec![CachedView::Profile(ProfileView::new(did.clone()))];
        let key = SubjectKey::from(&did);

        assert!(Speculation::Follow.apply(&mut views, &key));
        assert!(!Speculation::Like.apply(&mut views, &key));
        let CachedView::Profile(profile) = &views[0] else {
            panic!("expected profile view");
        };
        assert_eq!(profile.followers_count, 1);
    }
}
