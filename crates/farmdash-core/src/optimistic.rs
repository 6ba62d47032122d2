//! Optimistic updates to the dashboard's post preview.
//!
//! The local transforms are pure; [`LikeToggle`] and [`comment_on_post`]
//! run the apply / confirm / roll-back sequence against an [`AppState`].

use tracing::{debug, warn};

use crate::error::{GatewayError, MutationError};
use crate::gateway::ApiGateway;
use crate::state::AppState;
use crate::types::{Comment, DashboardViewModel};
use crate::validation::validate_comment;

/// Flips the like flag of `post_id` and moves its count by one. A post
/// that is not in the preview leaves the view untouched.
pub fn apply_optimistic_like_toggle(
    mut view: DashboardViewModel,
    post_id: &str,
    was_liked: bool,
) -> DashboardViewModel {
    if let Some(post) = view.posts.iter_mut().find(|post| post.id == post_id) {
        post.is_liked = !was_liked;
        post.likes = if was_liked {
            post.likes.saturating_sub(1)
        } else {
            post.likes.saturating_add(1)
        };
    }
    view
}

/// Inverse of [`apply_optimistic_like_toggle`] for the same `was_liked`.
/// A post no longer showing the optimistic state is left alone.
pub fn rollback_like_toggle(
    view: DashboardViewModel,
    post_id: &str,
    was_liked: bool,
) -> DashboardViewModel {
    let optimistic = view
        .post(post_id)
        .is_some_and(|post| post.is_liked != was_liked);
    if !optimistic {
        return view;
    }
    apply_optimistic_like_toggle(view, post_id, !was_liked)
}

pub fn apply_optimistic_comment(mut view: DashboardViewModel, post_id: &str) -> DashboardViewModel {
    if let Some(post) = view.posts.iter_mut().find(|post| post.id == post_id) {
        post.comments = post.comments.saturating_add(1);
    }
    view
}

pub fn rollback_comment(mut view: DashboardViewModel, post_id: &str) -> DashboardViewModel {
    if let Some(post) = view.posts.iter_mut().find(|post| post.id == post_id) {
        post.comments = post.comments.saturating_sub(1);
    }
    view
}

/// One pending like/unlike, remembered so it can be rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeToggle {
    pub post_id: String,
    pub was_liked: bool,
}

impl LikeToggle {
    /// Captures the current like state of `post_id`, if it is shown.
    pub fn for_post(view: &DashboardViewModel, post_id: &str) -> Option<Self> {
        view.post(post_id).map(|post| Self {
            post_id: post.id.clone(),
            was_liked: post.is_liked,
        })
    }

    pub fn apply(&self, view: DashboardViewModel) -> DashboardViewModel {
        apply_optimistic_like_toggle(view, &self.post_id, self.was_liked)
    }

    pub fn rollback(&self, view: DashboardViewModel) -> DashboardViewModel {
        rollback_like_toggle(view, &self.post_id, self.was_liked)
    }

    pub async fn confirm(&self, gateway: &dyn ApiGateway) -> Result<(), GatewayError> {
        if self.was_liked {
            gateway.unlike_community_post(&self.post_id).await
        } else {
            gateway.like_community_post(&self.post_id).await
        }
    }

    /// Applies locally, confirms remotely, and rolls back if the
    /// confirmation fails. Returns the toggle that was attempted, or `None`
    /// when the post is not on screen.
    pub async fn run(
        state: &AppState,
        gateway: &dyn ApiGateway,
        post_id: &str,
    ) -> Result<Option<LikeToggle>, GatewayError> {
        let Some(toggle) = state.dashboard().and_then(|view| Self::for_post(&view, post_id)) else {
            return Ok(None);
        };

        let shown = state.current_load();
        state.update_dashboard(|view| toggle.apply(view));
        if let Err(err) = toggle.confirm(gateway).await {
            warn!(post_id, error = %err, "like confirmation failed, rolling back");
            if !state.update_dashboard_if_current(shown, |view| toggle.rollback(view)) {
                debug!(post_id, "dashboard replaced during the like, nothing to roll back");
            }
            return Err(err);
        }
        Ok(Some(toggle))
    }
}

/// Posts a comment with an optimistic count bump, rolled back on failure.
pub async fn comment_on_post(
    state: &AppState,
    gateway: &dyn ApiGateway,
    post_id: &str,
    text: &str,
) -> Result<Option<Comment>, MutationError> {
    validate_comment(text)?;
    let shown = state.current_load();
    state.update_dashboard(|view| apply_optimistic_comment(view, post_id));
    match crate::fetchers::add_comment(gateway, post_id, text).await {
        Ok(comment) => Ok(comment),
        Err(err) => {
            warn!(post_id, error = %err, "comment failed, rolling back");
            if !state.update_dashboard_if_current(shown, |view| rollback_comment(view, post_id)) {
                debug!(post_id, "dashboard replaced during the comment, nothing to roll back");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorRef, CommunityPost, PostCategory};

    fn view_with_post(likes: u32, is_liked: bool) -> DashboardViewModel {
        DashboardViewModel {
            posts: vec![CommunityPost {
                id: "p1".into(),
                author: AuthorRef::default(),
                content: "Mulch early".into(),
                category: PostCategory::Tips,
                tags: Default::default(),
                likes,
                comments: 0,
                views: 0,
                is_liked,
                created_at: None,
            }],
            ..DashboardViewModel::empty()
        }
    }

    #[test]
    fn like_then_unlike_restores_state() {
        let original = view_with_post(5, false);
        let liked = apply_optimistic_like_toggle(original.clone(), "p1", false);
        assert_eq!(liked.posts[0].likes, 6);
        assert!(liked.posts[0].is_liked);

        let unliked = apply_optimistic_like_toggle(liked, "p1", true);
        assert_eq!(unliked, original);
    }

    #[test]
    fn missing_post_is_a_no_op() {
        let original = view_with_post(5, false);
        let result = apply_optimistic_like_toggle(original.clone(), "nope", false);
        assert_eq!(result, original);
    }

    #[test]
    fn rollback_inverts_apply() {
        let original = view_with_post(3, true);
        let toggle = LikeToggle::for_post(&original, "p1").expect("post present");
        let applied = toggle.apply(original.clone());
        assert_eq!(applied.posts[0].likes, 2);
        assert_eq!(toggle.rollback(applied), original);
    }

    #[test]
    fn rollback_skips_post_already_showing_server_state() {
        let toggle = LikeToggle {
            post_id: "p1".into(),
            was_liked: false,
        };
        let reloaded = view_with_post(5, false);
        assert_eq!(toggle.rollback(reloaded.clone()), reloaded);

        let gone = DashboardViewModel::empty();
        assert_eq!(toggle.rollback(gone.clone()), gone);
    }

    #[test]
    fn comment_rollback_never_underflows() {
        let view = rollback_comment(view_with_post(0, false), "p1");
        assert_eq!(view.posts[0].comments, 0);
    }
}
