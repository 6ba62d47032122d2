//! Explicit application state shared by the dashboard screens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::aggregate::DashboardAggregator;
use crate::error::DashboardError;
use crate::types::{CommunityPost, DashboardViewModel, PostCategory};

/// Issuance token for one dashboard load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenState {
    pub dashboard: Option<DashboardViewModel>,
    pub search_text: String,
    pub selected_category: Option<PostCategory>,
    pub add_post_modal_visible: bool,
    applied: u64,
}

/// Created once at startup and passed by reference (usually in an `Arc`)
/// to whatever needs to read or write it.
#[derive(Debug, Default)]
pub struct AppState {
    screen: RwLock<ScreenState>,
    issued: AtomicU64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ScreenState> {
        self.screen.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScreenState> {
        self.screen.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Installs `view` unless a load issued later has already been applied.
    pub fn apply(&self, ticket: LoadTicket, view: DashboardViewModel) -> bool {
        let mut screen = self.write();
        if ticket.0 < screen.applied {
            debug!(
                ticket = ticket.0,
                applied = screen.applied,
                "discarding superseded dashboard result"
            );
            return false;
        }
        screen.applied = ticket.0;
        screen.dashboard = Some(view);
        true
    }

    /// Ticket of the load currently on screen.
    pub fn current_load(&self) -> LoadTicket {
        LoadTicket(self.read().applied)
    }

    pub fn dashboard(&self) -> Option<DashboardViewModel> {
        self.read().dashboard.clone()
    }

    pub fn snapshot(&self) -> ScreenState {
        self.read().clone()
    }

    /// Rewrites the current dashboard in place. Returns `false` when no
    /// dashboard has been loaded yet.
    pub fn update_dashboard<F>(&self, transform: F) -> bool
    where
        F: FnOnce(DashboardViewModel) -> DashboardViewModel,
    {
        let mut screen = self.write();
        match screen.dashboard.take() {
            Some(view) => {
                screen.dashboard = Some(transform(view));
                true
            }
            None => false,
        }
    }

    /// Like [`update_dashboard`](Self::update_dashboard), but only while the
    /// load identified by `ticket` is still the one on screen.
    pub fn update_dashboard_if_current<F>(&self, ticket: LoadTicket, transform: F) -> bool
    where
        F: FnOnce(DashboardViewModel) -> DashboardViewModel,
    {
        let mut screen = self.write();
        if screen.applied != ticket.0 {
            debug!(
                ticket = ticket.0,
                applied = screen.applied,
                "dashboard reloaded since, leaving it as is"
            );
            return false;
        }
        match screen.dashboard.take() {
            Some(view) => {
                screen.dashboard = Some(transform(view));
                true
            }
            None => false,
        }
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        self.write().search_text = text.into();
    }

    pub fn select_category(&self, category: Option<PostCategory>) {
        self.write().selected_category = category;
    }

    pub fn set_add_post_modal(&self, visible: bool) {
        self.write().add_post_modal_visible = visible;
    }

    /// Preview posts matching the selected category and the search text
    /// (case-insensitive, over content and tags).
    pub fn visible_posts(&self) -> Vec<CommunityPost> {
        let screen = self.read();
        let Some(view) = screen.dashboard.as_ref() else {
            return Vec::new();
        };
        let needle = screen.search_text.trim().to_lowercase();

        view.posts
            .iter()
            .filter(|post| {
                screen
                    .selected_category
                    .map_or(true, |category| post.category == category)
            })
            .filter(|post| {
                needle.is_empty()
                    || post.content.to_lowercase().contains(&needle)
                    || post.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }
}

/// Loads (or refreshes) the dashboard and applies it to `state` under a
/// fresh ticket. Returns whether the result was the one left on screen.
pub async fn reload_dashboard(
    state: &AppState,
    aggregator: &DashboardAggregator,
    user_id: &str,
    refresh: bool,
) -> Result<bool, DashboardError> {
    let ticket = state.begin_load();
    let view = if refresh {
        aggregator.refresh_dashboard(user_id).await?
    } else {
        aggregator.load_dashboard(user_id).await?
    };
    Ok(state.apply(ticket, view))
}
