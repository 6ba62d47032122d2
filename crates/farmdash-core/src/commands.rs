//! Screen commands emitted by the data layer and interpreted by the host's
//! navigation controller.

use crate::error::{AggregationErrorKind, MutationError};
use crate::types::DashboardViewModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCommand {
    NavigateToLogin,
    ShowOfflineBanner { pending_changes: usize },
    ShowNotice { message: String },
    ShowAlert { title: String, message: String },
}

/// Commands a screen should run after showing `view`.
pub fn commands_for(view: &DashboardViewModel) -> Vec<ScreenCommand> {
    let mut commands = Vec::new();

    if view.is_offline {
        commands.push(ScreenCommand::ShowOfflineBanner {
            pending_changes: view.pending_changes,
        });
    }

    let Some(error) = view.error.as_ref() else {
        return commands;
    };
    match error.kind {
        AggregationErrorKind::AuthFailure => commands.push(ScreenCommand::NavigateToLogin),
        AggregationErrorKind::NetworkUnreachable if view.is_empty() => {
            commands.push(ScreenCommand::ShowAlert {
                title: "Dashboard unavailable".into(),
                message: "No connection and no saved data yet. Try again once you are online."
                    .into(),
            })
        }
        AggregationErrorKind::SyncFailure => commands.push(ScreenCommand::ShowNotice {
            message: "Some offline changes could not be synced yet.".into(),
        }),
        AggregationErrorKind::PartialCropFailure => commands.push(ScreenCommand::ShowNotice {
            message: "Some crops could not be loaded.".into(),
        }),
        AggregationErrorKind::NetworkUnreachable | AggregationErrorKind::PartialFarmFailure => {
            commands.push(ScreenCommand::ShowNotice {
                message: "Showing saved data; the latest could not be loaded.".into(),
            })
        }
    }
    commands
}

/// Maps a failed form submission to the command the screen should run.
pub fn command_for_mutation_error(err: &MutationError) -> ScreenCommand {
    match err {
        MutationError::Validation(validation) => ScreenCommand::ShowAlert {
            title: "Check the form".into(),
            message: validation.user_message(),
        },
        MutationError::Gateway(gateway) if gateway.is_auth() => ScreenCommand::NavigateToLogin,
        MutationError::Gateway(gateway) => ScreenCommand::ShowAlert {
            title: "Request failed".into(),
            message: gateway.to_string(),
        },
    }
}
