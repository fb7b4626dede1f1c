//! Per-item deployment states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one item during a deployment run.
///
/// ```text
/// Pending → ResolvingBody → Creating → PostProcessing → Done
///    │            │             │             │
///    └────────────┴─────────────┴─────────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemState {
    /// Waiting for its turn in the build order
    Pending,
    /// Placeholders are being replaced from the remap table
    ResolvingBody,
    /// The remote create call is in flight
    Creating,
    /// Follow-up calls that need the new identifier
    PostProcessing,
    /// Terminal success
    Done,
    /// Terminal failure
    Failed,
}

impl ItemState {
    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::ResolvingBody)
                | (Self::ResolvingBody, Self::Creating)
                | (Self::Creating, Self::PostProcessing)
                | (Self::PostProcessing, Self::Done)
                | (Self::Pending | Self::ResolvingBody | Self::Creating | Self::PostProcessing, Self::Failed)
        )
    }

    /// Label used in progress output and reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResolvingBody => "resolving-body",
            Self::Creating => "creating",
            Self::PostProcessing => "post-processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            ItemState::Pending,
            ItemState::ResolvingBody,
            ItemState::Creating,
            ItemState::PostProcessing,
            ItemState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [ItemState::Pending, ItemState::Done, ItemState::Failed] {
            assert!(!ItemState::Done.can_transition_to(next));
            assert!(!ItemState::Failed.can_transition_to(next));
        }
        assert!(ItemState::Done.is_terminal());
        assert!(!ItemState::Creating.is_terminal());
    }

    #[test]
    fn test_no_skipping_ahead() {
        assert!(!ItemState::Pending.can_transition_to(ItemState::Creating));
        assert!(!ItemState::ResolvingBody.can_transition_to(ItemState::Done));
        assert!(ItemState::Pending.can_transition_to(ItemState::Failed));
    }

    #[test]
    fn test_labels_serialize_kebab_case() {
        assert_eq!(serde_json::to_string(&ItemState::PostProcessing).unwrap(), "\"post-processing\"");
        assert_eq!(ItemState::ResolvingBody.to_string(), "resolving-body");
    }
}
