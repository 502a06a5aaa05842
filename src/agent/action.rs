//! Actions chosen by the decision engine and their execution outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::snapshot::ElementRef;

/// Scroll direction, in terms of content movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// One step the agent can take against the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click { target: ElementRef },
    SetText { target: ElementRef, text: String },
    Scroll { direction: ScrollDirection },
    Wait { duration_ms: u64 },
    NoOp,
}

impl Action {
    pub fn click(target: ElementRef) -> Self {
        Action::Click { target }
    }

    pub fn set_text(target: ElementRef, text: impl Into<String>) -> Self {
        Action::SetText {
            target,
            text: text.into(),
        }
    }

    /// Element the action needs resolved, if any.
    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            Action::Click { target } | Action::SetText { target, .. } => Some(target),
            Action::Scroll { .. } | Action::Wait { .. } | Action::NoOp => None,
        }
    }

    /// Short name used in logs and statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::SetText { .. } => "set_text",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::NoOp => "noop",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }

    pub(crate) fn wait_duration(duration_ms: u64) -> Duration {
        Duration::from_millis(duration_ms)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Click { target } => write!(f, "Click({})", target),
            Action::SetText { target, text } => write!(f, "SetText({}, {:?})", target, text),
            Action::Scroll { direction } => write!(f, "Scroll({:?})", direction),
            Action::Wait { duration_ms } => write!(f, "Wait({}ms)", duration_ms),
            Action::NoOp => write!(f, "NoOp"),
        }
    }
}

/// Why an action did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The target element is no longer present in the live tree.
    StaleReference,
    /// The platform surface rejected the action or timed out.
    ExecutionFailure,
}

/// Result of executing one action. There is no partial success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub succeeded: bool,
    pub error_kind: Option<ErrorKind>,
    /// Human-readable detail for failed outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_kind: Some(kind),
            message: Some(message.into()),
        }
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::StaleReference, message)
    }
}
