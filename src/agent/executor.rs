//! Action execution against a platform automation surface.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::action::{Action, ErrorKind, Outcome, ScrollDirection};
use super::perception::EnvironmentPerception;
use super::snapshot::UiElement;
use super::tree::UiTreeNode;

/// Faults reported by a platform surface.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Surface rejected action: {0}")]
    Rejected(String),
    #[error("Surface timed out after {0:?}")]
    Timeout(Duration),
    #[error("Surface unavailable: {0}")]
    Unavailable(String),
}

/// Platform automation surface the executor drives.
///
/// Element-targeted verbs receive the element as resolved against the live
/// tree, never the stale snapshot entry.
pub trait ActionSurface {
    /// Current tree, or `None` if there is no active window.
    fn live_tree(&mut self) -> Result<Option<UiTreeNode>, SurfaceError>;

    fn click(&mut self, element: &UiElement) -> Result<(), SurfaceError>;

    fn set_text(&mut self, element: &UiElement, text: &str) -> Result<(), SurfaceError>;

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SurfaceError>;

    fn wait(&mut self, duration: Duration) -> Result<(), SurfaceError> {
        thread::sleep(duration);
        Ok(())
    }
}

/// Turns actions into surface calls and every fault into an [`Outcome`].
pub struct ActionExecutor<S> {
    surface: S,
    perception: EnvironmentPerception,
}

impl<S: ActionSurface> ActionExecutor<S> {
    pub fn new(surface: S) -> Self {
        Self::with_perception(surface, EnvironmentPerception::default())
    }

    /// Use `perception` to read the live tree during resolution.
    pub fn with_perception(surface: S, perception: EnvironmentPerception) -> Self {
        Self {
            surface,
            perception,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Execute `action`. Never fails; failures are returned as outcomes.
    pub fn execute(&mut self, action: &Action) -> Outcome {
        let result = match action {
            Action::NoOp => return Outcome::success(),
            Action::Click { .. } | Action::SetText { .. } => {
                let element = match self.resolve_live(action) {
                    Ok(element) => element,
                    Err(outcome) => return outcome,
                };
                match action {
                    Action::SetText { text, .. } => self.surface.set_text(&element, text),
                    _ => self.surface.click(&element),
                }
            }
            Action::Scroll { direction } => self.surface.scroll(*direction),
            Action::Wait { duration_ms } => {
                self.surface.wait(Action::wait_duration(*duration_ms))
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!("Executed {}", action);
                Outcome::success()
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", action, e);
                Outcome::failure(ErrorKind::ExecutionFailure, e.to_string())
            }
        }
    }

    /// Resolve the action's target against the live tree.
    fn resolve_live(&mut self, action: &Action) -> Result<UiElement, Outcome> {
        let Some(target) = action.target() else {
            return Err(Outcome::failure(
                ErrorKind::ExecutionFailure,
                format!("{} has no target", action),
            ));
        };

        let tree = self.surface.live_tree().map_err(|e| {
            tracing::warn!("Could not read live tree: {}", e);
            Outcome::failure(ErrorKind::ExecutionFailure, e.to_string())
        })?;

        let live = self.perception.analyze(tree.as_ref());
        match live.resolve(target) {
            Some((_, element)) => Ok(element.clone()),
            None => {
                tracing::info!("Stale reference: {} not in live tree", target);
                Err(Outcome::stale(format!("{} no longer present", target)))
            }
        }
    }
}
