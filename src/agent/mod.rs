//! Agent module: the perceive/decide/execute/learn loop.

mod action;
mod decision;
mod executor;
mod goal;
mod learning;
mod perception;
mod runner;
mod snapshot;
mod system;
mod tree;

pub use action::{Action, ErrorKind, Outcome, ScrollDirection};
pub use decision::{BatchSummary, DecisionEngine, Policy, RuleBasedPolicy, StepStats};
pub use executor::{ActionExecutor, ActionSurface, SurfaceError};
pub use goal::{Goal, GoalParseError, GoalStep, Intent, TargetMatcher};
pub use learning::{
    Experience, ExperienceSink, LearningAnomaly, LearningModule, RecordResult, RewardCalculator,
    ShapedReward, DEFAULT_BUFFER_CAPACITY,
};
pub use perception::{EnvironmentPerception, PerceptionError, DEFAULT_MAX_NODES};
pub use runner::{AgentError, AgentHandle, AgentRunner, EventQueue, ReportCallback};
pub use snapshot::{short_identifier, ElementRef, Snapshot, UiElement};
pub use system::{AgentConfig, AgentState, AgentSystem, CycleReport, DEFAULT_QUEUE_CAPACITY};
pub use tree::{Bounds, UiNode, UiTreeNode};
