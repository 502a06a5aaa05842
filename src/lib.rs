// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # UI Agent
//!
//! Autonomous UI-automation agent for Android.
//!
//! Each environment event runs one cycle: the UI tree is perceived into an
//! immutable [`Snapshot`], a [`Policy`] decides on one [`Action`], the action
//! is executed against an [`ActionSurface`], and the outcome is recorded by the
//! [`LearningModule`], which updates the policy and periodically runs a
//! batched optimization pass.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ui_agent::adb::{dump_hierarchy, AdbSurface};
//! use ui_agent::{AgentConfig, AgentSystem, Goal, RuleBasedPolicy};
//!
//! fn main() -> anyhow::Result<()> {
//!     let goal = Goal::parse(["type:search_box=parcel", "click:go_button"])?;
//!     let config = AgentConfig::default();
//!     let mut agent = AgentSystem::new(
//!         &config,
//!         Box::new(RuleBasedPolicy::new(goal)),
//!         AdbSurface::new(None),
//!     );
//!
//!     let tree = dump_hierarchy(None)?;
//!     let report = agent.process_environment(tree.as_ref());
//!     println!("{} -> succeeded={}", report.action, report.outcome.succeeded);
//!     Ok(())
//! }
//! ```

pub mod adb;
pub mod agent;
pub mod archive;
pub mod settings;

pub use agent::{
    Action, ActionExecutor, ActionSurface, AgentConfig, AgentError, AgentHandle, AgentRunner,
    AgentState, AgentSystem, Bounds, CycleReport, DecisionEngine, ElementRef,
    EnvironmentPerception, ErrorKind, Experience, ExperienceSink, Goal, GoalParseError, GoalStep,
    Intent, LearningAnomaly, LearningModule, Outcome, Policy, RecordResult, RewardCalculator,
    RuleBasedPolicy, ScrollDirection, ShapedReward, Snapshot, SurfaceError, TargetMatcher,
    UiElement, UiNode, UiTreeNode,
};
pub use archive::{ArchiveError, ExperienceArchive};
pub use settings::AppSettings;
