//! The agent loop: perceive, decide, execute, learn.

use super::action::{Action, Outcome};
use super::decision::{DecisionEngine, Policy};
use super::executor::{ActionExecutor, ActionSurface};
use super::learning::{ExperienceSink, LearningModule, RecordResult, DEFAULT_BUFFER_CAPACITY};
use super::perception::{EnvironmentPerception, DEFAULT_MAX_NODES};
use super::snapshot::Snapshot;
use super::tree::UiNode;

/// Default bound of the pending-event queue used by the async runner.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Experiences buffered before an optimization pass.
    pub buffer_capacity: usize,
    /// Pending events kept while a cycle is in flight; the oldest is dropped
    /// on overflow.
    pub queue_capacity: usize,
    /// Node limit for a single perception pass.
    pub max_nodes: usize,
    /// Optional ADB device ID for multi-device setups.
    pub device_id: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_nodes: DEFAULT_MAX_NODES,
            device_id: None,
        }
    }
}

impl AgentConfig {
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Loop state, as seen from outside a running agent.
///
/// [`AgentSystem::process_environment`] holds `&mut self` for the whole cycle,
/// so the state is only observable through
/// [`AgentHandle::state`](super::runner::AgentHandle::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentState {
    /// No cycle in flight.
    #[default]
    Idle,
    /// One cycle running.
    Processing,
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// What perception saw this cycle.
    pub snapshot: Snapshot,
    pub action: Action,
    pub outcome: Outcome,
    pub record: RecordResult,
    /// Whether the policy reported completion after this cycle's update.
    pub policy_complete: bool,
}

/// Composes perception, decision, execution and learning into one step per
/// environment event.
///
/// Cycles are strictly sequential: `process_environment` takes `&mut self`,
/// so a second cycle can only start once the previous one returned.
pub struct AgentSystem<S> {
    perception: EnvironmentPerception,
    decision: DecisionEngine,
    executor: ActionExecutor<S>,
    learning: LearningModule,
    cycles: u64,
}

impl<S: ActionSurface> AgentSystem<S> {
    pub fn new(config: &AgentConfig, policy: Box<dyn Policy>, surface: S) -> Self {
        let perception = EnvironmentPerception::new(config.max_nodes);
        Self {
            executor: ActionExecutor::with_perception(surface, perception.clone()),
            perception,
            decision: DecisionEngine::new(policy),
            learning: LearningModule::new(config.buffer_capacity),
            cycles: 0,
        }
    }

    /// Replace the learning module, e.g. to attach a sink.
    pub fn with_learning(mut self, learning: LearningModule) -> Self {
        self.learning = learning;
        self
    }

    /// Attach a sink receiving each experience batch before it is cleared.
    pub fn with_sink(mut self, sink: Box<dyn ExperienceSink>) -> Self {
        self.learning = std::mem::take(&mut self.learning).with_sink(sink);
        self
    }

    /// Run one full cycle for an environment event.
    ///
    /// `root` is borrowed only until perception returns. Every stage runs even
    /// when the previous one degraded, so each call records at most one
    /// experience and executes at most one action.
    pub fn process_environment<N: UiNode>(&mut self, root: Option<&N>) -> CycleReport {
        self.cycles += 1;

        let snapshot = self.perception.analyze(root);
        let action = self.decision.decide(&snapshot);
        let outcome = self.executor.execute(&action);

        tracing::info!(
            "Cycle {}: {} elements, {} -> {}",
            self.cycles,
            snapshot.len(),
            action,
            if outcome.succeeded { "ok" } else { "failed" }
        );

        let record = self.learning.record(
            snapshot.clone(),
            action.clone(),
            outcome.clone(),
            self.decision.policy_mut(),
        );

        CycleReport {
            cycle: self.cycles,
            snapshot,
            action,
            outcome,
            record,
            policy_complete: self.decision.policy().is_complete(),
        }
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    pub fn decision_mut(&mut self) -> &mut DecisionEngine {
        &mut self.decision
    }

    pub fn learning(&self) -> &LearningModule {
        &self.learning
    }

    pub fn surface(&self) -> &S {
        self.executor.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.executor.surface_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.max_nodes, DEFAULT_MAX_NODES);
        assert!(config.device_id.is_none());
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_buffer_capacity(10)
            .with_queue_capacity(2)
            .with_max_nodes(500)
            .with_device_id("emulator-5554");

        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.max_nodes, 500);
        assert_eq!(config.device_id, Some("emulator-5554".to_string()));
    }
}
