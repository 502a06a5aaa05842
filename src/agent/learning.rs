//! Online learning: experience buffer, reward shaping and optimization passes.
//!
//! Learning is best-effort. Nothing in here returns an error to the agent
//! loop; anomalies are logged and the offending experience is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::action::{Action, ErrorKind, Outcome};
use super::decision::Policy;
use super::snapshot::Snapshot;

/// Default experience buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// One recorded perceive/decide/execute cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub snapshot: Snapshot,
    pub action: Action,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// Reward assigned when the experience was recorded.
    #[serde(default)]
    pub reward: f64,
}

impl Experience {
    pub fn new(snapshot: Snapshot, action: Action, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            snapshot,
            action,
            outcome,
            timestamp: Utc::now(),
            reward: 0.0,
        }
    }

    /// Check the experience is internally consistent.
    pub fn validate(&self) -> Result<(), LearningAnomaly> {
        if let Some(target) = self.action.target() {
            if self.snapshot.resolve(target).is_none() {
                return Err(LearningAnomaly::UnknownTarget(target.to_string()));
            }
        }
        if self.outcome.succeeded && self.outcome.error_kind.is_some() {
            return Err(LearningAnomaly::InconsistentOutcome);
        }
        Ok(())
    }
}

/// Malformed experiences. Logged and dropped, never propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LearningAnomaly {
    #[error("Action targets {0}, which is not in its snapshot")]
    UnknownTarget(String),
    #[error("Outcome marked succeeded but carries an error kind")]
    InconsistentOutcome,
    #[error("Reward is not finite: {0}")]
    NonFiniteReward(f64),
}

/// Scores an experience.
///
/// Implementations must return a positive reward for succeeded outcomes and a
/// non-positive one for failures.
pub trait RewardCalculator: Send {
    fn score(&self, experience: &Experience) -> f64;
}

/// Default reward shaping by action type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapedReward;

impl RewardCalculator for ShapedReward {
    fn score(&self, experience: &Experience) -> f64 {
        if !experience.outcome.succeeded {
            return match experience.outcome.error_kind {
                Some(ErrorKind::StaleReference) => -0.5,
                Some(ErrorKind::ExecutionFailure) | None => -1.0,
            };
        }

        match &experience.action {
            Action::SetText { target, text } => {
                let unchanged = experience
                    .snapshot
                    .resolve(target)
                    .map(|(_, element)| element.text == *text)
                    .unwrap_or(false);
                if unchanged {
                    0.5
                } else {
                    1.0
                }
            }
            Action::Click { .. } => 0.5,
            Action::Scroll { .. } => 0.3,
            Action::Wait { .. } => 0.1,
            Action::NoOp => 0.05,
        }
    }
}

/// Receives a copy of each full batch before the buffer is cleared.
pub trait ExperienceSink: Send {
    fn persist(&mut self, batch: &[Experience]) -> anyhow::Result<()>;
}

/// What happened to one `record` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordResult {
    /// Buffered with the given reward.
    Recorded { reward: f64, optimized: bool },
    /// Dropped as malformed.
    Dropped(LearningAnomaly),
}

impl RecordResult {
    pub fn reward(&self) -> Option<f64> {
        match self {
            RecordResult::Recorded { reward, .. } => Some(*reward),
            RecordResult::Dropped(_) => None,
        }
    }

    pub fn optimized(&self) -> bool {
        matches!(self, RecordResult::Recorded { optimized: true, .. })
    }
}

/// Bounded experience buffer with a periodic optimization pass.
pub struct LearningModule {
    buffer: Vec<Experience>,
    capacity: usize,
    reward_calculator: Box<dyn RewardCalculator>,
    sink: Option<Box<dyn ExperienceSink>>,
    optimization_runs: u64,
    dropped: u64,
}

impl Default for LearningModule {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl LearningModule {
    /// Create a module with the default reward shaping.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            reward_calculator: Box::new(ShapedReward),
            sink: None,
            optimization_runs: 0,
            dropped: 0,
        }
    }

    pub fn with_reward_calculator(mut self, calculator: Box<dyn RewardCalculator>) -> Self {
        self.reward_calculator = calculator;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn ExperienceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Record one cycle and update `policy`.
    ///
    /// The policy is only borrowed for the call; the decision engine keeps
    /// ownership.
    pub fn record(
        &mut self,
        snapshot: Snapshot,
        action: Action,
        outcome: Outcome,
        policy: &mut dyn Policy,
    ) -> RecordResult {
        let mut experience = Experience::new(snapshot, action, outcome);
        if let Err(anomaly) = experience.validate() {
            return self.drop_experience(anomaly);
        }

        let reward = self.reward_calculator.score(&experience);
        if !reward.is_finite() {
            return self.drop_experience(LearningAnomaly::NonFiniteReward(reward));
        }
        experience.reward = reward;

        tracing::debug!(
            "Recorded {} (succeeded={}, reward={:.2})",
            experience.action,
            experience.outcome.succeeded,
            reward
        );

        self.buffer.push(experience);
        if let Some(latest) = self.buffer.last() {
            policy.apply_update(latest, reward);
        }

        let optimized = if self.buffer.len() >= self.capacity {
            self.optimize(policy);
            true
        } else {
            false
        };

        RecordResult::Recorded { reward, optimized }
    }

    /// Consume the whole buffer in one batched policy refinement.
    fn optimize(&mut self, policy: &mut dyn Policy) {
        let batch = std::mem::take(&mut self.buffer);

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.persist(&batch) {
                tracing::error!("Failed to persist experience batch: {}", e);
            }
        }

        policy.optimize_batch(&batch);
        self.optimization_runs += 1;
        tracing::info!(
            "Optimization pass {} over {} experiences",
            self.optimization_runs,
            batch.len()
        );
    }

    fn drop_experience(&mut self, anomaly: LearningAnomaly) -> RecordResult {
        self.dropped += 1;
        tracing::warn!("Dropping experience: {}", anomaly);
        RecordResult::Dropped(anomaly)
    }

    pub fn buffer(&self) -> &[Experience] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn optimization_runs(&self) -> u64 {
        self.optimization_runs
    }

    /// Number of experiences dropped as anomalies.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
