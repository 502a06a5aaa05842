//! Decision engine and the replaceable policy behind it.

use std::collections::HashMap;

use super::action::{Action, ErrorKind};
use super::goal::{Goal, Intent};
use super::learning::Experience;
use super::snapshot::Snapshot;

/// Decision state consulted every cycle and updated by the learning module.
///
/// `decide` must be a pure function of the snapshot and the policy's current
/// state. Updates only happen through `apply_update` and `optimize_batch`.
pub trait Policy: Send {
    /// Choose one action for the snapshot.
    fn decide(&self, snapshot: &Snapshot) -> Action;

    /// Incremental update after a single experience.
    fn apply_update(&mut self, experience: &Experience, reward: f64);

    /// Batched refinement over a full experience buffer.
    fn optimize_batch(&mut self, batch: &[Experience]);

    /// Whether the policy has nothing left to do.
    fn is_complete(&self) -> bool {
        false
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        "policy"
    }
}

/// Per-step counters kept by [`RuleBasedPolicy`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepStats {
    pub attempts: u32,
    pub successes: u32,
    pub total_reward: f64,
}

impl StepStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Summary of the last optimization batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub size: usize,
    pub successes: usize,
    pub failures_by_kind: HashMap<ErrorKind, usize>,
    pub noops: usize,
}

impl BatchSummary {
    pub fn from_batch(batch: &[Experience]) -> Self {
        let mut summary = Self {
            size: batch.len(),
            ..Default::default()
        };
        for experience in batch {
            if experience.outcome.succeeded {
                summary.successes += 1;
            } else if let Some(kind) = experience.outcome.error_kind {
                *summary.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
            if experience.action.is_noop() {
                summary.noops += 1;
            }
        }
        summary
    }
}

/// Deterministic rule-based policy working through a [`Goal`] step by step.
///
/// Each cycle it targets the first element, in traversal order, that matches
/// the current step. A step is considered done once an experience shows the
/// step's own action succeeding.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedPolicy {
    goal: Goal,
    cursor: usize,
    step_stats: Vec<StepStats>,
    last_batch: Option<BatchSummary>,
    batches: u32,
}

impl RuleBasedPolicy {
    pub fn new(goal: Goal) -> Self {
        let step_stats = vec![StepStats::default(); goal.len()];
        Self {
            goal,
            cursor: 0,
            step_stats,
            last_batch: None,
            batches: 0,
        }
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    /// Index of the step currently being worked on.
    pub fn current_step(&self) -> usize {
        self.cursor
    }

    pub fn step_stats(&self) -> &[StepStats] {
        &self.step_stats
    }

    pub fn last_batch(&self) -> Option<&BatchSummary> {
        self.last_batch.as_ref()
    }

    /// Number of optimization batches seen.
    pub fn batches(&self) -> u32 {
        self.batches
    }

    /// Rewind to the first step, keeping statistics.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Replace the goal and start over.
    pub fn set_goal(&mut self, goal: Goal) {
        *self = Self::new(goal);
    }
}

impl Policy for RuleBasedPolicy {
    fn decide(&self, snapshot: &Snapshot) -> Action {
        let Some(step) = self.goal.step(self.cursor) else {
            return Action::NoOp;
        };

        // First match in traversal order wins.
        let target = snapshot
            .elements()
            .iter()
            .position(|element| step.accepts(element))
            .and_then(|index| snapshot.element_ref(index));

        match target {
            Some(target) => match &step.intent {
                Intent::Click => Action::click(target),
                Intent::SetText(text) => Action::set_text(target, text.clone()),
            },
            None => Action::NoOp,
        }
    }

    fn apply_update(&mut self, experience: &Experience, reward: f64) {
        if self.is_complete() || experience.action.is_noop() {
            return;
        }

        // Only experiences produced by the current step count towards it.
        if self.decide(&experience.snapshot) != experience.action {
            return;
        }

        let stats = &mut self.step_stats[self.cursor];
        stats.attempts += 1;
        stats.total_reward += reward;

        if experience.outcome.succeeded {
            stats.successes += 1;
            tracing::debug!(
                "Goal step {} done: {}",
                self.cursor,
                self.goal.steps()[self.cursor]
            );
            self.cursor += 1;
        }
    }

    fn optimize_batch(&mut self, batch: &[Experience]) {
        let summary = BatchSummary::from_batch(batch);
        self.batches += 1;
        tracing::info!(
            "Policy batch {}: {} experiences, {} succeeded, {} no-ops, step {}/{}",
            self.batches,
            summary.size,
            summary.successes,
            summary.noops,
            self.cursor,
            self.goal.len()
        );
        self.last_batch = Some(summary);
    }

    fn is_complete(&self) -> bool {
        self.cursor >= self.goal.len()
    }

    fn name(&self) -> &str {
        "rule-based"
    }
}

/// Maps a snapshot to an action through the owned policy.
pub struct DecisionEngine {
    policy: Box<dyn Policy>,
}

impl DecisionEngine {
    pub fn new(policy: Box<dyn Policy>) -> Self {
        Self { policy }
    }

    /// Rule-based engine for `goal`.
    pub fn rule_based(goal: Goal) -> Self {
        Self::new(Box::new(RuleBasedPolicy::new(goal)))
    }

    pub fn decide(&self, snapshot: &Snapshot) -> Action {
        let action = self.policy.decide(snapshot);
        tracing::debug!("{} decided {}", self.policy.name(), action);
        action
    }

    pub fn policy(&self) -> &dyn Policy {
        self.policy.as_ref()
    }

    /// Mutable policy access, handed to the learning module for updates.
    pub fn policy_mut(&mut self) -> &mut dyn Policy {
        self.policy.as_mut()
    }

    /// Swap in a different policy, returning the old one.
    pub fn replace_policy(&mut self, policy: Box<dyn Policy>) -> Box<dyn Policy> {
        std::mem::replace(&mut self.policy, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::action::Outcome;
    use crate::agent::perception::EnvironmentPerception;
    use crate::agent::snapshot::ElementRef;
    use crate::agent::tree::UiTreeNode;

    fn search_screen() -> Snapshot {
        let tree = UiTreeNode::new("android.widget.FrameLayout").with_children([
            UiTreeNode::edit_text("search_box"),
            UiTreeNode::button("go_button", "Go"),
            UiTreeNode::button("go_button", "Go again"),
        ]);
        EnvironmentPerception::default().analyze(Some(&tree))
    }

    fn goal() -> Goal {
        Goal::parse(["type:search_box=parcel", "click:go_button"]).unwrap()
    }

    #[test]
    fn test_empty_snapshot_is_noop() {
        let policy = RuleBasedPolicy::new(goal());
        assert_eq!(policy.decide(&Snapshot::empty()), Action::NoOp);
    }

    #[test]
    fn test_empty_goal_is_noop() {
        let policy = RuleBasedPolicy::default();
        assert!(policy.is_complete());
        assert_eq!(policy.decide(&search_screen()), Action::NoOp);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let engine = DecisionEngine::rule_based(goal());
        let snapshot = search_screen();
        let first = engine.decide(&snapshot);
        assert_eq!(first, engine.decide(&snapshot));
        assert_eq!(
            first,
            Action::set_text(ElementRef::id("search_box"), "parcel")
        );
    }

    #[test]
    fn test_advances_on_success_only() {
        let mut policy = RuleBasedPolicy::new(goal());
        let snapshot = search_screen();
        let action = policy.decide(&snapshot);

        let failed = Experience::new(
            snapshot.clone(),
            action.clone(),
            Outcome::stale("search_box vanished"),
        );
        policy.apply_update(&failed, -0.5);
        assert_eq!(policy.current_step(), 0);
        assert_eq!(policy.step_stats()[0].attempts, 1);

        let succeeded = Experience::new(snapshot.clone(), action, Outcome::success());
        policy.apply_update(&succeeded, 1.0);
        assert_eq!(policy.current_step(), 1);
        assert_eq!(policy.step_stats()[0].success_rate(), 0.5);

        // Tie-break: first go_button in traversal order.
        match policy.decide(&snapshot) {
            Action::Click { target } => {
                let (index, _) = snapshot.resolve(&target).unwrap();
                assert_eq!(index, 1);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_shared_id_targets_matched_row() {
        let tree = UiTreeNode::new("android.widget.ListView").with_children([
            UiTreeNode::button("com.app:id/row_title", "Apple"),
            UiTreeNode::button("com.app:id/row_title", "Banana"),
        ]);
        let snapshot = EnvironmentPerception::default().analyze(Some(&tree));
        let policy = RuleBasedPolicy::new(Goal::parse(["click-text:Banana"]).unwrap());

        let Action::Click { target } = policy.decide(&snapshot) else {
            panic!("expected a click");
        };
        let (index, element) = snapshot.resolve(&target).unwrap();
        assert_eq!(index, 1);
        assert_eq!(element.text, "Banana");
    }

    #[test]
    fn test_foreign_experience_is_ignored() {
        let mut policy = RuleBasedPolicy::new(goal());
        let experience = Experience::new(
            search_screen(),
            Action::click(ElementRef::id("go_button")),
            Outcome::success(),
        );
        policy.apply_update(&experience, 0.5);
        assert_eq!(policy.current_step(), 0);
        assert_eq!(policy.step_stats()[0].attempts, 0);
    }

    #[test]
    fn test_optimize_batch_summary() {
        let mut policy = RuleBasedPolicy::new(goal());
        let batch = vec![
            Experience::new(Snapshot::empty(), Action::NoOp, Outcome::success()),
            Experience::new(
                search_screen(),
                Action::click(ElementRef::id("go_button")),
                Outcome::stale("gone"),
            ),
        ];
        policy.optimize_batch(&batch);

        let summary = policy.last_batch().unwrap();
        assert_eq!(summary.size, 2);
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.noops, 1);
        assert_eq!(summary.failures_by_kind.get(&ErrorKind::StaleReference), Some(&1));
        assert_eq!(policy.batches(), 1);
    }

    #[test]
    fn test_replace_policy() {
        let mut engine = DecisionEngine::rule_based(goal());
        let old = engine.replace_policy(Box::new(RuleBasedPolicy::default()));
        assert_eq!(old.name(), "rule-based");
        assert_eq!(engine.decide(&search_screen()), Action::NoOp);
    }
}
