//! End-to-end cycles through `AgentSystem` against an in-memory device.

use std::sync::{Arc, Mutex};

use ui_agent::{
    Action, ActionSurface, AgentConfig, AgentSystem, ElementRef, ErrorKind,
    Experience, ExperienceSink, Goal, RecordResult, RuleBasedPolicy, ScrollDirection,
    SurfaceError, UiElement, UiTreeNode,
};

/// Fake device: typing updates the field text, clicking `go_button` opens an
/// empty results screen.
#[derive(Default)]
struct FakeDevice {
    screen: Option<UiTreeNode>,
    log: Vec<String>,
    clicked_text: Vec<String>,
}

impl FakeDevice {
    fn showing(screen: UiTreeNode) -> Self {
        Self {
            screen: Some(screen),
            ..Default::default()
        }
    }
}

impl ActionSurface for FakeDevice {
    fn live_tree(&mut self) -> Result<Option<UiTreeNode>, SurfaceError> {
        Ok(self.screen.clone())
    }

    fn click(&mut self, element: &UiElement) -> Result<(), SurfaceError> {
        self.log.push(format!("click {:?}", element.identifier));
        self.clicked_text.push(element.text.clone());
        if element.has_identifier("go_button") {
            self.screen = Some(results_screen());
        }
        Ok(())
    }

    fn set_text(&mut self, element: &UiElement, text: &str) -> Result<(), SurfaceError> {
        self.log.push(format!("set_text {:?} {}", element.identifier, text));
        if let Some(screen) = self.screen.as_mut() {
            for child in screen.children.iter_mut() {
                if child.resource_id == element.identifier {
                    child.text = Some(text.to_string());
                }
            }
        }
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SurfaceError> {
        self.log.push(format!("scroll {:?}", direction));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CountingSink(Arc<Mutex<Vec<usize>>>);

impl ExperienceSink for CountingSink {
    fn persist(&mut self, batch: &[Experience]) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(batch.len());
        Ok(())
    }
}

fn search_screen() -> UiTreeNode {
    UiTreeNode::new("android.widget.LinearLayout").with_children([
        UiTreeNode::new("android.widget.TextView").with_text("Track a parcel"),
        UiTreeNode::edit_text("search_box"),
        UiTreeNode::button("go_button", "Go"),
    ])
}

fn results_screen() -> UiTreeNode {
    UiTreeNode::new("android.widget.LinearLayout")
        .with_child(UiTreeNode::new("android.widget.TextView").with_text("No results"))
}

fn empty_screen() -> UiTreeNode {
    UiTreeNode::new("android.widget.FrameLayout")
        .with_child(UiTreeNode::new("android.widget.TextView").with_text("Loading"))
}

fn search_goal() -> Goal {
    Goal::parse(["type:search_box=parcel", "click:go_button"]).unwrap()
}

fn agent(goal: Goal, device: FakeDevice) -> AgentSystem<FakeDevice> {
    AgentSystem::new(
        &AgentConfig::default(),
        Box::new(RuleBasedPolicy::new(goal)),
        device,
    )
}

#[test]
fn type_then_click() {
    let mut agent = agent(search_goal(), FakeDevice::showing(search_screen()));

    let first = agent.process_environment(Some(&search_screen()));
    let ids: Vec<Option<&str>> = first
        .snapshot
        .elements()
        .iter()
        .map(|element| element.identifier.as_deref())
        .collect();
    assert_eq!(ids, vec![Some("search_box"), Some("go_button")]);
    assert_eq!(
        first.action,
        Action::set_text(ElementRef::id("search_box"), "parcel")
    );
    assert!(first.outcome.succeeded);
    assert!(first.record.reward().unwrap() > 0.0);

    let live = agent.surface_mut().live_tree().unwrap();
    let second = agent.process_environment(live.as_ref());
    assert_eq!(
        second.action,
        Action::click(ElementRef::id("go_button"))
    );
    assert!(second.outcome.succeeded);
    assert!(second.policy_complete);

    assert_eq!(
        agent.surface().log,
        vec![
            "set_text Some(\"search_box\") parcel".to_string(),
            "click Some(\"go_button\")".to_string(),
        ]
    );
    assert_eq!(agent.learning().len(), 2);
}

#[test]
fn empty_tree_cycle_is_noop() {
    let mut agent = agent(search_goal(), FakeDevice::showing(empty_screen()));

    let report = agent.process_environment(Some(&empty_screen()));
    assert!(report.snapshot.is_empty());
    assert_eq!(report.action, Action::NoOp);
    assert!(report.outcome.succeeded);
    assert!(report.record.reward().unwrap() >= 0.0);
    assert_eq!(agent.learning().len(), 1);
    assert!(agent.surface().log.is_empty());
}

#[test]
fn missing_root_still_records() {
    let mut agent = agent(search_goal(), FakeDevice::default());
    let report = agent.process_environment::<UiTreeNode>(None);
    assert_eq!(report.action, Action::NoOp);
    assert_eq!(agent.learning().len(), 1);
}

#[test]
fn hundred_cycles_run_one_optimization() {
    let sink = CountingSink::default();
    let batches = sink.0.clone();
    let mut agent =
        agent(search_goal(), FakeDevice::showing(empty_screen())).with_sink(Box::new(sink));

    for cycle in 1..=100 {
        let report = agent.process_environment(Some(&empty_screen()));
        assert!(matches!(report.record, RecordResult::Recorded { .. }));
        assert_eq!(report.record.optimized(), cycle == 100);
        assert!(agent.learning().len() < agent.learning().capacity());
    }

    assert_eq!(agent.learning().len(), 0);
    assert_eq!(agent.learning().optimization_runs(), 1);
    assert_eq!(*batches.lock().unwrap(), vec![100]);
    assert_eq!(agent.cycles(), 100);
}

#[test]
fn vanished_target_is_stale_and_retried_next_cycle() {
    // The device has already moved on when the action executes.
    let mut agent = agent(search_goal(), FakeDevice::showing(results_screen()));

    let report = agent.process_environment(Some(&search_screen()));
    assert!(!report.outcome.succeeded);
    assert_eq!(report.outcome.error_kind, Some(ErrorKind::StaleReference));
    assert!(report.record.reward().unwrap() <= 0.0);
    assert!(agent.surface().log.is_empty());

    // The policy did not advance, so the next cycle decides the same step.
    agent.surface_mut().screen = Some(search_screen());
    let retry = agent.process_environment(Some(&search_screen()));
    assert!(matches!(retry.action, Action::SetText { .. }));
    assert!(retry.outcome.succeeded);
}

#[test]
fn unchanged_tree_gives_same_decision() {
    let mut agent = agent(search_goal(), FakeDevice::showing(results_screen()));
    let first = agent.process_environment(Some(&search_screen()));
    let second = agent.process_environment(Some(&search_screen()));
    assert_eq!(first.action, second.action);
}

#[test]
fn shared_id_rows_click_the_matched_row() {
    let list = || {
        UiTreeNode::new("android.widget.ListView").with_children([
            UiTreeNode::button("com.app:id/row_title", "Apple"),
            UiTreeNode::button("com.app:id/row_title", "Banana"),
        ])
    };
    let goal = Goal::parse(["click-text:Banana"]).unwrap();
    let mut agent = agent(goal, FakeDevice::showing(list()));

    let report = agent.process_environment(Some(&list()));
    assert!(report.outcome.succeeded);
    assert!(report.policy_complete);
    assert_eq!(agent.surface().clicked_text, vec!["Banana".to_string()]);
}
