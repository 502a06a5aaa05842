//! Async runner that feeds environment events to an [`AgentSystem`].
//!
//! Events arriving while a cycle is in flight are queued in FIFO order in a
//! bounded queue. When the queue is full the oldest pending event is dropped,
//! since a newer tree supersedes it anyway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::executor::ActionSurface;
use super::system::{AgentState, AgentSystem, CycleReport};
use super::tree::UiTreeNode;

/// Runner errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent runner stopped")]
    Stopped,
}

/// Bounded FIFO queue that drops the oldest entry on overflow.
pub struct EventQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl<T> EventQueue<T> {
    /// Create a queue. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue `item`, returning the evicted oldest entry if the queue was full.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };
        if evicted.is_some() {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
        self.notify.notify_one();
        evicted
    }

    pub fn pop(&self) -> Option<T> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries evicted by overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Wait until something is pushed (or `wake` is called).
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    fn wake(&self) {
        self.notify.notify_one();
    }
}

/// Callback invoked after every cycle.
pub type ReportCallback = Box<dyn Fn(&CycleReport) + Send + Sync>;

/// Handle for delivering events to a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    queue: Arc<EventQueue<UiTreeNode>>,
    running: Arc<AtomicBool>,
    processing: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
}

impl AgentHandle {
    /// Deliver one environment event.
    pub fn deliver(&self, tree: UiTreeNode) -> Result<(), AgentError> {
        if !self.is_running() {
            return Err(AgentError::Stopped);
        }
        if self.queue.push(tree).is_some() {
            tracing::warn!("Event queue full, dropped oldest pending event");
        }
        Ok(())
    }

    /// Stop after the cycle in flight, if any.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.wake();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether a cycle is currently in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> AgentState {
        if self.is_processing() {
            AgentState::Processing
        } else {
            AgentState::Idle
        }
    }

    /// Events evicted because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

/// Owns an [`AgentSystem`] inside a tokio task and processes queued events
/// one at a time.
pub struct AgentRunner<S> {
    system: AgentSystem<S>,
    queue_capacity: usize,
    report_callback: Option<ReportCallback>,
}

impl<S> AgentRunner<S>
where
    S: ActionSurface + Send + 'static,
{
    pub fn new(system: AgentSystem<S>, queue_capacity: usize) -> Self {
        Self {
            system,
            queue_capacity,
            report_callback: None,
        }
    }

    /// Set a callback for cycle reports.
    pub fn with_report_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CycleReport) + Send + Sync + 'static,
    {
        self.report_callback = Some(Box::new(callback));
        self
    }

    /// Spawn the processing task.
    ///
    /// The join handle yields the system back once the runner is stopped.
    pub fn spawn(self) -> (AgentHandle, JoinHandle<AgentSystem<S>>) {
        let handle = AgentHandle {
            queue: Arc::new(EventQueue::new(self.queue_capacity)),
            running: Arc::new(AtomicBool::new(true)),
            processing: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(AtomicU64::new(0)),
        };

        let task_handle = handle.clone();
        let join = tokio::spawn(async move {
            let AgentRunner {
                mut system,
                report_callback,
                ..
            } = self;
            let handle = task_handle;

            while handle.is_running() {
                let Some(tree) = handle.queue.pop() else {
                    handle.queue.notified().await;
                    continue;
                };

                handle.processing.store(true, Ordering::SeqCst);
                let report = system.process_environment(Some(&tree));
                drop(tree);
                handle.processing.store(false, Ordering::SeqCst);
                handle.cycles.fetch_add(1, Ordering::SeqCst);

                if let Some(callback) = &report_callback {
                    callback(&report);
                }

                tokio::task::yield_now().await;
            }

            let discarded = handle.queue.len();
            if discarded > 0 {
                tracing::info!("Agent runner stopped with {} pending events", discarded);
            } else {
                tracing::info!("Agent runner stopped");
            }
            system
        });

        (handle, join)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::agent::action::ScrollDirection;
    use crate::agent::decision::RuleBasedPolicy;
    use crate::agent::executor::SurfaceError;
    use crate::agent::goal::Goal;
    use crate::agent::snapshot::UiElement;
    use crate::agent::system::AgentConfig;

    #[test]
    fn test_queue_drops_oldest() {
        let queue = EventQueue::new(2);
        assert_eq!(queue.push(1), None);
        assert_eq!(queue.push(2), None);
        assert_eq!(queue.push(3), Some(1));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert!(queue.is_empty());
    }

    struct StaticSurface {
        tree: UiTreeNode,
    }

    impl ActionSurface for StaticSurface {
        fn live_tree(&mut self) -> Result<Option<UiTreeNode>, SurfaceError> {
            Ok(Some(self.tree.clone()))
        }

        fn click(&mut self, _element: &UiElement) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn set_text(&mut self, _element: &UiElement, _text: &str) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn scroll(&mut self, _direction: ScrollDirection) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    fn screen() -> UiTreeNode {
        UiTreeNode::new("android.widget.FrameLayout")
            .with_child(UiTreeNode::edit_text("search_box"))
            .with_child(UiTreeNode::button("go_button", "Go"))
    }

    #[tokio::test]
    async fn test_runner_processes_events_in_order() {
        let goal = Goal::parse(["type:search_box=parcel", "click:go_button"]).unwrap();
        let system = AgentSystem::new(
            &AgentConfig::default(),
            Box::new(RuleBasedPolicy::new(goal)),
            StaticSurface { tree: screen() },
        );

        let actions = Arc::new(Mutex::new(Vec::new()));
        let seen = actions.clone();
        let (handle, join) = AgentRunner::new(system, 4)
            .with_report_callback(move |report| {
                seen.lock().unwrap().push(report.action.kind());
            })
            .spawn();

        handle.deliver(screen()).unwrap();
        handle.deliver(screen()).unwrap();
        handle.deliver(screen()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.cycles() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.stop();
        let system = join.await.unwrap();
        assert_eq!(system.cycles(), 3);
        assert!(system.decision().policy().is_complete());
        assert_eq!(*actions.lock().unwrap(), vec!["set_text", "click", "noop"]);
        assert_eq!(handle.deliver(screen()), Err(AgentError::Stopped));
        assert_eq!(handle.state(), AgentState::Idle);
    }

    /// Blocks every click until the test releases it.
    struct GatedSurface {
        release: mpsc::Receiver<()>,
    }

    impl ActionSurface for GatedSurface {
        fn live_tree(&mut self) -> Result<Option<UiTreeNode>, SurfaceError> {
            Ok(Some(screen()))
        }

        fn click(&mut self, _element: &UiElement) -> Result<(), SurfaceError> {
            self.release
                .recv()
                .map_err(|e| SurfaceError::Unavailable(e.to_string()))
        }

        fn set_text(&mut self, _element: &UiElement, _text: &str) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn scroll(&mut self, _direction: ScrollDirection) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_tracks_cycle_in_flight() {
        let (release, gate) = mpsc::channel();
        let goal = Goal::parse(["click:go_button"]).unwrap();
        let system = AgentSystem::new(
            &AgentConfig::default(),
            Box::new(RuleBasedPolicy::new(goal)),
            GatedSurface { release: gate },
        );
        let (handle, join) = AgentRunner::new(system, 4).spawn();
        assert_eq!(handle.state(), AgentState::Idle);

        handle.deliver(screen()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.state() != AgentState::Processing {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(handle.cycles(), 0);

        release.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.cycles() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(handle.state(), AgentState::Idle);

        handle.stop();
        let system = join.await.unwrap();
        assert!(system.decision().policy().is_complete());
    }
}
