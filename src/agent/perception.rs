//! Environment perception: turn a borrowed UI tree into a [`Snapshot`].

use thiserror::Error;

use super::snapshot::{Snapshot, UiElement};
use super::tree::UiNode;

/// Default upper bound on visited nodes per analysis.
pub const DEFAULT_MAX_NODES: usize = 10_000;

/// Perception errors. Never surfaced past [`EnvironmentPerception::analyze`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerceptionError {
    #[error("UI tree exceeds {0} nodes")]
    TreeTooLarge(usize),
}

/// Extracts interactive elements from a UI tree.
#[derive(Debug, Clone)]
pub struct EnvironmentPerception {
    max_nodes: usize,
}

impl Default for EnvironmentPerception {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODES)
    }
}

impl EnvironmentPerception {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Analyze the tree under `root`.
    ///
    /// A missing root or a malformed tree degrades to an empty snapshot.
    /// The root is only borrowed for the duration of this call.
    pub fn analyze<N: UiNode>(&self, root: Option<&N>) -> Snapshot {
        let Some(root) = root else {
            tracing::debug!("No root node, empty snapshot");
            return Snapshot::empty();
        };

        match self.extract_elements(root) {
            Ok(elements) => {
                tracing::debug!("Perceived {} interactive elements", elements.len());
                Snapshot::new(elements)
            }
            Err(e) => {
                tracing::warn!("Perception failed, using empty snapshot: {}", e);
                Snapshot::empty()
            }
        }
    }

    /// Depth-first, pre-order walk. Children are visited whether or not their
    /// parent is interactive.
    fn extract_elements<N: UiNode>(&self, root: &N) -> Result<Vec<UiElement>, PerceptionError> {
        let mut elements = Vec::new();
        let mut stack = vec![root];
        let mut visited = 0usize;

        while let Some(node) = stack.pop() {
            visited += 1;
            if visited > self.max_nodes {
                return Err(PerceptionError::TreeTooLarge(self.max_nodes));
            }

            if node.is_clickable() || node.is_editable() {
                elements.push(UiElement {
                    identifier: node.resource_id().map(|s| s.to_string()),
                    text: node.text().unwrap_or_default().to_string(),
                    element_class: node.class_name().unwrap_or_default().to_string(),
                    bounds: node.bounds(),
                    clickable: node.is_clickable(),
                    editable: node.is_editable(),
                });
            }

            // Reverse push keeps the first child on top of the stack.
            for index in (0..node.child_count()).rev() {
                if let Some(child) = node.child(index) {
                    stack.push(child);
                }
            }
        }

        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tree::UiTreeNode;

    fn sample_tree() -> UiTreeNode {
        UiTreeNode::new("android.widget.FrameLayout").with_children([
            UiTreeNode::new("android.widget.LinearLayout")
                .with_child(UiTreeNode::edit_text("search_box"))
                .with_child(UiTreeNode::new("android.widget.TextView").with_text("label")),
            UiTreeNode::new("android.widget.LinearLayout")
                .clickable()
                .with_child(UiTreeNode::button("go_button", "Go")),
        ])
    }

    #[test]
    fn test_missing_root_is_empty() {
        let perception = EnvironmentPerception::default();
        assert!(perception.analyze::<UiTreeNode>(None).is_empty());
    }

    #[test]
    fn test_no_interactive_nodes() {
        let tree = UiTreeNode::new("android.widget.FrameLayout")
            .with_child(UiTreeNode::new("android.widget.TextView").with_text("hello"));
        let snapshot = EnvironmentPerception::default().analyze(Some(&tree));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_preorder_traversal() {
        let tree = sample_tree();
        let snapshot = EnvironmentPerception::default().analyze(Some(&tree));

        let ids: Vec<Option<&str>> = snapshot
            .elements()
            .iter()
            .map(|e| e.identifier.as_deref())
            .collect();
        // The clickable container comes before its own child.
        assert_eq!(ids, vec![Some("search_box"), None, Some("go_button")]);
        assert!(snapshot.elements()[0].editable);
        assert_eq!(snapshot.elements()[0].text, "");
        assert_eq!(snapshot.elements()[2].text, "Go");
    }

    #[test]
    fn test_traversal_is_deterministic() {
        let tree = sample_tree();
        let perception = EnvironmentPerception::default();
        assert_eq!(perception.analyze(Some(&tree)), perception.analyze(Some(&tree)));
    }

    #[test]
    fn test_oversized_tree_degrades_to_empty() {
        let tree = sample_tree();
        let perception = EnvironmentPerception::new(3);
        assert!(perception.analyze(Some(&tree)).is_empty());
    }
}
