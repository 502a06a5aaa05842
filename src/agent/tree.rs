//! UI tree abstraction consumed by environment perception.
//!
//! Platform tree sources (accessibility services, `uiautomator` dumps, JSON
//! fixtures) expose their nodes through the [`UiNode`] trait. Perception only
//! ever borrows a root for the duration of one `analyze` call.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Create bounds from edges.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Center point, used as the tap target.
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    /// Whether the rectangle has no area (or is inverted).
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Read-only view of one node of a platform UI tree.
///
/// Every accessor mirrors what a platform may legitimately leave unset:
/// identifiers, text and class names can all be missing, and a child slot
/// may be empty even when `child_count` counts it.
pub trait UiNode {
    fn resource_id(&self) -> Option<&str>;
    fn text(&self) -> Option<&str>;
    fn class_name(&self) -> Option<&str>;
    fn bounds(&self) -> Bounds;
    fn is_clickable(&self) -> bool;
    fn is_editable(&self) -> bool;
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<&Self>;
}

/// Owned UI tree node.
///
/// Produced by the ADB hierarchy parser and deserializable from JSON, so an
/// event can carry a fully materialized tree instead of a platform handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiTreeNode {
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub class_name: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    pub editable: bool,
    pub children: Vec<UiTreeNode>,
}

impl UiTreeNode {
    /// Create a non-interactive node of the given class.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Default::default()
        }
    }

    /// Clickable button-like node.
    pub fn button(resource_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("android.widget.Button")
            .with_resource_id(resource_id)
            .with_text(text)
            .clickable()
    }

    /// Editable text field node.
    pub fn edit_text(resource_id: impl Into<String>) -> Self {
        Self::new("android.widget.EditText")
            .with_resource_id(resource_id)
            .editable()
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn with_child(mut self, child: UiTreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = UiTreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(UiTreeNode::node_count).sum::<usize>()
    }
}

impl UiNode for UiTreeNode {
    fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn is_clickable(&self) -> bool {
        self.clickable
    }

    fn is_editable(&self) -> bool {
        self.editable
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<&Self> {
        self.children.get(index)
    }
}
