//! Immutable observation of the interactive part of a UI tree.

use serde::{Deserialize, Serialize};

use super::tree::Bounds;

/// One interactive node captured during perception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiElement {
    /// Platform resource id, e.g. `com.example:id/search_box`.
    pub identifier: Option<String>,
    /// Visible text, empty when the node has none.
    pub text: String,
    /// Widget kind, e.g. `android.widget.Button`.
    pub element_class: String,
    pub bounds: Bounds,
    pub clickable: bool,
    pub editable: bool,
}

impl UiElement {
    /// Whether this element's identifier names `wanted`.
    ///
    /// Matches the full resource id as well as the short name after `:id/`.
    pub fn has_identifier(&self, wanted: &str) -> bool {
        match self.identifier.as_deref() {
            Some(id) => id == wanted || short_identifier(id) == wanted,
            None => false,
        }
    }
}

/// Strip an Android package prefix (`pkg:id/name` -> `name`).
pub fn short_identifier(identifier: &str) -> &str {
    identifier
        .rsplit_once(":id/")
        .map(|(_, name)| name)
        .unwrap_or(identifier)
}

/// Reference to an element of the snapshot an action was decided on.
///
/// Never a live platform handle: the executor resolves it against the live
/// tree at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ElementRef {
    /// Resource id of the element. `nth` counts earlier elements carrying the
    /// same id, so list rows sharing an id stay distinct.
    Id {
        id: String,
        #[serde(default)]
        nth: usize,
    },
    /// Traversal position, checked against the element class on resolution.
    Position { index: usize, element_class: String },
}

impl ElementRef {
    /// Reference to the first element carrying `id`.
    pub fn id(id: impl Into<String>) -> Self {
        ElementRef::Id {
            id: id.into(),
            nth: 0,
        }
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id { id, nth: 0 } => write!(f, "{}", short_identifier(id)),
            Self::Id { id, nth } => write!(f, "{}[{}]", short_identifier(id), nth),
            Self::Position {
                index,
                element_class,
            } => write!(f, "#{} ({})", index, element_class),
        }
    }
}

/// Ordered, immutable list of interactive elements in DFS pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    elements: Vec<UiElement>,
}

impl Snapshot {
    pub fn new(elements: Vec<UiElement>) -> Self {
        Self { elements }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[UiElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UiElement> {
        self.elements.get(index)
    }

    /// Build the most stable reference for the element at `index`.
    ///
    /// Elements with a resource id are referenced by id and occurrence, so the
    /// reference resolves back to this exact element and not to an earlier
    /// sibling sharing the id.
    pub fn element_ref(&self, index: usize) -> Option<ElementRef> {
        let element = self.elements.get(index)?;
        let reference = match element.identifier.as_deref() {
            Some(id) if !id.is_empty() => ElementRef::Id {
                id: id.to_string(),
                nth: self.elements[..index]
                    .iter()
                    .filter(|other| other.identifier.as_deref() == Some(id))
                    .count(),
            },
            _ => ElementRef::Position {
                index,
                element_class: element.element_class.clone(),
            },
        };
        Some(reference)
    }

    /// Find the element an [`ElementRef`] points at, with its position.
    ///
    /// Identifier references resolve to the `nth` element carrying that id.
    pub fn resolve(&self, element_ref: &ElementRef) -> Option<(usize, &UiElement)> {
        match element_ref {
            ElementRef::Id { id, nth } => self
                .elements
                .iter()
                .enumerate()
                .filter(|(_, element)| element.identifier.as_deref() == Some(id.as_str()))
                .nth(*nth),
            ElementRef::Position {
                index,
                element_class,
            } => self
                .elements
                .get(*index)
                .filter(|element| &element.element_class == element_class)
                .map(|element| (*index, element)),
        }
    }
}
