use std::fmt;

use thiserror::Error;

mod html;
mod memory;
mod selector;
mod style;

pub use memory::MemoryDocument;

/// Handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// After the existing children.
    Append,
    /// Before the existing children.
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    Input { input_type: String },
    Textarea,
    Select { multiple: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Snapshot of a form control's submit-relevant state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    pub name: Option<String>,
    pub kind: ControlKind,
    pub disabled: bool,
    pub checked: bool,
    pub value: ControlValue,
}

impl FormControl {
    /// Checkboxes and radios only submit while checked.
    pub fn is_checkable(&self) -> bool {
        matches!(
            &self.kind,
            ControlKind::Input { input_type } if input_type == "checkbox" || input_type == "radio"
        )
    }
}

/// The live page the dispatcher mutates and the serializer reads.
///
/// Selectors resolving to nothing are not errors; callers get an empty list.
pub trait Document {
    /// The node new top-level content hangs off when no `body` exists.
    fn root(&self) -> NodeId;

    fn select(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Matches among the descendants of `root`, in document order.
    fn select_within(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Reads a property, falling back to the attribute of the same name.
    fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, DomError>;

    fn set_property(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), DomError>;

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), DomError>;

    fn insert_html(
        &mut self,
        node: NodeId,
        html: &str,
        position: InsertPosition,
    ) -> Result<(), DomError>;

    /// Sets one inline style property; an empty value removes it.
    fn set_style(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), DomError>;

    fn remove(&mut self, node: NodeId) -> Result<(), DomError>;

    fn create_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId, DomError>;

    /// `None` when `node` is not an input, textarea or select.
    fn form_control(&self, node: NodeId) -> Result<Option<FormControl>, DomError>;

    /// Restores every control under `root` to its initial state.
    fn reset_controls(&mut self, root: NodeId) -> Result<(), DomError>;
}
