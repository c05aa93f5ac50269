//! Host DOM capability
//!
//! The engine never owns a tree. It drives whatever tree implements [`Dom`]:
//! node creation, navigation, text splitting, namespace-aware attributes and
//! the three child-list mutations (`insert_before`, `remove_child`,
//! `replace_child`). [`Document`](crate::document::Document) is the in-crate
//! implementation used for server rendering and tests.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::markup;

/// Stable handle of a node inside a [`Dom`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index, mostly useful for debugging output
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

/// A single attribute on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            value: value.into(),
        }
    }
}

/// Event delivered to a [`Listener`]
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    /// Node whose listener is currently running
    pub current_target: NodeId,
}

/// Event handler stored in an element's listener slot
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    /// Identity comparison; two listeners are equal only if they share the closure
    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

/// Tree mutation and navigation primitives the engine calls into
pub trait Dom {
    fn create_element(&mut self, name: &str) -> NodeId;
    fn create_text(&mut self, data: &str) -> NodeId;
    fn create_comment(&mut self, data: &str) -> NodeId;
    fn create_fragment(&mut self) -> NodeId;

    fn kind(&self, node: NodeId) -> NodeKind;
    /// Lower-case tag name for elements, `#text`, `#comment` or `#document-fragment` otherwise
    fn node_name(&self, node: NodeId) -> String;

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn child_nodes(&self, node: NodeId) -> Vec<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Character data of a text or comment node; empty for other kinds
    fn data(&self, node: NodeId) -> String;
    fn set_data(&mut self, node: NodeId, data: &str) -> Result<()>;
    /// Split a text node at a character offset, returning the new right-hand node
    fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId>;

    fn attributes(&self, node: NodeId) -> Vec<Attribute>;
    fn get_attribute(&self, node: NodeId, namespace: Option<&str>, name: &str) -> Option<String>;
    fn set_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<()>;
    fn remove_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str) -> Result<()>;

    /// Insert `child` before `reference` (or at the end when `None`); a fragment
    /// inserts its children; a node attached elsewhere is moved
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>)
        -> Result<()>;
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()>;
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()>;

    fn set_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        listener: Option<Listener>,
    ) -> Result<()>;
    fn event_listener(&self, node: NodeId, event_type: &str) -> Option<Listener>;

    /// Release a detached subtree that nothing refers to any more
    ///
    /// Hosts whose nodes are garbage collected can leave this as a no-op.
    fn discard(&mut self, _node: NodeId) {}

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    fn has_attribute(&self, node: NodeId, namespace: Option<&str>, name: &str) -> bool {
        self.get_attribute(node, namespace, name).is_some()
    }

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: NodeId) -> String {
        match self.kind(node) {
            NodeKind::Text | NodeKind::Comment => self.data(node),
            _ => {
                let mut text = String::new();
                for child in self.child_nodes(node) {
                    if self.kind(child) != NodeKind::Comment {
                        text.push_str(&self.text_content(child));
                    }
                }
                text
            }
        }
    }

    /// Parse markup into a detached fragment owned by this tree
    fn parse_html(&mut self, html: &str) -> Result<NodeId> {
        let nodes = markup::parse_fragment(html)?;
        markup::materialize(self, &nodes)
    }
}
