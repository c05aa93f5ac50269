//! Arena-backed DOM
//!
//! [`Document`] is a small HTML tree that implements [`Dom`] so the same parts,
//! processors and reconciliation code run on the server and in tests. Nodes
//! live in a `Vec` and are addressed by [`NodeId`]. Detached nodes stay in the
//! arena until they are passed to [`Dom::discard`], which frees their slots
//! for reuse, or until the document is dropped.

use std::collections::HashMap;

use tracing::trace;

use crate::dom::{Attribute, Dom, Event, Listener, NodeId, NodeKind};
use crate::error::{Error, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    name: String,
    data: String,
    attributes: Vec<Attribute>,
    listeners: HashMap<String, Listener>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    released: bool,
}

impl NodeData {
    fn new(kind: NodeKind, name: &str, data: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            data: data.to_string(),
            attributes: Vec::new(),
            listeners: HashMap::new(),
            parent: None,
            children: Vec::new(),
            released: false,
        }
    }
}

/// HTML tree with a counter of applied mutations
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    free: Vec<NodeId>,
    mutations: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document holding `html` parsed into a root fragment
    pub fn parse(html: &str) -> Result<(Self, NodeId)> {
        let mut doc = Self::new();
        let root = doc.parse_html(html)?;
        doc.reset_mutation_count();
        Ok((doc, root))
    }

    /// Number of tree, text and attribute writes since creation or the last reset
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    pub fn reset_mutation_count(&mut self) {
        self.mutations = 0;
    }

    /// Nodes currently held by the arena, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Serialized children of `node`
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.node(node).children {
            self.serialize(child, &mut out);
        }
        out
    }

    /// Serialized `node` including its own tag
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, &mut out);
        out
    }

    /// Replace all children of `node` with parsed markup
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        for child in self.child_nodes(node) {
            self.remove_child(node, child)?;
        }
        let fragment = self.parse_html(html)?;
        self.insert_before(node, fragment, None)
    }

    /// Deliver an event to `target` and bubble it through its ancestors
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> usize {
        let mut delivered = 0;
        let mut current = Some(target);
        while let Some(node) = current {
            if let Some(listener) = self.node(node).listeners.get(event_type) {
                listener.call(&Event {
                    event_type: event_type.to_string(),
                    target,
                    current_target: node,
                });
                delivered += 1;
            }
            current = self.node(node).parent;
        }
        delivered
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = data;
            return id;
        }
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() && !self.nodes[id.0].released {
            Ok(())
        } else {
            Err(Error::dom_owned(format!("unknown node {}", id.0)))
        }
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node(child).parent {
            self.node_mut(parent).children.retain(|&c| c != child);
            self.node_mut(child).parent = None;
        }
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    fn sibling(&self, node: NodeId, delta: isize) -> Option<NodeId> {
        let parent = self.node(node).parent?;
        let siblings = &self.node(parent).children;
        let index = siblings.iter().position(|&c| c == node)? as isize + delta;
        if index < 0 {
            return None;
        }
        siblings.get(index as usize).copied()
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        match node.kind {
            NodeKind::Text => {
                let raw = node
                    .parent
                    .map(|p| RAW_TEXT_ELEMENTS.contains(&self.node(p).name.as_str()))
                    .unwrap_or(false);
                if raw {
                    out.push_str(&node.data);
                } else {
                    escape_text(&node.data, out);
                }
            }
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&node.data);
                out.push_str("-->");
            }
            NodeKind::Fragment => {
                for &child in &node.children {
                    self.serialize(child, out);
                }
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&node.name);
                for attr in &node.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_attribute(&attr.value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&node.name.as_str()) {
                    return;
                }
                for &child in &node.children {
                    self.serialize(child, out);
                }
                out.push_str("</");
                out.push_str(&node.name);
                out.push('>');
            }
        }
    }
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

impl Dom for Document {
    fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Element, &name.to_ascii_lowercase(), ""))
    }

    fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Text, "#text", data))
    }

    fn create_comment(&mut self, data: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Comment, "#comment", data))
    }

    fn create_fragment(&mut self) -> NodeId {
        self.push(NodeData::new(NodeKind::Fragment, "#document-fragment", ""))
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.node(node).kind
    }

    fn node_name(&self, node: NodeId) -> String {
        self.node(node).name.clone()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).children.clone()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, 1)
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, -1)
    }

    fn data(&self, node: NodeId) -> String {
        self.node(node).data.clone()
    }

    fn set_data(&mut self, node: NodeId, data: &str) -> Result<()> {
        self.check(node)?;
        match self.node(node).kind {
            NodeKind::Text | NodeKind::Comment => {
                self.node_mut(node).data = data.to_string();
                self.mutations += 1;
                Ok(())
            }
            _ => Err(Error::dom_static("set_data on a node without character data")),
        }
    }

    fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId> {
        self.check(node)?;
        if self.node(node).kind != NodeKind::Text {
            return Err(Error::dom_static("split_text on a non-text node"));
        }
        let data = self.node(node).data.clone();
        let byte = match data.char_indices().nth(offset) {
            Some((byte, _)) => byte,
            None if offset == data.chars().count() => data.len(),
            None => {
                return Err(Error::dom_owned(format!(
                    "split offset {} past end of text of length {}",
                    offset,
                    data.chars().count()
                )))
            }
        };
        let (head, tail) = data.split_at(byte);
        let tail = tail.to_string();
        self.node_mut(node).data = head.to_string();
        let right = self.create_text(&tail);
        if let Some(parent) = self.node(node).parent {
            let next = self.next_sibling(node);
            self.insert_before(parent, right, next)?;
        } else {
            self.mutations += 1;
        }
        Ok(right)
    }

    fn attributes(&self, node: NodeId) -> Vec<Attribute> {
        self.node(node).attributes.clone()
    }

    fn get_attribute(&self, node: NodeId, namespace: Option<&str>, name: &str) -> Option<String> {
        self.node(node)
            .attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == namespace)
            .map(|a| a.value.clone())
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.check(node)?;
        if self.node(node).kind != NodeKind::Element {
            return Err(Error::dom_static("set_attribute on a non-element node"));
        }
        let attrs = &mut self.node_mut(node).attributes;
        match attrs
            .iter_mut()
            .find(|a| a.name == name && a.namespace.as_deref() == namespace)
        {
            Some(attr) => attr.value = value.to_string(),
            None => attrs.push(Attribute {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                value: value.to_string(),
            }),
        }
        self.mutations += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str) -> Result<()> {
        self.check(node)?;
        let attrs = &mut self.node_mut(node).attributes;
        let before = attrs.len();
        attrs.retain(|a| !(a.name == name && a.namespace.as_deref() == namespace));
        if attrs.len() != before {
            self.mutations += 1;
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        match self.node(parent).kind {
            NodeKind::Element | NodeKind::Fragment => {}
            _ => return Err(Error::dom_static("insert_before into a node that cannot have children")),
        }
        if let Some(reference) = reference {
            if self.node(reference).parent != Some(parent) {
                return Err(Error::dom_static("insert_before reference is not a child of parent"));
            }
            if reference == child {
                return Ok(());
            }
        }

        if self.node(child).kind == NodeKind::Fragment {
            for grandchild in self.child_nodes(child) {
                self.insert_before(parent, grandchild, reference)?;
            }
            return Ok(());
        }
        if self.is_ancestor(child, parent) {
            return Err(Error::dom_static("insert_before would create a cycle"));
        }

        self.detach(child);
        let siblings = &mut self.node_mut(parent).children;
        let index = match reference {
            Some(reference) => siblings
                .iter()
                .position(|&c| c == reference)
                .unwrap_or(siblings.len()),
            None => siblings.len(),
        };
        siblings.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        self.mutations += 1;
        trace!(parent = parent.0, child = child.0, "insert_before");
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(child)?;
        if self.node(child).parent != Some(parent) {
            return Err(Error::dom_owned(format!(
                "node {} is not a child of {}",
                child.0, parent.0
            )));
        }
        self.detach(child);
        self.mutations += 1;
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        if new_child == old_child {
            return Ok(());
        }
        if self.node(old_child).parent != Some(parent) {
            return Err(Error::dom_static("replace_child target is not a child of parent"));
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.remove_child(parent, old_child)
    }

    fn set_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        listener: Option<Listener>,
    ) -> Result<()> {
        self.check(node)?;
        let listeners = &mut self.node_mut(node).listeners;
        match listener {
            Some(listener) => {
                listeners.insert(event_type.to_string(), listener);
            }
            None => {
                listeners.remove(event_type);
            }
        }
        Ok(())
    }

    fn discard(&mut self, node: NodeId) {
        if self.check(node).is_err() || self.node(node).parent.is_some() {
            return;
        }
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            let mut released = NodeData::new(NodeKind::Fragment, "#released", "");
            released.released = true;
            let data = std::mem::replace(self.node_mut(id), released);
            pending.extend(data.children);
            self.free.push(id);
        }
        trace!(node = node.index(), free = self.free.len(), "discarded subtree");
    }

    fn event_listener(&self, node: NodeId, event_type: &str) -> Option<Listener> {
        self.node(node).listeners.get(event_type).cloned()
    }
}
