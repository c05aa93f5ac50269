//! Parts: the addressable mutation surface of a rendered template
//!
//! - [`AttrPart`] owns one slot of an attribute value. Every fragment of that
//!   attribute (literals and parts) lives in one shared [`AttrPartList`], and
//!   the live attribute always equals the list joined in order.
//! - [`ChildNodePart`] owns a contiguous, never-empty run of sibling nodes.
//!   Empty content is a single empty text placeholder so the run always has
//!   an anchor.
//! - [`InnerTemplatePart`] is a child-node part that also carries the
//!   directive and expression of the `<template>` element it replaced.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::instance::TemplateInstance;
use crate::reconcile::reconcile;
use crate::tokenizer::Token;
use crate::types::Template;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrItem {
    Literal(String),
    /// Current value of a part; `None` when the part removed the attribute
    Part(Option<String>),
}

/// All fragments of one templated attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrPartList {
    items: Vec<AttrItem>,
}

impl AttrPartList {
    pub fn new(items: Vec<AttrItem>) -> Self {
        Self { items }
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        Self::new(
            tokens
                .iter()
                .map(|token| match token {
                    Token::Literal(text) => AttrItem::Literal(text.clone()),
                    Token::Slot(_) => AttrItem::Part(Some(String::new())),
                })
                .collect(),
        )
    }

    pub fn items(&self) -> &[AttrItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the lengths of the items before `index`, in characters
    pub fn offset_of(&self, index: usize) -> usize {
        self.items[..index.min(self.items.len())]
            .iter()
            .map(|item| match item {
                AttrItem::Literal(text) | AttrItem::Part(Some(text)) => text.chars().count(),
                AttrItem::Part(None) => 0,
            })
            .sum()
    }
}

impl fmt::Display for AttrPartList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item {
                AttrItem::Literal(text) | AttrItem::Part(Some(text)) => f.write_str(text)?,
                AttrItem::Part(None) => {}
            }
        }
        Ok(())
    }
}

/// One slot inside an attribute value
#[derive(Debug, Clone)]
pub struct AttrPart {
    element: NodeId,
    name: String,
    namespace: Option<String>,
    list: Rc<RefCell<AttrPartList>>,
    index: usize,
}

impl AttrPart {
    pub fn new(
        element: NodeId,
        name: &str,
        namespace: Option<&str>,
        list: Rc<RefCell<AttrPartList>>,
        index: usize,
    ) -> Self {
        Self {
            element,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            list,
            index,
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn attribute_name(&self) -> &str {
        &self.name
    }

    pub fn attribute_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn list(&self) -> Rc<RefCell<AttrPartList>> {
        self.list.clone()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value(&self) -> Option<String> {
        match self.list.borrow().items.get(self.index) {
            Some(AttrItem::Part(value)) => value.clone(),
            _ => None,
        }
    }

    /// Whether this part is the only fragment of its attribute
    pub fn is_sole_fragment(&self) -> bool {
        self.list.borrow().len() == 1
    }

    /// Set this fragment and rewrite the attribute
    ///
    /// A sole fragment sets the attribute to the value or removes it for
    /// `None`; otherwise the attribute becomes the join of every fragment.
    /// Setting the current value again writes nothing.
    pub fn set_value(&self, dom: &mut dyn Dom, value: Option<&str>) -> Result<()> {
        let mut list = self.list.borrow_mut();
        let next = AttrItem::Part(value.map(str::to_string));
        match list.items.get(self.index) {
            Some(current) if *current == next => return Ok(()),
            Some(AttrItem::Part(_)) => {}
            _ => return Err(Error::invariant_static("attribute part index does not name a part")),
        }
        list.items[self.index] = next;

        let namespace = self.namespace.as_deref();
        if list.len() == 1 {
            match value {
                Some(value) => dom.set_attribute(self.element, namespace, &self.name, value),
                None => dom.remove_attribute(self.element, namespace, &self.name),
            }
        } else {
            dom.set_attribute(self.element, namespace, &self.name, &list.to_string())
        }
    }

    /// Attribute presence
    pub fn boolean_value(&self, dom: &dyn Dom) -> bool {
        dom.has_attribute(self.element, self.namespace.as_deref(), &self.name)
    }

    /// `true` sets an empty attribute, `false` removes it
    pub fn set_boolean_value(&self, dom: &mut dyn Dom, value: bool) -> Result<()> {
        if !self.is_sole_fragment() {
            return Err(Error::invariant_owned(format!(
                "attribute `{}` is not fully templatized",
                self.name
            )));
        }
        self.set_value(dom, if value { Some("") } else { None })
    }
}

/// New content for a [`ChildNodePart`]
#[derive(Debug, Clone)]
pub enum Content {
    /// Leaves only an empty placeholder
    Empty,
    Text(String),
    /// A node; a fragment contributes its children
    Node(NodeId),
    List(Vec<Content>),
}

impl Content {
    fn flatten_into(self, dom: &mut dyn Dom, out: &mut Vec<NodeId>) {
        match self {
            Content::Empty => out.push(dom.create_text("")),
            Content::Text(text) => out.push(dom.create_text(&text)),
            Content::Node(node) => {
                if dom.kind(node) == NodeKind::Fragment {
                    out.extend(dom.child_nodes(node));
                } else {
                    out.push(node);
                }
            }
            Content::List(items) => {
                for item in items {
                    item.flatten_into(dom, out);
                }
            }
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<NodeId> for Content {
    fn from(node: NodeId) -> Self {
        Content::Node(node)
    }
}

impl From<Vec<NodeId>> for Content {
    fn from(nodes: Vec<NodeId>) -> Self {
        Content::List(nodes.into_iter().map(Content::Node).collect())
    }
}

/// A template instance rendered into a child-node part
#[derive(Debug)]
pub struct Nested {
    pub template: Arc<Template>,
    pub instance: TemplateInstance,
}

/// A contiguous run of sibling nodes
#[derive(Debug)]
pub struct ChildNodePart {
    nodes: Vec<NodeId>,
    /// Nested instances by item position; one entry for a single template value
    pub(crate) nested: Vec<Option<Nested>>,
}

impl ChildNodePart {
    /// Bind to `nodes`; an empty list is not a valid part
    pub fn new(nodes: Vec<NodeId>) -> Self {
        debug_assert!(!nodes.is_empty(), "child node part needs an anchor node");
        Self {
            nodes,
            nested: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn parent_node(&self, dom: &dyn Dom) -> Option<NodeId> {
        self.nodes.first().and_then(|&node| dom.parent(node))
    }

    pub fn next_sibling(&self, dom: &dyn Dom) -> Option<NodeId> {
        self.nodes.last().and_then(|&node| dom.next_sibling(node))
    }

    pub fn previous_sibling(&self, dom: &dyn Dom) -> Option<NodeId> {
        self.nodes.first().and_then(|&node| dom.previous_sibling(node))
    }

    /// Text content of every owned node
    pub fn value(&self, dom: &dyn Dom) -> String {
        self.nodes.iter().map(|&node| dom.text_content(node)).collect()
    }

    /// Whether the part holds exactly one text node with `text`
    pub fn is_text(&self, dom: &dyn Dom, text: &str) -> bool {
        self.nested.is_empty()
            && self.nodes.len() == 1
            && dom.kind(self.nodes[0]) == NodeKind::Text
            && dom.data(self.nodes[0]) == text
    }

    /// Replace the owned nodes through reconciliation
    pub fn replace(&mut self, dom: &mut dyn Dom, content: Content) -> Result<()> {
        let mut wanted = Vec::new();
        content.flatten_into(dom, &mut wanted);
        if wanted.is_empty() {
            wanted.push(dom.create_text(""));
        }
        let parent = self
            .parent_node(dom)
            .ok_or_else(|| Error::dom_static("child node part is detached"))?;
        let end = self.next_sibling(dom);
        self.nodes = reconcile(dom, parent, &self.nodes, wanted, end)?;
        self.nested.clear();
        Ok(())
    }

    /// Show `text`, rewriting a lone text node in place when possible
    pub fn set_text(&mut self, dom: &mut dyn Dom, text: &str) -> Result<()> {
        if self.nested.is_empty() && self.nodes.len() == 1 && dom.kind(self.nodes[0]) == NodeKind::Text {
            if dom.data(self.nodes[0]) != text {
                dom.set_data(self.nodes[0], text)?;
            }
            return Ok(());
        }
        self.replace(dom, Content::Text(text.to_string()))
    }

    /// Parse `html` with the host parser and reconcile to the result
    pub fn replace_html(&mut self, dom: &mut dyn Dom, html: &str) -> Result<()> {
        let fragment = dom.parse_html(html)?;
        self.replace(dom, Content::Node(fragment))
    }

    /// Siblings before and after the owned run, captured so the run can be
    /// re-read after its contents were edited from inside
    pub(crate) fn bounds(&self, dom: &dyn Dom) -> Result<(NodeId, Option<NodeId>, Option<NodeId>)> {
        let parent = self
            .parent_node(dom)
            .ok_or_else(|| Error::dom_static("child node part is detached"))?;
        Ok((parent, self.previous_sibling(dom), self.next_sibling(dom)))
    }

    /// Rebind to every sibling strictly between `before` and `after`
    pub(crate) fn rebind_between(
        &mut self,
        dom: &dyn Dom,
        parent: NodeId,
        before: Option<NodeId>,
        after: Option<NodeId>,
    ) {
        let nodes = span_between(dom, parent, before, after);
        if !nodes.is_empty() {
            self.nodes = nodes;
        }
    }

    pub(crate) fn set_nodes(&mut self, nodes: Vec<NodeId>) {
        if !nodes.is_empty() {
            self.nodes = nodes;
        }
    }
}

/// Children of `parent` strictly between two siblings (`None` = open end)
pub(crate) fn span_between(
    dom: &dyn Dom,
    parent: NodeId,
    before: Option<NodeId>,
    after: Option<NodeId>,
) -> Vec<NodeId> {
    let children = dom.child_nodes(parent);
    let start = match before {
        Some(before) => match children.iter().position(|&c| c == before) {
            Some(index) => index + 1,
            None => return Vec::new(),
        },
        None => 0,
    };
    let end = match after {
        Some(after) => children.iter().position(|&c| c == after).unwrap_or(children.len()),
        None => children.len(),
    };
    if start >= end {
        return Vec::new();
    }
    children[start..end].to_vec()
}

/// Child-node part sourced from a `<template>` placeholder
#[derive(Debug)]
pub struct InnerTemplatePart {
    pub part: ChildNodePart,
    directive: Option<String>,
    expression: String,
    template: Arc<Template>,
}

impl InnerTemplatePart {
    pub fn new(
        part: ChildNodePart,
        directive: Option<String>,
        expression: String,
        template: Arc<Template>,
    ) -> Self {
        Self {
            part,
            directive,
            expression,
            template,
        }
    }

    pub fn directive(&self) -> Option<&str> {
        self.directive.as_deref()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Compiled contents of the `<template>` element
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }
}

#[derive(Debug)]
pub enum Part {
    Attribute(AttrPart),
    ChildNode(ChildNodePart),
    InnerTemplate(InnerTemplatePart),
}

impl Part {
    pub fn as_attribute(&self) -> Option<&AttrPart> {
        match self {
            Part::Attribute(part) => Some(part),
            _ => None,
        }
    }

    /// Child-node view of both child-node and inner-template parts
    pub fn as_child_node(&self) -> Option<&ChildNodePart> {
        match self {
            Part::ChildNode(part) => Some(part),
            Part::InnerTemplate(inner) => Some(&inner.part),
            Part::Attribute(_) => None,
        }
    }

    pub fn as_child_node_mut(&mut self) -> Option<&mut ChildNodePart> {
        match self {
            Part::ChildNode(part) => Some(part),
            Part::InnerTemplate(inner) => Some(&mut inner.part),
            Part::Attribute(_) => None,
        }
    }

    /// Current value as a string: the attribute fragment or the text content
    pub fn value(&self, dom: &dyn Dom) -> Option<String> {
        match self {
            Part::Attribute(part) => part.value(),
            Part::ChildNode(part) => Some(part.value(dom)),
            Part::InnerTemplate(inner) => Some(inner.part.value(dom)),
        }
    }
}

/// Ordered `(expression, part)` pairs of one template instance
pub type PartList = Vec<(String, Part)>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use pretty_assertions::assert_eq;

    fn attr_setup(doc: &mut Document, items: Vec<AttrItem>) -> (NodeId, Rc<RefCell<AttrPartList>>) {
        let element = doc.create_element("div");
        let list = Rc::new(RefCell::new(AttrPartList::new(items)));
        doc.set_attribute(element, None, "class", &list.borrow().to_string())
            .unwrap();
        (element, list)
    }

    #[test]
    fn test_attribute_is_join_of_fragments() {
        let mut doc = Document::new();
        let (element, list) = attr_setup(
            &mut doc,
            vec![
                AttrItem::Literal("my-".into()),
                AttrItem::Part(Some(String::new())),
                AttrItem::Literal("-state ".into()),
                AttrItem::Part(Some(String::new())),
            ],
        );
        let x = AttrPart::new(element, "class", None, list.clone(), 1);
        let y = AttrPart::new(element, "class", None, list.clone(), 3);
        x.set_value(&mut doc, Some("foo")).unwrap();
        y.set_value(&mut doc, Some("bar")).unwrap();
        assert_eq!(doc.get_attribute(element, None, "class").as_deref(), Some("my-foo-state bar"));
        x.set_value(&mut doc, Some("jim")).unwrap();
        y.set_value(&mut doc, Some("bill")).unwrap();
        assert_eq!(doc.get_attribute(element, None, "class").as_deref(), Some("my-jim-state bill"));
        assert_eq!(list.borrow().offset_of(3), "my-jim-state ".len());
    }

    #[test]
    fn test_sole_fragment_sets_and_removes() {
        let mut doc = Document::new();
        let (element, list) = attr_setup(&mut doc, vec![AttrItem::Part(Some(String::new()))]);
        let part = AttrPart::new(element, "class", None, list, 0);
        part.set_value(&mut doc, Some("on")).unwrap();
        assert_eq!(doc.get_attribute(element, None, "class").as_deref(), Some("on"));
        part.set_value(&mut doc, None).unwrap();
        assert!(!doc.has_attribute(element, None, "class"));
    }

    #[test]
    fn test_same_value_writes_nothing() {
        let mut doc = Document::new();
        let (element, list) = attr_setup(&mut doc, vec![AttrItem::Part(Some(String::new()))]);
        let part = AttrPart::new(element, "class", None, list, 0);
        part.set_value(&mut doc, Some("a")).unwrap();
        doc.reset_mutation_count();
        part.set_value(&mut doc, Some("a")).unwrap();
        assert_eq!(doc.mutation_count(), 0);
    }

    #[test]
    fn test_boolean_value_requires_sole_fragment() {
        let mut doc = Document::new();
        let (element, list) = attr_setup(
            &mut doc,
            vec![AttrItem::Literal("a ".into()), AttrItem::Part(Some(String::new()))],
        );
        let part = AttrPart::new(element, "class", None, list, 1);
        let err = part.set_boolean_value(&mut doc, true).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_boolean_toggle() {
        let mut doc = Document::new();
        let element = doc.create_element("div");
        doc.set_attribute(element, None, "hidden", "").unwrap();
        let list = Rc::new(RefCell::new(AttrPartList::new(vec![AttrItem::Part(Some(String::new()))])));
        let part = AttrPart::new(element, "hidden", None, list, 0);
        part.set_boolean_value(&mut doc, false).unwrap();
        assert!(!part.boolean_value(&doc));
        part.set_boolean_value(&mut doc, true).unwrap();
        assert_eq!(doc.outer_html(element), "<div hidden=\"\"></div>");
        part.set_boolean_value(&mut doc, true).unwrap();
        part.set_boolean_value(&mut doc, false).unwrap();
        assert_eq!(doc.outer_html(element), "<div></div>");
    }

    fn child_setup(doc: &mut Document) -> (NodeId, ChildNodePart) {
        let root = doc.create_element("p");
        let before = doc.create_text("<");
        let placeholder = doc.create_text("");
        let after = doc.create_text(">");
        for node in [before, placeholder, after] {
            doc.append_child(root, node).unwrap();
        }
        (root, ChildNodePart::new(vec![placeholder]))
    }

    #[test]
    fn test_empty_content_keeps_one_placeholder() {
        let mut doc = Document::new();
        let (root, mut part) = child_setup(&mut doc);
        part.replace(&mut doc, Content::List(vec![])).unwrap();
        assert_eq!(part.nodes().len(), 1);
        assert_eq!(doc.child_nodes(root).len(), 3);

        part.replace(&mut doc, Content::Empty).unwrap();
        assert_eq!(part.nodes().len(), 1);

        part.replace(&mut doc, Content::from("x")).unwrap();
        assert_eq!(doc.child_nodes(root).len(), 3);
        assert_eq!(doc.inner_html(root), "&lt;x&gt;");
    }

    #[test]
    fn test_replace_unwraps_fragments() {
        let mut doc = Document::new();
        let (root, mut part) = child_setup(&mut doc);
        let fragment = doc.parse_html("<b>1</b><i>2</i>").unwrap();
        part.replace(&mut doc, Content::Node(fragment)).unwrap();
        assert_eq!(part.nodes().len(), 2);
        assert_eq!(doc.inner_html(root), "&lt;<b>1</b><i>2</i>&gt;");
        assert_eq!(part.value(&doc), "12");
    }

    #[test]
    fn test_replace_html() {
        let mut doc = Document::new();
        let (root, mut part) = child_setup(&mut doc);
        part.replace_html(&mut doc, "<em>hi</em> there").unwrap();
        assert_eq!(doc.inner_html(root), "&lt;<em>hi</em> there&gt;");
        assert_eq!(part.previous_sibling(&doc), Some(doc.child_nodes(root)[0]));
        assert_eq!(part.next_sibling(&doc), doc.child_nodes(root).last().copied());
    }

    #[test]
    fn test_set_text_rewrites_in_place() {
        let mut doc = Document::new();
        let (_, mut part) = child_setup(&mut doc);
        let node = part.nodes()[0];
        part.set_text(&mut doc, "hello").unwrap();
        assert_eq!(part.nodes(), &[node]);
        assert!(part.is_text(&doc, "hello"));
    }

    #[test]
    fn test_span_between() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let nodes: Vec<_> = (0..4).map(|i| doc.create_text(&i.to_string())).collect();
        for &node in &nodes {
            doc.append_child(root, node).unwrap();
        }
        assert_eq!(span_between(&doc, root, Some(nodes[0]), Some(nodes[3])), nodes[1..3].to_vec());
        assert_eq!(span_between(&doc, root, None, None), nodes);
        assert!(span_between(&doc, root, Some(nodes[1]), Some(nodes[2])).is_empty());
    }
}
