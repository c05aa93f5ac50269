//! Enhancement matcher
//!
//! Hydration binds parts to markup that already holds rendered values. The
//! matcher works in two passes over two trees:
//!
//! 1. [`Matcher::harvest`] reads a fresh client render of the same template and
//!    state and describes every part as a [`Selector`].
//! 2. [`Matcher::resolve`] walks those selectors through the existing markup,
//!    splits text nodes at the computed boundaries and rebuilds the parts.
//!
//! Both passes see a level of siblings the same way. Adjoining text nodes form
//! one text block (comments do not break a block), and a block with nothing
//! but ASCII whitespace is ignorable: it gets no path step and is never
//! counted. Offsets into text blocks are measured in whitespace-collapsed
//! characters, so a server that collapses or expands whitespace runs still
//! lines up with the client's tokenizer.
//!
//! A selector that cannot be resolved leaves its part unbound and is recorded
//! as a [`Mismatch`]; so is content that differs from the fresh render.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::Result;
use crate::parts::{span_between, AttrItem, AttrPart, AttrPartList, ChildNodePart, InnerTemplatePart, Part, PartList};
use crate::selector::{Path, Selector, Step};
use crate::tokenizer::Token;
use crate::types::{PartDescriptor, Template, TemplateConfig};

/// The sibling run a template instance occupies: every child of `parent`
/// strictly between `before` and `after`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    parent: NodeId,
    before: Option<NodeId>,
    after: Option<NodeId>,
}

impl Scope {
    /// All children of `parent`
    pub fn children(parent: NodeId) -> Self {
        Self {
            parent,
            before: None,
            after: None,
        }
    }

    /// Exactly `nodes`, which must be consecutive children of `parent`
    pub fn around(dom: &dyn Dom, parent: NodeId, nodes: &[NodeId]) -> Self {
        match (nodes.first(), nodes.last()) {
            (Some(&first), Some(&last)) => Self {
                parent,
                before: dom.previous_sibling(first),
                after: dom.next_sibling(last),
            },
            _ => Self {
                parent,
                before: dom.child_nodes(parent).last().copied(),
                after: None,
            },
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Current nodes of the run; text splits inside it are picked up
    pub fn nodes(&self, dom: &dyn Dom) -> Vec<NodeId> {
        span_between(dom, self.parent, self.before, self.after)
    }

    fn level(&self, dom: &dyn Dom) -> Level {
        Level::read(dom, self.parent, &self.nodes(dom), self.after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Text at the resolved offsets differs from the fresh render
    Text,
    /// Attribute slice differs from the fresh render
    Attribute,
    /// The path does not resolve; the part is left unbound
    Structure,
}

/// A non-fatal difference between existing markup and the template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub expression: String,
    pub path: String,
    pub expected: Option<String>,
    pub found: Option<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} mismatch for `{}` at {}", self.kind, self.expression, self.path)?;
        if let Some(expected) = &self.expected {
            write!(f, ": expected {:?}", expected)?;
        }
        if let Some(found) = &self.found {
            write!(f, ", found {:?}", found)?;
        }
        Ok(())
    }
}

/// Parts rebuilt against existing markup, aligned with the template's
/// descriptors; `None` marks a part that could not be bound
#[derive(Debug, Default)]
pub struct Resolved {
    pub parts: Vec<Option<Part>>,
    pub mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone)]
enum Item {
    Element { node: NodeId, name: String },
    Text { nodes: Vec<NodeId>, text: String },
}

impl Item {
    fn significant(&self) -> bool {
        match self {
            Item::Element { .. } => true,
            Item::Text { text, .. } => text.chars().any(|c| !c.is_ascii_whitespace()),
        }
    }

    fn is_element(&self) -> bool {
        matches!(self, Item::Element { .. })
    }

    fn first(&self) -> NodeId {
        match self {
            Item::Element { node, .. } => *node,
            Item::Text { nodes, .. } => nodes[0],
        }
    }

    fn last(&self) -> NodeId {
        match self {
            Item::Element { node, .. } => *node,
            Item::Text { nodes, .. } => nodes[nodes.len() - 1],
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        match self {
            Item::Element { node: element, .. } => *element == node,
            Item::Text { nodes, .. } => nodes.contains(&node),
        }
    }
}

/// One level of siblings seen as elements and text blocks
#[derive(Debug)]
struct Level {
    parent: NodeId,
    /// Node right after the level, where insertions at its end go
    end: Option<NodeId>,
    items: Vec<Item>,
}

impl Level {
    fn read(dom: &dyn Dom, parent: NodeId, nodes: &[NodeId], end: Option<NodeId>) -> Self {
        let mut items: Vec<Item> = Vec::new();
        for &node in nodes {
            match dom.kind(node) {
                NodeKind::Element => items.push(Item::Element {
                    node,
                    name: dom.node_name(node),
                }),
                kind @ (NodeKind::Text | NodeKind::Comment) => {
                    let data = if kind == NodeKind::Text {
                        dom.data(node)
                    } else {
                        String::new()
                    };
                    if let Some(Item::Text { nodes, text }) = items.last_mut() {
                        nodes.push(node);
                        text.push_str(&data);
                        continue;
                    }
                    items.push(Item::Text {
                        nodes: vec![node],
                        text: data,
                    });
                }
                NodeKind::Fragment => {}
            }
        }
        Self { parent, end, items }
    }

    fn children(dom: &dyn Dom, element: NodeId) -> Self {
        Self::read(dom, element, &dom.child_nodes(element), None)
    }

    fn item_of(&self, node: NodeId) -> Option<usize> {
        self.items.iter().position(|item| item.contains(node))
    }

    /// Path step of the item at `index`; ignorable blocks have none
    fn step(&self, index: usize) -> Option<Step> {
        match &self.items[index] {
            Item::Element { name, .. } => {
                let count = self.items[..=index]
                    .iter()
                    .filter(|item| matches!(item, Item::Element { name: n, .. } if n == name))
                    .count();
                Some(Step::Element {
                    name: name.clone(),
                    index: count,
                })
            }
            item @ Item::Text { .. } if item.significant() => {
                let count = self.items[..=index]
                    .iter()
                    .filter(|item| !item.is_element() && item.significant())
                    .count();
                Some(Step::Text { index: count })
            }
            Item::Text { .. } => None,
        }
    }

    fn find(&self, step: &Step) -> Option<usize> {
        let mut count = 0;
        for (index, item) in self.items.iter().enumerate() {
            let hit = match (step, item) {
                (Step::Element { name, .. }, Item::Element { name: n, .. }) => n == name,
                (Step::Text { .. }, Item::Text { .. }) => item.significant(),
                _ => false,
            };
            if hit {
                count += 1;
                let wanted = match step {
                    Step::Element { index, .. } | Step::Text { index } => *index,
                };
                if count == wanted {
                    return Some(index);
                }
            }
        }
        None
    }

    fn significant(&self) -> Vec<usize> {
        (0..self.items.len())
            .filter(|&index| self.items[index].significant())
            .collect()
    }
}

/// Whitespace-collapsed view of a text block
///
/// Runs of ASCII whitespace count as one space and whitespace at the start
/// of the block counts as nothing.
#[derive(Debug)]
struct Collapsed {
    chars: Vec<char>,
    /// Raw offset of every collapsed character, plus the raw length
    raw_of: Vec<usize>,
    /// Collapsed offset at every raw position, plus the collapsed length
    collapsed_of: Vec<usize>,
}

impl Collapsed {
    fn new(raw: &str) -> Self {
        let mut chars = Vec::new();
        let mut raw_of = Vec::new();
        let mut collapsed_of = Vec::new();
        let mut after_space = true;
        let mut length = 0;
        for (index, c) in raw.chars().enumerate() {
            collapsed_of.push(chars.len());
            length = index + 1;
            if c.is_ascii_whitespace() {
                if after_space {
                    continue;
                }
                chars.push(' ');
                after_space = true;
            } else {
                chars.push(c);
                after_space = false;
            }
            raw_of.push(index);
        }
        collapsed_of.push(chars.len());
        raw_of.push(length);
        Self {
            chars,
            raw_of,
            collapsed_of,
        }
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    fn raw(&self, offset: usize) -> usize {
        self.raw_of[offset.min(self.len())]
    }

    fn collapsed(&self, raw: usize) -> usize {
        self.collapsed_of[raw.min(self.collapsed_of.len() - 1)]
    }

    fn slice(&self, offset: usize, length: usize) -> String {
        let start = offset.min(self.len());
        let end = offset.saturating_add(length).min(self.len());
        self.chars[start..end].iter().collect()
    }
}

/// Significant items among `nodes`, each as its own run
///
/// Lists enhance item by item only when every rendered item is one element
/// or one text block, which is what this splits on.
pub(crate) fn significant_runs(dom: &dyn Dom, parent: NodeId, nodes: &[NodeId]) -> Vec<Vec<NodeId>> {
    Level::read(dom, parent, nodes, None)
        .items
        .into_iter()
        .filter(Item::significant)
        .map(|item| match item {
            Item::Element { node, .. } => vec![node],
            Item::Text { nodes, .. } => nodes,
        })
        .collect()
}

/// `(node, start, end)` raw character ranges of a block's nodes
fn positions(dom: &dyn Dom, block: &[NodeId]) -> Vec<(NodeId, usize, usize)> {
    let mut offset = 0;
    block
        .iter()
        .map(|&node| {
            let length = match dom.kind(node) {
                NodeKind::Text => dom.data(node).chars().count(),
                _ => 0,
            };
            let range = (node, offset, offset + length);
            offset += length;
            range
        })
        .collect()
}

/// Split the block so that a node boundary falls on raw offset `at`
fn cut(dom: &mut dyn Dom, block: &[NodeId], at: usize) -> Result<Vec<NodeId>> {
    let mut nodes = Vec::with_capacity(block.len() + 1);
    for (node, start, end) in positions(dom, block) {
        nodes.push(node);
        if start < at && at < end {
            nodes.push(dom.split_text(node, at - start)?);
        }
    }
    Ok(nodes)
}

/// Siblings from `first` through `last`
fn run(dom: &dyn Dom, first: NodeId, last: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![first];
    let mut current = first;
    while current != last {
        match dom.next_sibling(current) {
            Some(next) => {
                nodes.push(next);
                current = next;
            }
            None => break,
        }
    }
    nodes
}

/// Walks selectors between fresh renders and existing markup
pub struct Matcher<'a> {
    config: &'a TemplateConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(config: &'a TemplateConfig) -> Self {
        Self { config }
    }

    /// Describe each part of a fresh render rooted at `scope`
    ///
    /// The result is aligned with `parts`; a part whose anchor is outside the
    /// scope yields `None`.
    pub fn harvest(&self, dom: &dyn Dom, scope: &Scope, parts: &PartList) -> Vec<Option<Selector>> {
        parts
            .iter()
            .map(|(key, part)| match part {
                Part::Attribute(attr) => self.attribute_selector(dom, scope, key, attr),
                Part::ChildNode(child) => self.child_selector(dom, scope, key, child.nodes()),
                Part::InnerTemplate(inner) => self.child_selector(dom, scope, key, inner.part.nodes()),
            })
            .collect()
    }

    fn attribute_selector(&self, dom: &dyn Dom, scope: &Scope, key: &str, attr: &AttrPart) -> Option<Selector> {
        let path = container_path(dom, scope, Some(attr.element()))?;
        let list = attr.list();
        let offset = list.borrow().offset_of(attr.index());
        let value = attr.value();
        let mut selector = Selector::new(path, key)
            .with_attribute(attr.attribute_name())
            .with_offset(offset)
            .with_length(value.as_deref().map(|v| v.chars().count()).unwrap_or(0));
        if let Some(value) = value {
            selector = selector.with_expected(value);
        }
        Some(selector)
    }

    fn child_selector(&self, dom: &dyn Dom, scope: &Scope, key: &str, nodes: &[NodeId]) -> Option<Selector> {
        let first = *nodes.first()?;
        let parent = dom.parent(first)?;
        let container = (parent != scope.parent).then_some(parent);
        let level = match container {
            Some(element) => Level::children(dom, element),
            None => scope.level(dom),
        };
        let base = container_path(dom, scope, container)?;

        let mut touched: Vec<usize> = Vec::new();
        for &node in nodes {
            let Some(index) = level.item_of(node) else {
                continue;
            };
            let counts = match dom.kind(node) {
                NodeKind::Element => true,
                NodeKind::Text => !dom.data(node).is_empty(),
                _ => false,
            };
            if counts && level.items[index].significant() && touched.last() != Some(&index) {
                touched.push(index);
            }
        }

        if touched.iter().any(|&index| level.items[index].is_element()) {
            let head = touched[0];
            let tail = touched[touched.len() - 1];
            let mut selector =
                Selector::new(base.child(level.step(head)?), key).with_nodes(touched.len());
            if let Item::Text { nodes: block, text } = &level.items[head] {
                let start = raw_start(dom, block, nodes);
                selector = selector.with_offset(Collapsed::new(text).collapsed(start));
            }
            if tail != head {
                if let Item::Text { nodes: block, text } = &level.items[tail] {
                    let end = raw_end(dom, block, nodes);
                    selector = selector.with_length(Collapsed::new(text).collapsed(end));
                }
            }
            return Some(selector);
        }

        let index = level.item_of(first)?;
        match &level.items[index] {
            item @ Item::Text { nodes: block, text } if item.significant() => {
                let collapsed = Collapsed::new(text);
                let start = collapsed.collapsed(raw_start(dom, block, nodes));
                let end = collapsed.collapsed(raw_end(dom, block, nodes)).max(start);
                Some(
                    Selector::new(base.child(level.step(index)?), key)
                        .with_offset(start)
                        .with_length(end - start)
                        .with_expected(collapsed.slice(start, end - start)),
                )
            }
            _ => {
                let preceding = level.items[..index].iter().filter(|item| item.significant()).count();
                Some(Selector::new(base, key).with_offset(preceding).with_nodes(0))
            }
        }
    }

    /// Bind `template`'s parts inside `scope` using one selector per descriptor
    pub fn resolve(
        &self,
        dom: &mut dyn Dom,
        scope: &Scope,
        template: &Template,
        selectors: &[Option<Selector>],
    ) -> Result<Resolved> {
        let descriptors = template.descriptors();
        let mut resolved = Resolved {
            parts: Vec::with_capacity(descriptors.len()),
            mismatches: Vec::new(),
        };

        let mut lists: HashMap<usize, Option<(NodeId, Rc<RefCell<AttrPartList>>)>> = HashMap::new();
        let mut created = HashSet::new();

        for (index, (key, descriptor)) in descriptors.iter().enumerate() {
            let selector = match selectors.get(index).and_then(Option::as_ref) {
                Some(selector) if selector.expression == *key => selector,
                other => {
                    self.report(
                        &mut resolved.mismatches,
                        Mismatch {
                            kind: MismatchKind::Structure,
                            expression: key.clone(),
                            path: other.map(|s| s.path.to_string()).unwrap_or_default(),
                            expected: Some(key.clone()),
                            found: other.map(|s| s.expression.clone()),
                        },
                    );
                    resolved.parts.push(None);
                    continue;
                }
            };

            let part = match descriptor {
                PartDescriptor::Attribute { binding, item } => {
                    if !lists.contains_key(binding) {
                        let list =
                            self.bind_attribute(dom, scope, template, *binding, selectors, &mut resolved.mismatches);
                        lists.insert(*binding, list);
                    }
                    lists.get(binding).and_then(Option::as_ref).map(|(element, list)| {
                        let attr = &template.bindings()[*binding];
                        Part::Attribute(AttrPart::new(
                            *element,
                            &attr.name,
                            attr.namespace.as_deref(),
                            list.clone(),
                            *item,
                        ))
                    })
                }
                PartDescriptor::ChildNode { .. } => self
                    .bind_child(dom, scope, selector, &mut created, &mut resolved.mismatches)?
                    .map(|nodes| Part::ChildNode(ChildNodePart::new(nodes))),
                PartDescriptor::InnerTemplate {
                    directive,
                    expression,
                    template: inner,
                    ..
                } => self
                    .bind_child(dom, scope, selector, &mut created, &mut resolved.mismatches)?
                    .map(|nodes| {
                        Part::InnerTemplate(InnerTemplatePart::new(
                            ChildNodePart::new(nodes),
                            directive.clone(),
                            expression.clone(),
                            inner.clone(),
                        ))
                    }),
            };
            resolved.parts.push(part);
        }

        debug!(
            parts = resolved.parts.iter().filter(|p| p.is_some()).count(),
            mismatches = resolved.mismatches.len(),
            "resolved selectors"
        );
        Ok(resolved)
    }

    fn bind_attribute(
        &self,
        dom: &dyn Dom,
        scope: &Scope,
        template: &Template,
        binding: usize,
        selectors: &[Option<Selector>],
        mismatches: &mut Vec<Mismatch>,
    ) -> Option<(NodeId, Rc<RefCell<AttrPartList>>)> {
        let mut by_item = HashMap::new();
        for (index, (_, descriptor)) in template.descriptors().iter().enumerate() {
            if let PartDescriptor::Attribute { binding: b, item } = descriptor {
                if *b == binding {
                    if let Some(selector) = selectors.get(index).and_then(Option::as_ref) {
                        by_item.insert(*item, selector);
                    }
                }
            }
        }
        let first = by_item.values().next().copied()?;
        let element = match self.locate(dom, scope, first.path.steps()) {
            Some(Located::Element(element)) => element,
            _ => {
                self.report(
                    mismatches,
                    Mismatch {
                        kind: MismatchKind::Structure,
                        expression: first.expression.clone(),
                        path: first.path.to_string(),
                        expected: first.attribute.clone(),
                        found: None,
                    },
                );
                return None;
            }
        };

        let attr = &template.bindings()[binding];
        let existing: Option<Vec<char>> = dom
            .get_attribute(element, attr.namespace.as_deref(), &attr.name)
            .map(|value| value.chars().collect());

        let mut items = Vec::with_capacity(attr.tokens.len());
        for (item, token) in attr.tokens.iter().enumerate() {
            match token {
                Token::Literal(text) => items.push(AttrItem::Literal(text.clone())),
                Token::Slot(_) => {
                    let selector = by_item.get(&item);
                    let found = existing.as_ref().map(|chars| {
                        let start = selector.and_then(|s| s.offset).unwrap_or(0).min(chars.len());
                        let end = match selector.and_then(|s| s.length) {
                            Some(length) => (start + length).min(chars.len()),
                            None => chars.len(),
                        };
                        chars[start..end].iter().collect::<String>()
                    });
                    if let Some(selector) = selector {
                        if selector.expected.is_some() && selector.expected != found {
                            self.report(
                                mismatches,
                                Mismatch {
                                    kind: MismatchKind::Attribute,
                                    expression: selector.expression.clone(),
                                    path: selector.to_string(),
                                    expected: selector.expected.clone(),
                                    found: found.clone(),
                                },
                            );
                        }
                    }
                    items.push(AttrItem::Part(found));
                }
            }
        }
        Some((element, Rc::new(RefCell::new(AttrPartList::new(items)))))
    }

    fn bind_child(
        &self,
        dom: &mut dyn Dom,
        scope: &Scope,
        selector: &Selector,
        created: &mut HashSet<NodeId>,
        mismatches: &mut Vec<Mismatch>,
    ) -> Result<Option<Vec<NodeId>>> {
        let bound = match selector.nodes {
            Some(0) => self.bind_anchor(dom, scope, selector, created)?,
            Some(count) => self.bind_run(dom, scope, selector, count)?,
            None => match selector.path.split_last() {
                Some((Step::Text { .. }, _)) => self.bind_text(dom, scope, selector, mismatches)?,
                _ => self.bind_run(dom, scope, selector, 1)?,
            },
        };
        if bound.is_none() {
            self.report(
                mismatches,
                Mismatch {
                    kind: MismatchKind::Structure,
                    expression: selector.expression.clone(),
                    path: selector.to_string(),
                    expected: selector.expected.clone(),
                    found: None,
                },
            );
        }
        Ok(bound)
    }

    /// Insert an empty placeholder after the `offset`-th significant item
    ///
    /// The placeholder goes directly after that item, or first in the level
    /// when `offset` is 0, so ignorable whitespace between items always
    /// ends up after it.
    fn bind_anchor(
        &self,
        dom: &mut dyn Dom,
        scope: &Scope,
        selector: &Selector,
        created: &mut HashSet<NodeId>,
    ) -> Result<Option<Vec<NodeId>>> {
        let Some(level) = self.descend(dom, scope, selector.path.steps()) else {
            return Ok(None);
        };
        let preceding = selector.offset.unwrap_or(0);
        let significant = level.significant();
        let mut reference = match preceding {
            0 => level.items.first().map(Item::first).or(level.end),
            n => match significant.get(n - 1) {
                Some(&index) => dom.next_sibling(level.items[index].last()),
                None => return Ok(None),
            },
        };
        while let Some(node) = reference {
            if !created.contains(&node) {
                break;
            }
            reference = dom.next_sibling(node);
        }
        let placeholder = dom.create_text("");
        dom.insert_before(level.parent, placeholder, reference)?;
        created.insert(placeholder);
        Ok(Some(vec![placeholder]))
    }

    /// Split a text block around the collapsed range of the selector
    fn bind_text(
        &self,
        dom: &mut dyn Dom,
        scope: &Scope,
        selector: &Selector,
        mismatches: &mut Vec<Mismatch>,
    ) -> Result<Option<Vec<NodeId>>> {
        let Some((last, parents)) = selector.path.split_last() else {
            return Ok(None);
        };
        let Some(level) = self.descend(dom, scope, parents) else {
            return Ok(None);
        };
        let Some(Item::Text { nodes: block, text }) = level.find(last).map(|i| &level.items[i]) else {
            return Ok(None);
        };

        let collapsed = Collapsed::new(text);
        let offset = selector.offset.unwrap_or(0);
        let length = selector
            .length
            .unwrap_or_else(|| collapsed.len().saturating_sub(offset));
        let found = collapsed.slice(offset, length);
        if selector.expected.as_ref().map_or(false, |expected| *expected != found) {
            self.report(
                mismatches,
                Mismatch {
                    kind: MismatchKind::Text,
                    expression: selector.expression.clone(),
                    path: selector.to_string(),
                    expected: selector.expected.clone(),
                    found: Some(found),
                },
            );
        }

        let start = collapsed.raw(offset);
        let end = collapsed.raw(offset.saturating_add(length)).max(start);
        let block = cut(dom, block, start)?;
        let block = cut(dom, &block, end)?;
        let table = positions(dom, &block);

        let inside: Vec<NodeId> = table
            .iter()
            .filter(|(_, s, e)| e > s && *s >= start && *e <= end)
            .map(|(node, _, _)| *node)
            .collect();
        if let (Some(&first), Some(&last)) = (inside.first(), inside.last()) {
            return Ok(Some(run(dom, first, last)));
        }

        let reference = match table.iter().filter(|(_, _, e)| *e <= start).last() {
            Some((node, _, _)) => dom.next_sibling(*node),
            None => Some(block[0]),
        };
        let placeholder = dom.create_text("");
        dom.insert_before(level.parent, placeholder, reference)?;
        Ok(Some(vec![placeholder]))
    }

    /// Collect `count` significant items, cutting text blocks at the edges
    fn bind_run(
        &self,
        dom: &mut dyn Dom,
        scope: &Scope,
        selector: &Selector,
        count: usize,
    ) -> Result<Option<Vec<NodeId>>> {
        let Some((last, parents)) = selector.path.split_last() else {
            return Ok(None);
        };
        let Some(level) = self.descend(dom, scope, parents) else {
            return Ok(None);
        };
        let Some(head) = level.find(last) else {
            return Ok(None);
        };
        let significant = level.significant();
        let Some(position) = significant.iter().position(|&index| index == head) else {
            return Ok(None);
        };
        let Some(items) = significant.get(position..position + count) else {
            return Ok(None);
        };
        let tail = items[items.len() - 1];

        let mut head_block = None;
        let start = match &level.items[head] {
            Item::Element { node, .. } => Some(*node),
            Item::Text { nodes: block, text } => {
                let at = Collapsed::new(text).raw(selector.offset.unwrap_or(0));
                let block = cut(dom, block, at)?;
                let start = positions(dom, &block)
                    .into_iter()
                    .find(|(_, s, e)| *s >= at && e > s)
                    .map(|(node, _, _)| node)
                    .or_else(|| block.last().and_then(|&node| dom.next_sibling(node)));
                head_block = Some(block);
                start
            }
        };

        let end = match &level.items[tail] {
            Item::Element { node, .. } => Some(*node),
            Item::Text { nodes: block, text } if tail != head => match selector.length {
                Some(length) => {
                    let at = Collapsed::new(text).raw(length);
                    let block = cut(dom, block, at)?;
                    positions(dom, &block)
                        .into_iter()
                        .filter(|(_, s, e)| *e <= at && e > s)
                        .last()
                        .map(|(node, _, _)| node)
                        .or_else(|| dom.previous_sibling(block[0]))
                }
                None => block.last().copied(),
            },
            Item::Text { nodes: block, .. } => head_block.as_ref().unwrap_or(block).last().copied(),
        };

        Ok(match (start, end) {
            (Some(start), Some(end)) => Some(run(dom, start, end)),
            _ => None,
        })
    }

    fn descend(&self, dom: &dyn Dom, scope: &Scope, steps: &[Step]) -> Option<Level> {
        let mut level = scope.level(dom);
        for step in steps {
            match &level.items[level.find(step)?] {
                Item::Element { node, .. } => level = Level::children(dom, *node),
                Item::Text { .. } => return None,
            }
        }
        Some(level)
    }

    fn locate(&self, dom: &dyn Dom, scope: &Scope, steps: &[Step]) -> Option<Located> {
        let (last, parents) = steps.split_last()?;
        let level = self.descend(dom, scope, parents)?;
        match &level.items[level.find(last)?] {
            Item::Element { node, .. } => Some(Located::Element(*node)),
            Item::Text { .. } => Some(Located::Text),
        }
    }

    fn report(&self, mismatches: &mut Vec<Mismatch>, mismatch: Mismatch) {
        if self.config.diagnostics() {
            warn!(
                kind = ?mismatch.kind,
                expression = %mismatch.expression,
                path = %mismatch.path,
                expected = ?mismatch.expected,
                found = ?mismatch.found,
                "hydration mismatch"
            );
        }
        mismatches.push(mismatch);
    }
}

enum Located {
    Element(NodeId),
    Text,
}

/// Path of `container` (`None` = the scope root) relative to `scope`
fn container_path(dom: &dyn Dom, scope: &Scope, container: Option<NodeId>) -> Option<Path> {
    let Some(element) = container else {
        return Some(Path::root());
    };
    let mut chain = vec![element];
    let mut current = element;
    loop {
        match dom.parent(current) {
            Some(parent) if parent == scope.parent => break,
            Some(parent) => {
                chain.push(parent);
                current = parent;
            }
            None => return None,
        }
    }

    let mut level = scope.level(dom);
    let mut path = Path::root();
    for &node in chain.iter().rev() {
        let index = level.item_of(node)?;
        path = path.child(level.step(index)?);
        level = Level::children(dom, node);
    }
    Some(path)
}

/// Raw offset where the part's first node starts inside `block`
fn raw_start(dom: &dyn Dom, block: &[NodeId], part: &[NodeId]) -> usize {
    positions(dom, block)
        .into_iter()
        .find(|(node, _, _)| part.contains(node))
        .map_or(0, |(_, start, _)| start)
}

/// Raw offset where the part's last node ends inside `block`
fn raw_end(dom: &dyn Dom, block: &[NodeId], part: &[NodeId]) -> usize {
    positions(dom, block)
        .into_iter()
        .filter(|(node, _, _)| part.contains(node))
        .last()
        .map_or(0, |(_, _, end)| end)
}
