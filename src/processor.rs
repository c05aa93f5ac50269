//! Default processors
//!
//! [`DefaultProcessor`] is a policy table: an ordered list of rules, each a
//! predicate and handler in one function that returns `Ok(true)` once it
//! has handled the part. Only parts whose key is present in the state are
//! visited, and for each the first rule that matches wins.
//!
//! | order | rule          | applies to                                     |
//! |-------|---------------|------------------------------------------------|
//! | 1     | `boolean`     | `Bool` on a fully templatized attribute        |
//! | 2     | `event`       | `Listener` or `Null` on an `on*` attribute     |
//! | 3     | `subtemplate` | `Template` on a child-node part                |
//! | 4     | `node`        | `Node` on a child-node part                    |
//! | 5     | `iterable`    | `List` on any part                             |
//! | 6     | `identity`    | everything else, as a string                   |
//!
//! ```rust,ignore
//! let mut processor = DefaultProcessor::new();
//! processor.insert_rule(0, Rule::new("conditional", |ctx, part, value| {
//!     // handle `<template directive="if">` parts here
//!     Ok(false)
//! }));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::dom::{Listener, NodeId, NodeKind};
use crate::enhance::significant_runs;
use crate::error::{Error, Result};
use crate::instance::{Context, Mode, Processor, TemplateInstance};
use crate::parts::{ChildNodePart, Content, Nested, Part, PartList};
use crate::renderer::TemplateResult;
use crate::value::{State, Value};

/// Handler signature of a [`Rule`]
pub type Apply = fn(&mut Context<'_>, &mut Part, &Value) -> Result<bool>;

#[derive(Clone, Copy)]
pub struct Rule {
    name: &'static str,
    apply: Apply,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

impl Rule {
    pub fn new(name: &'static str, apply: Apply) -> Self {
        Self { name, apply }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
        (self.apply)(ctx, part, value)
    }
}

#[derive(Debug, Clone)]
pub struct DefaultProcessor {
    rules: Vec<Rule>,
}

impl Default for DefaultProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultProcessor {
    pub fn new() -> Self {
        Self::with_rules(vec![
            Rule::new("boolean", boolean),
            Rule::new("event", event),
            Rule::new("subtemplate", subtemplate),
            Rule::new("node", node),
            Rule::new("iterable", iterable),
            Rule::new("identity", identity),
        ])
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Insert before the rule at `index`
    pub fn insert_rule(&mut self, index: usize, rule: Rule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Processor for DefaultProcessor {
    fn process_callback(&self, ctx: &mut Context<'_>, parts: &mut PartList, state: &State) -> Result<()> {
        for (key, part) in parts.iter_mut() {
            let value = match state.get(key) {
                Some(value) => value,
                None => continue,
            };
            for rule in &self.rules {
                if rule.apply(ctx, part, value)? {
                    trace!(key = %key, rule = rule.name, "projected value");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn boolean(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    match (part, value) {
        (Part::Attribute(attr), Value::Bool(on)) if attr.is_sole_fragment() => {
            if attr.boolean_value(&*ctx.dom) != *on {
                attr.set_boolean_value(ctx.dom, *on)?;
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn event(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    let attr = match part {
        Part::Attribute(attr) if attr.attribute_name().starts_with("on") => attr,
        _ => return Ok(false),
    };
    let listener = match value {
        Value::Listener(listener) => Some(listener.clone()),
        Value::Null => None,
        _ => return Ok(false),
    };
    let element = attr.element();
    let event_type = attr.attribute_name()[2..].to_ascii_lowercase();
    bind_listener(ctx, element, &event_type, listener)?;
    if attr.boolean_value(&*ctx.dom) {
        ctx.dom
            .remove_attribute(element, attr.attribute_namespace(), attr.attribute_name())?;
    }
    Ok(true)
}

fn bind_listener(
    ctx: &mut Context<'_>,
    element: NodeId,
    event_type: &str,
    listener: Option<Listener>,
) -> Result<()> {
    let current = ctx.dom.event_listener(element, event_type);
    let unchanged = match (&current, &listener) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    };
    if unchanged {
        return Ok(());
    }
    ctx.dom.set_event_listener(element, event_type, listener)
}

/// Render or update `result` as the single nested instance of `part`
fn project_template(ctx: &mut Context<'_>, part: &mut ChildNodePart, result: &TemplateResult) -> Result<()> {
    let template = result.template(ctx.config)?;
    let state = result.state();

    if let [Some(nested)] = part.nested.as_mut_slice() {
        if Arc::ptr_eq(&nested.template, &template) {
            nested.instance.update(ctx.dom, &state)?;
            let nodes = nested.instance.nodes();
            part.set_nodes(nodes);
            return Ok(());
        }
    }

    let instance = if ctx.mode == Mode::Enhance {
        let (parent, before, after) = part.bounds(&*ctx.dom)?;
        let nodes = part.nodes().to_vec();
        let instance = TemplateInstance::enhance(
            ctx.dom,
            template.clone(),
            parent,
            &nodes,
            &state,
            result.processor().clone(),
            ctx.config.clone(),
        )?;
        part.rebind_between(&*ctx.dom, parent, before, after);
        instance
    } else {
        let instance =
            TemplateInstance::render_nested(ctx, template.clone(), &state, result.processor().clone())?;
        part.replace(ctx.dom, Content::from(instance.nodes()))?;
        instance
    };
    part.nested = vec![Some(Nested { template, instance })];
    Ok(())
}

fn subtemplate(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    match (part.as_child_node_mut(), value) {
        (Some(child), Value::Template(result)) => {
            project_template(ctx, child, result)?;
            Ok(true)
        }
        (None, Value::Template(_)) => Err(Error::render_static(
            "a nested template cannot be bound to an attribute",
        )),
        _ => Ok(false),
    }
}

fn node(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    let (child, node) = match (part.as_child_node_mut(), value) {
        (Some(child), Value::Node(node)) => (child, *node),
        _ => return Ok(false),
    };
    if child.nodes() == [node] {
        return Ok(true);
    }
    // a fragment already spliced in leaves nothing behind to move
    if ctx.dom.kind(node) == NodeKind::Fragment && ctx.dom.child_nodes(node).is_empty() {
        return Ok(true);
    }
    child.replace(ctx.dom, Content::Node(node))?;
    Ok(true)
}

fn iterable(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    let items = match value {
        Value::List(items) => items,
        _ => return Ok(false),
    };
    let child = match part {
        Part::Attribute(attr) => {
            attr.set_value(ctx.dom, Some(&value.to_string()))?;
            return Ok(true);
        }
        Part::ChildNode(child) => child,
        Part::InnerTemplate(inner) => &mut inner.part,
    };

    if ctx.mode == Mode::Enhance && enhance_list(ctx, child, items)? {
        return Ok(true);
    }

    let mut previous = std::mem::take(&mut child.nested);
    // loose text nodes of the last render, reused for equal strings
    let owned: HashSet<NodeId> = previous
        .iter()
        .flatten()
        .flat_map(|entry| entry.instance.nodes())
        .collect();
    let mut spare: Vec<NodeId> = child
        .nodes()
        .iter()
        .copied()
        .filter(|node| !owned.contains(node) && ctx.dom.kind(*node) == NodeKind::Text)
        .collect();
    let mut nested = Vec::with_capacity(items.len());
    let mut content = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Template(result) => {
                let template = result.template(ctx.config)?;
                let state = result.state();
                let reusable = previous
                    .get_mut(index)
                    .and_then(Option::take)
                    .filter(|entry| Arc::ptr_eq(&entry.template, &template));
                let instance = match reusable {
                    Some(mut entry) => {
                        entry.instance.update(ctx.dom, &state)?;
                        entry.instance
                    }
                    None => TemplateInstance::render_nested(
                        ctx,
                        template.clone(),
                        &state,
                        result.processor().clone(),
                    )?,
                };
                content.push(Content::from(instance.nodes()));
                nested.push(Some(Nested { template, instance }));
            }
            Value::Node(node) => {
                content.push(Content::Node(*node));
                nested.push(None);
            }
            Value::Null => nested.push(None),
            Value::Listener(_) => {
                return Err(Error::render_static("a listener cannot be rendered as content"))
            }
            other => {
                let text = other.to_string();
                match spare.iter().position(|&node| ctx.dom.data(node) == text) {
                    Some(at) => content.push(Content::Node(spare.remove(at))),
                    None => content.push(Content::Text(text)),
                }
                nested.push(None);
            }
        }
    }
    if content.is_empty() {
        if let Some(at) = spare.iter().position(|&node| ctx.dom.data(node).is_empty()) {
            content.push(Content::Node(spare.remove(at)));
        }
    }
    child.replace(ctx.dom, Content::List(content))?;
    child.nested = nested;
    Ok(true)
}

/// Enhance a list of templates item by item; `false` when the existing
/// markup does not split into one run per item
fn enhance_list(ctx: &mut Context<'_>, child: &mut ChildNodePart, items: &[Value]) -> Result<bool> {
    let results: Vec<&TemplateResult> = items
        .iter()
        .filter_map(|item| match item {
            Value::Template(result) => Some(result),
            _ => None,
        })
        .collect();
    if results.is_empty() || results.len() != items.len() {
        return Ok(false);
    }
    let (parent, before, after) = child.bounds(&*ctx.dom)?;
    let runs = significant_runs(&*ctx.dom, parent, child.nodes());
    if runs.len() != results.len() {
        return Ok(false);
    }

    let mut nested = Vec::with_capacity(results.len());
    for (result, run) in results.into_iter().zip(runs) {
        let template = result.template(ctx.config)?;
        let instance = TemplateInstance::enhance(
            ctx.dom,
            template.clone(),
            parent,
            &run,
            &result.state(),
            result.processor().clone(),
            ctx.config.clone(),
        )?;
        nested.push(Some(Nested { template, instance }));
    }
    child.rebind_between(&*ctx.dom, parent, before, after);
    child.nested = nested;
    Ok(true)
}

fn identity(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
    let child = match part {
        Part::Attribute(attr) => {
            match value {
                Value::Null => attr.set_value(ctx.dom, None)?,
                Value::Node(_) | Value::Listener(_) | Value::Template(_) => {
                    return Err(Error::render_owned(format!(
                        "value cannot be projected onto attribute `{}`",
                        attr.attribute_name()
                    )))
                }
                other => attr.set_value(ctx.dom, Some(&other.to_string()))?,
            }
            return Ok(true);
        }
        Part::ChildNode(child) => child,
        Part::InnerTemplate(inner) => &mut inner.part,
    };
    match value {
        Value::Null if child.is_text(&*ctx.dom, "") => {}
        Value::Null => child.replace(ctx.dom, Content::Empty)?,
        Value::Listener(_) => return Err(Error::render_static("a listener cannot be rendered as content")),
        other => child.set_text(ctx.dom, &other.to_string())?,
    }
    Ok(true)
}

/// HTML attributes whose presence is their value
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "formnovalidate",
    "hidden",
    "inert",
    "ismap",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "selected",
];

/// Minimal processor: boolean attributes, listeners, and everything else
/// assigned as a string
///
/// Booleans are only recognized on attributes HTML defines as boolean, and
/// setting one that shares its attribute with other fragments is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyIdentityProcessor;

impl Processor for PropertyIdentityProcessor {
    fn process_callback(&self, ctx: &mut Context<'_>, parts: &mut PartList, state: &State) -> Result<()> {
        for (key, part) in parts.iter_mut() {
            let value = match state.get(key) {
                Some(value) => value,
                None => continue,
            };
            if let Part::Attribute(attr) = &*part {
                match value {
                    Value::Bool(on) if BOOLEAN_ATTRIBUTES.contains(&attr.attribute_name()) => {
                        attr.set_boolean_value(ctx.dom, *on)?;
                        continue;
                    }
                    Value::Listener(listener) => {
                        let name = attr.attribute_name();
                        let event_type = name.strip_prefix("on").unwrap_or(name).to_ascii_lowercase();
                        bind_listener(ctx, attr.element(), &event_type, Some(listener.clone()))?;
                        attr.set_value(ctx.dom, None)?;
                        continue;
                    }
                    _ => {}
                }
            }
            identity(ctx, part, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::dom::Dom;
    use crate::types::{Template, TemplateConfig};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn render(html: &str, state: &State) -> (Document, TemplateInstance) {
        render_with(html, state, Rc::new(DefaultProcessor::new()))
    }

    fn render_with(html: &str, state: &State, processor: Rc<dyn Processor>) -> (Document, TemplateInstance) {
        let mut doc = Document::new();
        let instance = TemplateInstance::render(
            &mut doc,
            Arc::new(Template::parse(html).unwrap()),
            state,
            processor,
            TemplateConfig::default(),
        )
        .unwrap();
        (doc, instance)
    }

    fn html(doc: &Document, instance: &TemplateInstance) -> String {
        doc.inner_html(instance.fragment().unwrap())
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = DefaultProcessor::new().rules().iter().map(Rule::name).collect();
        assert_eq!(
            names,
            vec!["boolean", "event", "subtemplate", "node", "iterable", "identity"]
        );
    }

    #[test]
    fn test_boolean_toggle() {
        let (mut doc, mut instance) =
            render("<input disabled=\"{{off}}\">", &State::new().with("off", true));
        assert_eq!(html(&doc, &instance), "<input disabled=\"\">");

        instance.update(&mut doc, &State::new().with("off", false)).unwrap();
        assert_eq!(html(&doc, &instance), "<input>");
    }

    #[test]
    fn test_boolean_inside_mixed_attribute_is_text() {
        let (doc, instance) = render("<p class=\"a {{x}}\"></p>", &State::new().with("x", true));
        assert_eq!(html(&doc, &instance), "<p class=\"a true\"></p>");
    }

    #[test]
    fn test_event_listener_replaces_attribute() {
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let state = State::new().with("click", Value::listener(move |_| counter.set(counter.get() + 1)));
        let (mut doc, mut instance) = render("<button onclick=\"{{click}}\">go</button>", &state);
        assert_eq!(html(&doc, &instance), "<button>go</button>");

        let button = doc.child_nodes(instance.fragment().unwrap())[0];
        assert_eq!(doc.dispatch_event(button, "click"), 1);
        assert_eq!(clicks.get(), 1);

        instance.update(&mut doc, &State::new().with("click", Value::Null)).unwrap();
        assert_eq!(doc.dispatch_event(button, "click"), 0);
    }

    #[test]
    fn test_same_listener_is_not_rebound() {
        let listener = Listener::new(|_| {});
        let state = State::new().with("click", listener.clone());
        let (mut doc, mut instance) = render("<a onclick=\"{{click}}\"></a>", &state);
        let a = doc.child_nodes(instance.fragment().unwrap())[0];
        instance.update(&mut doc, &state).unwrap();
        assert!(doc.event_listener(a, "click").unwrap().ptr_eq(&listener));
    }

    #[test]
    fn test_only_keys_in_state_are_touched() {
        let (mut doc, mut instance) = render(
            "<p>{{a}}</p><p>{{b}}</p>",
            &State::new().with("a", 1).with("b", 2),
        );
        instance.update(&mut doc, &State::new().with("b", 3)).unwrap();
        assert_eq!(html(&doc, &instance), "<p>1</p><p>3</p>");
    }

    #[test]
    fn test_list_in_attribute_joins_with_spaces() {
        let (doc, instance) = render(
            "<p class=\"{{classes}}\"></p>",
            &State::new().with("classes", vec!["a", "b"]),
        );
        assert_eq!(html(&doc, &instance), "<p class=\"a b\"></p>");
    }

    #[test]
    fn test_empty_list_leaves_placeholder() {
        let (mut doc, mut instance) =
            render("<ul>{{items}}</ul>", &State::new().with("items", vec!["x", "y"]));
        assert_eq!(html(&doc, &instance), "<ul>xy</ul>");

        instance
            .update(&mut doc, &State::new().with("items", Vec::<Value>::new()))
            .unwrap();
        assert_eq!(html(&doc, &instance), "<ul></ul>");
        let part = instance.part("items").and_then(Part::as_child_node).unwrap();
        assert_eq!(part.nodes().len(), 1);
    }

    #[test]
    fn test_null_clears_attribute_and_content() {
        let (mut doc, mut instance) = render(
            "<a href=\"{{h}}\">{{t}}</a>",
            &State::new().with("h", "/x").with("t", "link"),
        );
        instance
            .update(&mut doc, &State::new().with("h", Value::Null).with("t", Value::Null))
            .unwrap();
        assert_eq!(html(&doc, &instance), "<a></a>");
    }

    #[test]
    fn test_template_in_attribute_is_an_error() {
        let result = crate::html!(["<b></b>"]);
        let mut doc = Document::new();
        let outcome = TemplateInstance::render(
            &mut doc,
            Arc::new(Template::parse("<p title=\"{{t}}\"></p>").unwrap()),
            &State::new().with("t", result),
            Rc::new(DefaultProcessor::new()),
            TemplateConfig::default(),
        );
        assert!(matches!(outcome, Err(Error::RenderError(_))));
    }

    #[test]
    fn test_custom_rule_first() {
        fn shout(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
            match (part.as_child_node_mut(), value) {
                (Some(child), Value::String(s)) => {
                    child.set_text(ctx.dom, &s.to_uppercase())?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
        let mut processor = DefaultProcessor::new();
        processor.insert_rule(0, Rule::new("shout", shout));
        let (doc, instance) = render_with(
            "<p>{{x}}</p>",
            &State::new().with("x", "hey"),
            Rc::new(processor),
        );
        assert_eq!(html(&doc, &instance), "<p>HEY</p>");
    }

    #[test]
    fn test_inner_template_rule() {
        // renders the inner template once per truthy value
        fn conditional(ctx: &mut Context<'_>, part: &mut Part, value: &Value) -> Result<bool> {
            let inner = match part {
                Part::InnerTemplate(inner) if inner.directive() == Some("if") => inner,
                _ => return Ok(false),
            };
            if value.as_bool() == Some(true) {
                let processor = ctx.processor.clone();
                let instance =
                    TemplateInstance::render_nested(ctx, inner.template().clone(), &State::new(), processor)?;
                inner.part.replace(ctx.dom, Content::from(instance.nodes()))?;
            } else {
                inner.part.replace(ctx.dom, Content::Empty)?;
            }
            Ok(true)
        }
        let mut processor = DefaultProcessor::new();
        processor.insert_rule(0, Rule::new("conditional", conditional));
        let (mut doc, mut instance) = render_with(
            "<div><template directive=\"if\" expression=\"shown\"><b>yes</b></template></div>",
            &State::new().with("shown", true),
            Rc::new(processor),
        );
        assert_eq!(html(&doc, &instance), "<div><b>yes</b></div>");

        instance.update(&mut doc, &State::new().with("shown", false)).unwrap();
        assert_eq!(html(&doc, &instance), "<div></div>");
    }

    #[test]
    fn test_property_identity_processor() {
        let state = State::new().with("on", true).with("x", true);
        let (doc, instance) = render_with(
            "<input checked=\"{{on}}\" data-x=\"{{x}}\">",
            &state,
            Rc::new(PropertyIdentityProcessor),
        );
        assert_eq!(html(&doc, &instance), "<input checked=\"\" data-x=\"true\">");
    }

    #[test]
    fn test_property_identity_rejects_partial_boolean() {
        let mut doc = Document::new();
        let outcome = TemplateInstance::render(
            &mut doc,
            Arc::new(Template::parse("<input hidden=\"a {{on}}\">").unwrap()),
            &State::new().with("on", true),
            Rc::new(PropertyIdentityProcessor),
            TemplateConfig::default(),
        );
        assert!(matches!(outcome, Err(Error::InvariantViolation(_))));
    }
}
