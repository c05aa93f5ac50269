//! Template instances and the processor contract
//!
//! A [`TemplateInstance`] is one live binding of a [`Template`]: the nodes it
//! occupies, its part list and the [`Processor`] that projects state onto
//! those parts. Instances are created by a fresh render or by enhancing
//! markup that already holds the rendered values; either way the processor
//! sees `create_callback` once, then `process_callback`, and `update` only
//! calls `process_callback` again.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::dom::{Dom, NodeId};
use crate::enhance::{Matcher, Mismatch, Scope};
use crate::error::Result;
use crate::parts::{Part, PartList};
use crate::selector::Selector;
use crate::types::{Template, TemplateConfig};
use crate::value::State;

/// How an instance got its nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Nodes were cloned from the template
    Render,
    /// Nodes already existed and were matched
    Enhance,
}

/// What a processor works with besides the parts themselves
pub struct Context<'a> {
    pub dom: &'a mut dyn Dom,
    pub mode: Mode,
    pub config: &'a TemplateConfig,
    /// Processor of the instance being processed
    pub processor: &'a Rc<dyn Processor>,
    /// The render only exists to derive selectors and is discarded right
    /// after; nested instances built through [`TemplateInstance::render_nested`]
    /// skip `create_callback` as well
    pub scratch: bool,
}

/// Projects state values onto parts
pub trait Processor {
    /// Called once, right after the part list is built
    fn create_callback(&self, _ctx: &mut Context<'_>, _parts: &mut PartList, _state: &State) -> Result<()> {
        Ok(())
    }

    /// Called after creation and on every update
    fn process_callback(&self, ctx: &mut Context<'_>, parts: &mut PartList, state: &State) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Static(NodeId),
    /// Top-level child part, by index in the part list
    Part(usize),
}

pub struct TemplateInstance {
    template: Arc<Template>,
    parts: PartList,
    roots: Vec<Root>,
    processor: Rc<dyn Processor>,
    config: TemplateConfig,
    fragment: Option<NodeId>,
    mismatches: Vec<Mismatch>,
    scratch: bool,
}

impl fmt::Debug for TemplateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInstance")
            .field("parts", &self.parts)
            .field("roots", &self.roots)
            .field("fragment", &self.fragment)
            .field("mismatches", &self.mismatches)
            .finish()
    }
}

impl TemplateInstance {
    /// Clone the template into a new fragment, bind parts and process `state`
    pub fn render(
        dom: &mut dyn Dom,
        template: Arc<Template>,
        state: &State,
        processor: Rc<dyn Processor>,
        config: TemplateConfig,
    ) -> Result<Self> {
        Self::build(dom, template, state, processor, config, false)
    }

    /// Render an instance from inside a processor callback
    ///
    /// Same as [`TemplateInstance::render`] except that a scratch render
    /// stays a scratch render all the way down.
    pub fn render_nested(
        ctx: &mut Context<'_>,
        template: Arc<Template>,
        state: &State,
        processor: Rc<dyn Processor>,
    ) -> Result<Self> {
        let config = ctx.config.clone();
        Self::build(&mut *ctx.dom, template, state, processor, config, ctx.scratch)
    }

    fn build(
        dom: &mut dyn Dom,
        template: Arc<Template>,
        state: &State,
        processor: Rc<dyn Processor>,
        config: TemplateConfig,
        scratch: bool,
    ) -> Result<Self> {
        let (fragment, parts) = template.instantiate(dom)?;
        let roots = roots_of(&dom.child_nodes(fragment), &parts);
        let mut instance = Self {
            template,
            parts,
            roots,
            processor,
            config,
            fragment: Some(fragment),
            mismatches: Vec::new(),
            scratch,
        };
        instance.run(dom, Mode::Render, state, !scratch)?;
        Ok(instance)
    }

    /// Selectors harvested from a throwaway render of `template` with `state`
    ///
    /// The processor only sees `process_callback` for it, and the rendered
    /// nodes are discarded once read unless `state` hands in host nodes,
    /// which the scratch render may have adopted.
    fn scratch_selectors(
        dom: &mut dyn Dom,
        template: &Arc<Template>,
        state: &State,
        processor: &Rc<dyn Processor>,
        config: &TemplateConfig,
    ) -> Result<Vec<Option<Selector>>> {
        let scratch = Self::build(dom, template.clone(), state, processor.clone(), config.clone(), true)?;
        let selectors = scratch.selectors(dom);
        let adopted = state.iter().any(|(_, value)| value.holds_node());
        if let (Some(fragment), false) = (scratch.fragment, adopted) {
            dom.discard(fragment);
        }
        Ok(selectors)
    }

    /// Bind to `nodes`, consecutive children of `parent` that already hold
    /// a render of `template` with `state`
    ///
    /// Selectors come from a scratch render of the same template and state.
    pub fn enhance(
        dom: &mut dyn Dom,
        template: Arc<Template>,
        parent: NodeId,
        nodes: &[NodeId],
        state: &State,
        processor: Rc<dyn Processor>,
        config: TemplateConfig,
    ) -> Result<Self> {
        let scope = Scope::around(dom, parent, nodes);
        let selectors = Self::scratch_selectors(dom, &template, state, &processor, &config)?;
        Self::bind(dom, template, scope, &selectors, state, processor, config)
    }

    /// Bind to `nodes` with selectors emitted elsewhere, usually by the
    /// server that produced the markup
    ///
    /// Selectors are matched to parts in order by expression key; a part
    /// without a matching selector stays unbound. Content found at a
    /// selector is checked against a scratch render of `state`, so keys
    /// missing from `state` are never reported as mismatches.
    #[allow(clippy::too_many_arguments)]
    pub fn enhance_with_selectors(
        dom: &mut dyn Dom,
        template: Arc<Template>,
        parent: NodeId,
        nodes: &[NodeId],
        selectors: &[Selector],
        state: &State,
        processor: Rc<dyn Processor>,
        config: TemplateConfig,
    ) -> Result<Self> {
        let scope = Scope::around(dom, parent, nodes);
        let fresh = Self::scratch_selectors(dom, &template, state, &processor, &config)?;
        let mut pending = selectors.iter().peekable();
        let aligned: Vec<Option<Selector>> = template
            .expressions()
            .zip(fresh.into_iter().chain(std::iter::repeat(None)))
            .map(|(key, fresh)| {
                let mut selector = pending.next_if(|s| s.expression == key).cloned()?;
                if selector.expected.is_none() && state.contains_key(key) {
                    selector.expected = fresh.and_then(|fresh| fresh.expected);
                }
                Some(selector)
            })
            .collect();
        Self::bind(dom, template, scope, &aligned, state, processor, config)
    }

    fn bind(
        dom: &mut dyn Dom,
        template: Arc<Template>,
        scope: Scope,
        selectors: &[Option<Selector>],
        state: &State,
        processor: Rc<dyn Processor>,
        config: TemplateConfig,
    ) -> Result<Self> {
        let resolved = Matcher::new(&config).resolve(dom, &scope, &template, selectors)?;
        let parts: PartList = template
            .descriptors()
            .iter()
            .zip(resolved.parts)
            .filter_map(|((key, _), part)| part.map(|part| (key.clone(), part)))
            .collect();
        let roots = roots_of(&scope.nodes(dom), &parts);
        let mut instance = Self {
            template,
            parts,
            roots,
            processor,
            config,
            fragment: None,
            mismatches: resolved.mismatches,
            scratch: false,
        };
        instance.run(dom, Mode::Enhance, state, true)?;
        Ok(instance)
    }

    /// Process `state` again; only keys present in `state` are touched
    pub fn update(&mut self, dom: &mut dyn Dom, state: &State) -> Result<()> {
        self.run(dom, Mode::Render, state, false)
    }

    fn run(&mut self, dom: &mut dyn Dom, mode: Mode, state: &State, create: bool) -> Result<()> {
        let processor = self.processor.clone();
        let mut ctx = Context {
            dom,
            mode,
            config: &self.config,
            processor: &processor,
            scratch: self.scratch,
        };
        if create {
            processor.create_callback(&mut ctx, &mut self.parts, state)?;
        }
        processor.process_callback(&mut ctx, &mut self.parts, state)
    }

    /// Top-level nodes in document order, including whatever the top-level
    /// parts currently hold
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for root in &self.roots {
            match root {
                Root::Static(node) => nodes.push(*node),
                Root::Part(index) => {
                    if let Some(part) = self.parts[*index].1.as_child_node() {
                        nodes.extend_from_slice(part.nodes());
                    }
                }
            }
        }
        nodes
    }

    /// Selectors describing every part, for shipping alongside server markup
    pub fn selectors(&self, dom: &dyn Dom) -> Vec<Option<Selector>> {
        let nodes = self.nodes();
        let parent = match nodes.first().and_then(|&node| dom.parent(node)).or(self.fragment) {
            Some(parent) => parent,
            None => return vec![None; self.parts.len()],
        };
        let scope = Scope::around(dom, parent, &nodes);
        Matcher::new(&self.config).harvest(dom, &scope, &self.parts)
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn parts(&self) -> &PartList {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut PartList {
        &mut self.parts
    }

    /// First part bound to `expression`
    pub fn part(&self, expression: &str) -> Option<&Part> {
        self.parts
            .iter()
            .find(|(key, _)| key == expression)
            .map(|(_, part)| part)
    }

    /// Fragment the render was cloned into; `None` for enhanced instances
    pub fn fragment(&self) -> Option<NodeId> {
        self.fragment
    }

    /// Differences found while enhancing
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn processor(&self) -> &Rc<dyn Processor> {
        &self.processor
    }
}

fn roots_of(nodes: &[NodeId], parts: &PartList) -> Vec<Root> {
    let mut roots = Vec::with_capacity(nodes.len());
    for &node in nodes {
        let owner = parts.iter().position(|(_, part)| {
            part.as_child_node()
                .map_or(false, |child| child.nodes().contains(&node))
        });
        match owner {
            Some(index) if roots.last() == Some(&Root::Part(index)) => {}
            Some(index) => roots.push(Root::Part(index)),
            None => roots.push(Root::Static(node)),
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::processor::DefaultProcessor;
    use pretty_assertions::assert_eq;

    fn processor() -> Rc<dyn Processor> {
        Rc::new(DefaultProcessor::new())
    }

    fn template(html: &str) -> Arc<Template> {
        Arc::new(Template::parse(html).unwrap())
    }

    struct Recording {
        calls: std::cell::RefCell<Vec<&'static str>>,
    }

    impl Processor for Recording {
        fn create_callback(&self, _: &mut Context<'_>, _: &mut PartList, _: &State) -> Result<()> {
            self.calls.borrow_mut().push("create");
            Ok(())
        }

        fn process_callback(&self, ctx: &mut Context<'_>, parts: &mut PartList, state: &State) -> Result<()> {
            self.calls.borrow_mut().push("process");
            DefaultProcessor::new().process_callback(ctx, parts, state)
        }
    }

    #[test]
    fn test_callback_order() {
        let recording = Rc::new(Recording {
            calls: Default::default(),
        });
        let mut doc = Document::new();
        let mut instance = TemplateInstance::render(
            &mut doc,
            template("<p>{{x}}</p>"),
            &State::new().with("x", 1),
            recording.clone(),
            TemplateConfig::default(),
        )
        .unwrap();
        instance.update(&mut doc, &State::new().with("x", 2)).unwrap();
        assert_eq!(*recording.calls.borrow(), vec!["create", "process", "process"]);
    }

    #[test]
    fn test_enhance_runs_callbacks_once() {
        let recording = Rc::new(Recording {
            calls: Default::default(),
        });
        let (mut doc, root) = Document::parse("<p>hi</p>").unwrap();
        let nodes = doc.child_nodes(root);
        let instance = TemplateInstance::enhance(
            &mut doc,
            template("<p>{{x}}</p>"),
            root,
            &nodes,
            &State::new().with("x", "hi"),
            recording.clone(),
            TemplateConfig::default(),
        )
        .unwrap();
        assert!(instance.mismatches().is_empty());
        assert_eq!(*recording.calls.borrow(), vec!["create", "process"]);
    }

    #[test]
    fn test_enhance_releases_scratch_render() {
        let (mut doc, root) = Document::parse("<p class=\"on\">hello</p>").unwrap();
        let nodes = doc.child_nodes(root);
        let before = doc.node_count();
        let state = State::new().with("c", "on").with("x", "hello");
        let mut instance = TemplateInstance::enhance(
            &mut doc,
            template("<p class=\"{{c}}\">{{x}}</p>"),
            root,
            &nodes,
            &state,
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();
        assert_eq!(doc.node_count(), before);

        instance.update(&mut doc, &State::new().with("x", "bye")).unwrap();
        assert_eq!(doc.node_count(), before);
        assert_eq!(doc.inner_html(root), "<p class=\"on\">bye</p>");
    }

    #[test]
    fn test_render_and_update() {
        let mut doc = Document::new();
        let mut instance = TemplateInstance::render(
            &mut doc,
            template("<p title=\"{{t}}\">{{x}}</p>"),
            &State::new().with("t", "a").with("x", "one"),
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();
        let fragment = instance.fragment().unwrap();
        assert_eq!(doc.inner_html(fragment), "<p title=\"a\">one</p>");

        instance.update(&mut doc, &State::new().with("x", "two")).unwrap();
        assert_eq!(doc.inner_html(fragment), "<p title=\"a\">two</p>");
    }

    #[test]
    fn test_nodes_follow_top_level_parts() {
        let mut doc = Document::new();
        let mut instance = TemplateInstance::render(
            &mut doc,
            template("<i></i>{{x}}"),
            &State::new().with("x", "a"),
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();
        assert_eq!(instance.nodes().len(), 2);

        let fragment = doc.parse_html("<b>1</b><b>2</b>").unwrap();
        instance
            .update(&mut doc, &State::new().with("x", fragment))
            .unwrap();
        assert_eq!(instance.nodes().len(), 3);
        assert_eq!(instance.nodes(), doc.child_nodes(instance.fragment().unwrap()));
    }

    #[test]
    fn test_enhance_binds_existing_nodes() {
        let (mut doc, root) = Document::parse("<p class=\"on\">hello</p>").unwrap();
        let nodes = doc.child_nodes(root);
        let state = State::new().with("c", "on").with("x", "hello");
        let mut instance = TemplateInstance::enhance(
            &mut doc,
            template("<p class=\"{{c}}\">{{x}}</p>"),
            root,
            &nodes,
            &state,
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();
        assert!(instance.mismatches().is_empty());
        assert_eq!(instance.nodes(), nodes);

        let p = nodes[0];
        let text = doc.child_nodes(p)[0];
        instance
            .update(&mut doc, &State::new().with("x", "bye").with("c", "off"))
            .unwrap();
        assert_eq!(doc.inner_html(root), "<p class=\"off\">bye</p>");
        assert_eq!(doc.child_nodes(p)[0], text);
    }

    #[test]
    fn test_enhance_with_server_selectors() {
        let (mut doc, root) = Document::parse("<h1>Hi <b>Ann</b>!</h1>").unwrap();
        let nodes = doc.child_nodes(root);
        let selectors: Vec<Selector> = vec!["/h1[1]/b[1]/text()[1] +0 ~3 #name".parse().unwrap()];
        let mut instance = TemplateInstance::enhance_with_selectors(
            &mut doc,
            template("<h1>Hi <b>{{name}}</b>!</h1>"),
            root,
            &nodes,
            &selectors,
            &State::new(),
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();
        assert!(instance.part("name").is_some());
        instance
            .update(&mut doc, &State::new().with("name", "Bo"))
            .unwrap();
        assert_eq!(doc.inner_html(root), "<h1>Hi <b>Bo</b>!</h1>");
    }

    #[test]
    fn test_server_selectors_check_content_against_state() {
        let (mut doc, root) = Document::parse("<h1>Hi <b>Ann</b>!</h1>").unwrap();
        let nodes = doc.child_nodes(root);
        let selectors: Vec<Selector> = vec!["/h1[1]/b[1]/text()[1] +0 ~3 #name".parse().unwrap()];
        let instance = TemplateInstance::enhance_with_selectors(
            &mut doc,
            template("<h1>Hi <b>{{name}}</b>!</h1>"),
            root,
            &nodes,
            &selectors,
            &State::new().with("name", "Zed"),
            processor(),
            TemplateConfig::default(),
        )
        .unwrap();

        assert_eq!(instance.mismatches().len(), 1);
        let mismatch = &instance.mismatches()[0];
        assert_eq!(mismatch.kind, crate::enhance::MismatchKind::Text);
        assert_eq!(mismatch.expected.as_deref(), Some("Zed"));
        assert_eq!(mismatch.found.as_deref(), Some("Ann"));
        // the client state still wins
        assert_eq!(doc.inner_html(root), "<h1>Hi <b>Zed</b>!</h1>");
    }
}
