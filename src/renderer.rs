//! Rendering entry points
//!
//! [`TemplateResult`] is what the [`html!`](crate::html) macro produces: the
//! call site's static string pieces, the values between them and the
//! processor to apply. A [`Renderer`] remembers which template instance
//! lives in which container, so rendering the same call site into the same
//! container again only updates values.
//!
//! ```rust,ignore
//! use dom_parts::{html, Document, Renderer};
//!
//! let (mut doc, body) = Document::parse("")?;
//! let mut renderer = Renderer::new();
//!
//! for count in 0..3 {
//!     renderer.render(&mut doc, &html!(["<p>", " items</p>"], count), body)?;
//! }
//! assert_eq!(doc.inner_html(body), "<p>2 items</p>");
//! ```
//!
//! [`render_to_string`] runs the same parts and processors against a fresh
//! arena document and serializes it, so server output matches what the
//! client would build.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{get_global_cache, CacheKey};
use crate::document::Document;
use crate::dom::{Dom, NodeId};
use crate::enhance::Scope;
use crate::error::Result;
use crate::instance::{Processor, TemplateInstance};
use crate::processor::DefaultProcessor;
use crate::types::{CacheMode, Template, TemplateConfig};
use crate::value::{State, Value};

/// Static pieces and values of one tagged template evaluation
#[derive(Clone)]
pub struct TemplateResult {
    strings: &'static &'static [&'static str],
    values: Vec<Value>,
    processor: Rc<dyn Processor>,
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("strings", &self.strings)
            .field("values", &self.values)
            .finish()
    }
}

impl TemplateResult {
    /// Result processed by [`DefaultProcessor`]
    ///
    /// `strings` is the call site's static; its address identifies the
    /// template, so equal pieces from two call sites compile separately.
    pub fn new(strings: &'static &'static [&'static str], values: Vec<Value>) -> Self {
        Self::with_processor(strings, values, Rc::new(DefaultProcessor::new()))
    }

    pub fn with_processor(
        strings: &'static &'static [&'static str],
        values: Vec<Value>,
        processor: Rc<dyn Processor>,
    ) -> Self {
        Self {
            strings,
            values,
            processor,
        }
    }

    /// Cache key: the address of the call site's static
    pub fn key(&self) -> CacheKey {
        CacheKey::Statics(self.strings as *const &[&str] as usize)
    }

    pub fn strings(&self) -> &'static [&'static str] {
        *self.strings
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn processor(&self) -> &Rc<dyn Processor> {
        &self.processor
    }

    /// Compiled template for the static pieces
    pub fn template(&self, config: &TemplateConfig) -> Result<Arc<Template>> {
        match config.cache_mode() {
            CacheMode::None => Ok(Arc::new(Template::from_statics(self.strings)?)),
            CacheMode::Normal => {
                get_global_cache().get_or_compile(&self.key(), || Template::from_statics(self.strings))
            }
        }
    }

    /// Values keyed by slot position
    pub fn state(&self) -> State {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value.clone()))
            .collect()
    }

    /// Markup with values escaped in place; nested results are inlined as
    /// markup and list items concatenated
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for (index, piece) in self.strings().iter().enumerate() {
            html.push_str(piece);
            if let Some(value) = self.values.get(index) {
                write_html(value, &mut html);
            }
        }
        html
    }
}

fn write_html(value: &Value, out: &mut String) {
    match value {
        Value::Template(result) => out.push_str(&result.to_html()),
        Value::List(items) => items.iter().for_each(|item| write_html(item, out)),
        other => escape_html(&other.to_string(), out),
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

/// Build a [`TemplateResult`] from static pieces and values
///
/// The pieces are stored in a per-call-site `static`, whose address is the
/// template's cache key.
///
/// ```rust,ignore
/// let row = html!(["<li class=\"", "\">", "</li>"], class, label);
/// ```
#[macro_export]
macro_rules! html {
    ([$($piece:literal),+ $(,)?] $(, $value:expr)* $(,)?) => {{
        static STRINGS: &[&str] = &[$($piece),+];
        $crate::TemplateResult::new(&STRINGS, ::std::vec![$($crate::Value::from($value)),*])
    }};
}

#[derive(Debug)]
struct Rendered {
    template: Arc<Template>,
    instance: TemplateInstance,
}

/// Tracks the template instance rendered into each container
#[derive(Debug, Default)]
pub struct Renderer {
    rendered: HashMap<NodeId, Rendered>,
    config: TemplateConfig,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TemplateConfig) -> Self {
        Self {
            rendered: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Render `result` as the content of `container`
    ///
    /// The same template again only updates values; a different template
    /// replaces the container's children with a fresh instance.
    pub fn render(&mut self, dom: &mut dyn Dom, result: &TemplateResult, container: NodeId) -> Result<()> {
        let template = result.template(&self.config)?;
        let state = result.state();

        if let Some(rendered) = self.rendered.get_mut(&container) {
            if Arc::ptr_eq(&rendered.template, &template) {
                return rendered.instance.update(dom, &state);
            }
        }

        debug!(container = container.index(), "rendering new template instance");
        for child in dom.child_nodes(container) {
            dom.remove_child(container, child)?;
        }
        let instance = TemplateInstance::render(
            dom,
            template.clone(),
            &state,
            result.processor().clone(),
            self.config.clone(),
        )?;
        for node in instance.nodes() {
            dom.append_child(container, node)?;
        }
        self.rendered.insert(container, Rendered { template, instance });
        Ok(())
    }

    /// Bind `result` to the server-rendered children of `container`
    ///
    /// A container that already has an instance of the same template is only
    /// updated.
    pub fn enhance(&mut self, dom: &mut dyn Dom, result: &TemplateResult, container: NodeId) -> Result<()> {
        let template = result.template(&self.config)?;
        let state = result.state();

        if let Some(rendered) = self.rendered.get_mut(&container) {
            if Arc::ptr_eq(&rendered.template, &template) {
                return rendered.instance.update(dom, &state);
            }
        }

        let nodes = Scope::children(container).nodes(dom);
        let instance = TemplateInstance::enhance(
            dom,
            template.clone(),
            container,
            &nodes,
            &state,
            result.processor().clone(),
            self.config.clone(),
        )?;
        for mismatch in instance.mismatches() {
            debug!(container = container.index(), %mismatch, "enhanced with mismatch");
        }
        self.rendered.insert(container, Rendered { template, instance });
        Ok(())
    }

    pub fn instance(&self, container: NodeId) -> Option<&TemplateInstance> {
        self.rendered.get(&container).map(|rendered| &rendered.instance)
    }

    /// Drop the instance bound to `container`, leaving its nodes in place
    ///
    /// Nodes an update detaches, such as the old text nodes of a list of
    /// strings, are never released: the caller may still hold them. A
    /// [`Document`] that outlives many updates grows by those nodes until
    /// they are passed to [`Dom::discard`] or the document is dropped.
    pub fn forget(&mut self, container: NodeId) -> Option<TemplateInstance> {
        self.rendered.remove(&container).map(|rendered| rendered.instance)
    }
}

/// Render a marker template to HTML in a fresh arena document
pub fn render_to_string(markup: &str, state: &State, processor: Rc<dyn Processor>) -> Result<String> {
    let config = TemplateConfig::default();
    let template = Template::parse_with_config(markup, &config)?;
    let mut doc = Document::new();
    let instance = TemplateInstance::render(&mut doc, template, state, processor, config)?;
    let fragment = doc.create_fragment();
    for node in instance.nodes() {
        doc.append_child(fragment, node)?;
    }
    Ok(doc.inner_html(fragment))
}

/// Render a tagged template result to HTML
pub fn result_to_string(result: &TemplateResult) -> Result<String> {
    let config = TemplateConfig::default();
    let mut doc = Document::new();
    let instance = TemplateInstance::render(
        &mut doc,
        result.template(&config)?,
        &result.state(),
        result.processor().clone(),
        config,
    )?;
    let fragment = doc.create_fragment();
    for node in instance.nodes() {
        doc.append_child(fragment, node)?;
    }
    Ok(doc.inner_html(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(label: &str) -> TemplateResult {
        crate::html!(["<li>", "</li>"], label)
    }

    #[test]
    fn test_call_site_shares_key() {
        assert_eq!(row("a").key(), row("b").key());
        let twin = crate::html!(["<li>", "</li>"], "a");
        assert_ne!(row("a").key(), twin.key());

        let config = TemplateConfig::default();
        let a = row("a").template(&config).unwrap();
        let b = row("b").template(&config).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_state_keys_are_positions() {
        let result = crate::html!(["<a href=\"", "\">", "</a>"], "/x", 3);
        let keys: Vec<_> = result.state().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["0", "1"]);
    }

    #[test]
    fn test_to_html_escapes_values() {
        let result = crate::html!(["<p title=\"", "\">", "</p>"], "\"q\"", "<b>&");
        assert_eq!(
            result.to_html(),
            "<p title=\"&quot;q&quot;\">&lt;b&gt;&amp;</p>"
        );

        let outer = crate::html!(["<ul>", "</ul>"], vec![row("a"), row("b")]);
        assert_eq!(outer.to_html(), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_renderer_updates_same_template() {
        let (mut doc, body) = Document::parse("").unwrap();
        let mut renderer = Renderer::new();

        renderer.render(&mut doc, &row("one"), body).unwrap();
        let li = doc.child_nodes(body)[0];
        renderer.render(&mut doc, &row("two"), body).unwrap();

        assert_eq!(doc.inner_html(body), "<li>two</li>");
        assert_eq!(doc.child_nodes(body)[0], li);
    }

    #[test]
    fn test_renderer_replaces_different_template() {
        let (mut doc, body) = Document::parse("<p>old</p>").unwrap();
        let mut renderer = Renderer::new();
        renderer.render(&mut doc, &row("x"), body).unwrap();
        assert_eq!(doc.inner_html(body), "<li>x</li>");

        let other = crate::html!(["<b>", "</b>"], "y");
        renderer.render(&mut doc, &other, body).unwrap();
        assert_eq!(doc.inner_html(body), "<b>y</b>");
    }

    #[test]
    fn test_nested_results_render_recursively() {
        let (mut doc, body) = Document::parse("").unwrap();
        let mut renderer = Renderer::new();
        let list = |labels: &[&str]| {
            let items: Vec<Value> = labels.iter().map(|l| Value::from(row(l))).collect();
            crate::html!(["<ul>", "</ul>"], items)
        };

        renderer.render(&mut doc, &list(&["a", "b"]), body).unwrap();
        assert_eq!(doc.inner_html(body), "<ul><li>a</li><li>b</li></ul>");

        let ul = doc.child_nodes(body)[0];
        let first = doc.child_nodes(ul)[0];
        renderer.render(&mut doc, &list(&["c", "b", "d"]), body).unwrap();
        assert_eq!(doc.inner_html(body), "<ul><li>c</li><li>b</li><li>d</li></ul>");
        assert_eq!(doc.child_nodes(ul)[0], first);
    }

    #[test]
    fn test_render_to_string() {
        let html = render_to_string(
            "<p class=\"{{c}}\">{{greeting}}, <b>{{name}}</b></p>",
            &State::new()
                .with("c", "hi")
                .with("greeting", "Hello")
                .with("name", "<Ann>"),
            Rc::new(DefaultProcessor::new()),
        )
        .unwrap();
        assert_eq!(html, "<p class=\"hi\">Hello, <b>&lt;Ann&gt;</b></p>");
    }

    #[test]
    fn test_result_to_string() {
        let result = crate::html!(["<p>", " & ", "</p>"], "a", 1);
        assert_eq!(result_to_string(&result).unwrap(), "<p>a &amp; 1</p>");
    }
}
