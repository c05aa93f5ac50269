//! Test utilities
//!
//! HTML comparison that ignores serialization noise, plus shortcuts for
//! rendering a marker template and reading an instance back as HTML.

use std::rc::Rc;
use std::sync::Arc;

use dom_query::Document as QueryDocument;

use crate::document::Document;
use crate::error::Result;
use crate::instance::TemplateInstance;
use crate::processor::DefaultProcessor;
use crate::types::{Template, TemplateConfig};
use crate::value::State;

/// Normalize HTML for comparison by parsing and re-serializing it
///
/// Whitespace inside tags and the quoting of attribute values stop
/// mattering; text content is kept as is.
///
/// ```
/// use dom_parts::test_utils::normalize_html;
///
/// let a = "<div   class=\"test\"  ><p>Hello</p></div>";
/// let b = "<div class=\"test\"><p>Hello</p></div>";
/// assert_eq!(normalize_html(a), normalize_html(b));
/// ```
pub fn normalize_html(html: &str) -> String {
    QueryDocument::from(html).html().trim().to_string()
}

/// Assert that two HTML strings are equivalent after [`normalize_html`]
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_html_eq!($left, $right, "HTML differs")
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {{
        let left = $crate::test_utils::normalize_html(&$left);
        let right = $crate::test_utils::normalize_html(&$right);
        if left != right {
            panic!(
                "{}\n\nleft (normalized):\n{}\n\nright (normalized):\n{}",
                format!($($arg)+),
                left,
                right
            );
        }
    }};
}

/// Like [`assert_html_eq!`] but returns a bool
pub fn html_eq(a: &str, b: &str) -> bool {
    normalize_html(a) == normalize_html(b)
}

/// Render a marker template with the default processor in a new document
pub fn render(markup: &str, state: &State) -> Result<(Document, TemplateInstance)> {
    let mut doc = Document::new();
    let instance = TemplateInstance::render(
        &mut doc,
        Arc::new(Template::parse(markup)?),
        state,
        Rc::new(DefaultProcessor::new()),
        TemplateConfig::default(),
    )?;
    Ok((doc, instance))
}

/// Current HTML of an instance's top-level nodes
pub fn instance_html(doc: &Document, instance: &TemplateInstance) -> String {
    instance.nodes().into_iter().map(|node| doc.outer_html(node)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_tag_spacing() {
        assert!(html_eq(
            r#"<div   class="test"  ><p>  Hello  </p></div>"#,
            r#"<div class="test"><p>  Hello  </p></div>"#
        ));
        assert!(!html_eq("<p>a</p>", "<p>b</p>"));
    }

    #[test]
    fn test_assert_html_eq_macro() {
        assert_html_eq!("<input  type=\"text\" >", "<input type=\"text\">");
    }

    #[test]
    fn test_render_and_read_back() {
        let (mut doc, mut instance) = render("<b>{{x}}</b> and {{y}}", &State::new().with("x", 1).with("y", "z")).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<b>1</b> and z");
        instance.update(&mut doc, &State::new().with("y", "w")).unwrap();
        assert_eq!(instance_html(&doc, &instance), "<b>1</b> and w");
    }
}
