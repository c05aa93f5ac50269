//! Server-side string rendering and its round trip through enhance

use std::rc::Rc;
use std::sync::Arc;

use dom_parts::test_utils::{html_eq, instance_html, render};
use dom_parts::*;
use dom_parts::assert_html_eq;
use pretty_assertions::assert_eq;

fn server(markup: &str, state: &State) -> String {
    render_to_string(markup, state, Rc::new(DefaultProcessor::new())).unwrap()
}

#[test]
fn test_server_output_matches_client_render() {
    let markup = "<section class=\"card {{kind}}\"><h2>{{title}}</h2><ul>{{items}}</ul></section>";
    let state = State::new()
        .with("kind", "wide")
        .with("title", "Fish & Chips")
        .with("items", vec!["cod", "haddock"]);

    let (doc, instance) = render(markup, &state).unwrap();
    assert_html_eq!(server(markup, &state), instance_html(&doc, &instance));
    assert_eq!(
        server(markup, &state),
        "<section class=\"card wide\"><h2>Fish &amp; Chips</h2><ul>codhaddock</ul></section>"
    );
}

#[test]
fn test_false_and_null_leave_no_trace() {
    let html = server(
        "<input disabled=\"{{off}}\" title=\"{{t}}\"><p>{{none}}</p>",
        &State::new().with("off", false).with("t", Value::Null).with("none", Value::Null),
    );
    assert_eq!(html, "<input><p></p>");
}

#[test]
fn test_server_markup_enhances_cleanly() {
    let markup = "<label for=\"{{id}}\">{{label}}</label> <span>{{count}}</span> left";
    let state = State::new().with("id", "qty").with("label", "Quantity").with("count", 3);
    let html = server(markup, &state);

    let (mut doc, root) = Document::parse(&html).unwrap();
    let nodes = doc.child_nodes(root);
    let mut instance = TemplateInstance::enhance(
        &mut doc,
        Arc::new(Template::parse(markup).unwrap()),
        root,
        &nodes,
        &state,
        Rc::new(DefaultProcessor::new()),
        TemplateConfig::default(),
    )
    .unwrap();
    assert!(instance.mismatches().is_empty());
    assert_eq!(doc.inner_html(root), html);

    instance.update(&mut doc, &State::new().with("count", 4)).unwrap();
    assert_eq!(
        doc.inner_html(root),
        "<label for=\"qty\">Quantity</label> <span>4</span> left"
    );
}

#[test]
fn test_server_output_ignores_tag_spacing() {
    let html = server(
        "<div class=\"{{kind}}\"><span>{{a}}</span><span>{{b}}</span></div>",
        &State::new().with("kind", "odd").with("a", 1).with("b", "<2>"),
    );
    assert_html_eq!(
        html,
        "<div   class=\"odd\" ><span>1</span><span>&lt;2&gt;</span></div>",
        "server row differs"
    );
    assert!(!html_eq(&html, "<div class=\"even\"><span>1</span><span>&lt;2&gt;</span></div>"));
}
