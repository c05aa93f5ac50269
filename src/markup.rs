//! Markup parsing
//!
//! Turns an HTML string into a plain structural tree ([`Markup`]) using
//! `dom_query`, then materializes that tree into any [`Dom`]. Parts are never
//! created here; the compiler walks the finished tree in a separate pass.

use dom_query::{Document, Node, NodeData};

use crate::dom::{Attribute, Dom, NodeId};
use crate::error::{Error, Result};

/// Parsed static markup
#[derive(Debug, Clone, PartialEq)]
pub enum Markup {
    Element {
        name: String,
        attributes: Vec<Attribute>,
        /// For `<template>` elements these are the template contents
        children: Vec<Markup>,
    },
    Text(String),
    Comment(String),
}

impl Markup {
    pub fn element(name: &str, attributes: Vec<Attribute>, children: Vec<Markup>) -> Self {
        Markup::Element {
            name: name.to_string(),
            attributes,
            children,
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Markup::Element { name, .. } if name == "template")
    }
}

/// Parse an HTML fragment in body context
///
/// Leading and trailing whitespace is kept as text so that positions inside
/// the fragment match what a browser produces for `innerHTML`.
pub fn parse_fragment(html: &str) -> Result<Vec<Markup>> {
    let source = format!("<body>{}", html);
    let document = Document::from(source.as_str());
    let body = document.select("body");
    let body_node = body
        .nodes()
        .first()
        .cloned()
        .ok_or_else(|| Error::parse_static("markup produced no body"))?;

    let mut out = Vec::new();
    for child in body_node.children() {
        if let Some(markup) = convert(&child) {
            out.push(markup);
        }
    }
    Ok(out)
}

enum Shape {
    Element {
        name: String,
        attributes: Vec<Attribute>,
        contents: Option<dom_query::NodeId>,
    },
    Text(String),
    Comment(String),
    Other,
}

fn convert(node: &Node) -> Option<Markup> {
    let shape = node.query(|tree_node| match &tree_node.data {
        NodeData::Element(element) => Shape::Element {
            name: element.name.local.to_string(),
            attributes: element
                .attrs
                .iter()
                .map(|attr| {
                    let namespace = attr.name.ns.to_string();
                    let name = match &attr.name.prefix {
                        Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                        None => attr.name.local.to_string(),
                    };
                    Attribute {
                        name,
                        namespace: if namespace.is_empty() { None } else { Some(namespace) },
                        value: attr.value.to_string(),
                    }
                })
                .collect(),
            contents: element.template_contents,
        },
        NodeData::Text { contents } => Shape::Text(contents.to_string()),
        NodeData::Comment { contents } => Shape::Comment(contents.to_string()),
        _ => Shape::Other,
    })?;

    match shape {
        Shape::Element {
            name,
            attributes,
            contents,
        } => {
            let source = match contents {
                Some(id) => Node::new(id, node.tree),
                None => node.clone(),
            };
            let children = source.children().iter().filter_map(convert).collect();
            Some(Markup::Element {
                name,
                attributes,
                children,
            })
        }
        Shape::Text(text) => Some(Markup::Text(text)),
        Shape::Comment(text) => Some(Markup::Comment(text)),
        Shape::Other => None,
    }
}

/// Create `nodes` inside `dom` under a new detached fragment
pub fn materialize<D: Dom + ?Sized>(dom: &mut D, nodes: &[Markup]) -> Result<NodeId> {
    let fragment = dom.create_fragment();
    materialize_into(dom, fragment, nodes)?;
    Ok(fragment)
}

pub fn materialize_into<D: Dom + ?Sized>(dom: &mut D, parent: NodeId, nodes: &[Markup]) -> Result<()> {
    for node in nodes {
        let id = materialize_node(dom, node)?;
        dom.append_child(parent, id)?;
    }
    Ok(())
}

pub fn materialize_node<D: Dom + ?Sized>(dom: &mut D, node: &Markup) -> Result<NodeId> {
    Ok(match node {
        Markup::Element {
            name,
            attributes,
            children,
        } => {
            let element = dom.create_element(name);
            for attr in attributes {
                dom.set_attribute(element, attr.namespace.as_deref(), &attr.name, &attr.value)?;
            }
            materialize_into(dom, element, children)?;
            element
        }
        Markup::Text(text) => dom.create_text(text),
        Markup::Comment(text) => dom.create_comment(text),
    })
}

/// Serialize a markup tree, used for server output of templates never instantiated
pub fn to_html(nodes: &[Markup]) -> String {
    let mut doc = crate::document::Document::new();
    match materialize(&mut doc, nodes) {
        Ok(fragment) => doc.inner_html(fragment),
        Err(_) => String::new(),
    }
}
