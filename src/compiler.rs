//! Template compiler
//!
//! Walks parsed markup once and records where every slot lives. Text runs
//! with slots are expanded into literal text nodes and empty placeholders,
//! templated attributes get their literal-only value, and `<template>`
//! elements are consumed whole as inner template parts. Attributes of an
//! element are visited before its children, children in document order.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::markup::{self, Markup};
use crate::parts::{AttrPart, AttrPartList, ChildNodePart, InnerTemplatePart, Part, PartList};
use crate::tokenizer::{Grammar, Token};
use crate::types::{AttrBinding, NodePath, PartDescriptor, Template};

pub struct Compiler {
    grammar: Grammar,
}

impl Compiler {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn compile(&self, nodes: &[Markup]) -> Template {
        let mut template = Template {
            content: Vec::new(),
            parts: Vec::new(),
            attributes: Vec::new(),
            grammar: self.grammar,
        };
        let mut path = Vec::new();
        let mut content = Vec::new();
        self.walk(nodes, &mut path, &mut content, &mut template);
        template.content = content;
        debug!(
            parts = template.parts.len(),
            attributes = template.attributes.len(),
            "compiled template"
        );
        template
    }

    fn walk(&self, nodes: &[Markup], path: &mut NodePath, out: &mut Vec<Markup>, template: &mut Template) {
        for node in nodes {
            match node {
                Markup::Element {
                    name,
                    attributes,
                    children,
                } if name == "template" => {
                    let (directive, expression) = inner_template_expression(attributes);
                    let nested = Arc::new(self.compile(children));
                    template.parts.push((
                        expression.clone(),
                        PartDescriptor::InnerTemplate {
                            path: child_path(path, out.len()),
                            directive,
                            expression,
                            template: nested,
                        },
                    ));
                    out.push(Markup::Text(String::new()));
                }
                Markup::Element {
                    name,
                    attributes,
                    children,
                } => {
                    let element_path = child_path(path, out.len());
                    let mut rewritten = Vec::with_capacity(attributes.len());
                    for attr in attributes {
                        let mut attr = attr.clone();
                        if self.grammar.has_slots(&attr.value) {
                            let tokens = self.grammar.tokenize(&attr.value).to_vec();
                            let binding = template.attributes.len();
                            let mut literal = String::new();
                            for (item, token) in tokens.iter().enumerate() {
                                match token {
                                    Token::Literal(text) => literal.push_str(text),
                                    Token::Slot(key) => template
                                        .parts
                                        .push((key.clone(), PartDescriptor::Attribute { binding, item })),
                                }
                            }
                            template.attributes.push(AttrBinding {
                                path: element_path.clone(),
                                name: attr.name.clone(),
                                namespace: attr.namespace.clone(),
                                tokens,
                            });
                            attr.value = literal;
                        }
                        rewritten.push(attr);
                    }

                    let mut expanded = Vec::with_capacity(children.len());
                    path.push(out.len());
                    self.walk(children, path, &mut expanded, template);
                    path.pop();
                    out.push(Markup::Element {
                        name: name.clone(),
                        attributes: rewritten,
                        children: expanded,
                    });
                }
                Markup::Text(text) if self.grammar.has_slots(text) => {
                    for token in self.grammar.tokenize(text).iter() {
                        match token {
                            Token::Literal(literal) => out.push(Markup::Text(literal.clone())),
                            Token::Slot(key) => {
                                template.parts.push((
                                    key.clone(),
                                    PartDescriptor::ChildNode {
                                        path: child_path(path, out.len()),
                                    },
                                ));
                                out.push(Markup::Text(String::new()));
                            }
                        }
                    }
                }
                other => out.push(other.clone()),
            }
        }
    }

    /// Materialize `template` and bind its descriptors to the new nodes
    pub fn instantiate(template: &Template, dom: &mut dyn Dom) -> Result<(NodeId, PartList)> {
        let fragment = markup::materialize(dom, &template.content)?;

        let mut lists = Vec::with_capacity(template.attributes.len());
        for binding in &template.attributes {
            let element = node_at(dom, fragment, &binding.path)?;
            let list = Rc::new(RefCell::new(AttrPartList::from_tokens(&binding.tokens)));
            lists.push((element, list));
        }

        let mut parts = Vec::with_capacity(template.parts.len());
        for (key, descriptor) in &template.parts {
            let part = match descriptor {
                PartDescriptor::Attribute { binding, item } => {
                    let attr = &template.attributes[*binding];
                    let (element, list) = &lists[*binding];
                    Part::Attribute(AttrPart::new(
                        *element,
                        &attr.name,
                        attr.namespace.as_deref(),
                        list.clone(),
                        *item,
                    ))
                }
                PartDescriptor::ChildNode { path } => {
                    Part::ChildNode(ChildNodePart::new(vec![node_at(dom, fragment, path)?]))
                }
                PartDescriptor::InnerTemplate {
                    path,
                    directive,
                    expression,
                    template,
                } => Part::InnerTemplate(InnerTemplatePart::new(
                    ChildNodePart::new(vec![node_at(dom, fragment, path)?]),
                    directive.clone(),
                    expression.clone(),
                    template.clone(),
                )),
            };
            parts.push((key.clone(), part));
        }
        Ok((fragment, parts))
    }
}

fn child_path(path: &NodePath, index: usize) -> NodePath {
    let mut child = path.clone();
    child.push(index);
    child
}

fn node_at(dom: &dyn Dom, root: NodeId, path: &NodePath) -> Result<NodeId> {
    let mut node = root;
    for &index in path {
        node = dom
            .child_nodes(node)
            .get(index)
            .copied()
            .ok_or_else(|| Error::parse_owned(format!("template path {:?} does not resolve", path)))?;
    }
    Ok(node)
}

/// `directive` falls back to `type`; `expression` falls back to the attribute
/// named by the directive, and a `{{ }}` wrapper is stripped
fn inner_template_expression(attributes: &[crate::dom::Attribute]) -> (Option<String>, String) {
    let get = |name: &str| {
        attributes
            .iter()
            .find(|a| a.name == name && a.namespace.is_none())
            .map(|a| a.value.clone())
            .filter(|v| !v.is_empty())
    };
    let directive = get("directive").or_else(|| get("type"));
    let mut expression = get("expression")
        .or_else(|| directive.as_deref().and_then(get))
        .unwrap_or_default();
    if expression.starts_with("{{") {
        let chars: Vec<char> = expression.trim().chars().collect();
        expression = if chars.len() >= 4 {
            chars[2..chars.len() - 2].iter().collect::<String>().trim().to_string()
        } else {
            String::new()
        };
    }
    (directive, expression)
}
