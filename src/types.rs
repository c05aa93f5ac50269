//! Core template types and configuration
//!
//! # Key Types
//!
//! - [`Template`] - parsed static markup plus the part descriptors found in it
//! - [`TemplateConfig`] - explicit engine settings (caching, diagnostics)
//! - [`CacheMode`] - whether compiled templates go through the template cache
//!
//! ```rust,ignore
//! use dom_parts::{Template, TemplateConfig, CacheMode};
//!
//! let config = TemplateConfig::default()
//!     .with_cache_mode(CacheMode::None)
//!     .with_diagnostics(false);
//!
//! let template = Template::parse_with_config("<p>{{ greeting }}</p>", &config)?;
//! ```

use std::sync::Arc;

use crate::cache::{get_global_cache, CacheKey};
use crate::compiler::Compiler;
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::markup::{self, Markup};
use crate::parts::PartList;
use crate::tokenizer::{slot_marker, Grammar, Token};

/// Child indexes leading from a template's root fragment to a node
pub type NodePath = Vec<usize>;

/// Where a part lives inside the static markup of a [`Template`]
#[derive(Debug, Clone)]
pub enum PartDescriptor {
    /// Slot `item` of attribute binding `binding`
    Attribute { binding: usize, item: usize },
    /// Empty placeholder text node at `path`
    ChildNode { path: NodePath },
    /// A `<template>` element, replaced by an empty placeholder at `path`
    InnerTemplate {
        path: NodePath,
        directive: Option<String>,
        expression: String,
        template: Arc<Template>,
    },
}

/// An attribute whose value contains at least one slot
#[derive(Debug, Clone)]
pub struct AttrBinding {
    pub path: NodePath,
    pub name: String,
    pub namespace: Option<String>,
    pub tokens: Vec<Token>,
}

/// Parsed, immutable template
///
/// Static markup has every slot replaced by its placeholder: empty text nodes
/// for child positions and the literal-only form of each templated attribute.
/// Templates are shared through `Arc` and cached for the life of the process.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) content: Vec<Markup>,
    pub(crate) parts: Vec<(String, PartDescriptor)>,
    pub(crate) attributes: Vec<AttrBinding>,
    pub(crate) grammar: Grammar,
}

impl Template {
    /// Parse a string template using `{{ expression }}` markers
    pub fn parse(html: &str) -> Result<Self> {
        let nodes = markup::parse_fragment(html)?;
        Ok(Compiler::new(Grammar::Markers).compile(&nodes))
    }

    /// Parse through the global cache, keyed by the markup itself
    pub fn parse_with_config(html: &str, config: &TemplateConfig) -> Result<Arc<Self>> {
        match config.cache_mode() {
            CacheMode::None => Ok(Arc::new(Self::parse(html)?)),
            CacheMode::Normal => get_global_cache()
                .get_or_compile(&CacheKey::Markup(html.to_string()), || Self::parse(html)),
        }
    }

    /// Compile the static pieces of a tagged template; slot `i` sits between
    /// `strings[i]` and `strings[i + 1]` and is keyed `"i"`
    pub fn from_statics(strings: &[&str]) -> Result<Self> {
        if strings.is_empty() {
            return Err(Error::parse_static("tagged template has no static pieces"));
        }
        let mut html = String::from(strings[0]);
        for (index, piece) in strings[1..].iter().enumerate() {
            html.push_str(&slot_marker(index));
            html.push_str(piece);
        }
        let nodes = markup::parse_fragment(&html)?;
        Ok(Compiler::new(Grammar::Slots).compile(&nodes))
    }

    pub fn content(&self) -> &[Markup] {
        &self.content
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn descriptors(&self) -> &[(String, PartDescriptor)] {
        &self.parts
    }

    pub fn bindings(&self) -> &[AttrBinding] {
        &self.attributes
    }

    /// Expression keys in part order, duplicates included
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(key, _)| key.as_str())
    }

    /// Static markup with all placeholders empty
    pub fn to_html(&self) -> String {
        markup::to_html(&self.content)
    }

    /// Materialize the static markup into `dom` and bind a fresh part list to it
    pub fn instantiate(&self, dom: &mut dyn Dom) -> Result<(NodeId, PartList)> {
        Compiler::instantiate(self, dom)
    }
}

/// Cache strategies for compiled templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Compile on every use
    None,
    /// Compile once per call site or markup string
    Normal,
}

/// Engine configuration
///
/// Passed explicitly to instances, renderers and the hydration matcher.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    cache_mode: CacheMode,
    diagnostics: bool,
}

impl TemplateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics off: hydration mismatches are still recorded but not logged
    pub fn production() -> Self {
        Self::default().with_diagnostics(false)
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Normal,
            diagnostics: true,
        }
    }
}
