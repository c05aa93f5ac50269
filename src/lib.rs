//! DOM Parts templating
//!
//! Templates are parsed once into static markup plus a list of parts: slots
//! inside attribute values and slots between child nodes. Rendering clones
//! the markup and binds the parts; updating assigns new values to the parts
//! and patches the DOM in place with a minimal child-list reconciliation.
//! Server-rendered markup can be enhanced instead of re-rendered: the
//! matcher locates every part in the existing nodes and binds to them.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use dom_parts::{DefaultProcessor, Document, State, Template, TemplateConfig, TemplateInstance};
//!
//! # fn example() -> dom_parts::Result<()> {
//! let template = Arc::new(Template::parse(
//!     r#"<p class="{{ kind }}"><span>{{ count }}</span> items left</p>"#,
//! )?);
//!
//! let mut doc = Document::new();
//! let state = State::new().with("kind", "todo").with("count", 10);
//! let mut instance = TemplateInstance::render(
//!     &mut doc,
//!     template,
//!     &state,
//!     Rc::new(DefaultProcessor::new()),
//!     TemplateConfig::default(),
//! )?;
//!
//! // only the text node inside <span> is touched
//! instance.update(&mut doc, &State::new().with("count", 9))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod value;
pub mod dom;
pub mod document;
pub mod markup;
pub mod tokenizer;
pub mod compiler;
pub mod cache;
pub mod parts;
pub mod reconcile;
pub mod selector;
pub mod enhance;
pub mod instance;
pub mod processor;
pub mod renderer;
pub mod test_utils;

#[cfg(test)]
mod edge_case_tests;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{CacheMode, Template, TemplateConfig};
pub use value::{State, Value};
pub use dom::{Dom, Event, Listener, NodeId, NodeKind};
pub use document::Document;
pub use parts::{AttrPart, ChildNodePart, Content, InnerTemplatePart, Part, PartList};
pub use selector::{Path, Selector, SelectorGroup};
pub use enhance::{Mismatch, MismatchKind};
pub use instance::{Context, Mode, Processor, TemplateInstance};
pub use processor::{DefaultProcessor, PropertyIdentityProcessor, Rule};
pub use renderer::{render_to_string, result_to_string, Renderer, TemplateResult};

#[cfg(feature = "derive")]
pub use dom_parts_macros::IntoState;
