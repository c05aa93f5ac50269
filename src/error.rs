//! Error handling for dom-parts
//!
//! This module provides the error type shared by every dom-parts operation.
//! All errors implement the standard `std::error::Error` trait.
//!
//! # Error Types
//!
//! - [`Error::ParseError`] - markup that cannot be turned into a template
//! - [`Error::RenderError`] - processor and instance misuse while projecting values
//! - [`Error::SelectorError`] - hydration selectors or paths that cannot be decoded
//! - [`Error::DomError`] - host DOM primitives called with invalid arguments
//! - [`Error::InvariantViolation`] - a part setter used against its contract
//! - [`Error::JsonError`] - JSON state that cannot be parsed
//!
//! Hydration mismatches are *not* errors: they are collected as
//! [`Mismatch`](crate::enhance::Mismatch) records on the enhanced instance and
//! the affected part degrades instead of failing the whole render.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dom_parts::{Error, parts::AttrPart};
//!
//! match part.set_boolean_value(&mut doc, true) {
//!     Ok(()) => {}
//!     Err(Error::InvariantViolation(msg)) => eprintln!("misused part: {}", msg),
//!     Err(err) => eprintln!("other error: {}", err),
//! }
//! ```
//!
//! # Memory Efficiency
//!
//! Error messages use `Cow<'static, str>` so static messages never allocate.

use std::borrow::Cow;
use thiserror::Error;

/// Error type for all dom-parts operations
#[derive(Error, Debug)]
pub enum Error {
    /// Markup parsing and template compilation errors
    #[error("Parse error: {0}")]
    ParseError(Cow<'static, str>),

    /// Value projection errors
    ///
    /// Raised by processors when a value cannot be projected onto a part,
    /// e.g. a nested template bound to an attribute.
    #[error("Render error: {0}")]
    RenderError(Cow<'static, str>),

    /// Hydration selector and path decoding errors
    #[error("Selector error: {0}")]
    SelectorError(Cow<'static, str>),

    /// Host DOM errors
    ///
    /// Occurs when a tree primitive is called with arguments the tree cannot
    /// honor: removing a node that is not a child, inserting into a text node,
    /// splitting a text node past its end.
    #[error("DOM error: {0}")]
    DomError(Cow<'static, str>),

    /// Part contract violations
    ///
    /// Signals API misuse such as setting a boolean value on an attribute part
    /// that shares its attribute with other fragments.
    #[error("Invariant violation: {0}")]
    InvariantViolation(Cow<'static, str>),

    /// JSON parsing errors
    ///
    /// Automatically converted from `serde_json::Error` when building state from JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error with a static string
    pub fn parse_static(msg: &'static str) -> Self {
        Error::ParseError(Cow::Borrowed(msg))
    }

    /// Create a parse error with an owned string
    pub fn parse_owned(msg: String) -> Self {
        Error::ParseError(Cow::Owned(msg))
    }

    /// Create a render error with a static string
    pub fn render_static(msg: &'static str) -> Self {
        Error::RenderError(Cow::Borrowed(msg))
    }

    /// Create a render error with an owned string
    pub fn render_owned(msg: String) -> Self {
        Error::RenderError(Cow::Owned(msg))
    }

    /// Create a DOM error with a static string
    pub fn dom_static(msg: &'static str) -> Self {
        Error::DomError(Cow::Borrowed(msg))
    }

    /// Create a DOM error with an owned string
    pub fn dom_owned(msg: String) -> Self {
        Error::DomError(Cow::Owned(msg))
    }

    /// Create a selector error with a static string
    pub fn selector_static(msg: &'static str) -> Self {
        Error::SelectorError(Cow::Borrowed(msg))
    }

    /// Create a selector error with an owned string
    pub fn selector_owned(msg: String) -> Self {
        Error::SelectorError(Cow::Owned(msg))
    }

    /// Create an invariant violation with a static string
    pub fn invariant_static(msg: &'static str) -> Self {
        Error::InvariantViolation(Cow::Borrowed(msg))
    }

    /// Create an invariant violation with an owned string
    pub fn invariant_owned(msg: String) -> Self {
        Error::InvariantViolation(Cow::Owned(msg))
    }
}

/// Result type alias for dom-parts operations
pub type Result<T> = std::result::Result<T, Error>;
