//! Values bound to template expressions
//!
//! [`Value`] is everything a processor may assign to a part: plain data,
//! event listeners, host nodes, nested template results and lists of any of
//! these. [`State`] maps expression keys to values and keeps insertion order.
//!
//! ```rust,ignore
//! use dom_parts::{State, Value};
//!
//! let state = State::new()
//!     .with("count", 10)
//!     .with("done", false)
//!     .with("items", vec!["a", "b"]);
//!
//! // or straight from JSON
//! let state = State::from_json(r#"{"count": 10, "done": false}"#)?;
//! ```
//!
//! With the `derive` feature, `#[derive(IntoState)]` builds a [`State`] from
//! a struct's fields; `#[state(rename = "...")]` and `#[state(skip)]` adjust
//! the keys.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::dom::{Listener, NodeId};
use crate::error::{Error, Result};
use crate::renderer::TemplateResult;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Listener(Listener),
    Template(TemplateResult),
    Node(NodeId),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether a host node is reachable from this value, through lists and
    /// nested template values included
    pub fn holds_node(&self) -> bool {
        match self {
            Value::Node(_) => true,
            Value::List(items) => items.iter().any(Value::holds_node),
            Value::Template(result) => result.values().iter().any(Value::holds_node),
            _ => false,
        }
    }

    pub fn listener<F>(handler: F) -> Self
    where
        F: Fn(&crate::dom::Event) + 'static,
    {
        Value::Listener(Listener::new(handler))
    }
}

/// String form used for text content and attribute values
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Listener(_) | Value::Node(_) => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Template(result) => f.write_str(&result.to_html()),
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<Listener> for Value {
    fn from(listener: Listener) -> Self {
        Value::Listener(listener)
    }
}

impl From<TemplateResult> for Value {
    fn from(result: TemplateResult) -> Self {
        Value::Template(result)
    }
}

impl From<NodeId> for Value {
    fn from(node: NodeId) -> Self {
        Value::Node(node)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Objects have no part projection, so they bind as their JSON text
impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            object @ JsonValue::Object(_) => Value::String(object.to_string()),
        }
    }
}

/// Expression key to value map
#[derive(Debug, Clone, Default)]
pub struct State(IndexMap<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`State::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Top-level object members become entries
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_value(serde_json::from_str(json)?)
    }

    pub fn from_json_value(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Object(members) => Ok(members.into_iter().collect()),
            other => Err(Error::render_owned(format!(
                "state must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = State::new();
        for (key, value) in iter {
            state.insert(key, value);
        }
        state
    }
}
