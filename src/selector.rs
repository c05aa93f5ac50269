//! Hydration selector codec
//!
//! A [`Selector`] is the persisted stand-in for a live part: a structural
//! [`Path`] from the hydration root plus the expression key and optional
//! attribute, offset, length and node count. Its single-line encoding is the
//! only supported wire format:
//!
//! ```text
//! <path>[ @<attribute>][ +<offset>][ ~<length>][ *<nodes>] #<expression>
//! /div[1]/text()[2] +6 ~5 #count
//! /div[1] @class +3 ~3 #x
//! /ul[1]/li[1] *3 #items
//! /ul[1] +0 *0 #items
//! ```
//!
//! Path steps are `/<tag>[<n>]` or `/text()[<n>]` with 1-based indexes that
//! count only non-ignorable siblings of the same type; the root path is `/`.
//! Offsets and lengths are characters of whitespace-collapsed text for text
//! targets and raw characters for attributes. `*0` marks an empty part
//! anchored after the `offset`-th significant child of the path.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(text\(\)|[A-Za-z][A-Za-z0-9_.:-]*)\[([1-9][0-9]*)\]$").expect("Invalid path step regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// `index`-th element named `name`
    Element { name: String, index: usize },
    /// `index`-th block of adjoining non-ignorable text
    Text { index: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Element { name, index } => write!(f, "/{}[{}]", name, index),
            Step::Text { index } => write!(f, "/text()[{}]", index),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Path(pub Vec<Step>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, step: Step) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    /// Split off the last step
    pub fn split_last(&self) -> Option<(&Step, &[Step])> {
        self.0.split_last()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "/" {
            return Ok(Path::root());
        }
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::selector_owned(format!("path `{}` must start with `/`", s)))?;
        let mut steps = Vec::new();
        for segment in rest.split('/') {
            let caps = STEP_RE
                .captures(segment)
                .ok_or_else(|| Error::selector_owned(format!("bad path step `{}`", segment)))?;
            let index: usize = caps[2]
                .parse()
                .map_err(|_| Error::selector_owned(format!("bad index in `{}`", segment)))?;
            steps.push(if &caps[1] == "text()" {
                Step::Text { index }
            } else {
                Step::Element {
                    name: caps[1].to_ascii_lowercase(),
                    index,
                }
            });
        }
        Ok(Path(steps))
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for Path {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Persisted address of one part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub path: Path,
    pub expression: String,
    pub attribute: Option<String>,
    pub offset: Option<usize>,
    pub length: Option<usize>,
    pub nodes: Option<usize>,
    /// Content a fresh client render put at this address; used to report
    /// mismatches and never encoded
    pub expected: Option<String>,
}

impl Selector {
    pub fn new(path: Path, expression: impl Into<String>) -> Self {
        Self {
            path,
            expression: expression.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Encoding without the path, as stored inside a [`SelectorGroup`]
    pub fn encode_entry(&self) -> String {
        let mut out = String::new();
        if let Some(attribute) = &self.attribute {
            out.push('@');
            out.push_str(attribute);
            out.push(' ');
        }
        if let Some(offset) = self.offset {
            out.push_str(&format!("+{} ", offset));
        }
        if let Some(length) = self.length {
            out.push_str(&format!("~{} ", length));
        }
        if let Some(nodes) = self.nodes {
            out.push_str(&format!("*{} ", nodes));
        }
        out.push('#');
        out.push_str(&self.expression);
        out
    }

    /// Decode a group entry for `path`
    pub fn parse_entry(path: Path, entry: &str) -> Result<Self> {
        let (fields, expression) = split_expression(entry)?;
        let mut selector = Selector::new(path, expression);
        for field in fields.split_ascii_whitespace() {
            let mut chars = field.chars();
            let tag = chars.next();
            let value = chars.as_str();
            let number = || {
                value
                    .parse::<usize>()
                    .map_err(|_| Error::selector_owned(format!("bad number in `{}`", field)))
            };
            match tag {
                Some('@') if !value.is_empty() => selector.attribute = Some(value.to_string()),
                Some('+') => selector.offset = Some(number()?),
                Some('~') => selector.length = Some(number()?),
                Some('*') => selector.nodes = Some(number()?),
                _ => return Err(Error::selector_owned(format!("unknown selector field `{}`", field))),
            }
        }
        Ok(selector)
    }
}

fn split_expression(s: &str) -> Result<(&str, &str)> {
    if let Some(expression) = s.strip_prefix('#') {
        return Ok(("", expression));
    }
    match s.find(" #") {
        Some(index) => Ok((&s[..index], &s[index + 2..])),
        None => Err(Error::selector_owned(format!("selector `{}` has no `#expression`", s))),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.encode_entry())
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim_start();
        if s.is_empty() {
            return Err(Error::selector_static("empty selector"));
        }
        let (path, entry) = match s.find(' ') {
            Some(index) => (&s[..index], &s[index + 1..]),
            None => return Err(Error::selector_owned(format!("selector `{}` has no fields", s))),
        };
        Selector::parse_entry(path.parse()?, entry)
    }
}

/// Selectors sharing one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RawGroup", try_from = "RawGroup")]
pub struct SelectorGroup {
    pub path: Path,
    pub entries: Vec<Selector>,
}

#[derive(Serialize, Deserialize)]
struct RawGroup {
    path: Path,
    parts: Vec<String>,
}

impl From<SelectorGroup> for RawGroup {
    fn from(group: SelectorGroup) -> Self {
        RawGroup {
            path: group.path,
            parts: group.entries.iter().map(Selector::encode_entry).collect(),
        }
    }
}

impl TryFrom<RawGroup> for SelectorGroup {
    type Error = Error;

    fn try_from(raw: RawGroup) -> Result<Self> {
        let entries = raw
            .parts
            .iter()
            .map(|entry| Selector::parse_entry(raw.path.clone(), entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(SelectorGroup {
            path: raw.path,
            entries,
        })
    }
}

/// Group selectors by path, in order of first appearance
pub fn group(selectors: &[Selector]) -> Vec<SelectorGroup> {
    let mut groups: IndexMap<Path, Vec<Selector>> = IndexMap::new();
    for selector in selectors {
        groups
            .entry(selector.path.clone())
            .or_default()
            .push(selector.clone());
    }
    groups
        .into_iter()
        .map(|(path, entries)| SelectorGroup { path, entries })
        .collect()
}

/// Flatten groups back into selectors
pub fn ungroup(groups: &[SelectorGroup]) -> Vec<Selector> {
    groups.iter().flat_map(|g| g.entries.iter().cloned()).collect()
}
