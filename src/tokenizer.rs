//! Slot tokenizer
//!
//! Two grammars split static text into literal and slot tokens:
//!
//! - [`Grammar::Markers`] scans for `{{ expression }}` pairs in plain strings
//!   (server-stored HTML, [`render_to_string`](crate::renderer::render_to_string)).
//!   Escaped openers and closers (`\{{`, `\}}`) are literal, nested `{{ }}`
//!   pairs are balanced into the expression, and anything unterminated stays
//!   literal text.
//! - [`Grammar::Slots`] reads the private-use slot markers the
//!   [`html!`](crate::html) macro inserts between static pieces, so braces in
//!   static text are never interpreted.
//!
//! Marker tokenization is memoized per distinct input string.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// Opens a structural slot; followed by the slot index and [`SLOT_CLOSE`]
pub const SLOT_OPEN: char = '\u{E000}';
pub const SLOT_CLOSE: char = '\u{E001}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Slot(String),
}

impl Token {
    pub fn is_slot(&self) -> bool {
        matches!(self, Token::Slot(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    /// `{{ expression }}` markers inside strings
    Markers,
    /// Structural slots produced by [`slot_marker`]
    Slots,
}

impl Grammar {
    pub fn tokenize(self, text: &str) -> Arc<[Token]> {
        match self {
            Grammar::Markers => tokenize(text),
            Grammar::Slots => tokenize_slots(text).into(),
        }
    }

    /// Cheap pre-check before tokenizing a text or attribute value
    pub fn has_slots(self, text: &str) -> bool {
        match self {
            Grammar::Markers => text.contains("{{"),
            Grammar::Slots => text.contains(SLOT_OPEN),
        }
    }
}

static MEMO: Lazy<Mutex<HashMap<String, Arc<[Token]>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Tokenize `{{ }}` markers
pub fn tokenize(text: &str) -> Arc<[Token]> {
    if let Ok(memo) = MEMO.lock() {
        if let Some(tokens) = memo.get(text) {
            return tokens.clone();
        }
    }

    let tokens: Arc<[Token]> = scan_markers(text).into();
    if let Ok(mut memo) = MEMO.lock() {
        memo.insert(text.to_string(), tokens.clone());
    }
    tokens
}

fn scan_markers(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut value = String::new();
    // Goes negative on stray closers; they only count again once balanced
    let mut open: i32 = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let escaped = i > 0 && chars[i - 1] == '\\';

        let opener = c == '{' && next == Some('{') && !escaped && i + 2 < chars.len();
        if opener {
            open += 1;
        }
        let closer = c == '}' && next == Some('}') && !escaped;
        if closer {
            open -= 1;
        }

        if opener && open == 1 {
            if !value.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut value)));
            }
            i += 1;
        } else if closer && open == 0 {
            tokens.push(Token::Slot(value.trim().to_string()));
            value.clear();
            i += 1;
        } else {
            value.push(c);
        }
        i += 1;
    }

    if !value.is_empty() {
        if open > 0 {
            value.insert_str(0, "{{");
        }
        tokens.push(Token::Literal(value));
    }
    tokens
}

/// Marker text standing for slot `index` in structural templates
pub fn slot_marker(index: usize) -> String {
    format!("{}{}{}", SLOT_OPEN, index, SLOT_CLOSE)
}

fn tokenize_slots(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(SLOT_OPEN) {
        let after = &rest[start + SLOT_OPEN.len_utf8()..];
        let Some(end) = after.find(SLOT_CLOSE) else {
            break;
        };
        if start > 0 {
            tokens.push(Token::Literal(rest[..start].to_string()));
        }
        tokens.push(Token::Slot(after[..end].to_string()));
        rest = &after[end + SLOT_CLOSE.len_utf8()..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest.to_string()));
    }
    tokens
}
