// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-journald-native.
//
// tracing-journald-native is free software: you can redistribute it and/or modify it under the
// terms of the GNU General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
//
// tracing-journald-native is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// tracing-journald-native.  If not, see <http://www.gnu.org/licenses/>.

//! Structured metadata & the journal fields derived from it.
//!
//! # Introduction
//!
//! A log event carries two bags of metadata alongside its message: the *context* (in
//! [`tracing`] terms, the fields of the spans the event occurred in) and the *extra* (the event's
//! own fields). [`collect_fields`] merges the two & derives from them the journal fields that
//! follow the mandatory `MESSAGE`, `PRIORITY` & `SYSLOG_IDENTIFIER` triplet.
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//!
//! # Values
//!
//! [`Value`] is a closed set of shapes. Scalars, strings, text-renderable objects & null produce
//! fields; arrays & opaque objects are dropped without complaint. A [`Value::Error`] stands in for
//! an error or exception object: the first one found contributes its source location as
//! `CODE_FILE` & `CODE_LINE`, and any others are ignored.
//!
//! # Field names
//!
//! Keys are uppercased on the way out. Journald only accepts names made of `A-Z`, `0-9` & `_`, not
//! starting with a digit, at most 64 bytes long, and treats names starting with `_` as trusted
//! fields it sets itself, so anything else in a key is replaced with `_` & leading underscores and
//! digits are stripped. A key that then matches one of the [`RESERVED`] names is dropped: the
//! mandatory fields always win.
//!
//! Distinct keys may therefore map to the same field name (`user.id` & `user_id` both become
//! `USER_ID`). Both fields are sent; journald keeps every value of a repeated field.

use crate::field::{encode_field, Field};

use std::sync::Arc;

/// Field names that user metadata may never produce.
pub const RESERVED: &[&str] = &[
    "MESSAGE",
    "PRIORITY",
    "SYSLOG_IDENTIFIER",
    "CODE_FILE",
    "CODE_LINE",
];

/// Journald's limit on field name length.
const MAX_NAME_LEN: usize = 64;

/// Does `name` (case-insensitively) collide with a [`RESERVED`] field name?
pub fn is_reserved(name: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Turn a metadata key into a journal field name, or `None` if nothing usable is left of it.
pub fn normalize_name(key: &str) -> Option<String> {
    let mapped: String = key
        .chars()
        .map(|c| match c {
            'A'..='Z' | '0'..='9' | '_' => c,
            'a'..='z' => c.to_ascii_uppercase(),
            _ => '_',
        })
        .collect();
    let mut name = mapped
        .trim_start_matches(|c: char| c == '_' || c.is_ascii_digit())
        .to_string();
    // everything left is ASCII, so any index is a char boundary
    name.truncate(MAX_NAME_LEN);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        metadata values                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The source location of an error or exception carried in metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
    file: String,
    line: u32,
}

impl ErrorContext {
    pub fn new<S: Into<String>>(file: S, line: u32) -> ErrorContext {
        ErrorContext {
            file: file.into(),
            line,
        }
    }
    /// The location of whoever called this function
    #[track_caller]
    pub fn caller() -> ErrorContext {
        std::panic::Location::caller().into()
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl std::convert::From<&std::panic::Location<'_>> for ErrorContext {
    fn from(loc: &std::panic::Location<'_>) -> Self {
        ErrorContext::new(loc.file(), loc.line())
    }
}

/// A metadata value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// Some object that knows how to render itself as text
    Display(Arc<dyn std::fmt::Display + Send + Sync>),
    Array(Vec<Value>),
    /// An error or exception, reduced to where it came from
    Error(ErrorContext),
    /// Anything that can't be rendered (a handle, a resource...); the label is for debugging only
    Opaque(&'static str),
}

impl Value {
    /// Wrap an arbitrary text-renderable object.
    pub fn display<D: std::fmt::Display + Send + Sync + 'static>(d: D) -> Value {
        Value::Display(Arc::new(d))
    }
    /// This value as something that can be handed to [`encode_field`], if it can be rendered as
    /// text at all. `Null` renders as the empty string.
    pub fn as_display(&self) -> Option<&dyn std::fmt::Display> {
        match self {
            Value::Null => Some(&""),
            Value::Bool(b) => Some(b),
            Value::I64(n) => Some(n),
            Value::U64(n) => Some(n),
            Value::F64(x) => Some(x),
            Value::Str(s) => Some(s),
            Value::Display(d) => Some(d.as_ref()),
            Value::Array(_) | Value::Error(_) | Value::Opaque(_) => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({:?})", b),
            Value::I64(n) => write!(f, "I64({:?})", n),
            Value::U64(n) => write!(f, "U64({:?})", n),
            Value::F64(x) => write!(f, "F64({:?})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            // The object may not be `Debug`, and rendering it here could fail; don't try.
            Value::Display(_) => write!(f, "Display(..)"),
            Value::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Value::Opaque(label) => write!(f, "Opaque({})", label),
        }
    }
}

impl std::convert::From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl std::convert::From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl std::convert::From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I64(n as i64)
    }
}

impl std::convert::From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::U64(n)
    }
}

impl std::convert::From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::U64(n as u64)
    }
}

impl std::convert::From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::F64(x)
    }
}

impl std::convert::From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl std::convert::From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl std::convert::From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl std::convert::From<ErrorContext> for Value {
    fn from(e: ErrorContext) -> Self {
        Value::Error(e)
    }
}

impl<T: Into<Value>> std::convert::From<Option<T>> for Value {
    fn from(x: Option<T>) -> Self {
        x.map(Into::into).unwrap_or(Value::Null)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         struct Metadata                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A metadata key: a name, or a position (for array-shaped bags).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl std::convert::From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl std::convert::From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl std::convert::From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// An ordered mapping from [`Key`] to [`Value`].
///
/// Insertion order is preserved; inserting a key that is already present replaces its value in
/// place. Bags are small (a handful of entries), so lookups are linear.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    entries: Vec<(Key, Value)>,
}

impl Metadata {
    pub const fn new() -> Metadata {
        Metadata {
            entries: Vec::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
    /// Insert `value` under `key`, replacing (in place) any previous value.
    pub fn insert<K: Into<Key>, V: Into<Value>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }
    /// Append `value` under the next free positional key.
    pub fn push<V: Into<Value>>(&mut self, value: V) {
        let next = self
            .entries
            .iter()
            .filter_map(|(k, _)| match k {
                Key::Index(i) => Some(i + 1),
                Key::Name(_) => None,
            })
            .max()
            .unwrap_or(0);
        self.entries.push((Key::Index(next), value.into()));
    }
    /// Builder-style [`Metadata::insert`]
    pub fn with<K: Into<Key>, V: Into<Value>>(mut self, key: K, value: V) -> Metadata {
        self.insert(key, value);
        self
    }
}

impl<K: Into<Key>, V: Into<Value>> std::iter::FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Metadata::new();
        for (k, v) in iter {
            md.insert(k, v);
        }
        md
    }
}

/// Merge two metadata bags, `first`'s entries preceding `second`'s.
///
/// - positional entries of `second` are appended under fresh indices; they never collide
/// - when a name appears in both & both values are arrays, `second`'s elements are appended to
///   `first`'s
/// - otherwise `second`'s value replaces `first`'s, in `first`'s position
pub fn merge(first: &Metadata, second: &Metadata) -> Metadata {
    let mut merged = first.clone();
    for (key, value) in second.iter() {
        match key {
            Key::Index(_) => merged.push(value.clone()),
            Key::Name(_) => match merged.entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => match (slot, value) {
                    (Value::Array(existing), Value::Array(more)) => {
                        existing.extend(more.iter().cloned())
                    }
                    (slot, _) => *slot = value.clone(),
                },
                None => merged.entries.push((key.clone(), value.clone())),
            },
        }
    }
    merged
}

/// Derive the additional journal fields for an event from its `context` & `extra` metadata.
///
/// The bags are [`merge`]d, then scanned in order:
///
/// 1. the first [`Value::Error`] yields `CODE_FILE` & `CODE_LINE`; later ones are skipped
/// 2. positional keys are skipped
/// 3. names are normalized (see [`normalize_name`]); unusable & [`RESERVED`] names are skipped
/// 4. values with no textual rendering (arrays, opaque objects) are skipped
/// 5. everything else is handed to [`encode_field`]; a value that fails to render is skipped
///
/// The location fields come first, followed by the rest in merge order. Nothing here fails.
pub fn collect_fields(context: &Metadata, extra: &Metadata) -> Vec<Field> {
    let merged = merge(context, extra);

    let mut location: Vec<Field> = Vec::with_capacity(2);
    let mut error_seen = false;
    let mut fields: Vec<Field> = Vec::with_capacity(merged.len());
    for (key, value) in merged.iter() {
        if let Value::Error(err) = value {
            if !error_seen {
                error_seen = true;
                location.extend(encode_field("CODE_FILE", &err.file()).ok());
                location.extend(encode_field("CODE_LINE", &err.line()).ok());
            }
            continue;
        }
        let name = match key {
            Key::Name(name) => name,
            Key::Index(_) => continue,
        };
        let name = match normalize_name(name) {
            Some(name) if !is_reserved(&name) => name,
            _ => continue,
        };
        if let Some(display) = value.as_display() {
            fields.extend(encode_field(&name, display).ok());
        }
    }

    location.extend(fields);
    location
}
