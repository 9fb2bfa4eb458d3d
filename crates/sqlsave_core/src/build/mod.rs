//! Statement values and SQL text helpers.
//!
//! # Responsibility
//! - Define the `Statement` unit of execution (query text + ordered params).
//! - Provide placeholder formatters and select-list helpers.
//! - Host the save (conditional upsert) builder.
//!
//! # Invariants
//! - `Statement::params().len()` equals the number of placeholders in its
//!   query when produced by this module's builders.

mod save;
mod value;

pub use save::SaveBuilder;

use crate::model::metadata::ColumnMap;
use serde::Serialize;
use serde_json::Value;

/// Maps a 1-based parameter position to its placeholder text.
pub type ParamFormatter = fn(usize) -> String;

/// Named-style placeholder: `@1`, `@2`, ...
pub fn param(index: usize) -> String {
    format!("@{index}")
}

/// Explicitly numbered placeholder: `?1`, `?2`, ...
pub fn numbered_param(index: usize) -> String {
    format!("?{index}")
}

/// Returns `length` placeholders numbered after `from`.
pub fn params(length: usize, from: usize) -> Vec<String> {
    (1..=length).map(|i| param(i + from)).collect()
}

/// One unit of execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    query: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(query: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Keeps requested fields that exist in `all`; `None` when nothing survives.
pub fn get_fields<'a>(fields: &[&'a str], all: Option<&[&str]>) -> Option<Vec<&'a str>> {
    if fields.is_empty() {
        return None;
    }
    let kept: Vec<&str> = match all {
        Some(all) => fields
            .iter()
            .copied()
            .filter(|field| all.contains(field))
            .collect(),
        None => fields.to_vec(),
    };
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

/// Select list for `fields`, falling back to `*`.
pub fn build_fields(fields: &[&str], all: Option<&[&str]>) -> String {
    match get_fields(fields, all) {
        Some(kept) => kept.join(","),
        None => "*".to_string(),
    }
}

/// Looks `name` up in a column map, returning `name` itself when unmapped.
pub fn map_field<'a>(name: &'a str, map: Option<&'a ColumnMap>) -> &'a str {
    map.and_then(|map| map.get(name))
        .map(String::as_str)
        .filter(|mapped| !mapped.is_empty())
        .unwrap_or(name)
}
