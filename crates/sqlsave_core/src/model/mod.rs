//! Attribute schema and resolved metadata.
//!
//! # Responsibility
//! - Hold the declarative per-entity schema (`Model`, `Attributes`).
//! - Derive immutable working metadata consumed by builders and mappers.
//!
//! # Invariants
//! - Schemas are defined once and never mutated by resolution.

pub mod attribute;
pub mod metadata;

/// Entity instance handed in by callers: logical field name -> value.
///
/// An absent key means "not provided"; `Value::Null` means an explicit null.
pub type Entity = serde_json::Map<String, serde_json::Value>;

/// Row returned by read queries, keyed by column (or mapped field) name.
pub type Row = serde_json::Map<String, serde_json::Value>;
