//! Declarative attribute schema for persisted entities.
//!
//! # Responsibility
//! - Describe the persisted shape of one entity type (columns, keys, flags).
//! - Load schemas from JSON model definitions without losing key order.
//!
//! # Invariants
//! - Every `Attribute::name` equals the key it is registered under.
//! - Attribute order is the registration (or JSON document) order.
//! - Schemas are read-only after construction.

use crate::model::metadata::SchemaResult;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Formatter;

/// Optional storage type hint for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Text,
    Number,
    Integer,
    Boolean,
    Date,
    Datetime,
    Object,
    Array,
    /// Any hint this crate does not interpret.
    #[serde(other)]
    Other,
}

/// One persisted field of an entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Attribute {
    /// Logical field name. Filled from the owning map key.
    #[serde(skip)]
    pub name: String,
    /// Column name. Falls back to `name` when unset.
    pub field: Option<String>,
    /// Primary-key component.
    pub key: bool,
    #[serde(rename = "type")]
    pub kind: Option<AttributeType>,
    /// Substituted on insert when the entity value is absent or null.
    pub default: Option<Value>,
    /// Storage literal for `true`.
    #[serde(rename = "true", deserialize_with = "scalar_text")]
    pub true_value: Option<String>,
    /// Storage literal for `false`.
    #[serde(rename = "false", deserialize_with = "scalar_text")]
    pub false_value: Option<String>,
    /// Optimistic-concurrency counter.
    pub version: bool,
    pub ignored: bool,
    pub noinsert: bool,
    pub noupdate: bool,
}

impl Attribute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the attribute as a primary-key component.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Sets the column name when it differs from the logical name.
    pub fn column(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn kind(mut self, kind: AttributeType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Encodes booleans with the given storage literals.
    pub fn sentinels(mut self, truthy: impl Into<String>, falsy: impl Into<String>) -> Self {
        self.true_value = Some(truthy.into());
        self.false_value = Some(falsy.into());
        self
    }

    pub fn version(mut self) -> Self {
        self.version = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn noinsert(mut self) -> Self {
        self.noinsert = true;
        self
    }

    pub fn noupdate(mut self) -> Self {
        self.noupdate = true;
        self
    }

    /// Column name used in generated SQL.
    pub fn column_name(&self) -> &str {
        self.field.as_deref().unwrap_or(self.name.as_str())
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == Some(AttributeType::Boolean)
    }
}

/// Ordered mapping from logical field name to attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `attr` under `name`, replacing any previous entry with that name.
    pub fn with(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.insert(name, attr);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, mut attr: Attribute) {
        attr.name = name.into();
        match self.entries.iter_mut().find(|e| e.name == attr.name) {
            Some(existing) => *existing = attr,
            None => self.entries.push(attr),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries.iter().find(|attr| attr.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of field name to attribute")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut attrs = Attributes::new();
                while let Some((name, attr)) = access.next_entry::<String, Attribute>()? {
                    attrs.insert(name, attr);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

/// Named schema, one per entity type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Model {
    /// Table identifier.
    pub name: String,
    pub attributes: Attributes,
}

impl Model {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Parses a model definition such as
    /// `{"name": "users", "attributes": {"id": {"key": true}}}`.
    pub fn from_json(text: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// Sentinels show up as `"Y"` as often as `1` in model files.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}
