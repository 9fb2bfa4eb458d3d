//! Schema resolution into immutable working metadata.
//!
//! # Responsibility
//! - Derive primary keys, boolean fields, column map, version field and
//!   persisted fields from an `Attributes` map in one pass.
//! - Precompute per-attribute column names and boolean encodings so the
//!   statement builder never re-inspects the raw schema.
//!
//! # Invariants
//! - `ResolvedMetadata` is never mutated after `resolve` returns.
//! - `column_map` only holds entries whose lower-cased column differs from the
//!   logical field name.
//! - At most one version attribute; a second one is a schema error.

use crate::model::attribute::{Attribute, Attributes};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema definition problems detected at resolution time.
#[derive(Debug)]
pub enum SchemaError {
    DuplicateVersionField { first: String, second: String },
    UnknownVersionField(String),
    UnknownKeyField(String),
    Json(serde_json::Error),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateVersionField { first, second } => write!(
                f,
                "schema declares more than one version field: `{first}` and `{second}`"
            ),
            Self::UnknownVersionField(name) => {
                write!(f, "version field `{name}` is not a schema attribute")
            }
            Self::UnknownKeyField(name) => {
                write!(f, "key field `{name}` is not a schema attribute")
            }
            Self::Json(err) => write!(f, "invalid model definition: {err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::DuplicateVersionField { .. }
            | Self::UnknownVersionField(_)
            | Self::UnknownKeyField(_) => None,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Lower-cased column name -> logical field name.
pub type ColumnMap = BTreeMap<String, String>;

/// How a boolean entity value reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolEncoding {
    /// Inlined as `true` / `false`.
    Native,
    /// Bound as one of two storage literals.
    Sentinel { truthy: String, falsy: String },
}

/// Boolean field descriptor consumed by the result mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanField {
    pub name: String,
    /// Explicit `true` literal, if the schema defines one.
    pub true_value: Option<String>,
}

impl BooleanField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            true_value: None,
        }
    }

    pub fn with_true_value(mut self, value: impl Into<String>) -> Self {
        self.true_value = Some(value.into());
        self
    }
}

/// One attribute with its column and encoding resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribute {
    pub name: String,
    pub column: String,
    pub key: bool,
    pub version: bool,
    pub persisted: bool,
    pub noinsert: bool,
    pub noupdate: bool,
    pub default: Option<Value>,
    pub encoding: BoolEncoding,
}

impl ResolvedAttribute {
    fn from_attribute(attr: &Attribute) -> Self {
        let encoding = if attr.true_value.is_some() || attr.false_value.is_some() {
            BoolEncoding::Sentinel {
                truthy: attr.true_value.clone().unwrap_or_else(|| "1".to_string()),
                falsy: attr.false_value.clone().unwrap_or_else(|| "0".to_string()),
            }
        } else {
            BoolEncoding::Native
        };

        Self {
            name: attr.name.clone(),
            column: attr.column_name().to_string(),
            key: attr.key,
            version: attr.version,
            persisted: !attr.ignored,
            noinsert: attr.noinsert,
            noupdate: attr.noupdate,
            default: attr.default.clone(),
            encoding,
        }
    }
}

/// Working metadata derived from one attribute schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    attributes: Vec<ResolvedAttribute>,
    primary_keys: Vec<usize>,
    version_field: Option<usize>,
    boolean_fields: Vec<BooleanField>,
    column_map: ColumnMap,
    persisted_fields: Vec<String>,
}

impl ResolvedMetadata {
    /// All attributes in schema order.
    pub fn attributes(&self) -> &[ResolvedAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ResolvedAttribute> + '_ {
        self.primary_keys.iter().map(|&i| &self.attributes[i])
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn version_field(&self) -> Option<&ResolvedAttribute> {
        self.version_field.map(|i| &self.attributes[i])
    }

    pub fn boolean_fields(&self) -> &[BooleanField] {
        &self.boolean_fields
    }

    /// Column map for row post-processing; `None` when every column already
    /// matches its logical name.
    pub fn column_map(&self) -> Option<&ColumnMap> {
        if self.column_map.is_empty() {
            None
        } else {
            Some(&self.column_map)
        }
    }

    /// Logical names of every non-ignored attribute, in schema order.
    ///
    /// The save builder walks `attributes()` directly; this list is for
    /// callers that filter requested fields (`build::get_fields`) or shape a
    /// select list (`build::build_fields`) against the schema.
    pub fn persisted_fields(&self) -> &[String] {
        &self.persisted_fields
    }
}

/// Resolves an attribute schema into working metadata.
///
/// # Errors
/// - `DuplicateVersionField` when more than one attribute sets `version`.
pub fn resolve(attrs: &Attributes) -> SchemaResult<ResolvedMetadata> {
    let mut attributes = Vec::with_capacity(attrs.len());
    let mut primary_keys = Vec::new();
    let mut version_field: Option<usize> = None;
    let mut boolean_fields = Vec::new();
    let mut column_map = ColumnMap::new();
    let mut persisted_fields = Vec::new();

    for (index, attr) in attrs.iter().enumerate() {
        if attr.key {
            primary_keys.push(index);
        }
        if !attr.ignored {
            persisted_fields.push(attr.name.clone());
        }
        if attr.is_boolean() {
            boolean_fields.push(BooleanField {
                name: attr.name.clone(),
                true_value: attr.true_value.clone(),
            });
        }
        if attr.version {
            if let Some(first) = version_field {
                let first: &ResolvedAttribute = &attributes[first];
                return Err(SchemaError::DuplicateVersionField {
                    first: first.name.clone(),
                    second: attr.name.clone(),
                });
            }
            version_field = Some(index);
        }

        let lowered = attr.column_name().to_lowercase();
        if lowered != attr.name {
            column_map.insert(lowered, attr.name.clone());
        }

        attributes.push(ResolvedAttribute::from_attribute(attr));
    }

    Ok(ResolvedMetadata {
        attributes,
        primary_keys,
        version_field,
        boolean_fields,
        column_map,
        persisted_fields,
    })
}
