//! Construction-time configuration for builders and backends.
//!
//! # Invariants
//! - A `SqlConfig` is fixed when a builder or backend is constructed and is
//!   never mutated while statements are built or executed.

use crate::build::ParamFormatter;

/// SQL rendering of the conditional upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `IF EXISTS (...) UPDATE ... ELSE INSERT ...` with `@N` placeholders.
    #[default]
    Conditional,
    /// `INSERT ... ON CONFLICT(<keys>) DO UPDATE SET ... WHERE ...` with `?N`
    /// placeholders.
    Sqlite,
}

impl Dialect {
    /// Placeholder formatter used when the caller does not supply one.
    pub fn default_formatter(self) -> ParamFormatter {
        match self {
            Self::Conditional => crate::build::param,
            Self::Sqlite => crate::build::numbered_param,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conditional => "conditional",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Settings shared by statement building and parameter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlConfig {
    pub dialect: Dialect,
    /// Bind object/array parameters as JSON text instead of rejecting them.
    pub json_objects: bool,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Conditional,
            json_objects: true,
        }
    }
}

impl SqlConfig {
    /// Configuration for statements executed by the SQLite backend.
    pub fn sqlite() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            ..Self::default()
        }
    }

    pub fn with_json_objects(mut self, enabled: bool) -> Self {
        self.json_objects = enabled;
        self
    }
}
