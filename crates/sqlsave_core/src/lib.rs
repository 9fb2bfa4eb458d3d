//! Metadata-driven persistence over relational backends.
//! Builds conditional upsert statements from attribute schemas, executes them
//! under transactional batch policies, and maps result rows back to entities.

pub mod build;
pub mod config;
pub mod db;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod service;

pub use build::{SaveBuilder, Statement};
pub use config::{Dialect, SqlConfig};
pub use db::{
    open_db, open_db_in_memory, Backend, BatchMode, DbError, SqlError, SqlResult, SqliteBackend,
};
pub use logging::{init_logging, logging_status, LogLevel};
pub use mapper::{handle_result, map_row, map_rows};
pub use model::attribute::{Attribute, AttributeType, Attributes, Model};
pub use model::metadata::{resolve, BooleanField, ColumnMap, ResolvedMetadata, SchemaError};
pub use model::{Entity, Row};
pub use service::manager::SqlManager;
pub use service::writer::{BatchWriter, EntityWriter};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
