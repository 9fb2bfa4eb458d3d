//! Typed per-table writers.
//!
//! # Responsibility
//! - Serialize caller types into entities and persist them through the save
//!   builder.
//! - Apply an optional `to_db` hook before building statements.
//!
//! # Invariants
//! - Metadata is resolved once, when the writer is constructed.
//! - The version field defaults to the schema's own version attribute.

use crate::build::{ParamFormatter, SaveBuilder, Statement};
use crate::config::SqlConfig;
use crate::db::{exec_statement, run_batch, Backend, BatchMode, SqlError, SqlResult};
use crate::model::attribute::Model;
use crate::model::metadata::{resolve, ResolvedMetadata, SchemaError, SchemaResult};
use crate::model::Entity;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

type ToDb = Box<dyn Fn(Entity) -> Entity + Send + Sync>;

struct WriterCore {
    table: String,
    meta: ResolvedMetadata,
    version: Option<String>,
    formatter: Option<ParamFormatter>,
    to_db: Option<ToDb>,
}

impl WriterCore {
    fn new(model: &Model) -> SchemaResult<Self> {
        Ok(Self {
            table: model.name.clone(),
            meta: resolve(&model.attributes)?,
            version: None,
            formatter: None,
            to_db: None,
        })
    }

    fn set_version(&mut self, name: &str) -> SchemaResult<()> {
        if self.meta.attribute(name).is_none() {
            return Err(SchemaError::UnknownVersionField(name.to_string()));
        }
        self.version = Some(name.to_string());
        Ok(())
    }

    fn builder<B: Backend>(&self, backend: &B) -> SqlResult<SaveBuilder<'_>> {
        let config = SqlConfig {
            dialect: backend.dialect(),
            ..SqlConfig::default()
        };
        let mut builder = SaveBuilder::with_config(&self.table, &self.meta, config);
        if let Some(version) = &self.version {
            builder = builder.version_field(version)?;
        }
        if let Some(formatter) = self.formatter {
            builder = builder.formatter(formatter);
        }
        Ok(builder)
    }

    fn to_entity<T: Serialize>(&self, value: &T) -> SqlResult<Entity> {
        let entity = match serde_json::to_value(value) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(SqlError::InvalidData(format!(
                    "entity for `{}` must serialize to an object, got `{other}`",
                    self.table
                )))
            }
            Err(err) => return Err(SqlError::InvalidData(err.to_string())),
        };
        Ok(match &self.to_db {
            Some(to_db) => to_db(entity),
            None => entity,
        })
    }
}

macro_rules! writer_options {
    () => {
        /// Uses `name` as the optimistic-concurrency counter.
        ///
        /// # Errors
        /// - `UnknownVersionField` when `name` is not a schema attribute.
        pub fn with_version_field(mut self, name: &str) -> SchemaResult<Self> {
            self.core.set_version(name)?;
            Ok(self)
        }

        /// Transforms each serialized entity before statements are built.
        pub fn with_to_db(
            mut self,
            to_db: impl Fn(Entity) -> Entity + Send + Sync + 'static,
        ) -> Self {
            self.core.to_db = Some(Box::new(to_db));
            self
        }

        pub fn with_formatter(mut self, formatter: ParamFormatter) -> Self {
            self.core.formatter = Some(formatter);
            self
        }

        pub fn table(&self) -> &str {
            &self.core.table
        }

        pub fn metadata(&self) -> &ResolvedMetadata {
            &self.core.meta
        }
    };
}

/// Saves one value of `T` per call.
pub struct EntityWriter<T> {
    core: WriterCore,
    _entity: PhantomData<fn(&T)>,
}

impl<T: Serialize> EntityWriter<T> {
    pub fn new(model: &Model) -> SchemaResult<Self> {
        Ok(Self {
            core: WriterCore::new(model)?,
            _entity: PhantomData,
        })
    }

    writer_options!();

    /// Upserts `value`; returns affected rows (`0` when there is nothing to
    /// write).
    pub fn write<B: Backend>(&self, backend: &mut B, value: &T) -> SqlResult<usize> {
        let entity = self.core.to_entity(value)?;
        match self.core.builder(backend)?.build_to_save(&entity) {
            Some(statement) => exec_statement(backend, &statement),
            None => Ok(0),
        }
    }
}

/// Saves a slice of `T` as one all-or-nothing batch.
pub struct BatchWriter<T> {
    core: WriterCore,
    _entity: PhantomData<fn(&T)>,
}

impl<T: Serialize> BatchWriter<T> {
    pub fn new(model: &Model) -> SchemaResult<Self> {
        Ok(Self {
            core: WriterCore::new(model)?,
            _entity: PhantomData,
        })
    }

    writer_options!();

    pub fn write<B: Backend>(&self, backend: &mut B, values: &[T]) -> SqlResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let entities = values
            .iter()
            .map(|value| self.core.to_entity(value))
            .collect::<SqlResult<Vec<_>>>()?;
        let statements: Vec<Statement> = self
            .core
            .builder(backend)?
            .build_to_save_batch(&entities)
            .into_iter()
            .flatten()
            .collect();
        run_batch(backend, &statements, BatchMode::All)
    }
}
