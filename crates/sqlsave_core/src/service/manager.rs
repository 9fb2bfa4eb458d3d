//! Manager facade over a `Backend`.
//!
//! # Responsibility
//! - Expose exec/batch/query/scalar primitives as the single seam used by
//!   application services.
//! - Build-and-execute helpers for saving entities.
//!
//! # Invariants
//! - Every backend failure is classified (duplicate vs. generic) before it
//!   reaches the caller.
//! - An empty result set is `None`, never an error.

use crate::build::{SaveBuilder, Statement};
use crate::config::SqlConfig;
use crate::db::{exec_statement, run_batch, Backend, BatchMode, SqlError, SqlResult};
use crate::mapper::{handle_result, map_rows};
use crate::model::metadata::{BooleanField, ColumnMap, ResolvedMetadata};
use crate::model::{Entity, Row};
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;

/// Query/exec facade that owns (or borrows, via `&mut B`) a backend.
pub struct SqlManager<B: Backend> {
    backend: B,
}

impl<B: Backend> SqlManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executes one statement with positional params; returns affected rows.
    pub fn exec(&mut self, query: &str, params: &[Value]) -> SqlResult<usize> {
        exec_statement(&mut self.backend, &Statement::new(query, params.to_vec()))
    }

    /// Executes `statements` under `mode`; see [`run_batch`].
    pub fn exec_batch(&mut self, statements: &[Statement], mode: BatchMode) -> SqlResult<usize> {
        run_batch(&mut self.backend, statements, mode)
    }

    /// Runs a read query and post-processes rows through the result mapper.
    pub fn query(
        &mut self,
        query: &str,
        params: &[Value],
        column_map: Option<&ColumnMap>,
        booleans: &[BooleanField],
    ) -> SqlResult<Vec<Row>> {
        let rows = self.fetch(query, params)?;
        Ok(map_rows(rows, column_map, booleans))
    }

    /// First mapped row, or `None` when the query returned nothing.
    pub fn query_one(
        &mut self,
        query: &str,
        params: &[Value],
        column_map: Option<&ColumnMap>,
        booleans: &[BooleanField],
    ) -> SqlResult<Option<Row>> {
        let rows = self.fetch(query, params)?;
        Ok(handle_result(rows, column_map, booleans))
    }

    /// Mapped rows deserialized into `T`.
    pub fn query_as<T: DeserializeOwned>(
        &mut self,
        query: &str,
        params: &[Value],
        column_map: Option<&ColumnMap>,
        booleans: &[BooleanField],
    ) -> SqlResult<Vec<T>> {
        self.query(query, params, column_map, booleans)?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    pub fn query_one_as<T: DeserializeOwned>(
        &mut self,
        query: &str,
        params: &[Value],
        column_map: Option<&ColumnMap>,
        booleans: &[BooleanField],
    ) -> SqlResult<Option<T>> {
        self.query_one(query, params, column_map, booleans)?
            .map(decode_row)
            .transpose()
    }

    /// Value of the first column of the first row, or `None` without a row.
    pub fn exec_scalar(&mut self, query: &str, params: &[Value]) -> SqlResult<Option<Value>> {
        let row = self.query_one(query, params, None, &[])?;
        Ok(row.and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    /// Numeric scalar; no row or a null value counts as `0`.
    pub fn count(&mut self, query: &str, params: &[Value]) -> SqlResult<i64> {
        match self.exec_scalar(query, params)? {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|float| float as i64))
                .ok_or_else(|| SqlError::InvalidData(format!("count `{number}` is out of range"))),
            Some(other) => Err(SqlError::InvalidData(format!(
                "count query returned non-numeric value `{other}`"
            ))),
        }
    }

    /// Builds and executes the save statement for one entity in this
    /// backend's dialect. Nothing to write counts as `0` rows.
    pub fn save(
        &mut self,
        table: &str,
        meta: &ResolvedMetadata,
        entity: &Entity,
    ) -> SqlResult<usize> {
        let builder = SaveBuilder::with_config(table, meta, self.build_config());
        match builder.build_to_save(entity) {
            Some(statement) => exec_statement(&mut self.backend, &statement),
            None => Ok(0),
        }
    }

    /// Saves `entities` in one all-or-nothing batch, skipping entities that
    /// produce no statement.
    pub fn save_batch(
        &mut self,
        table: &str,
        meta: &ResolvedMetadata,
        entities: &[Entity],
    ) -> SqlResult<usize> {
        let builder = SaveBuilder::with_config(table, meta, self.build_config());
        let statements: Vec<Statement> = builder
            .build_to_save_batch(entities)
            .into_iter()
            .flatten()
            .collect();
        run_batch(&mut self.backend, &statements, BatchMode::All)
    }

    fn fetch(&mut self, query: &str, params: &[Value]) -> SqlResult<Vec<Row>> {
        let started_at = Instant::now();
        match self.backend.fetch(query, params) {
            Ok(rows) => {
                debug!(
                    "event=sql_query module=service status=ok rows={} duration_ms={}",
                    rows.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(rows)
            }
            Err(err) => {
                error!(
                    "event=sql_query module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn build_config(&self) -> SqlConfig {
        SqlConfig {
            dialect: self.backend.dialect(),
            ..SqlConfig::default()
        }
    }
}

fn decode_row<T: DeserializeOwned>(row: Row) -> SqlResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(|err| SqlError::InvalidData(err.to_string()))
}
