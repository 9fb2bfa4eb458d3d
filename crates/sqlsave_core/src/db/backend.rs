//! Execution capability and its SQLite implementation.
//!
//! # Responsibility
//! - Define `Backend`: execute a statement, fetch rows, control transactions.
//! - Bind JSON parameter values positionally and decode rows into JSON maps.
//!
//! # Invariants
//! - Parameter `i` binds to placeholder `i` (1-based); every statement binds
//!   its own parameter list from scratch.
//! - Decoded rows keep the backend's column order.

use super::{DbError, DbResult};
use crate::config::{Dialect, SqlConfig};
use crate::model::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

/// Something that can run statements and report affected-row counts.
pub trait Backend {
    /// Executes one statement and returns the affected-row count.
    fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<usize>;
    /// Runs a read query and returns its raw rows.
    fn fetch(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>>;
    fn begin(&mut self) -> DbResult<()>;
    fn commit(&mut self) -> DbResult<()>;
    fn rollback(&mut self) -> DbResult<()>;

    /// SQL dialect statements for this backend should be built in.
    fn dialect(&self) -> Dialect {
        Dialect::Conditional
    }
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<usize> {
        (**self).execute(query, params)
    }

    fn fetch(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        (**self).fetch(query, params)
    }

    fn begin(&mut self) -> DbResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> DbResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> DbResult<()> {
        (**self).rollback()
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }
}

/// SQLite-backed executor over a borrowed connection.
pub struct SqliteBackend<'conn> {
    conn: &'conn Connection,
    config: SqlConfig,
}

impl<'conn> SqliteBackend<'conn> {
    /// Uses [`SqlConfig::sqlite`].
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_config(conn, SqlConfig::sqlite())
    }

    pub fn with_config(conn: &'conn Connection, config: SqlConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> SqlConfig {
        self.config
    }

    fn bind(&self, params: &[Value]) -> DbResult<Vec<SqlValue>> {
        params
            .iter()
            .enumerate()
            .map(|(i, value)| to_sql_value(i + 1, value, self.config.json_objects))
            .collect()
    }
}

impl Backend for SqliteBackend<'_> {
    fn execute(&mut self, query: &str, params: &[Value]) -> DbResult<usize> {
        let values = self.bind(params)?;
        Ok(self.conn.execute(query, params_from_iter(values))?)
    }

    fn fetch(&mut self, query: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let values = self.bind(params)?;
        let mut stmt = self.conn.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query(params_from_iter(values))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), from_sql_value(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn begin(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("BEGIN IMMEDIATE;")?)
    }

    fn commit(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("COMMIT;")?)
    }

    fn rollback(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("ROLLBACK;")?)
    }

    fn dialect(&self) -> Dialect {
        self.config.dialect
    }
}

fn to_sql_value(index: usize, value: &Value, json_objects: bool) -> DbResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => number.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) if json_objects => SqlValue::Text(value.to_string()),
        Value::Array(_) => return Err(DbError::UnsupportedParam { index, kind: "array" }),
        Value::Object(_) => return Err(DbError::UnsupportedParam { index, kind: "object" }),
    })
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::from(int),
        ValueRef::Real(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::{to_sql_value, Backend, SqliteBackend};
    use crate::config::SqlConfig;
    use crate::db::{open_db_in_memory, DbError};
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    #[test]
    fn params_bind_by_type() {
        assert_eq!(to_sql_value(1, &json!(null), true).unwrap(), SqlValue::Null);
        assert_eq!(to_sql_value(1, &json!(true), true).unwrap(), SqlValue::Integer(1));
        assert_eq!(to_sql_value(1, &json!(7), true).unwrap(), SqlValue::Integer(7));
        assert_eq!(to_sql_value(1, &json!(0.5), true).unwrap(), SqlValue::Real(0.5));
        assert_eq!(
            to_sql_value(1, &json!({"a": 1}), true).unwrap(),
            SqlValue::Text(r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn objects_are_rejected_without_json_encoding() {
        match to_sql_value(3, &json!([1, 2]), false) {
            Err(DbError::UnsupportedParam { index, kind }) => {
                assert_eq!(index, 3);
                assert_eq!(kind, "array");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn fetch_decodes_rows_in_column_order() {
        let conn = open_db_in_memory().unwrap();
        let mut backend = SqliteBackend::with_config(&conn, SqlConfig::sqlite());
        let rows = backend
            .fetch(
                "SELECT ?1 AS b, 2 AS a, 1.5 AS c, NULL AS d, x'0102' AS e",
                &[json!("text")],
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c", "d", "e"]);
        assert_eq!(rows[0]["b"], json!("text"));
        assert_eq!(rows[0]["a"], json!(2));
        assert_eq!(rows[0]["c"], json!(1.5));
        assert_eq!(rows[0]["d"], json!(null));
        assert_eq!(rows[0]["e"], json!([1, 2]));
    }
}
