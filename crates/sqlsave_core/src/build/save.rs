//! Conditional upsert ("save") statement builder.
//!
//! # Responsibility
//! - Turn one entity (or a batch) plus resolved metadata into a single
//!   update-if-exists-else-insert statement.
//! - Apply optimistic versioning through the schema's version attribute.
//!
//! # Invariants
//! - An entity missing any primary-key value (absent or null) yields no
//!   statement. Present falsy keys such as `0` or `""` are valid keys.
//! - The emitted branch is chosen before any placeholder is allocated, so
//!   params always match the placeholders in the query text.
//! - The version column is always inserted as `1`; updates compare the prior
//!   value and write `prior + 1`.

use super::value::{finite_number, increment_literal, numeric_literal, Placeholders, ValueKind};
use super::{ParamFormatter, Statement};
use crate::config::{Dialect, SqlConfig};
use crate::model::metadata::{ResolvedAttribute, ResolvedMetadata, SchemaError, SchemaResult};
use crate::model::Entity;
use log::debug;
use serde_json::{Number, Value};

static NULL: Value = Value::Null;

/// One insert column: the entity/default value, or `None` for the version
/// counter's fixed initial value.
type InsertValue<'a> = (&'a ResolvedAttribute, Option<&'a Value>);

/// Builds save statements for one table.
#[derive(Debug, Clone)]
pub struct SaveBuilder<'a> {
    table: &'a str,
    meta: &'a ResolvedMetadata,
    keys: Vec<&'a ResolvedAttribute>,
    version: Option<&'a ResolvedAttribute>,
    dialect: Dialect,
    formatter: ParamFormatter,
}

impl<'a> SaveBuilder<'a> {
    /// Builder with the default (conditional) dialect.
    pub fn new(table: &'a str, meta: &'a ResolvedMetadata) -> Self {
        Self::with_config(table, meta, SqlConfig::default())
    }

    pub fn with_config(table: &'a str, meta: &'a ResolvedMetadata, config: SqlConfig) -> Self {
        Self {
            table,
            meta,
            keys: meta.primary_keys().collect(),
            version: meta.version_field(),
            dialect: config.dialect,
            formatter: config.dialect.default_formatter(),
        }
    }

    /// Uses `name` as the version counter instead of the schema's own.
    ///
    /// # Errors
    /// - `UnknownVersionField` when `name` is not a schema attribute.
    pub fn version_field(mut self, name: &str) -> SchemaResult<Self> {
        let attr = self
            .meta
            .attribute(name)
            .ok_or_else(|| SchemaError::UnknownVersionField(name.to_string()))?;
        self.version = Some(attr);
        Ok(self)
    }

    /// Identifies rows by `names` instead of the schema's key attributes.
    ///
    /// # Errors
    /// - `UnknownKeyField` when a name is not a schema attribute.
    pub fn primary_keys(mut self, names: &[&str]) -> SchemaResult<Self> {
        let meta = self.meta;
        self.keys = names
            .iter()
            .map(|name| {
                meta.attribute(name)
                    .ok_or_else(|| SchemaError::UnknownKeyField((*name).to_string()))
            })
            .collect::<SchemaResult<Vec<_>>>()?;
        Ok(self)
    }

    pub fn formatter(mut self, formatter: ParamFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Builds the save statement for `entity` with placeholders numbered from 1.
    ///
    /// Returns `None` when there is nothing to write.
    pub fn build_to_save(&self, entity: &Entity) -> Option<Statement> {
        self.build_to_save_from(entity, 1)
    }

    /// Same as [`Self::build_to_save`] with placeholders numbered from `start`.
    pub fn build_to_save_from(&self, entity: &Entity, start: usize) -> Option<Statement> {
        if let Some(missing) = self
            .keys
            .iter()
            .find(|pk| is_missing(entity.get(&pk.name)))
        {
            debug!(
                "event=save_build module=build status=skipped reason=missing_key dialect={} table={} field={}",
                self.dialect.as_str(),
                self.table,
                missing.name
            );
            return None;
        }

        let has_key = !self.keys.is_empty();
        let inserts = self.insert_values(entity);
        if !has_key && inserts.is_empty() {
            debug!(
                "event=save_build module=build status=skipped reason=no_columns dialect={} table={}",
                self.dialect.as_str(),
                self.table
            );
            return None;
        }

        let updates = self.update_values(entity);
        let mut sink = Placeholders::new(self.formatter, start);
        let query = if !has_key || updates.is_empty() {
            self.render_insert(&inserts, &mut sink)
        } else {
            match self.dialect {
                Dialect::Conditional => {
                    self.render_conditional(entity, &updates, &inserts, &mut sink)
                }
                Dialect::Sqlite => self.render_on_conflict(entity, &updates, &inserts, &mut sink),
            }
        };

        Some(Statement::new(query, sink.into_params()))
    }

    /// Builds one statement per entity, keeping `None` at the index of every
    /// entity that produced nothing.
    pub fn build_to_save_batch(&self, entities: &[Entity]) -> Vec<Option<Statement>> {
        entities
            .iter()
            .map(|entity| self.build_to_save(entity))
            .collect()
    }

    fn is_key(&self, attr: &ResolvedAttribute) -> bool {
        self.keys.iter().any(|key| key.name == attr.name)
    }

    fn is_version(&self, attr: &ResolvedAttribute) -> bool {
        self.version.is_some_and(|version| version.name == attr.name)
    }

    fn update_values<'e>(
        &'e self,
        entity: &'e Entity,
    ) -> Vec<(&'e ResolvedAttribute, &'e Value)> {
        self.meta
            .attributes()
            .iter()
            .filter(|attr| {
                attr.persisted && !self.is_key(attr) && !attr.noupdate && !self.is_version(attr)
            })
            .filter_map(|attr| entity.get(&attr.name).map(|value| (attr, value)))
            .collect()
    }

    fn insert_values<'e>(&'e self, entity: &'e Entity) -> Vec<InsertValue<'e>> {
        self.meta
            .attributes()
            .iter()
            .filter(|attr| attr.persisted && !attr.noinsert)
            .filter_map(|attr| {
                let value = entity
                    .get(&attr.name)
                    .filter(|value| !value.is_null())
                    .or_else(|| attr.default.as_ref().filter(|value| !value.is_null()))?;
                if self.is_version(attr) {
                    Some((attr, None))
                } else {
                    Some((attr, Some(value)))
                }
            })
            .collect()
    }

    /// Prior version value pinned by the update branch, if the entity has one.
    fn pinned_version<'e>(
        &'e self,
        entity: &'e Entity,
    ) -> Option<(&'e ResolvedAttribute, &'e Number)> {
        let attr = self.version?;
        let prior = entity.get(&attr.name).and_then(finite_number)?;
        Some((attr, prior))
    }

    fn key_clauses(&self, entity: &Entity, sink: &mut Placeholders) -> Vec<String> {
        self.keys
            .iter()
            .map(|pk| {
                let value = entity.get(&pk.name).unwrap_or(&NULL);
                format!(
                    "{}={}",
                    pk.column,
                    sink.render(ValueKind::classify(value, &pk.encoding))
                )
            })
            .collect()
    }

    fn set_clauses(
        &self,
        updates: &[(&ResolvedAttribute, &Value)],
        sink: &mut Placeholders,
    ) -> Vec<String> {
        updates
            .iter()
            .map(|(attr, value)| {
                format!(
                    "{}={}",
                    attr.column,
                    sink.render(ValueKind::classify(value, &attr.encoding))
                )
            })
            .collect()
    }

    fn insert_lists(
        &self,
        inserts: &[InsertValue<'_>],
        sink: &mut Placeholders,
    ) -> (Vec<String>, Vec<String>) {
        let mut columns = Vec::with_capacity(inserts.len() + 1);
        let mut values = Vec::with_capacity(inserts.len() + 1);
        for (attr, value) in inserts {
            columns.push(attr.column.clone());
            values.push(match value {
                Some(value) => sink.render(ValueKind::classify(value, &attr.encoding)),
                None => "1".to_string(),
            });
        }

        if let Some(version) = self.version {
            if !inserts.iter().any(|(attr, _)| attr.name == version.name) {
                columns.push(version.column.clone());
                values.push("1".to_string());
            }
        }

        (columns, values)
    }

    fn render_insert(&self, inserts: &[InsertValue<'_>], sink: &mut Placeholders) -> String {
        let (columns, values) = self.insert_lists(inserts, sink);
        insert_sql(self.table, &columns, &values)
    }

    fn render_conditional(
        &self,
        entity: &Entity,
        updates: &[(&ResolvedAttribute, &Value)],
        inserts: &[InsertValue<'_>],
        sink: &mut Placeholders,
    ) -> String {
        let exists = self.key_clauses(entity, sink);
        let mut set = self.set_clauses(updates, sink);
        let mut filter = self.key_clauses(entity, sink);
        if let Some((attr, prior)) = self.pinned_version(entity) {
            set.push(format!("{}={}", attr.column, increment_literal(prior)));
            filter.push(format!("{}={}", attr.column, numeric_literal(prior)));
        }
        let (columns, values) = self.insert_lists(inserts, sink);
        let first_key = self
            .keys
            .first()
            .map_or("*", |pk| pk.column.as_str());

        format!(
            "if exists (select {first_key} from {table} where {exists})\n update {table} set {set} where {filter}\nelse\n {insert}",
            table = self.table,
            exists = exists.join(" and "),
            set = set.join(","),
            filter = filter.join(" and "),
            insert = insert_sql(self.table, &columns, &values),
        )
    }

    /// Insert list that carries every key column, `noinsert` keys included,
    /// so the conflict target can match an existing row.
    fn with_key_columns<'e>(
        &'e self,
        entity: &'e Entity,
        inserts: &[InsertValue<'e>],
    ) -> Vec<InsertValue<'e>> {
        let mut merged = Vec::with_capacity(inserts.len() + self.keys.len());
        for attr in self.meta.attributes() {
            if let Some(found) = inserts.iter().find(|(insert, _)| insert.name == attr.name) {
                merged.push(*found);
            } else if self.is_key(attr) {
                merged.push((attr, Some(entity.get(&attr.name).unwrap_or(&NULL))));
            }
        }
        merged
    }

    fn render_on_conflict(
        &self,
        entity: &Entity,
        updates: &[(&ResolvedAttribute, &Value)],
        inserts: &[InsertValue<'_>],
        sink: &mut Placeholders,
    ) -> String {
        let inserts = self.with_key_columns(entity, inserts);
        let (columns, values) = self.insert_lists(&inserts, sink);
        let mut set = self.set_clauses(updates, sink);
        let keys: Vec<&str> = self.keys.iter().map(|pk| pk.column.as_str()).collect();

        let mut query = format!(
            "{} on conflict({}) do update set ",
            insert_sql(self.table, &columns, &values),
            keys.join(",")
        );
        match self.pinned_version(entity) {
            Some((attr, prior)) => {
                set.push(format!("{}={}", attr.column, increment_literal(prior)));
                query.push_str(&set.join(","));
                query.push_str(&format!(" where {}={}", attr.column, numeric_literal(prior)));
            }
            None => query.push_str(&set.join(",")),
        }
        query
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn insert_sql(table: &str, columns: &[String], values: &[String]) -> String {
    if columns.is_empty() {
        format!("insert into {table} default values")
    } else {
        format!(
            "insert into {table}({}) values ({})",
            columns.join(","),
            values.join(",")
        )
    }
}
