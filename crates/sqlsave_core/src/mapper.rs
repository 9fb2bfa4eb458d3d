//! Result-row post-processing.
//!
//! # Responsibility
//! - Rename raw backend columns to logical field names.
//! - Coerce storage-encoded booleans back to JSON booleans.
//!
//! # Invariants
//! - Renaming runs before boolean coercion.
//! - Native booleans and nulls are never rewritten.
//! - Unmapped columns pass through unchanged.

use crate::model::metadata::{BooleanField, ColumnMap};
use crate::model::Row;
use serde_json::Value;
use std::borrow::Cow;

const DEFAULT_TRUE_LITERALS: &[&str] = &["1", "T", "Y", "ON"];

/// Maps every row; see [`map_row`].
pub fn map_rows(
    rows: Vec<Row>,
    column_map: Option<&ColumnMap>,
    booleans: &[BooleanField],
) -> Vec<Row> {
    if column_map.map_or(true, |map| map.is_empty()) && booleans.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|row| map_row(row, column_map, booleans))
        .collect()
}

/// Maps only the first row; `None` for an empty result.
pub fn handle_result(
    rows: Vec<Row>,
    column_map: Option<&ColumnMap>,
    booleans: &[BooleanField],
) -> Option<Row> {
    rows.into_iter()
        .next()
        .map(|row| map_row(row, column_map, booleans))
}

/// Renames columns through `column_map`, then coerces `booleans`.
///
/// Column lookup tries the raw name first and then its lower-cased form, since
/// drivers often report upper-cased column names. A boolean field matches a
/// row key exactly, or case-insensitively when no exact key exists.
pub fn map_row(row: Row, column_map: Option<&ColumnMap>, booleans: &[BooleanField]) -> Row {
    let mut row = match column_map {
        Some(map) if !map.is_empty() => rename_columns(row, map),
        _ => row,
    };
    for field in booleans {
        coerce_boolean(&mut row, field);
    }
    row
}

fn rename_columns(row: Row, map: &ColumnMap) -> Row {
    row.into_iter()
        .map(|(column, value)| {
            let mapped = map
                .get(&column)
                .or_else(|| map.get(&column.to_lowercase()))
                .cloned();
            (mapped.unwrap_or(column), value)
        })
        .collect()
}

fn coerce_boolean(row: &mut Row, field: &BooleanField) {
    let key = if row.contains_key(&field.name) {
        field.name.clone()
    } else {
        match row.keys().find(|key| key.eq_ignore_ascii_case(&field.name)) {
            Some(key) => key.clone(),
            None => return,
        }
    };

    if let Some(value) = row.get_mut(&key) {
        if matches!(value, Value::Bool(_) | Value::Null) {
            return;
        }
        *value = Value::Bool(is_truthy(value, field.true_value.as_deref()));
    }
}

fn is_truthy(value: &Value, true_value: Option<&str>) -> bool {
    let Some(text) = scalar_text(value) else {
        return false;
    };
    match true_value {
        Some(expected) => text == expected,
        None => DEFAULT_TRUE_LITERALS.contains(&&*text),
    }
}

fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{handle_result, map_row, map_rows};
    use crate::model::metadata::{BooleanField, ColumnMap};
    use crate::model::Row;
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    fn user_map() -> ColumnMap {
        let mut map = ColumnMap::new();
        map.insert("userid".to_string(), "userId".to_string());
        map
    }

    #[test]
    fn upper_case_row_is_renamed_and_coerced() {
        let mapped = map_row(
            row(json!({"USERID": 5, "ACTIVE": "Y"})),
            Some(&user_map()),
            &[BooleanField::new("active")],
        );
        assert_eq!(mapped, row(json!({"userId": 5, "ACTIVE": true})));
    }

    #[test]
    fn unlisted_columns_pass_through() {
        let mapped = map_row(
            row(json!({"userid": 1, "email": "a@b"})),
            Some(&user_map()),
            &[],
        );
        assert_eq!(mapped, row(json!({"userId": 1, "email": "a@b"})));
    }

    #[test]
    fn default_truthy_set_is_case_sensitive() {
        let field = [BooleanField::new("flag")];
        for (raw, expected) in [
            (json!("1"), true),
            (json!(1), true),
            (json!("T"), true),
            (json!("ON"), true),
            (json!("on"), false),
            (json!("y"), false),
            (json!("0"), false),
            (json!(0), false),
        ] {
            let mapped = map_row(row(json!({ "flag": raw.clone() })), None, &field);
            assert_eq!(mapped["flag"], json!(expected), "raw value {raw}");
        }
    }

    #[test]
    fn explicit_sentinel_replaces_default_set() {
        let field = [BooleanField::new("enabled").with_true_value("yes")];
        let mapped = map_rows(
            vec![
                row(json!({"enabled": "yes"})),
                row(json!({"enabled": "Y"})),
            ],
            None,
            &field,
        );
        assert_eq!(mapped[0]["enabled"], json!(true));
        assert_eq!(mapped[1]["enabled"], json!(false));
    }

    #[test]
    fn native_booleans_nulls_and_missing_fields_are_untouched() {
        let field = [BooleanField::new("a"), BooleanField::new("b"), BooleanField::new("c")];
        let mapped = map_row(row(json!({"a": false, "b": null})), None, &field);
        assert_eq!(mapped, row(json!({"a": false, "b": null})));
    }

    #[test]
    fn handle_result_maps_first_row_only() {
        let rows = vec![row(json!({"USERID": 1})), row(json!({"USERID": 2}))];
        let first = handle_result(rows, Some(&user_map()), &[]).unwrap();
        assert_eq!(first, row(json!({"userId": 1})));
        assert!(handle_result(Vec::new(), None, &[]).is_none());
    }

    #[test]
    fn no_map_and_no_booleans_returns_rows_as_is() {
        let rows = vec![row(json!({"X": 1}))];
        assert_eq!(map_rows(rows.clone(), None, &[]), rows);
    }
}
