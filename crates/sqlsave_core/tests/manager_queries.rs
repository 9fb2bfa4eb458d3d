use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use sqlsave_core::db::open_db_in_memory;
use sqlsave_core::{Backend, BooleanField, ColumnMap, SqlError, SqlManager, SqliteBackend};

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE accounts (
            ACCOUNT_ID INTEGER PRIMARY KEY,
            OWNER TEXT NOT NULL,
            ENABLED TEXT,
            BALANCE REAL
        );
        INSERT INTO accounts VALUES (1, 'ann', 'Y', 10.5);
        INSERT INTO accounts VALUES (2, 'bob', 'N', NULL);",
    )
    .unwrap();
    conn
}

fn account_map() -> ColumnMap {
    let mut map = ColumnMap::new();
    map.insert("account_id".to_string(), "accountId".to_string());
    map
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Account {
    account_id: i64,
    #[serde(rename = "OWNER")]
    owner: String,
    #[serde(rename = "ENABLED")]
    enabled: bool,
}

#[test]
fn query_renames_and_coerces_rows() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let rows = manager
        .query(
            "SELECT ACCOUNT_ID, OWNER, ENABLED FROM accounts ORDER BY ACCOUNT_ID",
            &[],
            Some(&account_map()),
            &[BooleanField::new("enabled")],
        )
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["accountId"], json!(1));
    assert_eq!(rows[0]["ENABLED"], json!(true));
    assert_eq!(rows[1]["ENABLED"], json!(false));
}

#[test]
fn query_one_returns_none_for_empty_result() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let row = manager
        .query_one("SELECT * FROM accounts WHERE ACCOUNT_ID = ?1", &[json!(99)], None, &[])
        .unwrap();
    assert!(row.is_none());
}

#[test]
fn typed_queries_decode_mapped_rows() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));
    let booleans = [BooleanField::new("ENABLED")];

    let accounts: Vec<Account> = manager
        .query_as(
            "SELECT ACCOUNT_ID, OWNER, ENABLED FROM accounts ORDER BY ACCOUNT_ID",
            &[],
            Some(&account_map()),
            &booleans,
        )
        .unwrap();
    assert_eq!(
        accounts,
        vec![
            Account {
                account_id: 1,
                owner: "ann".to_string(),
                enabled: true,
            },
            Account {
                account_id: 2,
                owner: "bob".to_string(),
                enabled: false,
            },
        ]
    );

    let missing: Option<Account> = manager
        .query_one_as(
            "SELECT ACCOUNT_ID, OWNER, ENABLED FROM accounts WHERE ACCOUNT_ID = 42",
            &[],
            Some(&account_map()),
            &booleans,
        )
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn typed_query_reports_shape_mismatch() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let err = manager
        .query_as::<Account>("SELECT OWNER FROM accounts", &[], None, &[])
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidData(_)));
}

#[test]
fn exec_scalar_reads_first_column_of_first_row() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let owner = manager
        .exec_scalar("SELECT OWNER, BALANCE FROM accounts WHERE ACCOUNT_ID = ?1", &[json!(1)])
        .unwrap();
    assert_eq!(owner, Some(json!("ann")));

    let none = manager
        .exec_scalar("SELECT OWNER FROM accounts WHERE ACCOUNT_ID = 0", &[])
        .unwrap();
    assert_eq!(none, None);
}

#[test]
fn count_treats_missing_and_null_as_zero() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    assert_eq!(manager.count("SELECT COUNT(*) FROM accounts", &[]).unwrap(), 2);
    assert_eq!(
        manager
            .count("SELECT BALANCE FROM accounts WHERE ACCOUNT_ID = 2", &[])
            .unwrap(),
        0
    );
    assert_eq!(
        manager
            .count("SELECT BALANCE FROM accounts WHERE ACCOUNT_ID = 3", &[])
            .unwrap(),
        0
    );
    assert_eq!(
        manager
            .count("SELECT BALANCE FROM accounts WHERE ACCOUNT_ID = 1", &[])
            .unwrap(),
        10
    );
}

#[test]
fn count_rejects_non_numeric_scalar() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let err = manager
        .count("SELECT OWNER FROM accounts WHERE ACCOUNT_ID = 1", &[])
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidData(_)));
}

#[test]
fn exec_reports_affected_rows_and_classifies_duplicates() {
    let conn = setup();
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let rows = manager
        .exec("UPDATE accounts SET ENABLED = ?1", &[json!("N")])
        .unwrap();
    assert_eq!(rows, 2);

    let err = manager
        .exec(
            "INSERT INTO accounts (ACCOUNT_ID, OWNER) VALUES (?1, ?2)",
            &[json!(1), json!("again")],
        )
        .unwrap_err();
    assert!(err.is_duplicate());

    let err = manager
        .exec("INSERT INTO accounts (ACCOUNT_ID) VALUES (?1)", &[json!(5)])
        .unwrap_err();
    assert!(!err.is_duplicate());
    assert!(matches!(err, SqlError::Execution(_)));
}

#[test]
fn object_params_need_json_binding() {
    let conn = setup();
    let strict = sqlsave_core::SqlConfig::sqlite().with_json_objects(false);
    let mut manager = SqlManager::new(SqliteBackend::with_config(&conn, strict));
    assert!(!manager.backend().config().json_objects);
    assert_eq!(manager.backend().dialect().as_str(), "sqlite");

    let err = manager
        .exec("UPDATE accounts SET OWNER = ?1", &[json!({"nested": true})])
        .unwrap_err();
    assert!(matches!(err, SqlError::Execution(_)));

    let mut relaxed = SqlManager::new(SqliteBackend::new(&conn));
    relaxed
        .exec("UPDATE accounts SET OWNER = ?1 WHERE ACCOUNT_ID = 2", &[json!({"nested": true})])
        .unwrap();
    let owner = relaxed
        .exec_scalar("SELECT OWNER FROM accounts WHERE ACCOUNT_ID = 2", &[])
        .unwrap();
    assert_eq!(owner, Some(json!(r#"{"nested":true}"#)));
}
