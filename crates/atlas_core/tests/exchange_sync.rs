use atlas_core::db::{open_db, open_db_in_memory};
use atlas_core::exchange::{export_tables, import_tables, ExchangeError, TableCount};
use atlas_core::model::sentence::content_hash;
use atlas_core::sync::{sync_share_database, SyncDirection, SyncError};
use atlas_core::{EditorService, NewStructure};
use rusqlite::Connection;

fn seed_femur(conn: &Connection, paragraph: &str) {
    let service = EditorService::from_connection(conn).unwrap();
    service
        .create_structure(NewStructure {
            value: 100_001,
            name: "骨骼".to_string(),
            parent_value: None,
        })
        .unwrap();
    service
        .create_structure(NewStructure {
            value: 1_000_000,
            name: "股骨".to_string(),
            parent_value: Some(100_001),
        })
        .unwrap();
    service.save_paragraph(1_000_000, paragraph).unwrap();
}

fn seeded_database() -> Connection {
    let conn = open_db_in_memory().unwrap();
    seed_femur(&conn, "股骨是最长的骨。\n它位于大腿。");
    conn
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn rows(counts: &[TableCount]) -> Vec<(&str, usize)> {
    counts.iter().map(|count| (count.table, count.rows)).collect()
}

fn femur_orders(conn: &Connection) -> Vec<i64> {
    let mut stmt = conn
        .prepare("SELECT order_id FROM ia_connect WHERE model_value = 1000000 ORDER BY order_id;")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn femur_paragraph(conn: &Connection) -> String {
    EditorService::from_connection(conn)
        .unwrap()
        .load_model(1_000_000)
        .unwrap()
        .paragraph()
}

#[test]
fn export_writes_one_json_array_per_table() {
    let conn = seeded_database();
    let dir = tempfile::tempdir().unwrap();

    let counts = export_tables(&conn, dir.path()).unwrap();
    assert_eq!(rows(&counts), vec![("attribution", 2), ("ia_connect", 2)]);

    let raw = std::fs::read_to_string(dir.path().join("ia_connect.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &parsed.as_array().unwrap()[0];
    assert_eq!(first["model_value"], serde_json::json!(1_000_000));
    assert_eq!(first["order_id"], serde_json::json!(0));
    assert!(first["text_hash"].is_string());
}

#[test]
fn import_inserts_new_rows_and_skips_known_keys() {
    let source = seeded_database();
    let dir = tempfile::tempdir().unwrap();
    export_tables(&source, dir.path()).unwrap();

    let target = open_db_in_memory().unwrap();
    let first = import_tables(&target, dir.path()).unwrap();
    assert_eq!(rows(&first), vec![("attribution", 2), ("ia_connect", 2)]);

    let second = import_tables(&target, dir.path()).unwrap();
    assert_eq!(rows(&second), vec![("attribution", 0), ("ia_connect", 0)]);
    assert_eq!(count(&target, "ia_connect"), 2);
}

#[test]
fn import_without_files_inserts_nothing() {
    let target = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let counts = import_tables(&target, dir.path()).unwrap();
    assert_eq!(rows(&counts), vec![("attribution", 0), ("ia_connect", 0)]);
}

#[test]
fn import_rejects_unknown_columns_and_rolls_back() {
    let target = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("attribution.json"),
        r#"[{"text_hash": "h1", "context": "A"}]"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("ia_connect.json"),
        r#"[{"model_value": 1000000, "text_hash": "h1", "order_id": 0, "weight": 3}]"#,
    )
    .unwrap();

    let err = import_tables(&target, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::UnknownColumn {
            table: "ia_connect",
            ..
        }
    ));
    assert_eq!(count(&target, "attribution"), 0);
}

#[test]
fn import_requires_unique_key_fields() {
    let target = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("attribution.json"),
        r#"[{"text_hash": "h1"}]"#,
    )
    .unwrap();

    let err = import_tables(&target, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::MissingKeyField {
            table: "attribution",
            column: "context"
        }
    ));
}

#[test]
fn upload_then_download_copies_sentences_once() {
    let local = seeded_database();
    let dir = tempfile::tempdir().unwrap();
    let share_path = dir.path().join("share.db");

    let uploaded = sync_share_database(&local, &share_path, SyncDirection::Upload).unwrap();
    assert_eq!((uploaded.sentences, uploaded.links), (2, 2));
    assert_eq!(uploaded.total(), 4);

    let again = sync_share_database(&local, &share_path, SyncDirection::Upload).unwrap();
    assert_eq!(again.total(), 0);

    let share = open_db(&share_path).unwrap();
    assert_eq!(count(&share, "attribution"), 2);
    drop(share);

    let other = open_db_in_memory().unwrap();
    let downloaded = sync_share_database(&other, &share_path, SyncDirection::Download).unwrap();
    assert_eq!(downloaded.total(), 4);
    assert_eq!(count(&other, "ia_connect"), 2);
}

#[test]
fn download_from_missing_share_fails() {
    let local = open_db_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = sync_share_database(&local, &dir.path().join("absent.db"), SyncDirection::Download)
        .unwrap_err();
    assert!(matches!(err, SyncError::ShareMissing(_)));
}

#[test]
fn download_appends_share_links_after_local_ones() {
    let dir = tempfile::tempdir().unwrap();
    let share_path = dir.path().join("share.db");
    {
        let share = open_db(&share_path).unwrap();
        seed_femur(&share, "B。");
    }
    let local = open_db_in_memory().unwrap();
    seed_femur(&local, "A。");

    let report = sync_share_database(&local, &share_path, SyncDirection::Download).unwrap();
    assert_eq!((report.sentences, report.links), (1, 1));
    assert_eq!(femur_orders(&local), vec![0, 1]);
    assert_eq!(femur_paragraph(&local), "A。\n\nB。");
}

#[test]
fn upload_appends_local_links_after_shared_ones() {
    let dir = tempfile::tempdir().unwrap();
    let share_path = dir.path().join("share.db");
    {
        let share = open_db(&share_path).unwrap();
        seed_femur(&share, "B。\nC。");
    }
    let local = open_db_in_memory().unwrap();
    seed_femur(&local, "A。\nB。");

    let report = sync_share_database(&local, &share_path, SyncDirection::Upload).unwrap();
    assert_eq!(report.links, 1);

    let share = open_db(&share_path).unwrap();
    assert_eq!(femur_orders(&share), vec![0, 1, 2]);
    assert_eq!(femur_paragraph(&share), "B。\n\nC。\n\nA。");
}

#[test]
fn import_appends_links_after_existing_ones() {
    let source = open_db_in_memory().unwrap();
    seed_femur(&source, "B。\nC。");
    let dir = tempfile::tempdir().unwrap();
    export_tables(&source, dir.path()).unwrap();

    let target = open_db_in_memory().unwrap();
    seed_femur(&target, "A。");
    let counts = import_tables(&target, dir.path()).unwrap();
    assert_eq!(rows(&counts), vec![("attribution", 2), ("ia_connect", 2)]);
    assert_eq!(femur_orders(&target), vec![0, 1, 2]);
    assert_eq!(femur_paragraph(&target), "A。\n\nB。\n\nC。");
}

#[test]
fn import_keeps_stored_text_when_hash_is_taken() {
    let target = open_db_in_memory().unwrap();
    seed_femur(&target, "A。");
    let hash = content_hash("A");
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("attribution.json"),
        serde_json::json!([{ "text_hash": hash.as_str(), "context": "改写后的A" }]).to_string(),
    )
    .unwrap();

    let counts = import_tables(&target, dir.path()).unwrap();
    assert_eq!(rows(&counts), vec![("attribution", 0), ("ia_connect", 0)]);
    let stored: String = target
        .query_row(
            "SELECT context FROM attribution WHERE text_hash = ?1;",
            [hash.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "A");
}
