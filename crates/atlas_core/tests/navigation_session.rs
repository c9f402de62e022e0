use atlas_core::db::open_db_in_memory;
use atlas_core::{Direction, EditorError, EditorService, NewStructure, SessionStore};
use rusqlite::Connection;

fn seed(conn: &Connection, values: &[(i64, Option<i64>)]) {
    let service = EditorService::from_connection(conn).unwrap();
    for (value, parent_value) in values {
        service
            .create_structure(NewStructure {
                value: *value,
                name: format!("结构{value}"),
                parent_value: *parent_value,
            })
            .unwrap();
    }
}

fn seed_default(conn: &Connection) {
    seed(
        conn,
        &[
            (100_001, None),
            (100_002, None),
            (110_001, None),
            (1_000_000, Some(100_001)),
        ],
    );
}

#[test]
fn next_and_previous_follow_system_order_and_wrap() {
    let conn = open_db_in_memory().unwrap();
    seed_default(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    let step = |value, direction| service.navigate(value, direction).unwrap().value().get();
    // System 0 leaf sorts before the system 1 parent.
    assert_eq!(step(100_002, Direction::Next), 1_000_000);
    assert_eq!(step(1_000_000, Direction::Next), 110_001);
    assert_eq!(step(110_001, Direction::Next), 100_001);
    assert_eq!(step(100_001, Direction::Previous), 110_001);
}

#[test]
fn jump_lands_on_nearest_stored_value() {
    let conn = open_db_in_memory().unwrap();
    seed_default(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    let jump = |value| {
        service
            .navigate(value, Direction::Jump)
            .unwrap()
            .value()
            .get()
    };
    assert_eq!(jump(100_002), 100_002);
    assert_eq!(jump(100_500), 100_002);
    assert_eq!(jump(105_002), 110_001);
    assert_eq!(jump(100_000), 100_001);
    assert_eq!(jump(2_000_000), 1_000_000);
}

#[test]
fn navigation_errors_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = EditorService::from_connection(&conn).unwrap();
    assert!(matches!(
        service.navigate(100_001, Direction::Jump),
        Err(EditorError::EmptyDataset)
    ));

    seed_default(&conn);
    assert!(matches!(
        service.navigate(100_003, Direction::Next),
        Err(EditorError::UnknownIdentifier(100_003))
    ));
    assert!(matches!(
        service.navigate(50, Direction::Jump),
        Err(EditorError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        service.load_model(100_003),
        Err(EditorError::ModelNotFound(100_003))
    ));
}

#[test]
fn resume_returns_remembered_model() {
    let conn = open_db_in_memory().unwrap();
    seed_default(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session = SessionStore::new(dir.path().join("last_model.txt"));

    let model = service.navigate(100_001, Direction::Next).unwrap();
    service.remember(&session, model.value()).unwrap();

    assert_eq!(service.resume(&session).unwrap().value().get(), 100_002);
}

#[test]
fn resume_falls_back_to_default_start() {
    let conn = open_db_in_memory().unwrap();
    seed_default(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("last_model.txt");
    let session = SessionStore::new(&path);

    assert_eq!(service.resume(&session).unwrap().value().get(), 100_001);

    std::fs::write(&path, "garbage").unwrap();
    assert_eq!(service.resume(&session).unwrap().value().get(), 100_001);

    std::fs::write(&path, "42").unwrap();
    assert_eq!(service.resume(&session).unwrap().value().get(), 100_001);

    // A stale but legal value resolves through the nearest-value jump.
    std::fs::write(&path, "1000003").unwrap();
    assert_eq!(service.resume(&session).unwrap().value().get(), 1_000_000);
}

#[test]
fn resume_on_empty_store_reports_empty_dataset() {
    let conn = open_db_in_memory().unwrap();
    let service = EditorService::from_connection(&conn).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session = SessionStore::new(dir.path().join("last_model.txt"));

    assert!(matches!(
        service.resume(&session),
        Err(EditorError::EmptyDataset)
    ));
}
