use atlas_core::db::open_db_in_memory;
use atlas_core::model::sentence::content_hash;
use atlas_core::{EditorError, EditorService, NewStructure, Sentence};
use rusqlite::Connection;

fn seed(conn: &Connection) {
    let service = EditorService::from_connection(conn).unwrap();
    for (value, name, parent) in [
        (100_001, "骨骼", None),
        (1_000_000, "股骨", Some(100_001)),
        (1_000_001, "胫骨", Some(100_001)),
    ] {
        service
            .create_structure(NewStructure {
                value,
                name: name.to_string(),
                parent_value: parent,
            })
            .unwrap();
    }
}

fn texts(sentences: &[Sentence]) -> Vec<&str> {
    sentences.iter().map(Sentence::text).collect()
}

fn links(conn: &Connection, model_value: i64) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare(
            "SELECT a.context, c.order_id
             FROM ia_connect AS c
             JOIN attribution AS a ON a.text_hash = c.text_hash
             WHERE c.model_value = ?1
             ORDER BY c.order_id;",
        )
        .unwrap();
    stmt.query_map([model_value], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn sentence_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM attribution;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn saved_paragraph_reloads_in_order() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    let outcome = service
        .save_paragraph(1_000_000, "股骨是最长的骨。\n它位于大腿。")
        .unwrap();
    assert_eq!(outcome.linked, 2);
    assert_eq!(outcome.new_sentences, 2);

    let model = service.load_model(1_000_000).unwrap();
    assert_eq!(texts(model.sentences()), vec!["股骨是最长的骨", "它位于大腿"]);
    assert_eq!(model.paragraph(), "股骨是最长的骨。\n\n它位于大腿。");

    let stored_hash: String = conn
        .query_row(
            "SELECT text_hash FROM ia_connect WHERE model_value = 1000000 AND order_id = 0;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored_hash, content_hash("股骨是最长的骨").as_str());
}

#[test]
fn resave_keeps_reorders_inserts_and_unlinks() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    service.save_paragraph(1_000_000, "A。\nB。").unwrap();

    let outcome = service.save_paragraph(1_000_000, "B。\nC。").unwrap();
    assert_eq!(outcome.unlinked, 1);
    assert_eq!(outcome.reordered, 1);
    assert_eq!(outcome.linked, 1);
    assert_eq!(
        links(&conn, 1_000_000),
        vec![("B".to_string(), 0), ("C".to_string(), 1)]
    );

    // Unlinked sentences stay until purged.
    assert_eq!(sentence_rows(&conn), 3);
    assert_eq!(service.purge_orphan_sentences().unwrap(), 1);
    assert_eq!(sentence_rows(&conn), 2);
}

#[test]
fn unchanged_paragraph_touches_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    service.save_paragraph(1_000_000, "A。\nB。").unwrap();

    let outcome = service.save_paragraph(1_000_000, "A。\n\nB。").unwrap();
    assert_eq!(
        (outcome.linked, outcome.unlinked, outcome.reordered),
        (0, 0, 0)
    );
}

#[test]
fn sentences_are_shared_between_models() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    service.save_paragraph(1_000_000, "属于下肢骨。").unwrap();
    let outcome = service.save_paragraph(1_000_001, "属于下肢骨。").unwrap();
    assert_eq!(outcome.linked, 1);
    assert_eq!(outcome.new_sentences, 0);
    assert_eq!(sentence_rows(&conn), 1);

    // Unlinking from one model keeps the row for the other.
    service.save_paragraph(1_000_000, "   ").unwrap();
    assert_eq!(service.purge_orphan_sentences().unwrap(), 0);
    assert_eq!(texts(service.load_model(1_000_001).unwrap().sentences()), vec!["属于下肢骨"]);
}

#[test]
fn blank_paragraph_clears_model() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    service.save_paragraph(1_000_000, "A。\nB。").unwrap();

    let outcome = service.save_paragraph(1_000_000, " \n ").unwrap();
    assert_eq!(outcome.unlinked, 2);
    assert!(service.load_model(1_000_000).unwrap().is_empty());
}

#[test]
fn paragraph_without_content_is_empty_paragraph() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    assert!(matches!(
        service.save_paragraph(1_000_000, "。\n。"),
        Err(EditorError::EmptyParagraph)
    ));
    assert!(matches!(
        service.split_preview(""),
        Err(EditorError::EmptyParagraph)
    ));
}

#[test]
fn repeated_sentence_is_linked_once() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    let preview = service.split_preview("A。\nA。\nB").unwrap();
    assert_eq!(texts(&preview), vec!["A", "A", "B"]);

    service.save_paragraph(1_000_000, "A。\nA。\nB").unwrap();
    assert_eq!(
        links(&conn, 1_000_000),
        vec![("A".to_string(), 0), ("B".to_string(), 1)]
    );
}

#[test]
fn saving_to_missing_model_fails() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();

    assert!(matches!(
        service.save_paragraph(1_000_005, "A。"),
        Err(EditorError::ModelNotFound(1_000_005))
    ));
}

#[test]
fn link_preview_does_not_write_until_commit() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    service.save_paragraph(1_000_000, "A。\nB。").unwrap();
    service.save_paragraph(1_000_001, "B。\nC。").unwrap();

    let source = service.load_model(1_000_000).unwrap();
    let preview = service
        .preview_links(source.sentences(), &[1_000_001])
        .unwrap();
    assert_eq!(texts(preview[0].sentences()), vec!["B", "C", "A"]);
    assert_eq!(
        texts(service.load_model(1_000_001).unwrap().sentences()),
        vec!["B", "C"]
    );

    let outcomes = service.commit_models(&preview).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].linked, 1);
    assert_eq!(
        texts(service.load_model(1_000_001).unwrap().sentences()),
        vec!["B", "C", "A"]
    );
}

#[test]
fn append_from_model_adds_missing_sentences() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = EditorService::from_connection(&conn).unwrap();
    service.save_paragraph(1_000_000, "A。\nB。").unwrap();

    let merged = service.append_from_model("B。", 1_000_000).unwrap();
    assert_eq!(merged, "B。\nA。\n");
    assert_eq!(
        texts(&service.split_preview(&merged).unwrap()),
        vec!["B", "A"]
    );
}
