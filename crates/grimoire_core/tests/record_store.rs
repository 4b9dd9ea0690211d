use grimoire_core::db::open_db_in_memory;
use grimoire_core::{
    LanguageCode, MultilingualRecord, RecordKind, RecordMetadata, RecordStore, RepoError,
    SqliteRecordStore, TranslationVariant, VariantContent,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

fn variant(code: &str, protected: bool) -> TranslationVariant {
    TranslationVariant::new(
        lang(code),
        VariantContent::named(format!("name-{code}"))
            .with_description("desc")
            .with_field("level", json!(3)),
        protected,
        100,
    )
}

fn spell(codes: &[(&str, bool)]) -> MultilingualRecord {
    let variants = codes
        .iter()
        .map(|(code, protected)| variant(code, *protected))
        .collect();
    MultilingualRecord::new(RecordKind::Spell, variants, 100).unwrap()
}

#[test]
fn create_and_load_roundtrip_preserves_variants_and_content() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let record = spell(&[("fr", false), ("en", true)]);
    let id = store.create_record(&record).unwrap();

    let loaded = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.available_languages(), &[lang("en"), lang("fr")]);
    assert!(loaded.variant(&lang("en")).unwrap().is_protected());
    assert_eq!(
        loaded.variant(&lang("fr")).unwrap().content.fields["level"],
        json!(3)
    );
}

#[test]
fn metadata_roundtrips_and_follows_atomic_update() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let record = spell(&[("en", true)]).with_metadata(RecordMetadata { tag: 9, srd: true });
    let id = store.create_record(&record).unwrap();
    let mut loaded = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.metadata(), RecordMetadata { tag: 9, srd: true });

    loaded.set_tag(-3, 200).unwrap();
    store.atomic_update(&loaded, 0).unwrap();
    let reloaded = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(reloaded.metadata(), RecordMetadata { tag: -3, srd: true });
    assert_eq!(reloaded.updated_at(), 200);
}

#[test]
fn load_reads_inside_a_transaction_that_is_closed_afterwards() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let id = store.create_record(&spell(&[("en", false)])).unwrap();

    assert!(store.load_by_id(id).unwrap().is_some());
    assert!(conn.is_autocommit());
    assert!(store.load_by_id(Uuid::new_v4()).unwrap().is_none());
    assert!(conn.is_autocommit());

    conn.execute_batch("BEGIN;").unwrap();
    let err = store.load_by_id(id).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    conn.execute_batch("ROLLBACK;").unwrap();
}

#[test]
fn load_unknown_id_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    assert!(store.load_by_id(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn creating_same_id_twice_fails() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let record = spell(&[("en", false)]);
    store.create_record(&record).unwrap();

    let err = store.create_record(&record).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(id) if id == record.id()));
}

#[test]
fn atomic_update_bumps_version_and_persists_tombstones() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let id = store
        .create_record(&spell(&[("en", false), ("fr", false)]))
        .unwrap();

    let mut working = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(working.version(), 0);
    working.remove_variant(&lang("fr"), 200).unwrap();

    let saved = store.atomic_update(&working, 0).unwrap();
    assert_eq!(saved.version(), 1);

    let loaded = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.version(), 1);
    assert_eq!(loaded.available_languages(), &[lang("en")]);
    assert_eq!(loaded.variant(&lang("fr")).unwrap().deleted_at, Some(200));
    assert_eq!(loaded.variants().len(), 2);
}

#[test]
fn atomic_update_with_stale_version_conflicts_and_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let id = store
        .create_record(&spell(&[("en", false), ("fr", false), ("es", false)]))
        .unwrap();

    let mut first = store.load_by_id(id).unwrap().unwrap();
    let mut second = first.clone();

    first.remove_variant(&lang("fr"), 200).unwrap();
    store.atomic_update(&first, 0).unwrap();

    second.remove_variant(&lang("es"), 201).unwrap();
    let err = store.atomic_update(&second, 0).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Conflict { id: conflict_id, expected_version: 0 } if conflict_id == id
    ));

    let loaded = store.load_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.version(), 1);
    assert_eq!(loaded.available_languages(), &[lang("en"), lang("es")]);
}

#[test]
fn atomic_update_on_missing_record_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let record = spell(&[("en", false)]);

    let err = store.atomic_update(&record, 0).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == record.id()));
}

#[test]
fn distinct_languages_skips_deleted_variants_and_tombstoned_records() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let first = store
        .create_record(&spell(&[("en", false), ("fr", false)]))
        .unwrap();
    let second = store
        .create_record(&spell(&[("de", false), ("it", false)]))
        .unwrap();

    let mut working = store.load_by_id(first).unwrap().unwrap();
    working.remove_variant(&lang("fr"), 300).unwrap();
    store.atomic_update(&working, 0).unwrap();

    let mut working = store.load_by_id(second).unwrap().unwrap();
    working.tombstone(300).unwrap();
    store.atomic_update(&working, 0).unwrap();

    let languages: Vec<String> = store
        .distinct_languages()
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(languages, vec!["en".to_string()]);
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteRecordStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn load_rejects_corrupted_content_json() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let id = store.create_record(&spell(&[("en", false)])).unwrap();

    conn.execute(
        "UPDATE record_translations SET content_json = 'not json' WHERE record_uuid = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let err = store.load_by_id(id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
