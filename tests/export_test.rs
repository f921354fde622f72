//! Export surfaces: SQL script emission and SQLite loading

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tempfile::TempDir;

use dtsxrows::export::script::ScriptProcessor;
use dtsxrows::export::sqlite::SqliteProcessor;
use dtsxrows::export::PackageProcessor;
use dtsxrows::ExportError;

const PACKAGE_A: &str = "<pkg name=\"first\"><task>run 'fast'</task></pkg>";
const PACKAGE_B: &str = "<pkg name=\"second\"><step/><step/></pkg>";

fn write_package(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn script_single_package() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "a.dtsx", PACKAGE_A);

    let mut processor = ScriptProcessor::new();
    let count = processor.export(&src.path().join("a.dtsx"), dest.path()).unwrap();
    assert_eq!(count, 1);

    let script = fs::read_to_string(dest.path().join("single-dtsx-data.sql")).unwrap();
    assert!(script.starts_with("/*\ncreate table dtsx_info("));
    assert!(!script.contains("begin tran"));
    // Quote in the text value must be doubled
    assert!(script.contains("run ''fast''"));
    assert!(script.contains("'a.dtsx'"));
}

#[test]
fn script_renames_existing_file() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "a.dtsx", PACKAGE_A);
    let package = src.path().join("a.dtsx");

    let mut processor = ScriptProcessor::new();
    processor.export(&package, dest.path()).unwrap();
    processor.export(&package, dest.path()).unwrap();
    processor.export(&package, dest.path()).unwrap();

    assert!(dest.path().join("single-dtsx-data.sql").exists());
    assert!(dest.path().join("single-dtsx-data (1).sql").exists());
    assert!(dest.path().join("single-dtsx-data (2).sql").exists());
}

#[test]
fn script_tree_wraps_each_package_in_a_transaction() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "a.dtsx", PACKAGE_A);
    fs::create_dir(src.path().join("nested")).unwrap();
    write_package(&src.path().join("nested"), "b.dtsx", PACKAGE_B);

    let mut processor = ScriptProcessor::new();
    let count = processor.export_tree(src.path(), dest.path()).unwrap();
    assert_eq!(count, 2);

    let script = fs::read_to_string(dest.path().join("dtsx-data.sql")).unwrap();
    assert_eq!(script.matches("begin tran").count(), 2);
    assert_eq!(script.matches("commit tran").count(), 2);
    // Both packages present, with distinct ordinals
    assert!(script.contains("'a.dtsx'"));
    assert!(script.contains("'b.dtsx'"));
}

#[test]
fn script_tree_without_packages_is_an_error() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let err = ScriptProcessor::new().export_tree(src.path(), dest.path()).unwrap_err();
    assert!(matches!(err, ExportError::NoPackages(_)));
}

#[test]
fn sqlite_single_package() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "a.dtsx", PACKAGE_A);
    let db = dest.path().join("rows.db");

    let mut processor = SqliteProcessor::new();
    let count = processor.export(&src.path().join("a.dtsx"), &db).unwrap();
    assert_eq!(count, 1);

    let conn = Connection::open(&db).unwrap();
    let total: i64 = conn
        .query_row("select count(*) from dtsx_info", [], |r| r.get(0))
        .unwrap();
    // pkg identity + attr + child ref, task identity, TEXT child/identity/value
    assert_eq!(total, 7);

    let value: String = conn
        .query_row(
            "select value from dtsx_info where field_name = 'value'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(value, "run 'fast'");
}

#[test]
fn sqlite_tree_keeps_item_ids_unique_across_packages() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "a.dtsx", PACKAGE_A);
    write_package(src.path(), "b.dtsx", PACKAGE_B);
    let db = dest.path().join("rows.db");

    let mut ordinals = Vec::new();
    {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();
        let mut processor = SqliteProcessor::new()
            .with_progress(move |p| seen_in_cb.lock().unwrap().push(p.ordinal));
        let count = processor.export_tree(src.path(), &db).unwrap();
        assert_eq!(count, 2);
        ordinals.extend(seen.lock().unwrap().iter().copied());
    }
    assert_eq!(ordinals, vec![1, 2]);

    let conn = Connection::open(&db).unwrap();
    let (ids, distinct): (i64, i64) = conn
        .query_row(
            "select count(item_id), count(distinct item_id) from dtsx_info \
             where field_name = '_parent_id'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert!(ids > 0);
    assert_eq!(ids, distinct, "item ids must not collide across packages");

    let packages: i64 = conn
        .query_row("select count(distinct dtsx_id) from dtsx_info", [], |r| r.get(0))
        .unwrap();
    assert_eq!(packages, 2);
}

#[test]
fn sqlite_malformed_package_loads_nothing() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_package(src.path(), "bad.dtsx", "<pkg><open></pkg>");
    let db = dest.path().join("rows.db");

    let err = SqliteProcessor::new().export(&src.path().join("bad.dtsx"), &db).unwrap_err();
    assert!(matches!(err, ExportError::Flatten(_)));

    let conn = Connection::open(&db).unwrap();
    let total: i64 = conn
        .query_row("select count(*) from dtsx_info", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, 0, "a failed package must leave no rows behind");
}
