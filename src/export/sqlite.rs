//! SQLite loading
//!
//! Loads flattened rows into a `dtsx_info` table with parameterized
//! statements. Each package is one transaction: any failure rolls the whole
//! package back, so the table only ever holds complete packages.

use std::path::Path;

use log::info;
use rusqlite::{params, Connection};

use crate::error::ExportError;
use crate::flatten::FlattenedDocument;
use crate::flatten_file;

use super::{package_dir, package_files, ExportedPackage, PackageProcessor, ProgressFn};

const CREATE_TABLE_SQL: &str = "create table if not exists dtsx_info(
    dtsx_id integer,
    dtsx_path text,
    dtsx_name text,
    item_id integer,
    item_type text,
    field_id integer,
    field_name text,
    value text,
    linked_item_type text
)";

const INSERT_SQL: &str = "insert into dtsx_info(\
    dtsx_id,dtsx_path,dtsx_name,item_id,item_type,field_id,field_name,value,linked_item_type) \
    values (?1,?2,?3,?4,?5,?6,?7,?8,?9)";

/// Loads packages into a SQLite database file
#[derive(Default)]
pub struct SqliteProcessor {
    progress: Option<ProgressFn>,
}

impl SqliteProcessor {
    pub fn new() -> Self {
        SqliteProcessor { progress: None }
    }

    /// Register a callback fired after each package is committed
    pub fn with_progress(mut self, callback: impl FnMut(&ExportedPackage) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn notify(&mut self, exported: &ExportedPackage) {
        if let Some(callback) = self.progress.as_mut() {
            callback(exported);
        }
    }
}

impl PackageProcessor for SqliteProcessor {
    fn export(&mut self, package: &Path, destination: &Path) -> Result<u32, ExportError> {
        let mut conn = Connection::open(destination)?;
        conn.execute(CREATE_TABLE_SQL, [])?;

        let doc = flatten_file(package, 0)?;
        load_document(&mut conn, 1, package, &doc)?;

        self.notify(&ExportedPackage {
            ordinal: 1,
            source: package.to_path_buf(),
            destination: Some(destination.to_path_buf()),
        });
        Ok(1)
    }

    fn export_tree(&mut self, root: &Path, destination: &Path) -> Result<u32, ExportError> {
        let packages = package_files(root);
        if packages.is_empty() {
            return Err(ExportError::NoPackages(root.to_path_buf()));
        }

        let mut conn = Connection::open(destination)?;
        conn.execute(CREATE_TABLE_SQL, [])?;

        let mut seed = 0u64;
        let mut ordinal = 0u32;
        for package in &packages {
            ordinal += 1;
            let doc = flatten_file(package, seed)?;
            seed = doc.last_item_id;

            load_document(&mut conn, ordinal, package, &doc)?;

            self.notify(&ExportedPackage {
                ordinal,
                source: package.clone(),
                destination: Some(destination.to_path_buf()),
            });
        }

        info!("loaded {} packages into {}", ordinal, destination.display());
        Ok(ordinal)
    }
}

/// Insert one package's rows inside a single transaction.
///
/// The transaction commits only after every row is in; dropping it on an
/// early return rolls everything back.
fn load_document(
    conn: &mut Connection,
    ordinal: u32,
    package: &Path,
    doc: &FlattenedDocument,
) -> Result<(), ExportError> {
    let dir = package_dir(package);
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for row in &doc.rows {
            stmt.execute(params![
                ordinal,
                dir,
                row.document,
                row.item_id as i64,
                row.item_type,
                row.field_id,
                row.field_name,
                row.value,
                row.linked_item_type,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}
