//! SQL script emission
//!
//! Serializes flattened rows into an INSERT script compatible with the
//! `dtsx_info` table. Batch exports wrap each package's inserts in a
//! transaction so a partially loaded package can never survive a failed
//! script run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::ExportError;
use crate::flatten::Row;
use crate::flatten_file;

use super::{package_dir, package_files, rename_existing, ExportedPackage, PackageProcessor, ProgressFn};

/// Script file name for a single-package export
const SINGLE_SCRIPT_NAME: &str = "single-dtsx-data.sql";

/// Script file name for a folder-tree export
const BATCH_SCRIPT_NAME: &str = "dtsx-data.sql";

/// Commented-out DDL for the destination table, written at the top of every
/// script so the consumer knows the expected shape.
const TABLE_HEADER: &str = "/*
create table dtsx_info(
dtsx_id int,
dtsx_path nvarchar(2000),
dtsx_name varchar(200),
item_id int,
item_type varchar(200),
field_id int,
field_name varchar(200),
value varchar(max),
linked_item_type varchar(200)
)
*/";

/// Exports packages to SQL INSERT scripts
#[derive(Default)]
pub struct ScriptProcessor {
    progress: Option<ProgressFn>,
}

impl ScriptProcessor {
    pub fn new() -> Self {
        ScriptProcessor { progress: None }
    }

    /// Register a callback fired after each package is written
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

impl PackageProcessor for ScriptProcessor {
    fn export(&mut self, package: &Path, destination: &Path) -> Result<u32, ExportError> {
        let doc = flatten_file(package, 0)?;

        let script_path = destination.join(SINGLE_SCRIPT_NAME);
        rename_existing(&script_path)?;

        let mut writer = BufWriter::new(File::create(&script_path)?);
        writeln!(writer, "{}", TABLE_HEADER)?;
        let dir = package_dir(package);
        for row in &doc.rows {
            write_insert(&mut writer, 1, &dir, row)?;
        }
        writer.flush()?;

        info!("wrote {} rows to {}", doc.rows.len(), script_path.display());
        self.notify(&ExportedPackage {
            ordinal: 1,
            source: package.to_path_buf(),
            destination: Some(script_path),
        });
        Ok(1)
    }

    fn export_tree(&mut self, root: &Path, destination: &Path) -> Result<u32, ExportError> {
        let packages = package_files(root);
        if packages.is_empty() {
            return Err(ExportError::NoPackages(root.to_path_buf()));
        }

        let script_path = destination.join(BATCH_SCRIPT_NAME);
        rename_existing(&script_path)?;

        let mut writer = BufWriter::new(File::create(&script_path)?);
        writeln!(writer, "{}", TABLE_HEADER)?;

        // Item ids continue across packages so the combined destination
        // table never sees a collision.
        let mut seed = 0u64;
        let mut ordinal = 0u32;
        for package in &packages {
            ordinal += 1;
            let doc = flatten_file(package, seed)?;
            seed = doc.last_item_id;

            let dir = package_dir(package);
            writeln!(writer, "begin tran")?;
            for row in &doc.rows {
                write_insert(&mut writer, ordinal, &dir, row)?;
            }
            writeln!(writer, "commit tran")?;

            self.notify(&ExportedPackage {
                ordinal,
                source: package.clone(),
                destination: Some(script_path.clone()),
            });
        }
        writer.flush()?;

        info!("wrote {} packages to {}", ordinal, script_path.display());
        Ok(ordinal)
    }
}

fn write_insert<W: Write>(
    writer: &mut W,
    ordinal: u32,
    dir: &str,
    row: &Row,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "insert into dtsx_info(dtsx_id,dtsx_path,dtsx_name,item_id,item_type,field_id,field_name,value,linked_item_type)"
    )?;
    writeln!(
        writer,
        "values({},'{}','{}',{},'{}',{},'{}','{}','{}')",
        ordinal,
        sql_escape(dir),
        sql_escape(&row.document),
        row.item_id,
        row.item_type,
        row.field_id,
        row.field_name,
        sql_value(&row.value),
        row.linked_item_type,
    )
}

/// Escape a string literal for SQL: single quotes are doubled
pub fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Escape a row value: quotes doubled, newlines normalized to CRLF
pub fn sql_value(s: &str) -> String {
    sql_escape(s).replace("\r\n", "\n").replace('\n', "\r\n")
}
