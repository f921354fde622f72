//! Export surfaces over the flattened row stream
//!
//! Consumers of the row model:
//! - script: SQL INSERT script emission
//! - sqlite: parameterized loading into a SQLite database
//! - json: row (de)serialization
//!
//! Exporters are thin: all the structure is already in the rows.

pub mod json;
pub mod script;
pub mod sqlite;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ExportError;

/// Notification fired after each package lands in its destination
#[derive(Debug, Clone)]
pub struct ExportedPackage {
    /// 1-based ordinal of the package within the export run
    pub ordinal: u32,
    /// Path of the source package
    pub source: PathBuf,
    /// Where the package's rows were written, when that is a file
    pub destination: Option<PathBuf>,
}

/// Progress callback invoked once per exported package
pub type ProgressFn = Box<dyn FnMut(&ExportedPackage)>;

/// A destination for flattened packages
pub trait PackageProcessor {
    /// Export a single package. Returns the number of packages processed.
    fn export(&mut self, package: &Path, destination: &Path) -> Result<u32, ExportError>;

    /// Export every `.dtsx` file under a folder tree, keeping item ids and
    /// package ordinals unique across the whole batch. Returns the number
    /// of packages processed.
    fn export_tree(&mut self, root: &Path, destination: &Path) -> Result<u32, ExportError>;
}

/// All `.dtsx` files under `root`, in a stable traversal order
pub(crate) fn package_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("dtsx"))
        })
        .collect()
}

/// Move an existing file out of the way: `name.sql` becomes `name (1).sql`,
/// then `name (2).sql`, and so on. No-op if the path does not exist.
pub(crate) fn rename_existing(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = path.extension().and_then(|s| s.to_str());
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut counter = 0u32;
    loop {
        counter += 1;
        let candidate = match extension {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, counter, ext)),
            None => dir.join(format!("{} ({})", stem, counter)),
        };
        if !candidate.exists() {
            return std::fs::rename(path, candidate);
        }
    }
}

/// The parent directory of a package, as text for the `dtsx_path` column
pub(crate) fn package_dir(package: &Path) -> String {
    package
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
