//! JSON serialization of flattened rows

use std::io::{Read, Write};

use crate::error::ExportError;
use crate::flatten::Row;

/// Serialize rows to a writer as a JSON array
pub fn write_rows<W: Write>(writer: W, rows: &[Row]) -> Result<(), ExportError> {
    serde_json::to_writer(writer, rows)?;
    Ok(())
}

/// Deserialize rows previously written by [`write_rows`]
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>, ExportError> {
    Ok(serde_json::from_reader(reader)?)
}
