//! Extract file writer
//!
//! Serializes flattened records as CSV with a fixed header. The load step
//! skips exactly one header line, so the file always holds a single header
//! followed by one line per record.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::flatten::FlatRecord;

/// Header row of the extract, in column order
pub const CSV_HEADER: [&str; 13] = [
    "Datazone Asset Name",
    "Asset System Name",
    "Subscription ID",
    "Subscriber Project",
    "Subscription Status",
    "Subscription Request ID",
    "Created At",
    "Created By",
    "Updated At",
    "Updated By",
    "filter_name",
    "filter_columns",
    "filter_row_expression",
];

/// Error writing the extract
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Write(#[from] std::io::Error),
}

/// Written extract file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFile {
    pub path: PathBuf,
    /// Data rows, header excluded
    pub rows: usize,
    /// Hex SHA-256 of the file content
    pub sha256: String,
}

/// Quote a field when it holds a separator, quote or line break
pub fn escape_csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_line<W: Write, S: AsRef<str>>(writer: &mut W, cells: &[S]) -> std::io::Result<()> {
    let line = cells
        .iter()
        .map(|cell| escape_csv_field(cell.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")
}

/// Write the header and one line per record
pub fn write_csv<W: Write>(records: &[FlatRecord], writer: &mut W) -> Result<(), ExportError> {
    write_line(writer, &CSV_HEADER)?;
    for record in records {
        write_line(writer, &record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the extract in memory
pub fn render_csv(records: &[FlatRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    Ok(buffer)
}

/// Compute SHA256 hash of content
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Write the extract to `path`, replacing any previous content
pub async fn write_csv_file(
    records: &[FlatRecord],
    path: &Path,
) -> Result<ExtractFile, ExportError> {
    let content = render_csv(records)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, &content)
        .await
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let file = ExtractFile {
        path: path.to_path_buf(),
        rows: records.len(),
        sha256: compute_hash(&content),
    };
    info!(path = %path.display(), rows = file.rows, "Wrote extract file");
    Ok(file)
}
