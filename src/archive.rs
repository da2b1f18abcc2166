/*!
 * Archive packaging for separate-document batches.
 */

use std::io::{Cursor, Write};

use bytes::Bytes;
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::AppError;

/// One file inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File name inside the archive, already sanitized and unique
    pub name: String,
    pub content: String,
}

/// Packs named documents into a single payload
pub trait Archiver: Send + Sync {
    fn package(&self, entries: &[ArchiveEntry]) -> Result<Bytes, AppError>;
}

/// Deflate-compressed ZIP archiver
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn package(&self, entries: &[ArchiveEntry]) -> Result<Bytes, AppError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for entry in entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| AppError::Archive(format!("{}: {}", entry.name, e)))?;
            writer
                .write_all(entry.content.as_bytes())
                .map_err(|e| AppError::Archive(format!("{}: {}", entry.name, e)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| AppError::Archive(e.to_string()))?;
        let bytes = cursor.into_inner();
        debug!("Packed {} entries into {} bytes", entries.len(), bytes.len());

        Ok(Bytes::from(bytes))
    }
}
