//! Local file import
//!
//! Provides Markdown file reading with:
//! - Extension or MIME based acceptance
//! - File size limits
//! - UTF-8 decoding with BOM stripping

use crate::error::{ImportError, ImportResult};
use crate::utils::path::is_markdown_name;
use std::path::Path;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Result of reading a file
#[derive(Debug, Clone)]
pub struct FileReadResult {
    /// The file content as a string
    pub content: String,
    /// Original file size in bytes
    pub size_bytes: u64,
    /// Whether a UTF-8 byte order mark was stripped
    pub had_bom: bool,
}

/// Whether a file may be imported, by name or by `text/*` MIME type
pub fn is_allowed_file(name: &str, mime: Option<&str>) -> bool {
    let is_text_type = mime
        .map(|m| m.trim().to_ascii_lowercase().starts_with("text/"))
        .unwrap_or(false);
    is_markdown_name(name) || is_text_type
}

/// Decode file bytes as UTF-8, stripping a leading BOM
fn decode_content(mut bytes: Vec<u8>) -> Result<(String, bool), Vec<u8>> {
    let had_bom = bytes.starts_with(&UTF8_BOM);
    if had_bom {
        bytes.drain(..UTF8_BOM.len());
    }
    String::from_utf8(bytes)
        .map(|s| (s, had_bom))
        .map_err(|e| e.into_bytes())
}

/// Read a Markdown file for import
pub async fn read_markdown_file(
    path: impl AsRef<Path>,
    max_size: u64,
) -> ImportResult<FileReadResult> {
    let path = path.as_ref();
    let path_buf = path.to_path_buf();

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !is_allowed_file(&name, None) {
        return Err(ImportError::DisallowedFile { name });
    }

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ImportError::NotFound {
            path: path_buf.clone(),
        },
        _ => ImportError::Read {
            path: path_buf.clone(),
            source: e,
        },
    })?;

    let size_bytes = metadata.len();
    if size_bytes > max_size {
        return Err(ImportError::TooLarge {
            path: path_buf,
            size: size_bytes,
            max_size,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| ImportError::Read {
        path: path_buf.clone(),
        source: e,
    })?;

    let (content, had_bom) =
        decode_content(bytes).map_err(|_| ImportError::Encoding { path: path_buf })?;

    log::debug!("Read {} ({} bytes)", path.display(), size_bytes);
    Ok(FileReadResult {
        content,
        size_bytes,
        had_bom,
    })
}
