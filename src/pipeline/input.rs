//! Input resolution: turn a path or an uploaded byte buffer into a local PDF
//! file pdfium can open.
//!
//! ## Why stage uploads in a temp dir?
//!
//! pdfium opens documents by path. An upload held in memory is written to a
//! `TempDir` that lives inside [`ResolvedInput`], so the file disappears when
//! the run is over, even on an early return. Both paths check the `%PDF`
//! magic bytes first so a stray `.docx` fails with a clear message instead
//! of a pdfium error code.

use crate::error::ExtractionError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF ready to be opened by path.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Caller-supplied file on disk.
    Local(PathBuf),
    /// In-memory upload written to a temp dir that is removed on drop.
    Staged { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Staged { path, .. } => path,
        }
    }
}

/// Validate a local file: it must exist, be readable and start with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, ExtractionError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ExtractionError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(ExtractionError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractionError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractionError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write an uploaded PDF to a temp file.
///
/// `name` is only used for the file name inside the temp dir; anything
/// that is not a plain file name falls back to `upload.pdf`.
pub async fn stage_bytes(bytes: &[u8], name: &str) -> Result<ResolvedInput, ExtractionError> {
    let file_name = sanitize_file_name(name);
    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ExtractionError::NotAPdf {
            path: PathBuf::from(file_name),
            magic,
        });
    }

    let temp_dir = TempDir::new().map_err(|e| ExtractionError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(&file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ExtractionError::Internal(format!("Failed to write temp file: {e}")))?;

    debug!("Staged {} bytes at {}", bytes.len(), path.display());
    Ok(ResolvedInput::Staged {
        path,
        _temp_dir: temp_dir,
    })
}

fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if base.is_empty() || base.starts_with('.') {
        "upload.pdf".to_string()
    } else {
        base.to_string()
    }
}
