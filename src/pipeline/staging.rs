//! Ephemeral storage for uploads.
//!
//! Each upload is written to `<upload_dir>/<uuid>_<sanitized name>` and is
//! owned by a [`StoredFile`] guard that deletes it when dropped, so the file
//! never outlives the request that created it, whichever way the request ends.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Name used when sanitization leaves nothing usable.
const FALLBACK_FILENAME: &str = "upload.xlsx";
const MAX_FILENAME_LEN: usize = 100;

/// Sanitize a filename: removes path traversal and special characters.
pub fn sanitize_filename(name: &str) -> String {
    // Keep only the last path component (browsers on Windows may send full paths)
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Remove consecutive dots (path traversal prevention)
    let mut sanitized = sanitized;
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "");
    }
    let sanitized = sanitized.trim_start_matches('.').to_string();

    // ASCII-only at this point, so byte truncation is char-safe
    let sanitized = if sanitized.len() > MAX_FILENAME_LEN {
        sanitized[sanitized.len() - MAX_FILENAME_LEN..].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        FALLBACK_FILENAME.into()
    } else {
        sanitized
    }
}

/// Writes uploads into the configured working directory.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    dir: PathBuf,
}

impl UploadStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `bytes` under a fresh per-request key derived from `filename`.
    pub fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<StoredFile> {
        fs::create_dir_all(&self.dir)?;

        let key = Uuid::new_v4();
        let path = self
            .dir
            .join(format!("{}_{}", key, sanitize_filename(filename)));

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        // From here on the guard owns the path, so a failed write still cleans up.
        let stored = StoredFile { key, path };
        file.write_all(bytes)?;
        file.sync_all()?;

        tracing::debug!(
            request_id = %key,
            size = bytes.len(),
            "Upload stored"
        );

        Ok(stored)
    }

    /// Remove files left behind by a previous process that died mid-request.
    ///
    /// Only names carrying the `<uuid>_` storage prefix are touched. Returns the
    /// number of files removed.
    pub fn cleanup_orphans(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return 0, // Upload dir may not exist yet
        };

        let mut count = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !has_storage_prefix(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove orphaned upload"
                ),
            }
        }

        if count > 0 {
            tracing::info!(
                files_cleaned = count,
                "Cleaned orphaned uploads from previous session"
            );
        }
        count
    }
}

fn has_storage_prefix(name: &str) -> bool {
    name.split_once('_')
        .is_some_and(|(prefix, _)| Uuid::parse_str(prefix).is_ok())
}

/// A request-scoped upload on disk. Deleted on drop.
#[derive(Debug)]
pub struct StoredFile {
    key: Uuid,
    path: PathBuf,
}

impl StoredFile {
    /// Unique per-request storage key.
    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting failures. Dropping the guard does the same silently.
    pub fn release(self) -> io::Result<()> {
        // The destructor runs afterwards and finds nothing left to remove
        remove_if_present(&self.path)
    }
}

impl Drop for StoredFile {
    fn drop(&mut self) {
        if let Err(e) = remove_if_present(&self.path) {
            tracing::error!(
                request_id = %self.key,
                error = %e,
                "Failed to remove stored upload"
            );
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
