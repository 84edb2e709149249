use std::collections::BTreeSet;

use super::PipelineError;

/// Accepts or rejects an upload by filename before anything touches disk.
#[derive(Debug, Clone)]
pub struct FormatGatekeeper {
    allowed: BTreeSet<String>,
}

impl FormatGatekeeper {
    /// `allowed` holds lowercase extensions without the leading dot.
    pub fn new(allowed: BTreeSet<String>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Lowercased suffix after the last dot, if the filename has one.
    pub fn extension(filename: &str) -> Option<String> {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
    }

    pub fn is_allowed(&self, filename: &str) -> bool {
        Self::extension(filename).is_some_and(|ext| self.allowed.contains(&ext))
    }

    pub fn check(&self, filename: &str) -> Result<(), PipelineError> {
        if filename.is_empty() {
            return Err(PipelineError::EmptyFilename);
        }
        if !self.is_allowed(filename) {
            return Err(PipelineError::DisallowedExtension {
                allowed: self.allowed.iter().cloned().collect(),
            });
        }
        Ok(())
    }
}
