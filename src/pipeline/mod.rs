//! Upload → validate → store → extract → predict → respond.

pub mod assemble;
pub mod features;
pub mod gatekeeper;
pub mod orchestrator;
pub mod predictor;
pub mod records;
pub mod sheet;
pub mod staging;

#[cfg(test)]
pub(crate) mod test_support;

pub use assemble::{assemble, ResultRecord};
pub use features::{FeatureExtractor, FeatureTable, SpreadsheetFeatureExtractor};
pub use gatekeeper::FormatGatekeeper;
pub use orchestrator::Pipeline;
pub use predictor::{ModelError, Predictor, TrainedModel};
pub use records::{RecordColumns, RecordContext, RecordReader, Scalar, SpreadsheetRecordReader};
pub use sheet::SheetError;
pub use staging::{sanitize_filename, StoredFile, UploadStorage};

use thiserror::Error;

/// A single uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-supplied name, not yet validated.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing file, empty filename or disallowed extension.
    ClientInput,
    /// The stored workbook does not match the expected schema.
    ContentFormat,
    /// Collaborators disagree about row counts.
    Consistency,
    ServerFault,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Uploading failed! You didn't attach any file. Try again.")]
    MissingFile,

    #[error("Uploading failed! You didn't attach any file. Try again.")]
    EmptyFilename,

    #[error(
        "Uploading failed! Not allowed datafile format. There are possible variants: {}",
        format_variants(.allowed)
    )]
    DisallowedExtension { allowed: Vec<String> },

    #[error(
        "Processing failed! Supposedly, incorrect format of data. Detailed description of the error: {0}"
    )]
    ContentFormat(#[source] SheetError),

    #[error("Row count mismatch at {stage}: expected {expected}, found {found}")]
    RowCountMismatch {
        stage: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Record context could not be read after extraction succeeded: {0}")]
    RecordRead(#[source] SheetError),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] ModelError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::MissingFile | Self::EmptyFilename | Self::DisallowedExtension { .. } => {
                ErrorClass::ClientInput
            }
            Self::ContentFormat(_) => ErrorClass::ContentFormat,
            Self::RowCountMismatch { .. } => ErrorClass::Consistency,
            Self::Storage(_) | Self::RecordRead(_) | Self::Prediction(_) | Self::Internal(_) => {
                ErrorClass::ServerFault
            }
        }
    }

    /// Client-visible failures (HTTP 400) as opposed to server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.classify(),
            ErrorClass::ClientInput | ErrorClass::ContentFormat
        )
    }
}

/// Render an extension set the way the upload page has always shown it: `{'xlsx'}`.
fn format_variants(allowed: &[String]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|ext| format!("'{ext}'")).collect();
    format!("{{{}}}", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert_eq!(PipelineError::MissingFile.classify(), ErrorClass::ClientInput);
        assert_eq!(PipelineError::EmptyFilename.classify(), ErrorClass::ClientInput);
        assert_eq!(
            PipelineError::DisallowedExtension { allowed: vec!["xlsx".into()] }.classify(),
            ErrorClass::ClientInput
        );
        assert!(PipelineError::ContentFormat(SheetError::NoWorksheet).is_client_error());
    }

    #[test]
    fn faults_are_not_client_errors() {
        let faults = [
            PipelineError::RowCountMismatch { stage: "predict", expected: 2, found: 1 },
            PipelineError::RecordRead(SheetError::MissingHeader),
            PipelineError::Storage(std::io::Error::other("disk full")),
            PipelineError::Internal("task panicked".into()),
        ];
        for fault in faults {
            assert!(!fault.is_client_error(), "{fault} should be a server fault");
        }
        assert_eq!(
            PipelineError::RowCountMismatch { stage: "predict", expected: 2, found: 1 }
                .classify(),
            ErrorClass::Consistency
        );
    }

    #[test]
    fn content_format_message_includes_cause() {
        let err = PipelineError::ContentFormat(SheetError::MissingColumn("absences".into()));
        let message = err.to_string();
        assert!(message.starts_with("Processing failed!"));
        assert!(message.ends_with("Required column 'absences' is missing"));
    }

    #[test]
    fn variants_render_like_a_set() {
        assert_eq!(format_variants(&["xlsx".into()]), "{'xlsx'}");
        assert_eq!(format_variants(&["a".into(), "b".into()]), "{'a', 'b'}");
    }
}
