//! Per-request pipeline run.
//!
//! ```text
//! Received → Validated → Stored → Extracted → Predicted → Assembled → Released
//!    │                      │
//!    └→ Rejected (client)   └→ Rejected (content format) / Faulted (server)
//! ```
//!
//! Every path out of `Stored` releases the stored file: explicitly on normal
//! return, through [`StoredFile`]'s destructor when a collaborator panics.

use std::sync::Arc;

use super::assemble::{assemble, ResultRecord};
use super::features::FeatureExtractor;
use super::gatekeeper::FormatGatekeeper;
use super::predictor::Predictor;
use super::records::RecordReader;
use super::staging::{StoredFile, UploadStorage};
use super::{PipelineError, UploadRequest};

/// The upload pipeline with its collaborators injected at startup.
///
/// Cheap to clone; every request shares the same read-only collaborators.
#[derive(Clone)]
pub struct Pipeline {
    gatekeeper: FormatGatekeeper,
    storage: UploadStorage,
    extractor: Arc<dyn FeatureExtractor>,
    reader: Arc<dyn RecordReader>,
    predictor: Arc<dyn Predictor>,
}

impl Pipeline {
    pub fn new(
        gatekeeper: FormatGatekeeper,
        storage: UploadStorage,
        extractor: Arc<dyn FeatureExtractor>,
        reader: Arc<dyn RecordReader>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            gatekeeper,
            storage,
            extractor,
            reader,
            predictor,
        }
    }

    pub fn gatekeeper(&self) -> &FormatGatekeeper {
        &self.gatekeeper
    }

    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }

    /// Run one upload to completion. Blocking; call from a blocking context.
    pub fn run(&self, upload: UploadRequest) -> Result<Vec<ResultRecord>, PipelineError> {
        self.gatekeeper.check(&upload.filename)?;

        let stored = self.storage.store(&upload.filename, &upload.bytes)?;
        let span = tracing::info_span!("upload", request_id = %stored.key());
        let _entered = span.enter();

        tracing::info!(
            filename = %upload.filename,
            size = upload.bytes.len(),
            "Processing upload"
        );

        let outcome = self.process(&stored);

        if let Err(e) = stored.release() {
            // The startup orphan sweep picks the file up if it survives this.
            tracing::error!(error = %e, "Failed to release stored upload");
        }

        match &outcome {
            Ok(results) => tracing::info!(rows = results.len(), "Upload processed"),
            Err(e) if e.is_client_error() => tracing::info!(error = %e, "Upload rejected"),
            Err(e) => tracing::error!(error = %e, class = ?e.classify(), "Upload faulted"),
        }
        outcome
    }

    fn process(&self, stored: &StoredFile) -> Result<Vec<ResultRecord>, PipelineError> {
        let features = self
            .extractor
            .extract(stored.path())
            .map_err(PipelineError::ContentFormat)?;

        let records = self
            .reader
            .read(stored.path())
            .map_err(PipelineError::RecordRead)?;
        ensure_rows("read", features.n_rows(), records.len())?;

        let predictions = self.predictor.predict(&features)?;
        ensure_rows("predict", features.n_rows(), predictions.len())?;

        assemble(records, predictions)
    }
}

fn ensure_rows(stage: &'static str, expected: usize, found: usize) -> Result<(), PipelineError> {
    if expected != found {
        return Err(PipelineError::RowCountMismatch {
            stage,
            expected,
            found,
        });
    }
    Ok(())
}
