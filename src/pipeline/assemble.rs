use serde::Serialize;

use super::records::{RecordContext, Scalar};
use super::PipelineError;

/// One row of the response. Keys follow the input spreadsheet headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(rename = "Номер ЛД")]
    pub identifier: Scalar,
    #[serde(rename = "Учебный год")]
    pub academic_year: Scalar,
    #[serde(rename = "Полугодие")]
    pub term: Scalar,
    #[serde(rename = "Ожидаемое число двоек")]
    pub predicted_count: f64,
}

/// Zip record context with predictions index-wise, preserving order.
pub fn assemble(
    records: Vec<RecordContext>,
    predictions: Vec<f64>,
) -> Result<Vec<ResultRecord>, PipelineError> {
    if records.len() != predictions.len() {
        return Err(PipelineError::RowCountMismatch {
            stage: "assemble",
            expected: records.len(),
            found: predictions.len(),
        });
    }

    Ok(records
        .into_iter()
        .zip(predictions)
        .map(|(record, predicted_count)| ResultRecord {
            identifier: record.identifier,
            academic_year: record.academic_year,
            term: record.term,
            predicted_count,
        })
        .collect())
}
