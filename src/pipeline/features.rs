//! Feature extraction: stored workbook → numeric feature table.

use std::path::Path;

use calamine::Data;
use ndarray::{Array2, ArrayView2};

use super::sheet::{cell, open_first_sheet, SheetError};

/// Rectangular model input: one row per record, columns in predictor order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    /// Build a table from row-major values. Every row must have `columns.len()` entries.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Self {
        let width = columns.len();
        let values = Array2::from_shape_fn((rows.len(), width), |(i, j)| {
            rows[i].get(j).copied().unwrap_or(f64::NAN)
        });
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }
}

/// Converts a stored upload into a feature table.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<FeatureTable, SheetError>;
}

/// Selects the model's feature columns from the first worksheet by header name.
pub struct SpreadsheetFeatureExtractor {
    columns: Vec<String>,
}

impl SpreadsheetFeatureExtractor {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl FeatureExtractor for SpreadsheetFeatureExtractor {
    fn extract(&self, path: &Path) -> Result<FeatureTable, SheetError> {
        let sheet = open_first_sheet(path)?;

        // Resolve every column up front so a missing one is reported before row parsing.
        let indices = self
            .columns
            .iter()
            .map(|name| sheet.column_index(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for (row_number, cells) in sheet.data_rows() {
            let row = indices
                .iter()
                .zip(&self.columns)
                .map(|(&index, name)| numeric_value(cell(cells, index), name, row_number))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        tracing::debug!(
            rows = rows.len(),
            columns = self.columns.len(),
            "Feature table extracted"
        );

        Ok(FeatureTable::from_rows(self.columns.clone(), &rows))
    }
}

/// Numeric value of a feature cell. Blank cells become NaN (missing value).
fn numeric_value(cell: &Data, column: &str, row: u32) -> Result<f64, SheetError> {
    match cell {
        Data::Empty => Ok(f64::NAN),
        Data::Int(i) => Ok(*i as f64),
        Data::Float(f) => Ok(*f),
        Data::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Ok(dt.as_f64()),
        Data::String(s) if s.trim().is_empty() => Ok(f64::NAN),
        Data::String(s) => parse_numeric_text(s).ok_or_else(|| SheetError::NonNumeric {
            column: column.to_string(),
            row,
            value: s.clone(),
        }),
        Data::Error(e) => Err(SheetError::ErrorCell {
            column: column.to_string(),
            row,
            value: e.to_string(),
        }),
        other => Err(SheetError::NonNumeric {
            column: column.to_string(),
            row,
            value: other.to_string(),
        }),
    }
}

/// Parse finite numbers typed as text. Accepts a single decimal comma ("3,5")
/// but not thousands separators ("1,234" is ambiguous) or "inf"/"NaN".
fn parse_numeric_text(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let value = if trimmed.contains(',') {
        let (whole, fraction) = trimmed.split_once(',')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let unsigned = whole.strip_prefix(['-', '+']).unwrap_or(whole);
        if !digits(unsigned) || !digits(fraction) || fraction.len() == 3 {
            return None;
        }
        format!("{whole}.{fraction}").parse::<f64>().ok()?
    } else {
        trimmed.parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{write_workbook, Cell};

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_columns_in_requested_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(
            dir.path(),
            "students.xlsx",
            &["id", "absences", "avg_grade"],
            &[
                vec![Cell::Num(101.0), Cell::Num(4.0), Cell::Num(3.5)],
                vec![Cell::Num(102.0), Cell::Num(0.0), Cell::Num(4.8)],
            ],
        );

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["avg_grade", "absences"]));
        let table = extractor.extract(&path).unwrap();

        assert_eq!(table.columns(), &columns(&["avg_grade", "absences"])[..]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.values()[[0, 0]], 3.5);
        assert_eq!(table.values()[[0, 1]], 4.0);
        assert_eq!(table.values()[[1, 0]], 4.8);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(
            dir.path(),
            "broken.xlsx",
            &["id"],
            &[vec![Cell::Num(1.0)]],
        );

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["absences"]));
        let err = extractor.extract(&path).unwrap_err();
        assert!(err.to_string().contains("'absences'"));
    }

    #[test]
    fn text_in_numeric_column_names_row_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(
            dir.path(),
            "text.xlsx",
            &["absences"],
            &[vec![Cell::Num(1.0)], vec![Cell::Text("many".into())]],
        );

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["absences"]));
        match extractor.extract(&path) {
            Err(SheetError::NonNumeric { column, row, value }) => {
                assert_eq!(column, "absences");
                assert_eq!(row, 3);
                assert_eq!(value, "many");
            }
            other => panic!("expected NonNumeric, got {other:?}"),
        }
    }

    #[test]
    fn blanks_and_numeric_text_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(
            dir.path(),
            "mixed.xlsx",
            &["a", "b", "c"],
            &[vec![Cell::Text("3,5".into()), Cell::Blank, Cell::Bool(true)]],
        );

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["a", "b", "c"]));
        let table = extractor.extract(&path).unwrap();
        assert_eq!(table.values()[[0, 0]], 3.5);
        assert!(table.values()[[0, 1]].is_nan());
        assert_eq!(table.values()[[0, 2]], 1.0);
    }

    #[test]
    fn non_finite_and_thousands_text_are_rejected() {
        for text in ["inf", "-infinity", "NaN", "1,234", "1,5,0", "2.5,1"] {
            let dir = tempfile::tempdir().unwrap();
            let path = write_workbook(
                dir.path(),
                "odd.xlsx",
                &["absences"],
                &[vec![Cell::Text(text.into())]],
            );

            let extractor = SpreadsheetFeatureExtractor::new(columns(&["absences"]));
            match extractor.extract(&path) {
                Err(SheetError::NonNumeric { value, .. }) => assert_eq!(value, text),
                other => panic!("{text:?} should be non-numeric, got {other:?}"),
            }
        }
    }

    #[test]
    fn numeric_text_forms() {
        assert_eq!(parse_numeric_text(" 4.25 "), Some(4.25));
        assert_eq!(parse_numeric_text("-3,5"), Some(-3.5));
        assert_eq!(parse_numeric_text("12,75"), Some(12.75));
        assert_eq!(parse_numeric_text(",5"), None);
        assert_eq!(parse_numeric_text("1e400"), None);
    }

    #[test]
    fn whitespace_text_is_a_missing_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(
            dir.path(),
            "spaces.xlsx",
            &["absences", "avg_grade"],
            &[vec![Cell::Text("   ".into()), Cell::Num(4.0)]],
        );

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["absences", "avg_grade"]));
        let table = extractor.extract(&path).unwrap();
        assert!(table.values()[[0, 0]].is_nan());
        assert_eq!(table.values()[[0, 1]], 4.0);
    }

    #[test]
    fn header_only_sheet_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path(), "header.xlsx", &["a"], &[]);

        let extractor = SpreadsheetFeatureExtractor::new(columns(&["a"]));
        let table = extractor.extract(&path).unwrap();
        assert_eq!(table.n_rows(), 0);
        assert_eq!(table.columns().len(), 1);
    }

    #[test]
    fn from_rows_pads_short_rows_with_nan() {
        let table = FeatureTable::from_rows(columns(&["a", "b"]), &[vec![1.0]]);
        assert_eq!(table.values()[[0, 0]], 1.0);
        assert!(table.values()[[0, 1]].is_nan());
    }
}
