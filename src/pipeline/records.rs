//! Raw record reader: recovers business identifiers from the stored workbook.
//!
//! Runs over the same file the feature extractor used, but with its own
//! schema: only the identifier, academic year and term columns matter here,
//! and their values are carried to the response verbatim.

use std::path::Path;

use calamine::Data;
use serde::Serialize;

use super::sheet::{cell, open_first_sheet, SheetError};

/// A cell value passed through to the response unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

/// Largest integer an f64 represents exactly (2^53).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl From<&Data> for Scalar {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => Scalar::Null,
            Data::Int(i) => Scalar::Int(*i),
            // Excel stores every number as a float; whole values read back as integers.
            Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => {
                Scalar::Int(*f as i64)
            }
            Data::Float(f) => Scalar::Float(*f),
            Data::Bool(b) => Scalar::Bool(*b),
            Data::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

/// Identifying fields of one input row.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContext {
    pub identifier: Scalar,
    pub academic_year: Scalar,
    pub term: Scalar,
}

/// Header names of the context columns.
#[derive(Debug, Clone)]
pub struct RecordColumns {
    pub identifier: String,
    pub academic_year: String,
    pub term: String,
}

impl Default for RecordColumns {
    fn default() -> Self {
        Self {
            identifier: "Номер ЛД".into(),
            academic_year: "Учебный год".into(),
            term: "Полугодие".into(),
        }
    }
}

/// Reads record context rows from a stored upload, in file order.
pub trait RecordReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<RecordContext>, SheetError>;
}

pub struct SpreadsheetRecordReader {
    columns: RecordColumns,
}

impl SpreadsheetRecordReader {
    pub fn new(columns: RecordColumns) -> Self {
        Self { columns }
    }
}

impl Default for SpreadsheetRecordReader {
    fn default() -> Self {
        Self::new(RecordColumns::default())
    }
}

impl RecordReader for SpreadsheetRecordReader {
    fn read(&self, path: &Path) -> Result<Vec<RecordContext>, SheetError> {
        let sheet = open_first_sheet(path)?;
        let id_col = sheet.column_index(&self.columns.identifier)?;
        let year_col = sheet.column_index(&self.columns.academic_year)?;
        let term_col = sheet.column_index(&self.columns.term)?;

        Ok(sheet
            .data_rows()
            .map(|(_, cells)| RecordContext {
                identifier: Scalar::from(cell(cells, id_col)),
                academic_year: Scalar::from(cell(cells, year_col)),
                term: Scalar::from(cell(cells, term_col)),
            })
            .collect())
    }
}
