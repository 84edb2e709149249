//! Workbook access shared by the feature extractor and the record reader.
//!
//! Both readers open the same stored file independently; this module only
//! owns the mechanics (first worksheet, header row, data row numbering) so
//! the two stay in agreement about which rows exist and in what order.

use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use thiserror::Error;

/// Failure to interpret an uploaded workbook.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Cannot open workbook: {0}")]
    Open(String),

    #[error("Workbook contains no worksheets")]
    NoWorksheet,

    #[error("Worksheet has no header row")]
    MissingHeader,

    #[error("Required column '{0}' is missing")]
    MissingColumn(String),

    #[error("Column '{column}' has non-numeric value {value:?} in row {row}")]
    NonNumeric {
        column: String,
        row: u32,
        value: String,
    },

    #[error("Column '{column}' has an error cell ({value}) in row {row}")]
    ErrorCell {
        column: String,
        row: u32,
        value: String,
    },
}

/// First worksheet of a workbook, split into header and data rows.
pub struct Sheet {
    header: Vec<String>,
    range: Range<Data>,
}

/// Open the first worksheet of the `.xlsx` workbook at `path`.
pub fn open_first_sheet(path: &Path) -> Result<Sheet, SheetError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| SheetError::Open(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)?
        .map_err(|e| SheetError::Open(e.to_string()))?;

    let header = range
        .rows()
        .next()
        .ok_or(SheetError::MissingHeader)?
        .iter()
        .map(header_label)
        .collect::<Vec<_>>();

    if header.iter().all(String::is_empty) {
        return Err(SheetError::MissingHeader);
    }

    Ok(Sheet { header, range })
}

impl Sheet {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Position of the column titled `name` (first match, exact after trimming).
    pub fn column_index(&self, name: &str) -> Result<usize, SheetError> {
        let wanted = name.trim();
        self.header
            .iter()
            .position(|label| label == wanted)
            .ok_or_else(|| SheetError::MissingColumn(name.to_string()))
    }

    /// Data rows in file order, paired with their 1-based spreadsheet row number.
    /// Rows where every cell is blank are skipped.
    pub fn data_rows(&self) -> impl Iterator<Item = (u32, &[Data])> + '_ {
        let first_row = self.range.start().map(|(row, _)| row).unwrap_or(0);
        self.range
            .rows()
            .enumerate()
            .skip(1)
            .filter(|(_, cells)| !cells.iter().all(is_blank))
            .map(move |(offset, cells)| (first_row + offset as u32 + 1, cells))
    }
}

fn header_label(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

pub(crate) fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Cell at `index`, treating short rows as padded with empty cells.
pub(crate) fn cell(cells: &[Data], index: usize) -> &Data {
    cells.get(index).unwrap_or(&Data::Empty)
}
