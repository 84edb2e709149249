//! Fixtures shared by the pipeline and API tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_xlsxwriter::Workbook;

use super::features::SpreadsheetFeatureExtractor;
use super::gatekeeper::FormatGatekeeper;
use super::orchestrator::Pipeline;
use super::predictor::{Estimator, ObliviousTree, Split, TrainedModel};
use super::records::SpreadsheetRecordReader;
use super::staging::UploadStorage;

/// Feature columns of [`sample_model`].
pub(crate) const FEATURES: [&str; 2] = ["absences", "avg_grade"];

pub(crate) const STUDENT_HEADERS: [&str; 5] =
    ["Номер ЛД", "Учебный год", "Полугодие", "absences", "avg_grade"];

pub(crate) enum Cell {
    Num(f64),
    Text(String),
    Bool(bool),
    Blank,
}

/// Serialize a single-sheet workbook: header row, then `rows`.
pub(crate) fn workbook_bytes(headers: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Num(v) => {
                    sheet.write_number(r, c, *v).unwrap();
                }
                Cell::Text(s) => {
                    sheet.write_string(r, c, s.as_str()).unwrap();
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b).unwrap();
                }
                Cell::Blank => {}
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

pub(crate) fn write_workbook(
    dir: &Path,
    name: &str,
    headers: &[&str],
    rows: &[Vec<Cell>],
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, workbook_bytes(headers, rows)).unwrap();
    path
}

/// Student sheet rows: (identifier, academic year, term, absences, avg_grade).
pub(crate) fn students_bytes(rows: &[(i64, i64, i64, f64, f64)]) -> Vec<u8> {
    let rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|&(id, year, term, absences, grade)| {
            vec![
                Cell::Num(id as f64),
                Cell::Num(year as f64),
                Cell::Num(term as f64),
                Cell::Num(absences),
                Cell::Num(grade),
            ]
        })
        .collect();
    workbook_bytes(&STUDENT_HEADERS, &rows)
}

/// Student sheet with zeroed features.
pub(crate) fn write_students(dir: &Path, name: &str, rows: &[(i64, i64, i64)]) -> PathBuf {
    let rows: Vec<_> = rows
        .iter()
        .map(|&(id, year, term)| (id, year, term, 0.0, 0.0))
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, students_bytes(&rows)).unwrap();
    path
}

/// Two oblivious trees over [`FEATURES`]:
/// - tree 0: absences > 5 (bit 0), avg_grade > 3.5 (bit 1), leaves [0.0, 2.0, 0.5, 1.0]
/// - tree 1: absences > 10, leaves [0.0, 1.0]
pub(crate) fn sample_model() -> TrainedModel {
    TrainedModel {
        feature_names: FEATURES.iter().map(|s| s.to_string()).collect(),
        estimator: Estimator::ObliviousTrees {
            trees: vec![
                ObliviousTree {
                    splits: vec![
                        Split {
                            feature_index: 0,
                            border: 5.0,
                        },
                        Split {
                            feature_index: 1,
                            border: 3.5,
                        },
                    ],
                    leaf_values: vec![0.0, 2.0, 0.5, 1.0],
                },
                ObliviousTree {
                    splits: vec![Split {
                        feature_index: 0,
                        border: 10.0,
                    }],
                    leaf_values: vec![0.0, 1.0],
                },
            ],
        },
        scale: 1.0,
        bias: 0.0,
    }
}

/// Pipeline wired with the spreadsheet collaborators and [`sample_model`].
pub(crate) fn sample_pipeline(upload_dir: &Path) -> Pipeline {
    let model = sample_model();
    Pipeline::new(
        FormatGatekeeper::new(BTreeSet::from(["xlsx".to_string()])),
        UploadStorage::new(upload_dir),
        Arc::new(SpreadsheetFeatureExtractor::new(model.feature_names.clone())),
        Arc::new(SpreadsheetRecordReader::default()),
        Arc::new(model),
    )
}
