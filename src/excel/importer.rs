//! Excel importer implementation - Excel (.xlsx) → Workbook

use crate::backend::CellValue;
use crate::book::{Sheet, Workbook};
use crate::error::{SheetError, SheetResult};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::debug;

/// Reads an .xlsx file into an in-memory [`Workbook`]
pub struct ExcelImporter {
    path: std::path::PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Import every worksheet, keeping sheet order
    pub fn import(&self) -> SheetResult<Workbook> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)
            .map_err(|e| SheetError::Import(format!("Failed to open Excel file: {}", e)))?;

        let mut book = Workbook::new();
        let sheet_names = workbook.sheet_names().to_vec();

        for sheet_name in sheet_names {
            let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
                SheetError::Import(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;
            book.add_sheet(self.process_sheet(&sheet_name, &range));
        }

        Ok(book)
    }

    fn process_sheet(&self, sheet_name: &str, range: &Range<Data>) -> Sheet {
        let mut sheet = Sheet::new(sheet_name);
        // used_cells are relative to the range start
        let (row0, col0) = range.start().unwrap_or((0, 0));

        for (r, c, data) in range.used_cells() {
            let value = to_cell_value(data);
            if value.is_empty() {
                continue;
            }
            let row = row0 + r as u32 + 1;
            let col = col0 + c as u32 + 1;
            sheet.set_cell(row, col, value);
        }

        debug!(sheet = sheet_name, rows = sheet.max_row(), "imported sheet");
        sheet
    }
}

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(n) => CellValue::Int(*n),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match from_excel_serial(dt.as_f64()) {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Excel serial date to a datetime, rounded to the second.
pub(crate) fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::try_seconds(seconds)?)
}
