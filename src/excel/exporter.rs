//! Excel exporter implementation - Workbook → Excel (.xlsx)

use crate::backend::{CellStyle, CellValue, Validation};
use crate::book::{Sheet, Workbook};
use crate::coords::CellRange;
use crate::error::{SheetError, SheetResult};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{
    Color, DataValidation, DataValidationRule, Format, FormatBorder, Formula,
    Workbook as XlsxWorkbook, Worksheet,
};
use std::path::Path;
use tracing::debug;

/// Number format for date cells without a style of their own.
const DEFAULT_DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
/// Largest integer magnitude an xlsx number cell (an f64) holds exactly.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Writes an in-memory [`Workbook`] as an .xlsx file
pub struct ExcelExporter<'a> {
    book: &'a Workbook,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(book: &'a Workbook) -> Self {
        Self { book }
    }

    /// Export the workbook to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> SheetResult<()> {
        let mut workbook = XlsxWorkbook::new();

        for sheet in self.book.sheets() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(|e| {
                SheetError::Export(format!("Failed to set sheet name '{}': {}", sheet.name, e))
            })?;
            self.export_sheet(worksheet, sheet)?;
        }

        workbook
            .save(output_path)
            .map_err(|e| SheetError::Export(format!("Failed to save workbook: {}", e)))?;
        Ok(())
    }

    fn export_sheet(&self, worksheet: &mut Worksheet, sheet: &Sheet) -> SheetResult<()> {
        for (row, col, value) in sheet.cells() {
            let style = sheet.style_at(row, col);
            write_cell(worksheet, row, col, value, style.as_ref())?;
        }

        // styled cells without a value still carry their format
        for (range, _) in sheet.styles() {
            for row in range.first_row..=range.last_row {
                for col in range.first_col..=range.last_col {
                    if sheet.cell(row, col).is_some() {
                        continue;
                    }
                    if let Some(style) = sheet.style_at(row, col) {
                        let (r, c) = to_xlsx(row, col)?;
                        worksheet
                            .write_blank(r, c, &to_format(&style))
                            .map_err(|e| {
                                SheetError::Export(format!("Failed to style blank cell: {}", e))
                            })?;
                    }
                }
            }
        }

        for (col, width) in sheet.widths() {
            let (_, c) = to_xlsx(1, col)?;
            worksheet
                .set_column_width(c, width)
                .map_err(|e| SheetError::Export(format!("Failed to set column width: {}", e)))?;
        }

        for (range, rule) in sheet.validations() {
            add_validation(worksheet, range, rule)?;
        }

        debug!(
            sheet = %sheet.name,
            rows = sheet.max_row(),
            cols = sheet.max_col(),
            "exported sheet"
        );
        Ok(())
    }
}

/// 1-based `(row, col)` to rust_xlsxwriter's 0-based coordinates.
fn to_xlsx(row: u32, col: u32) -> SheetResult<(u32, u16)> {
    let c = u16::try_from(col.saturating_sub(1))
        .map_err(|_| SheetError::Export(format!("Column {} is out of range", col)))?;
    Ok((row.saturating_sub(1), c))
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if style.bold {
        format = format.set_bold();
    }
    if style.italic {
        format = format.set_italic();
    }
    if style.wrap {
        format = format.set_text_wrap();
    }
    if style.border {
        format = format.set_border(FormatBorder::Thin);
    }
    if let Some(rgb) = style.font_color {
        format = format.set_font_color(Color::RGB(rgb));
    }
    if let Some(rgb) = style.fill_color {
        format = format.set_background_color(Color::RGB(rgb));
    }
    if let Some(num_format) = &style.num_format {
        format = format.set_num_format(num_format);
    }
    format
}

/// Excel serial date (days since 1899-12-30, fraction for the time).
pub(crate) fn excel_serial(dt: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_seconds() as f64 / 86_400.0
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u32,
    value: &CellValue,
    style: Option<&CellStyle>,
) -> SheetResult<()> {
    let (r, c) = to_xlsx(row, col)?;
    let format = style.map(to_format);
    let err = |e: rust_xlsxwriter::XlsxError| {
        SheetError::Export(format!("Failed to write cell R{}C{}: {}", row, col, e))
    };

    match (value, format) {
        (CellValue::Empty, Some(format)) => {
            worksheet.write_blank(r, c, &format).map_err(err)?;
        }
        (CellValue::Empty, None) => {}
        (CellValue::Text(s), format) => {
            write_text(worksheet, r, c, s, format.as_ref()).map_err(err)?;
        }
        // integers past 2^53 would round as numbers; they are kept as text
        (CellValue::Int(n), format) if n.unsigned_abs() > MAX_EXACT_INT => {
            write_text(worksheet, r, c, &n.to_string(), format.as_ref()).map_err(err)?;
        }
        (CellValue::UInt(n), format) if *n > MAX_EXACT_INT => {
            write_text(worksheet, r, c, &n.to_string(), format.as_ref()).map_err(err)?;
        }
        (CellValue::Int(n), format) => {
            write_number(worksheet, r, c, *n as f64, format.as_ref()).map_err(err)?;
        }
        (CellValue::UInt(n), format) => {
            write_number(worksheet, r, c, *n as f64, format.as_ref()).map_err(err)?;
        }
        (CellValue::Float(n), format) => {
            write_number(worksheet, r, c, *n, format.as_ref()).map_err(err)?;
        }
        (CellValue::Bool(b), Some(format)) => {
            worksheet.write_boolean_with_format(r, c, *b, &format).map_err(err)?;
        }
        (CellValue::Bool(b), None) => {
            worksheet.write_boolean(r, c, *b).map_err(err)?;
        }
        (CellValue::DateTime(dt), format) => {
            // a date needs a number format to show as a date
            let has_num_format = style.is_some_and(|s| s.num_format.is_some());
            let format = match format {
                Some(format) if has_num_format => format,
                Some(format) => format.set_num_format(DEFAULT_DATETIME_NUM_FORMAT),
                None => Format::new().set_num_format(DEFAULT_DATETIME_NUM_FORMAT),
            };
            worksheet
                .write_number_with_format(r, c, excel_serial(dt), &format)
                .map_err(err)?;
        }
    }
    Ok(())
}

fn write_text(
    worksheet: &mut Worksheet,
    r: u32,
    c: u16,
    s: &str,
    format: Option<&Format>,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    match format {
        Some(format) => worksheet.write_string_with_format(r, c, s, format)?,
        None => worksheet.write_string(r, c, s)?,
    };
    Ok(())
}

fn write_number(
    worksheet: &mut Worksheet,
    r: u32,
    c: u16,
    n: f64,
    format: Option<&Format>,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    match format {
        Some(format) => worksheet.write_number_with_format(r, c, n, format)?,
        None => worksheet.write_number(r, c, n)?,
    };
    Ok(())
}

fn add_validation(worksheet: &mut Worksheet, range: &CellRange, rule: &Validation) -> SheetResult<()> {
    let validation = match rule {
        Validation::WholeNumber { min, max } => {
            DataValidation::new().allow_whole_number(DataValidationRule::Between(*min, *max))
        }
        Validation::Decimal { min, max } => {
            DataValidation::new().allow_decimal_number(DataValidationRule::Between(*min, *max))
        }
        Validation::List { values } => DataValidation::new()
            .allow_list_strings(values.as_slice())
            .map_err(|e| SheetError::Export(format!("Invalid validation list: {}", e)))?,
        Validation::ListSource { range } => {
            DataValidation::new().allow_list_formula(Formula::new(range.as_str()))
        }
    };

    let (first_row, first_col) = to_xlsx(range.first_row, range.first_col)?;
    let (last_row, last_col) = to_xlsx(range.last_row, range.last_col)?;
    worksheet
        .add_data_validation(first_row, first_col, last_row, last_col, &validation)
        .map_err(|e| SheetError::Export(format!("Failed to add data validation {}: {}", range, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_serial() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(excel_serial(&dt), 45292.5);
    }

    #[test]
    fn test_to_xlsx_is_zero_based() {
        assert_eq!(to_xlsx(1, 1).unwrap(), (0, 0));
        assert_eq!(to_xlsx(10, 3).unwrap(), (9, 2));
        assert!(to_xlsx(1, 70_000).is_err());
    }
}
