//! Excel persistence for the in-memory workbook
//!
//! - Export: Workbook → .xlsx (values, widths, styles, data validations)
//! - Import: .xlsx → Workbook (values; date cells become datetimes)

mod exporter;
mod importer;

pub use exporter::ExcelExporter;
pub use importer::ExcelImporter;
