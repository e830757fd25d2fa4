//! In-memory workbook
//!
//! The default [`SheetBackend`]: ordered sheets of sparse cells plus the
//! column widths, styles and validations recorded against them. Persisted
//! to and loaded from `.xlsx` through the `excel` module.

use crate::backend::{CellStyle, CellValue, RowCursor, SheetBackend, Validation};
use crate::coords::CellRange;
use crate::error::{SheetError, SheetResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
    widths: BTreeMap<u32, f64>,
    styles: Vec<(CellRange, CellStyle)>,
    validations: Vec<(CellRange, Validation)>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Rendered text of a cell; empty when unset.
    pub fn text(&self, row: u32, col: u32) -> String {
        self.cell(row, col).map(CellValue::render).unwrap_or_default()
    }

    pub fn set_cell(&mut self, row: u32, col: u32, value: CellValue) {
        if value == CellValue::Empty {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> {
        self.cells.iter().map(|(&(r, c), v)| (r, c, v))
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|&(r, _)| r).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|&(_, c)| c).max().unwrap_or(0)
    }

    /// One row as text, trailing empty cells trimmed.
    pub fn row(&self, row: u32) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (&(_, col), value) in self.cells.range((row, 0)..=(row, u32::MAX)) {
            let idx = (col - 1) as usize;
            if out.len() <= idx {
                out.resize(idx + 1, String::new());
            }
            out[idx] = value.render();
        }
        while out.last().is_some_and(|s| s.is_empty()) {
            out.pop();
        }
        out
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        (1..=self.max_row()).map(|r| self.row(r)).collect()
    }

    /// Column-major view, trailing empty cells of each column trimmed.
    pub fn cols(&self) -> Vec<Vec<String>> {
        let max_row = self.max_row();
        (1..=self.max_col())
            .map(|col| {
                let mut column: Vec<String> = (1..=max_row).map(|row| self.text(row, col)).collect();
                while column.last().is_some_and(|s| s.is_empty()) {
                    column.pop();
                }
                column
            })
            .collect()
    }

    pub fn width(&self, col: u32) -> Option<f64> {
        self.widths.get(&col).copied()
    }

    pub fn widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.widths.iter().map(|(&c, &w)| (c, w))
    }

    pub fn styles(&self) -> &[(CellRange, CellStyle)] {
        &self.styles
    }

    /// Every style covering the cell, applied in registration order.
    pub fn style_at(&self, row: u32, col: u32) -> Option<CellStyle> {
        let mut covering = self.styles.iter().filter(|(r, _)| r.contains(col, row));
        let (_, first) = covering.next()?;
        let mut style = first.clone();
        for (_, next) in covering {
            style.overlay(next);
        }
        Some(style)
    }

    pub fn validations(&self) -> &[(CellRange, Validation)] {
        &self.validations
    }

    pub fn set_width(&mut self, col: u32, width: f64) {
        self.widths.insert(col, width);
    }

    pub fn add_style(&mut self, range: CellRange, style: CellStyle) {
        self.styles.push((range, style));
    }

    pub fn add_validation(&mut self, range: CellRange, rule: Validation) {
        self.validations.push((range, rule));
    }

    fn insert_cols(&mut self, before: u32, count: u32) {
        let shift = |c: u32| if c >= before { c + count } else { c };

        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .map(|((r, c), v)| ((r, shift(c)), v))
            .collect();

        let widths = std::mem::take(&mut self.widths);
        self.widths = widths.into_iter().map(|(c, w)| (shift(c), w)).collect();

        let ranges = self
            .styles
            .iter_mut()
            .map(|(r, _)| r)
            .chain(self.validations.iter_mut().map(|(r, _)| r));
        for range in ranges {
            range.first_col = shift(range.first_col);
            range.last_col = shift(range.last_col);
        }
    }
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an `.xlsx` file.
    pub fn open<P: AsRef<Path>>(path: P) -> SheetResult<Self> {
        let path = path.as_ref();
        let book = ExcelImporter::new(path).import()?;
        info!(path = %path.display(), sheets = book.sheets.len(), "opened workbook");
        Ok(book)
    }

    /// Loads `path` when it exists, else starts an empty workbook.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> SheetResult<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Writes the workbook as `.xlsx`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SheetResult<()> {
        let path = path.as_ref();
        ExcelExporter::new(self).export(path)?;
        info!(path = %path.display(), sheets = self.sheets.len(), "saved workbook");
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        match self.sheet_mut(&sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    fn require(&self, name: &str) -> SheetResult<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn require_mut(&mut self, name: &str) -> SheetResult<&mut Sheet> {
        self.sheet_mut(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    /// Rendered text of a cell, empty when unset or the sheet is missing.
    pub fn cell_text(&self, sheet: &str, row: u32, col: u32) -> String {
        self.sheet(sheet)
            .map(|s| s.text(row, col))
            .unwrap_or_default()
    }

    /// Row-major rendered view of a sheet.
    pub fn rows_of(&self, sheet: &str) -> SheetResult<Vec<Vec<String>>> {
        Ok(self.require(sheet)?.rows())
    }

    /// Column-major rendered view of a sheet.
    pub fn cols(&self, sheet: &str) -> SheetResult<Vec<Vec<String>>> {
        Ok(self.require(sheet)?.cols())
    }
}

impl SheetBackend for Workbook {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet(sheet).is_some()
    }

    fn ensure_sheet(&mut self, sheet: &str) -> SheetResult<()> {
        if !self.has_sheet(sheet) {
            self.sheets.push(Sheet::new(sheet));
        }
        Ok(())
    }

    fn write_cell(&mut self, sheet: &str, row: u32, col: u32, value: CellValue) -> SheetResult<()> {
        if row == 0 || col == 0 {
            return Err(SheetError::InvalidCellRange(format!("R{row}C{col}")));
        }
        self.require_mut(sheet)?.set_cell(row, col, value);
        Ok(())
    }

    fn rows(&self, sheet: &str) -> SheetResult<RowCursor<'_>> {
        let sheet = self.require(sheet)?;
        Ok(RowCursor::new((1..=sheet.max_row()).map(move |r| (r, sheet.row(r)))))
    }

    fn insert_cols(&mut self, sheet: &str, before: u32, count: u32) -> SheetResult<()> {
        if before == 0 {
            return Err(SheetError::InvalidCellRange(format!("column {before}")));
        }
        self.require_mut(sheet)?.insert_cols(before, count);
        Ok(())
    }

    fn set_col_width(&mut self, sheet: &str, col: u32, width: f64) -> SheetResult<()> {
        self.require_mut(sheet)?.set_width(col, width);
        Ok(())
    }

    fn set_style(&mut self, sheet: &str, range: CellRange, style: &CellStyle) -> SheetResult<()> {
        self.require_mut(sheet)?.add_style(range, style.clone());
        Ok(())
    }

    fn add_validation(&mut self, sheet: &str, sqref: &str, rule: &Validation) -> SheetResult<()> {
        let range = CellRange::parse(sqref)?;
        self.require_mut(sheet)?.add_validation(range, rule.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workbook {
        let mut book = Workbook::new();
        book.ensure_sheet("Sheet1").unwrap();
        book.write_cell("Sheet1", 1, 1, "a".into()).unwrap();
        book.write_cell("Sheet1", 1, 2, "b".into()).unwrap();
        book.write_cell("Sheet1", 3, 3, CellValue::Int(7)).unwrap();
        book
    }

    #[test]
    fn test_rows_are_dense_and_trimmed() {
        let book = sample();
        let rows: Vec<(u32, Vec<String>)> = book.rows("Sheet1").unwrap().collect();
        assert_eq!(
            rows,
            vec![
                (1, vec!["a".to_string(), "b".to_string()]),
                (2, vec![]),
                (3, vec![String::new(), String::new(), "7".to_string()]),
            ]
        );
    }

    #[test]
    fn test_cols_view() {
        let book = sample();
        assert_eq!(
            book.cols("Sheet1").unwrap(),
            vec![
                vec!["a".to_string()],
                vec!["b".to_string()],
                vec![String::new(), String::new(), "7".to_string()],
            ]
        );
    }

    #[test]
    fn test_insert_cols_shifts_content() {
        let mut book = sample();
        book.set_col_width("Sheet1", 2, 12.0).unwrap();
        book.set_style("Sheet1", CellRange::new(2, 1, 3, 3), &CellStyle::default())
            .unwrap();
        book.insert_cols("Sheet1", 2, 2).unwrap();

        let sheet = book.sheet("Sheet1").unwrap();
        assert_eq!(sheet.text(1, 1), "a");
        assert_eq!(sheet.text(1, 2), "");
        assert_eq!(sheet.text(1, 4), "b");
        assert_eq!(sheet.text(3, 5), "7");
        assert_eq!(sheet.width(4), Some(12.0));
        assert_eq!(sheet.styles()[0].0, CellRange::new(4, 1, 5, 3));
    }

    #[test]
    fn test_missing_sheet() {
        let book = Workbook::new();
        assert!(matches!(
            book.rows("Nope"),
            Err(SheetError::SheetNotFound(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_validation_range_parsed() {
        let mut book = sample();
        let rule = Validation::List {
            values: vec!["x".to_string()],
        };
        book.add_validation("Sheet1", "A2:A5", &rule).unwrap();
        assert!(book.add_validation("Sheet1", "bogus", &rule).is_err());
        let sheet = book.sheet("Sheet1").unwrap();
        assert_eq!(sheet.validations(), &[(CellRange::new(1, 2, 1, 5), rule)]);
    }
}
