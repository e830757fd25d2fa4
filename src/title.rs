//! Title index
//!
//! Tracks where each logical field lives in the sheet: its column block,
//! the highest row written at every position of that block, and the widest
//! value seen there. Columns of one field are always contiguous; growing a
//! field inserts backend columns right after its block and shifts every
//! field to the right of it.

use crate::backend::{CellValue, SheetBackend, Validation};
use crate::coords::{cell_name, sheet_prefix, CellRange};
use crate::error::{BoxError, SheetError, SheetResult};
use std::collections::HashMap;
use tracing::debug;

/// One logical field and its column block.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleEntry {
    pub name: String,
    columns: Vec<u32>,
    /// Per position: widest value written.
    widths: Vec<f64>,
    /// Per position: highest row written, starting at the title row.
    rows: Vec<u32>,
}

impl TitleEntry {
    fn new(name: &str, col: u32, title_row: u32) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![col],
            widths: vec![0.0],
            rows: vec![title_row],
        }
    }

    pub fn columns(&self) -> &[u32] {
        &self.columns
    }

    pub fn first_column(&self) -> u32 {
        self.columns[0]
    }

    pub fn last_column(&self) -> u32 {
        self.columns[self.columns.len() - 1]
    }

    /// Highest row written in the block's first column.
    pub fn highest_row(&self) -> u32 {
        self.rows[0]
    }

    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    fn position(&self, col: u32) -> Option<usize> {
        self.columns.iter().position(|&c| c == col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleIndex {
    sheet: String,
    title_row: u32,
    entries: Vec<TitleEntry>,
    index: HashMap<String, usize>,
}

impl TitleIndex {
    /// One column per name, left to right from column A.
    pub fn new<S: AsRef<str>>(sheet: &str, title_row: u32, names: &[S]) -> Self {
        let mut title = Self::empty(sheet, title_row);
        for name in names {
            let name = name.as_ref();
            if title.index.contains_key(name) {
                continue;
            }
            let col = title.entries.len() as u32 + 1;
            title.index.insert(name.to_string(), title.entries.len());
            title.entries.push(TitleEntry::new(name, col, title_row));
        }
        title
    }

    /// Builds the index from a header row as read from the sheet.
    ///
    /// Repeated names become one entry with several columns, in the order
    /// they appear. Blank header cells are not titles.
    pub fn from_header(
        sheet: &str,
        title_row: u32,
        header: &[String],
        conv: &dyn Fn(&str) -> String,
    ) -> Self {
        let mut title = Self::empty(sheet, title_row);
        for (i, raw) in header.iter().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let name = conv(raw);
            let col = i as u32 + 1;
            match title.index.get(&name) {
                Some(&idx) => {
                    let entry = &mut title.entries[idx];
                    entry.columns.push(col);
                    entry.widths.push(0.0);
                    entry.rows.push(title_row);
                }
                None => {
                    title.index.insert(name.clone(), title.entries.len());
                    title.entries.push(TitleEntry::new(&name, col, title_row));
                }
            }
        }
        title
    }

    fn empty(sheet: &str, title_row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            title_row,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn title_row(&self) -> u32 {
        self.title_row
    }

    pub fn first_data_row(&self) -> u32 {
        self.title_row + 1
    }

    pub fn entries(&self) -> &[TitleEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&TitleEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn columns(&self, name: &str) -> Option<&[u32]> {
        self.get(name).map(TitleEntry::columns)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn highest_row(&self, name: &str) -> Option<u32> {
        self.get(name).map(TitleEntry::highest_row)
    }

    /// Highest row written at column `col` of the field.
    pub fn highest_row_at(&self, name: &str, col: u32) -> Option<u32> {
        let entry = self.get(name)?;
        entry.position(col).map(|pos| entry.rows[pos])
    }

    /// Highest row written anywhere; the title row when nothing was.
    pub fn max_row(&self) -> u32 {
        self.entries
            .iter()
            .flat_map(|e| e.rows.iter().copied())
            .fold(self.title_row, u32::max)
    }

    fn entry_mut(&mut self, name: &str) -> SheetResult<&mut TitleEntry> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(SheetError::TitleNotFound {
                name: name.to_string(),
            }),
        }
    }

    pub fn write_titles(
        &self,
        backend: &mut dyn SheetBackend,
        conv: &dyn Fn(&str) -> String,
    ) -> SheetResult<()> {
        for entry in &self.entries {
            self.write_title(backend, &entry.name, conv)?;
        }
        Ok(())
    }

    /// Writes the title text into every column of the field's block.
    pub fn write_title(
        &self,
        backend: &mut dyn SheetBackend,
        name: &str,
        conv: &dyn Fn(&str) -> String,
    ) -> SheetResult<()> {
        let entry = self.get(name).ok_or_else(|| SheetError::TitleNotFound {
            name: name.to_string(),
        })?;
        let text = conv(name);
        for &col in &entry.columns {
            backend.write_cell(&self.sheet, self.title_row, col, CellValue::Text(text.clone()))?;
        }
        Ok(())
    }

    /// Makes sure the field owns at least `needed` columns and returns them.
    ///
    /// Missing columns are inserted in the backend right after the field's
    /// block; every column of any field beyond the block moves right.
    pub fn ensure_columns(
        &mut self,
        backend: &mut dyn SheetBackend,
        name: &str,
        needed: usize,
        conv: &dyn Fn(&str) -> String,
    ) -> SheetResult<Vec<u32>> {
        let title_row = self.title_row;
        let entry = self.entry_mut(name)?;
        let have = entry.columns.len();
        if have >= needed {
            return Ok(entry.columns.clone());
        }

        let last = entry.last_column();
        let diff = (needed - have) as u32;
        backend.insert_cols(&self.sheet, last + 1, diff)?;

        for other in self.entries.iter_mut() {
            for col in other.columns.iter_mut() {
                if *col > last {
                    *col += diff;
                }
            }
        }

        let entry = self.entry_mut(name)?;
        for col in last + 1..=last + diff {
            entry.columns.push(col);
            entry.widths.push(0.0);
            entry.rows.push(title_row);
        }
        let columns = entry.columns.clone();

        debug!(title = name, from = have, to = needed, "grew title columns");
        self.write_title(backend, name, conv)?;
        Ok(columns)
    }

    /// Records a write at `(row, col)` and the width it needs, if any.
    pub fn mark_written(&mut self, name: &str, col: u32, row: u32, width: Option<f64>) {
        let Some(&i) = self.index.get(name) else {
            return;
        };
        let entry = &mut self.entries[i];
        let Some(pos) = entry.position(col) else {
            return;
        };
        entry.rows[pos] = entry.rows[pos].max(row);
        if let Some(width) = width {
            entry.widths[pos] = entry.widths[pos].max(width);
        }
    }

    /// Absolute range of the field's first column, from the first data row
    /// down to the highest row written there, e.g. `Sheet1!$A$2:$A$9`.
    ///
    /// Before anything is written the range is the single first data cell.
    pub fn sqref(&self, name: &str) -> SheetResult<String> {
        let entry = self.get(name).ok_or_else(|| SheetError::TitleNotFound {
            name: name.to_string(),
        })?;
        let col = entry.first_column();
        let start = self.first_data_row();
        let end = entry.highest_row().max(start);
        Ok(format!(
            "{}{}:{}",
            sheet_prefix(&self.sheet),
            cell_name(col, start, true),
            cell_name(col, end, true)
        ))
    }

    /// Cells covering the whole block of a field, title row included, down
    /// to the workspace's last written row.
    pub fn block_range(&self, name: &str) -> Option<CellRange> {
        let entry = self.get(name)?;
        Some(CellRange::new(
            entry.first_column(),
            self.title_row,
            entry.last_column(),
            self.max_row(),
        ))
    }

    /// Registers a validation for each title the callback returns a rule for.
    pub fn apply_validations(
        &self,
        backend: &mut dyn SheetBackend,
        rule: &dyn Fn(&str) -> Result<Option<Validation>, BoxError>,
        over_row: u32,
    ) -> SheetResult<()> {
        let max_row = self.max_row();
        if max_row == self.title_row {
            return Ok(());
        }
        let last_row = max_row + over_row;

        for entry in &self.entries {
            let validation = rule(&entry.name).map_err(|e| {
                SheetError::Config(format!(
                    "data validation for title {:?} failed: {}",
                    entry.name, e
                ))
            })?;
            let Some(validation) = validation else {
                continue;
            };
            let range = CellRange::new(
                entry.first_column(),
                self.first_data_row(),
                entry.last_column(),
                last_row,
            );
            debug!(title = %entry.name, range = %range, "adding data validation");
            backend.add_validation(&self.sheet, &range.to_string(), &validation)?;
        }
        Ok(())
    }

    /// Sets the widest observed width on every written position.
    ///
    /// Titles whose `max_width` is `0` keep the backend's default width.
    pub fn apply_widths(
        &self,
        backend: &mut dyn SheetBackend,
        max_width: &dyn Fn(&str) -> f64,
    ) -> SheetResult<()> {
        for entry in &self.entries {
            if max_width(&entry.name) == 0.0 {
                continue;
            }
            for (&col, &width) in entry.columns.iter().zip(&entry.widths) {
                if width > 0.0 {
                    backend.set_col_width(&self.sheet, col, width)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Workbook;

    fn identity(s: &str) -> String {
        s.to_string()
    }

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_assigns_columns_left_to_right() {
        let title = TitleIndex::new("Sheet1", 1, &["id", "name", "id"]);
        assert_eq!(title.names(), vec!["id", "name"]);
        assert_eq!(title.columns("id"), Some(&[1][..]));
        assert_eq!(title.columns("name"), Some(&[2][..]));
        assert_eq!(title.max_row(), 1);
    }

    #[test]
    fn test_from_header_groups_duplicates() {
        let title = TitleIndex::from_header(
            "Sheet1",
            2,
            &header(&["a", "b", "a", "", " c "]),
            &identity,
        );
        assert_eq!(title.names(), vec!["a", "b", "c"]);
        assert_eq!(title.columns("a"), Some(&[1, 3][..]));
        assert_eq!(title.columns("c"), Some(&[5][..]));
        assert_eq!(title.first_data_row(), 3);
    }

    #[test]
    fn test_ensure_columns_grows_and_shifts() {
        let mut book = Workbook::new();
        book.ensure_sheet("Sheet1").unwrap();
        let mut title = TitleIndex::new("Sheet1", 1, &["a", "list", "z"]);
        title.write_titles(&mut book, &identity).unwrap();

        let cols = title.ensure_columns(&mut book, "list", 3, &identity).unwrap();
        assert_eq!(cols, vec![2, 3, 4]);
        assert_eq!(title.columns("a"), Some(&[1][..]));
        assert_eq!(title.columns("z"), Some(&[5][..]));

        let sheet = book.sheet("Sheet1").unwrap();
        assert_eq!(sheet.row(1), vec!["a", "list", "list", "list", "z"]);

        // already large enough: untouched
        let cols = title.ensure_columns(&mut book, "list", 2, &identity).unwrap();
        assert_eq!(cols, vec![2, 3, 4]);
    }

    #[test]
    fn test_sqref_tracks_highest_row() {
        let mut title = TitleIndex::new("Sheet1", 1, &["id"]);
        assert_eq!(title.sqref("id").unwrap(), "Sheet1!$A$2:$A$2");
        title.mark_written("id", 1, 5, None);
        title.mark_written("id", 1, 3, None);
        assert_eq!(title.sqref("id").unwrap(), "Sheet1!$A$2:$A$5");
        assert!(matches!(
            title.sqref("missing"),
            Err(SheetError::TitleNotFound { .. })
        ));
    }

    #[test]
    fn test_validations_skipped_without_data() {
        let mut book = Workbook::new();
        book.ensure_sheet("Sheet1").unwrap();
        let title = TitleIndex::new("Sheet1", 1, &["id"]);
        let rule = |_: &str| -> Result<Option<Validation>, BoxError> {
            Ok(Some(Validation::WholeNumber { min: 0, max: 9 }))
        };
        title.apply_validations(&mut book, &rule, 10).unwrap();
        assert!(book.sheet("Sheet1").unwrap().validations().is_empty());
    }

    #[test]
    fn test_validation_range_spans_block() {
        let mut book = Workbook::new();
        book.ensure_sheet("Sheet1").unwrap();
        let mut title = TitleIndex::new("Sheet1", 1, &["id", "tags"]);
        title.ensure_columns(&mut book, "tags", 2, &identity).unwrap();
        title.mark_written("id", 1, 4, None);

        let rule = |name: &str| -> Result<Option<Validation>, BoxError> {
            Ok((name == "tags").then(|| Validation::List {
                values: vec!["x".to_string()],
            }))
        };
        title.apply_validations(&mut book, &rule, 2).unwrap();
        let validations = book.sheet("Sheet1").unwrap().validations();
        assert_eq!(validations.len(), 1);
        assert_eq!(validations[0].0, CellRange::new(2, 2, 3, 6));
    }

    #[test]
    fn test_widths_keep_maximum() {
        let mut book = Workbook::new();
        book.ensure_sheet("Sheet1").unwrap();
        let mut title = TitleIndex::new("Sheet1", 1, &["id", "name"]);
        title.mark_written("name", 2, 2, Some(8.0));
        title.mark_written("name", 2, 3, Some(5.0));
        title.apply_widths(&mut book, &|_| -1.0).unwrap();

        let sheet = book.sheet("Sheet1").unwrap();
        assert_eq!(sheet.width(2), Some(8.0));
        assert_eq!(sheet.width(1), None);
    }
}
