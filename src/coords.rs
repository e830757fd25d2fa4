//! A1-style cell coordinates
//!
//! Rows and columns are 1-based everywhere in this crate, as in the A1
//! notation itself.

use crate::error::{SheetError, SheetResult};
use regex::Regex;
use std::fmt;

/// Convert a 1-based column number to its letters (1 → A, 27 → AA).
pub fn column_name(col: u32) -> String {
    let mut result = String::new();
    let mut idx = col.saturating_sub(1);

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Convert column letters back to a 1-based column number.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)
    })
}

/// `A1` or, when `absolute`, `$A$1`.
pub fn cell_name(col: u32, row: u32, absolute: bool) -> String {
    if absolute {
        format!("${}${}", column_name(col), row)
    } else {
        format!("{}{}", column_name(col), row)
    }
}

/// Sheet prefix for a range reference; quoted when the name needs it.
pub fn sheet_prefix(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_alphanumeric() || c == '_') {
        format!("{sheet}!")
    } else {
        format!("'{}'!", sheet.replace('\'', "''"))
    }
}

/// Rectangular cell range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_col: u32,
    pub first_row: u32,
    pub last_col: u32,
    pub last_row: u32,
}

impl CellRange {
    pub fn new(first_col: u32, first_row: u32, last_col: u32, last_row: u32) -> Self {
        Self {
            first_col,
            first_row,
            last_col,
            last_row,
        }
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.first_col..=self.last_col).contains(&col)
            && (self.first_row..=self.last_row).contains(&row)
    }

    /// `Sheet!$A$2:$B$9`
    pub fn to_absolute(&self, sheet: &str) -> String {
        format!(
            "{}{}:{}",
            sheet_prefix(sheet),
            cell_name(self.first_col, self.first_row, true),
            cell_name(self.last_col, self.last_row, true)
        )
    }

    /// Parses `A2`, `A2:B9`, `$A$2:$B$9`, optionally prefixed with a sheet
    /// name (`Sheet1!` or `'My Sheet'!`), which is discarded.
    pub fn parse(text: &str) -> SheetResult<Self> {
        // Pattern: [Sheet!]$A$1[:$B$2], sheet names optionally quoted
        let pattern = Regex::new(
            r"^(?:(?:'[^']*(?:''[^']*)*'|[^!]+)!)?\$?([A-Za-z]+)\$?(\d+)(?::\$?([A-Za-z]+)\$?(\d+))?$",
        )
        .map_err(|e| SheetError::InvalidCellRange(format!("Regex error: {}", e)))?;

        let invalid = || SheetError::InvalidCellRange(text.to_string());
        let caps = pattern.captures(text.trim()).ok_or_else(invalid)?;
        let col = |i: usize| caps.get(i).and_then(|m| column_number(m.as_str()));
        let row = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|r| *r > 0)
        };

        let first_col = col(1).ok_or_else(invalid)?;
        let first_row = row(2).ok_or_else(invalid)?;
        let (last_col, last_row) = if caps.get(3).is_some() {
            (col(3).ok_or_else(invalid)?, row(4).ok_or_else(invalid)?)
        } else {
            (first_col, first_row)
        };

        Ok(Self::new(
            first_col.min(last_col),
            first_row.min(last_row),
            first_col.max(last_col),
            first_row.max(last_row),
        ))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            cell_name(self.first_col, self.first_row, false),
            cell_name(self.last_col, self.last_row, false)
        )
    }
}
