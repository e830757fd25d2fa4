//! Sheet backend interface
//!
//! The engine never touches file bytes. Everything it reads or writes goes
//! through [`SheetBackend`], addressed with 1-based rows and columns.

use crate::coords::CellRange;
use crate::error::SheetResult;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text form of datetime cells. Fractional seconds appear only when set.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell value as handed to the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The text a row cursor reports for this cell.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Int(n) => write!(f, "{n}"),
            CellValue::UInt(n) => write!(f, "{n}"),
            CellValue::Float(n) => write!(f, "{n}"),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// Visual cell formatting. `None`/`false` fields leave the cell untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub wrap: bool,
    pub border: bool,
    /// `0xRRGGBB`
    pub font_color: Option<u32>,
    /// `0xRRGGBB`
    pub fill_color: Option<u32>,
    /// Excel number format code, e.g. `yyyy-mm-dd` or `0.00`.
    pub num_format: Option<String>,
}

impl CellStyle {
    pub fn is_plain(&self) -> bool {
        *self == CellStyle::default()
    }

    /// Applies every setting of `other` on top of `self`.
    pub fn overlay(&mut self, other: &CellStyle) {
        self.bold |= other.bold;
        self.italic |= other.italic;
        self.wrap |= other.wrap;
        self.border |= other.border;
        if other.font_color.is_some() {
            self.font_color = other.font_color;
        }
        if other.fill_color.is_some() {
            self.fill_color = other.fill_color;
        }
        if other.num_format.is_some() {
            self.num_format.clone_from(&other.num_format);
        }
    }
}

/// A data validation rule bound to a cell range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validation {
    WholeNumber { min: i32, max: i32 },
    Decimal { min: f64, max: f64 },
    List { values: Vec<String> },
    /// Allowed values come from a range, e.g. `Lists!$A$2:$A$9`.
    ListSource { range: String },
}

/// Forward-only iterator over `(row, cells)`, rows numbered from 1.
pub struct RowCursor<'a> {
    inner: Box<dyn Iterator<Item = (u32, Vec<String>)> + 'a>,
}

impl<'a> RowCursor<'a> {
    pub fn new<I>(rows: I) -> Self
    where
        I: Iterator<Item = (u32, Vec<String>)> + 'a,
    {
        Self {
            inner: Box::new(rows),
        }
    }
}

impl Iterator for RowCursor<'_> {
    type Item = (u32, Vec<String>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Storage the engine reads from and writes to.
///
/// `rows` must yield every row from 1 to the last non-empty one, with
/// trailing empty cells trimmed. `insert_cols` shifts existing content at
/// or after `before` right by `count`.
pub trait SheetBackend {
    fn has_sheet(&self, sheet: &str) -> bool;
    fn ensure_sheet(&mut self, sheet: &str) -> SheetResult<()>;
    fn write_cell(&mut self, sheet: &str, row: u32, col: u32, value: CellValue)
        -> SheetResult<()>;
    fn rows(&self, sheet: &str) -> SheetResult<RowCursor<'_>>;
    fn insert_cols(&mut self, sheet: &str, before: u32, count: u32) -> SheetResult<()>;

    fn set_col_width(&mut self, _sheet: &str, _col: u32, _width: f64) -> SheetResult<()> {
        Ok(())
    }

    fn set_style(&mut self, _sheet: &str, _range: CellRange, _style: &CellStyle) -> SheetResult<()> {
        Ok(())
    }

    /// `sqref` is an A1 range such as `B2:C9`.
    fn add_validation(&mut self, _sheet: &str, _sqref: &str, _rule: &Validation) -> SheetResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cell_value_render() {
        assert_eq!(CellValue::Int(-3).render(), "-3");
        assert_eq!(CellValue::UInt(u64::MAX).render(), "18446744073709551615");
        assert_eq!(CellValue::Float(1.0).render(), "1");
        assert_eq!(CellValue::Float(0.1).render(), "0.1");
        assert_eq!(CellValue::Bool(true).render(), "TRUE");
        assert_eq!(CellValue::Empty.render(), "");

        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).render(), "2024-02-29 13:05:00");

        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 0, 250)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).render(), "2024-02-29 13:05:00.250");
    }

    #[test]
    fn test_style_overlay() {
        let mut base = CellStyle {
            bold: true,
            num_format: Some("0.00".to_string()),
            ..Default::default()
        };
        base.overlay(&CellStyle {
            fill_color: Some(0xFFFF00),
            num_format: Some("yyyy-mm-dd".to_string()),
            ..Default::default()
        });
        assert!(base.bold);
        assert_eq!(base.fill_color, Some(0xFFFF00));
        assert_eq!(base.num_format.as_deref(), Some("yyyy-mm-dd"));
        assert!(!base.is_plain());
    }

    #[test]
    fn test_validation_from_yaml() {
        let rule: Validation = serde_yaml::from_str("type: whole_number\nmin: 1\nmax: 10\n").unwrap();
        assert_eq!(rule, Validation::WholeNumber { min: 1, max: 10 });

        let rule: Validation = serde_yaml::from_str("type: list\nvalues: [a, b]\n").unwrap();
        assert_eq!(
            rule,
            Validation::List {
                values: vec!["a".to_string(), "b".to_string()]
            }
        );
    }
}
