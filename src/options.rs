//! Workspace options
//!
//! [`EncodeOptions`] and [`DecodeOptions`] configure one workspace each.
//! Plain settings can also come from a YAML or JSON file through
//! [`WorkspaceConfig`]; the caller-supplied conversion hooks only exist in
//! code.

use crate::backend::{CellStyle, Validation};
use crate::error::{BoxError, SheetError, SheetResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_SHEET: &str = "Sheet1";
pub const DEFAULT_TAG: &str = "excel";
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";

/// Date/time layouts tried, in order, when no `time_conv` is supplied.
pub const DEFAULT_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d",
    "%m-%d-%y",
];

/// Maps a field name to the text shown in the title row (and back, on decode).
pub type TitleConv = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Maximum width for a title; `0` disables auto width, negative is unlimited.
pub type TitleMaxWidth = Arc<dyn Fn(&str) -> f64 + Send + Sync>;
/// Column width for a value of `len` characters.
pub type ScaleAutoWidth = Arc<dyn Fn(usize) -> f64 + Send + Sync>;
pub type DataValidationFn =
    Arc<dyn Fn(&str) -> Result<Option<Validation>, BoxError> + Send + Sync>;

pub type WriteStringConv = Arc<dyn Fn(&str, &str) -> Result<String, BoxError> + Send + Sync>;
pub type WriteBoolConv = Arc<dyn Fn(&str, bool) -> Result<String, BoxError> + Send + Sync>;
pub type WriteTimeConv =
    Arc<dyn Fn(&str, NaiveDateTime) -> Result<String, BoxError> + Send + Sync>;

pub type ReadStringConv = Arc<dyn Fn(&str, &str) -> Result<String, BoxError> + Send + Sync>;
pub type ReadBoolConv = Arc<dyn Fn(&str, &str) -> Result<bool, BoxError> + Send + Sync>;
pub type ReadTimeConv = Arc<dyn Fn(&str) -> Result<NaiveDateTime, BoxError> + Send + Sync>;

/// Default auto width: two characters of padding.
pub fn default_scale_auto_width(len: usize) -> f64 {
    len as f64 + 2.0
}

/// Parses `text` with each of [`DEFAULT_TIME_LAYOUTS`].
pub fn parse_default_time(text: &str) -> Result<NaiveDateTime, String> {
    for layout in DEFAULT_TIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, layout) {
            return Ok(dt);
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(text, layout) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }
    Err(format!("no known date/time layout matches {text:?}"))
}

/// How a field's multiple values are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Values of one field expand across columns of the record's row.
    #[default]
    Row,
    /// Each field is one column; values go down successive rows.
    #[serde(alias = "col")]
    Column,
}

#[derive(Clone)]
pub struct EncodeOptions {
    pub sheet_name: String,
    /// 1-based; data starts on the next row.
    pub title_row: u32,
    /// Explicit title list. Required for map records.
    pub title_names: Vec<String>,
    /// Fail with `TitleNotFound` instead of skipping values whose name has
    /// no column (map keys outside `title_names`).
    pub disallow_unknown_fields: bool,
    pub tag: String,
    pub orientation: Orientation,

    pub title_conv: Option<TitleConv>,
    pub title_max_width: Option<TitleMaxWidth>,
    pub scale_auto_width: Option<ScaleAutoWidth>,
    pub data_validation: Option<DataValidationFn>,
    /// Extra rows covered by validations below the last written row.
    pub validation_over_row: u32,

    pub string_conv: Option<WriteStringConv>,
    pub bool_conv: Option<WriteBoolConv>,
    /// When unset, datetimes are written as native date cells.
    pub time_conv: Option<WriteTimeConv>,

    /// Base style for every title's range.
    pub cell_style: Option<CellStyle>,
    /// Named styles referenced by `title_style`.
    pub styles: HashMap<String, CellStyle>,
    /// Title → style name.
    pub title_style: HashMap<String, String>,
    /// Number format for datetime fields. Defaults to `yyyy-mm-dd`.
    pub date_format: Option<String>,
    /// Title → number format, overriding `date_format`.
    pub title_num_fmt: HashMap<String, String>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            title_row: 1,
            title_names: Vec::new(),
            disallow_unknown_fields: false,
            tag: DEFAULT_TAG.to_string(),
            orientation: Orientation::Row,
            title_conv: None,
            title_max_width: None,
            scale_auto_width: None,
            data_validation: None,
            validation_over_row: 0,
            string_conv: None,
            bool_conv: None,
            time_conv: None,
            cell_style: None,
            styles: HashMap::new(),
            title_style: HashMap::new(),
            date_format: None,
            title_num_fmt: HashMap::new(),
        }
    }
}

impl fmt::Debug for EncodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeOptions")
            .field("sheet_name", &self.sheet_name)
            .field("title_row", &self.title_row)
            .field("title_names", &self.title_names)
            .field("disallow_unknown_fields", &self.disallow_unknown_fields)
            .field("tag", &self.tag)
            .field("orientation", &self.orientation)
            .field("title_conv", &self.title_conv.is_some())
            .field("data_validation", &self.data_validation.is_some())
            .field("validation_over_row", &self.validation_over_row)
            .field("cell_style", &self.cell_style)
            .field("title_style", &self.title_style)
            .field("date_format", &self.date_format)
            .finish_non_exhaustive()
    }
}

impl EncodeOptions {
    /// Fills blank settings with defaults and drops repeated title names.
    pub fn normalized(mut self) -> Self {
        if self.sheet_name.is_empty() {
            self.sheet_name = DEFAULT_SHEET.to_string();
        }
        if self.tag.is_empty() {
            self.tag = DEFAULT_TAG.to_string();
        }
        if self.title_row == 0 {
            self.title_row = 1;
        }
        self.title_names = dedup(std::mem::take(&mut self.title_names));
        self
    }

    pub fn convert_title(&self, name: &str) -> String {
        match &self.title_conv {
            Some(conv) => conv(name),
            None => name.to_string(),
        }
    }

    pub fn with_sheet(mut self, sheet: &str) -> Self {
        self.sheet_name = sheet.to_string();
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_title_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.title_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }
}

#[derive(Clone)]
pub struct DecodeOptions {
    pub sheet_name: String,
    pub title_row: u32,
    pub tag: String,
    pub title_conv: Option<TitleConv>,
    pub string_conv: Option<ReadStringConv>,
    pub bool_conv: Option<ReadBoolConv>,
    pub time_conv: Option<ReadTimeConv>,
    /// Reject header names that match no record field.
    pub disallow_unknown_columns: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            title_row: 1,
            tag: DEFAULT_TAG.to_string(),
            title_conv: None,
            string_conv: None,
            bool_conv: None,
            time_conv: None,
            disallow_unknown_columns: false,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("sheet_name", &self.sheet_name)
            .field("title_row", &self.title_row)
            .field("tag", &self.tag)
            .field("disallow_unknown_columns", &self.disallow_unknown_columns)
            .finish_non_exhaustive()
    }
}

impl DecodeOptions {
    pub fn normalized(mut self) -> Self {
        if self.sheet_name.is_empty() {
            self.sheet_name = DEFAULT_SHEET.to_string();
        }
        if self.tag.is_empty() {
            self.tag = DEFAULT_TAG.to_string();
        }
        if self.title_row == 0 {
            self.title_row = 1;
        }
        self
    }

    pub fn convert_title(&self, name: &str) -> String {
        match &self.title_conv {
            Some(conv) => conv(name),
            None => name.to_string(),
        }
    }

    pub fn with_sheet(mut self, sheet: &str) -> Self {
        self.sheet_name = sheet.to_string();
        self
    }

    pub fn with_title_row(mut self, row: u32) -> Self {
        self.title_row = row;
        self
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Serializable workspace settings, loaded from YAML or JSON.
///
/// ```yaml
/// sheet: Employees
/// title_row: 2
/// orientation: row
/// validations:
///   age: { type: whole_number, min: 18, max: 99 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub sheet: String,
    pub title_row: u32,
    pub title_names: Vec<String>,
    pub tag: String,
    pub orientation: Orientation,
    pub disallow_unknown_fields: bool,
    pub disallow_unknown_columns: bool,
    pub validation_over_row: u32,
    pub date_format: Option<String>,
    pub cell_style: Option<CellStyle>,
    pub styles: HashMap<String, CellStyle>,
    pub title_style: HashMap<String, String>,
    pub title_num_fmt: HashMap<String, String>,
    /// Title → rule.
    pub validations: HashMap<String, Validation>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_SHEET.to_string(),
            title_row: 1,
            title_names: Vec::new(),
            tag: DEFAULT_TAG.to_string(),
            orientation: Orientation::Row,
            disallow_unknown_fields: false,
            disallow_unknown_columns: false,
            validation_over_row: 0,
            date_format: None,
            cell_style: None,
            styles: HashMap::new(),
            title_style: HashMap::new(),
            title_num_fmt: HashMap::new(),
            validations: HashMap::new(),
        }
    }
}

impl WorkspaceConfig {
    pub fn from_yaml_str(text: &str) -> SheetResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> SheetResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| SheetError::Config(format!("Invalid JSON config: {}", e)))
    }

    /// Loads a config file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> SheetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn encode_options(&self) -> EncodeOptions {
        let validations = self.validations.clone();
        let data_validation: Option<DataValidationFn> = if validations.is_empty() {
            None
        } else {
            Some(Arc::new(
                move |title: &str| -> Result<Option<Validation>, BoxError> {
                    Ok(validations.get(title).cloned())
                },
            ))
        };

        EncodeOptions {
            sheet_name: self.sheet.clone(),
            title_row: self.title_row,
            title_names: self.title_names.clone(),
            disallow_unknown_fields: self.disallow_unknown_fields,
            tag: self.tag.clone(),
            orientation: self.orientation,
            data_validation,
            validation_over_row: self.validation_over_row,
            cell_style: self.cell_style.clone(),
            styles: self.styles.clone(),
            title_style: self.title_style.clone(),
            date_format: self.date_format.clone(),
            title_num_fmt: self.title_num_fmt.clone(),
            ..Default::default()
        }
        .normalized()
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            sheet_name: self.sheet.clone(),
            title_row: self.title_row,
            tag: self.tag.clone(),
            disallow_unknown_columns: self.disallow_unknown_columns,
            ..Default::default()
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_options_normalized() {
        let opts = EncodeOptions {
            sheet_name: String::new(),
            tag: String::new(),
            title_row: 0,
            title_names: vec!["a".into(), "b".into(), "a".into()],
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.sheet_name, "Sheet1");
        assert_eq!(opts.tag, "excel");
        assert_eq!(opts.title_row, 1);
        assert_eq!(opts.title_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_default_time_layouts() {
        let full = parse_default_time("2024-03-01 08:30:00").unwrap();
        assert_eq!(full.to_string(), "2024-03-01 08:30:00");
        let iso = parse_default_time("2024-03-01T08:30:00").unwrap();
        assert_eq!(iso, full);
        let date = parse_default_time("2024-03-01").unwrap();
        assert_eq!(date.to_string(), "2024-03-01 00:00:00");
        let short = parse_default_time("12-31-99").unwrap();
        assert_eq!(short.to_string(), "1999-12-31 00:00:00");
        assert!(parse_default_time("yesterday").is_err());
    }

    #[test]
    fn test_workspace_config_from_yaml() {
        let config = WorkspaceConfig::from_yaml_str(
            "sheet: People\ntitle_row: 2\norientation: col\nvalidations:\n  age: { type: whole_number, min: 1, max: 9 }\n",
        )
        .unwrap();
        assert_eq!(config.sheet, "People");
        assert_eq!(config.orientation, Orientation::Column);
        assert_eq!(config.tag, "excel");

        let opts = config.encode_options();
        assert_eq!(opts.title_row, 2);
        let rule = opts.data_validation.as_ref().unwrap();
        assert_eq!(
            rule("age").unwrap(),
            Some(Validation::WholeNumber { min: 1, max: 9 })
        );
        assert_eq!(rule("name").unwrap(), None);
    }

    #[test]
    fn test_workspace_config_from_json() {
        let config = WorkspaceConfig::from_json_str(r#"{"sheet": "Data", "tag": "json"}"#).unwrap();
        let opts = config.decode_options();
        assert_eq!(opts.sheet_name, "Data");
        assert_eq!(opts.tag, "json");
        assert!(WorkspaceConfig::from_json_str("{").is_err());
    }
}
