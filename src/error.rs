use std::fmt;
use thiserror::Error;

pub type SheetResult<T> = Result<T, SheetError>;

/// Error type returned by caller-supplied hooks and conversion functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("invalid decode target: {type_name} is not a struct or string-keyed map")]
    InvalidTarget { type_name: &'static str },

    #[error("cannot decode {value:?} into field {field:?} of type {type_name}: {reason}")]
    TypeMismatch {
        value: String,
        field: String,
        type_name: &'static str,
        reason: String,
    },

    #[error("cannot convert value {value:?} of field {field:?}: {source}")]
    ConversionFailed {
        value: String,
        field: String,
        #[source]
        source: BoxError,
    },

    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: &'static str },

    #[error("title {name:?} not found")]
    TitleNotFound { name: String },

    #[error("error calling marshal hook for type {type_name}: {source}")]
    MarshalHookFailed {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("error calling unmarshal hook for type {type_name} (field {field:?}): {source}")]
    UnmarshalHookFailed {
        type_name: &'static str,
        field: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Row(#[from] RowError),

    #[error("encoder close failed earlier: {0}")]
    CloseFailed(String),

    #[error("title row {row} is out of range")]
    TitleRowOutOfRange { row: u32 },

    #[error("sheet {0:?} not found")]
    SheetNotFound(String),

    #[error("invalid cell range {0:?}")]
    InvalidCellRange(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// All field-level failures collected while decoding one row.
///
/// The record handed to the decoder still holds every field that
/// converted successfully.
#[derive(Debug, Default)]
pub struct RowError {
    pub row: u32,
    pub errors: Vec<SheetError>,
}

impl RowError {
    pub fn new(row: u32) -> Self {
        Self {
            row,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, err: SheetError) {
        match err {
            // nested struct walks report their own aggregate
            SheetError::Row(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), SheetError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SheetError::Row(self))
        }
    }

    /// Every `TypeMismatch` in the aggregate, in field order.
    pub fn type_mismatches(&self) -> Vec<&SheetError> {
        self.errors
            .iter()
            .filter(|e| matches!(e, SheetError::TypeMismatch { .. }))
            .collect()
    }

    /// Every `ConversionFailed` in the aggregate, in field order.
    pub fn conversion_failures(&self) -> Vec<&SheetError> {
        self.errors
            .iter()
            .filter(|e| matches!(e, SheetError::ConversionFailed { .. }))
            .collect()
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} decode error: ", self.row)?;
        if self.errors.is_empty() {
            return write!(f, "no causes");
        }
        let causes: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", causes.join(", "))
    }
}

impl std::error::Error for RowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_flattens_nested_aggregates() {
        let mut inner = RowError::new(3);
        inner.push(SheetError::TitleNotFound {
            name: "a".to_string(),
        });

        let mut outer = RowError::new(3);
        outer.push(SheetError::Row(inner));
        outer.push(SheetError::UnsupportedType { type_name: "()" });

        assert_eq!(outer.errors.len(), 2);
        assert!(outer.to_string().starts_with("row 3 decode error: "));
    }

    #[test]
    fn test_row_error_empty_is_ok() {
        assert!(RowError::new(2).into_result().is_ok());
        assert_eq!(RowError::new(2).to_string(), "row 2 decode error: no causes");
    }
}
