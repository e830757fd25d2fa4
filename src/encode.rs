//! Encoding session
//!
//! Walks one record through its dispatch entries and writes each value at
//! the column(s) the title index assigns to the field in focus. Any error
//! ends the walk for the current record and is returned to the workspace;
//! cells already written for that record stay in the backend.

use crate::backend::{CellValue, SheetBackend};
use crate::dispatch::{DispatchEntry, EncodeStrategy, LiteralKind};
use crate::error::{SheetError, SheetResult};
use crate::fields::FieldList;
use crate::options::{EncodeOptions, Orientation};
use crate::reflect::{is_empty_value, MarshalFn, Reflect, ValueRef};
use crate::title::TitleIndex;
use chrono::NaiveDateTime;
use tracing::trace;

pub(crate) struct EncodeState<'a> {
    backend: &'a mut dyn SheetBackend,
    title: &'a mut TitleIndex,
    opts: &'a EncodeOptions,
    /// Title currently receiving values.
    field: String,
    /// Record row in row orientation.
    row: u32,
    col: u32,
}

impl<'a> EncodeState<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn SheetBackend,
        title: &'a mut TitleIndex,
        opts: &'a EncodeOptions,
        row: u32,
    ) -> Self {
        Self {
            backend,
            title,
            opts,
            field: String::new(),
            row,
            col: 0,
        }
    }

    /// Encodes a whole record through its top-level entry.
    pub(crate) fn encode_record(
        &mut self,
        entry: &DispatchEntry,
        value: &dyn Reflect,
    ) -> SheetResult<()> {
        self.encode_value(entry, value)
    }

    fn encode_value(&mut self, entry: &DispatchEntry, value: &dyn Reflect) -> SheetResult<()> {
        match &entry.encode {
            EncodeStrategy::Hook(marshal) => {
                let cells = marshal_cells(entry, *marshal, value)?;
                self.encode_strings(&cells)
            }
            EncodeStrategy::Literal(kind) => self.encode_literal(*kind, value),
            EncodeStrategy::DateTime => match value.value_ref() {
                ValueRef::DateTime(dt) => self.encode_time(dt),
                _ => Ok(()),
            },
            EncodeStrategy::Bytes => {
                let ValueRef::Seq(seq) = value.value_ref() else {
                    return Ok(());
                };
                let bytes: Vec<u8> = (0..seq.len())
                    .filter_map(|i| match seq.get(i)?.value_ref() {
                        ValueRef::Uint(b) => Some(b as u8),
                        _ => None,
                    })
                    .collect();
                if bytes.is_empty() {
                    return Ok(());
                }
                let text = String::from_utf8_lossy(&bytes).into_owned();
                self.write_value(CellValue::Text(text))
            }
            EncodeStrategy::Seq(elem) => {
                let ValueRef::Seq(seq) = value.value_ref() else {
                    return Ok(());
                };
                let elem = elem.get();
                // hook elements may yield several cells each; lay them all
                // out as one run so they take consecutive columns
                if let EncodeStrategy::Hook(marshal) = &elem.encode {
                    let mut cells = Vec::new();
                    for item in (0..seq.len()).filter_map(|i| seq.get(i)) {
                        cells.extend(marshal_cells(&elem, *marshal, item)?);
                    }
                    return self.encode_strings(&cells);
                }
                let columns = self.range_columns(seq.len())?;
                for (i, col) in columns.into_iter().enumerate().take(seq.len()) {
                    if let Some(item) = seq.get(i) {
                        self.col = col;
                        self.encode_value(&elem, item)?;
                    }
                }
                Ok(())
            }
            EncodeStrategy::Map(elem) => {
                let ValueRef::Map(entries) = value.value_ref() else {
                    return Ok(());
                };
                let elem = elem.get();
                for (key, item) in entries {
                    if !self.set_field(key)? {
                        continue;
                    }
                    self.encode_value(&elem, item)?;
                }
                Ok(())
            }
            EncodeStrategy::Pointer(inner) => match value.value_ref() {
                ValueRef::Pointer(Some(target)) => self.encode_value(&inner.get(), target),
                _ => Ok(()),
            },
            EncodeStrategy::Struct(fields) => self.encode_struct(&fields.get(), value),
            EncodeStrategy::Unsupported => Err(SheetError::UnsupportedType {
                type_name: entry.type_name,
            }),
        }
    }

    fn encode_struct(&mut self, fields: &FieldList, value: &dyn Reflect) -> SheetResult<()> {
        for spec in fields.iter() {
            // a nil pointer on the way to an inline field skips it
            let Some(field_value) = field_path(value, &spec.index) else {
                continue;
            };
            if spec.omit_empty && is_empty_value(field_value) {
                trace!(field = %spec.name, "omitting empty field");
                continue;
            }
            if !self.set_field(&spec.name)? {
                continue;
            }
            self.encode_value(&spec.codec.get(), field_value)?;
        }
        Ok(())
    }

    fn encode_literal(&mut self, kind: LiteralKind, value: &dyn Reflect) -> SheetResult<()> {
        let cell = match (kind, value.value_ref()) {
            (LiteralKind::Int, ValueRef::Int(n)) => CellValue::Int(n),
            (LiteralKind::Uint, ValueRef::Uint(n)) => CellValue::UInt(n),
            (LiteralKind::Float { bits: 32 }, ValueRef::Float(f)) => {
                // keep the shortest f32 rendering, not the widened digits
                CellValue::Float(format!("{}", f as f32).parse::<f64>().unwrap_or(f))
            }
            (LiteralKind::Float { .. }, ValueRef::Float(f)) => CellValue::Float(f),
            (LiteralKind::Bool, ValueRef::Bool(b)) => match &self.opts.bool_conv {
                Some(conv) => {
                    let text = conv(&self.field, b).map_err(|source| SheetError::ConversionFailed {
                        value: b.to_string(),
                        field: self.field.clone(),
                        source,
                    })?;
                    CellValue::Text(text)
                }
                None => CellValue::Bool(b),
            },
            (LiteralKind::Str, ValueRef::Str(s)) => CellValue::Text(self.convert_string(s)?),
            _ => return Ok(()),
        };
        self.write_value(cell)
    }

    fn encode_time(&mut self, dt: NaiveDateTime) -> SheetResult<()> {
        let cell = match &self.opts.time_conv {
            Some(conv) => {
                let text = conv(&self.field, dt).map_err(|source| SheetError::ConversionFailed {
                    value: dt.to_string(),
                    field: self.field.clone(),
                    source,
                })?;
                CellValue::Text(text)
            }
            None => CellValue::DateTime(dt),
        };
        self.write_value(cell)
    }

    /// Hook output: one cell per string, laid out like a sequence.
    fn encode_strings(&mut self, cells: &[String]) -> SheetResult<()> {
        let columns = self.range_columns(cells.len())?;
        for (text, col) in cells.iter().zip(columns) {
            self.col = col;
            let text = self.convert_string(text)?;
            self.write_value(CellValue::Text(text))?;
        }
        Ok(())
    }

    fn convert_string(&self, s: &str) -> SheetResult<String> {
        match &self.opts.string_conv {
            Some(conv) => conv(&self.field, s).map_err(|source| SheetError::ConversionFailed {
                value: s.to_string(),
                field: self.field.clone(),
                source,
            }),
            None => Ok(s.to_string()),
        }
    }

    /// Focuses the session on `name`. `Ok(false)` means the name has no
    /// column and unknown fields are tolerated.
    fn set_field(&mut self, name: &str) -> SheetResult<bool> {
        self.field = name.to_string();
        match self.title.columns(name) {
            Some(columns) => {
                self.col = columns[0];
                Ok(true)
            }
            None if self.opts.disallow_unknown_fields => Err(SheetError::TitleNotFound {
                name: name.to_string(),
            }),
            None => Ok(false),
        }
    }

    /// Columns receiving the `len` values of the focused field.
    fn range_columns(&mut self, len: usize) -> SheetResult<Vec<u32>> {
        match self.opts.orientation {
            Orientation::Row => {
                let opts = self.opts;
                let conv = |name: &str| opts.convert_title(name);
                self.title
                    .ensure_columns(&mut *self.backend, &self.field, len, &conv)
            }
            Orientation::Column => {
                let columns = self.title.columns(&self.field).ok_or_else(|| {
                    SheetError::TitleNotFound {
                        name: self.field.clone(),
                    }
                })?;
                Ok(vec![columns[0]; len])
            }
        }
    }

    fn write_value(&mut self, value: CellValue) -> SheetResult<()> {
        let row = match self.opts.orientation {
            Orientation::Row => self.row,
            Orientation::Column => {
                let highest = self
                    .title
                    .highest_row_at(&self.field, self.col)
                    .unwrap_or(self.title.title_row());
                highest + 1
            }
        };

        let width = self.cell_width(&value);
        self.backend
            .write_cell(self.title.sheet(), row, self.col, value)?;
        self.title.mark_written(&self.field, self.col, row, width);
        Ok(())
    }

    /// Auto width for a value, when enabled for the focused title.
    fn cell_width(&self, value: &CellValue) -> Option<f64> {
        let scale = self.opts.scale_auto_width.as_ref()?;
        let max = match &self.opts.title_max_width {
            Some(max_width) => max_width(&self.field),
            None => -1.0,
        };
        if max == 0.0 {
            return None;
        }
        let width = scale(value.render().chars().count());
        if max > 0.0 && width > max {
            Some(max)
        } else {
            Some(width)
        }
    }
}

fn marshal_cells(
    entry: &DispatchEntry,
    marshal: MarshalFn,
    value: &dyn Reflect,
) -> SheetResult<Vec<String>> {
    marshal(value).map_err(|source| SheetError::MarshalHookFailed {
        type_name: entry.type_name,
        source,
    })
}

/// Follows a field index path, stepping through pointers; `None` when a
/// pointer on the way is null.
fn field_path<'v>(mut value: &'v dyn Reflect, index: &[usize]) -> Option<&'v dyn Reflect> {
    for &i in index {
        value = deref(value)?;
        let ValueRef::Struct(fields) = value.value_ref() else {
            return None;
        };
        value = fields.field(i)?;
    }
    Some(value)
}

fn deref(mut value: &dyn Reflect) -> Option<&dyn Reflect> {
    while let ValueRef::Pointer(target) = value.value_ref() {
        value = target?;
    }
    Some(value)
}
