//! Decoding session
//!
//! Fills one record from one row of cells. Each field reads the trimmed,
//! non-empty cells of its title's columns, except fixed-size arrays, which
//! read column by column so gaps stay in place. Fields with nothing to read
//! keep their current value. A failing field does not stop the row: every
//! failure is collected into a [`RowError`] returned once the row is done.

use crate::dispatch::{DecodeStrategy, DispatchEntry, LiteralKind};
use crate::error::{RowError, SheetError, SheetResult};
use crate::fields::FieldList;
use crate::options::{parse_default_time, DecodeOptions};
use crate::reflect::{Reflect, Scalar, ValueMut, ValueRef};
use crate::title::TitleIndex;
use std::any::TypeId;

pub(crate) struct DecodeState<'a> {
    opts: &'a DecodeOptions,
    title: &'a TitleIndex,
    cells: &'a [String],
    row: u32,
    field: String,
    /// Struct types on the current decode path.
    active: Vec<TypeId>,
}

impl<'a> DecodeState<'a> {
    pub(crate) fn new(
        opts: &'a DecodeOptions,
        title: &'a TitleIndex,
        row: u32,
        cells: &'a [String],
    ) -> Self {
        Self {
            opts,
            title,
            cells,
            row,
            field: String::new(),
            active: Vec::new(),
        }
    }

    /// Decodes the row into a struct or string-keyed map record.
    pub(crate) fn decode_row(
        &mut self,
        entry: &DispatchEntry,
        target: &mut dyn Reflect,
    ) -> SheetResult<()> {
        match &entry.decode {
            DecodeStrategy::Struct(fields) => {
                self.active.push(entry.type_id);
                let result = self.decode_struct(&fields.get(), target);
                self.active.pop();
                result
            }
            DecodeStrategy::Map(elem) => self.decode_map(&elem.get(), entry, target),
            DecodeStrategy::Pointer(inner) => match target.value_mut() {
                ValueMut::Pointer(ptr) => self.decode_row(&inner.get(), ptr.get_or_alloc()),
                _ => Err(SheetError::InvalidTarget {
                    type_name: entry.type_name,
                }),
            },
            _ => Err(SheetError::InvalidTarget {
                type_name: entry.type_name,
            }),
        }
    }

    fn decode_struct(&mut self, fields: &FieldList, target: &mut dyn Reflect) -> SheetResult<()> {
        let title = self.title;
        let cells = self.cells;
        let mut errors = RowError::new(self.row);

        for spec in fields.iter() {
            let items = title
                .columns(&spec.name)
                .map(|columns| collect_cells(cells, columns))
                .unwrap_or_default();
            let entry = spec.codec.get();
            if !has_data(&items) && !self.nested_has_data(&entry, &mut Vec::new()) {
                continue;
            }

            let slot = match field_path_mut(&mut *target, &spec.index) {
                Ok(slot) => slot,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            self.field = spec.name.clone();
            if let Err(err) = self.decode_value(&entry, slot, &items) {
                errors.push(err);
            }
        }

        errors.into_result()
    }

    fn decode_map(
        &mut self,
        elem: &DispatchEntry,
        entry: &DispatchEntry,
        target: &mut dyn Reflect,
    ) -> SheetResult<()> {
        let ValueMut::Map(map) = target.value_mut() else {
            return Err(SheetError::InvalidTarget {
                type_name: entry.type_name,
            });
        };
        let title = self.title;
        let mut errors = RowError::new(self.row);

        for title_entry in title.entries() {
            let items = collect_cells(self.cells, title_entry.columns());
            if !has_data(&items) {
                continue;
            }
            self.field = title_entry.name.clone();
            if let Err(err) = self.decode_value(elem, map.entry(&title_entry.name), &items) {
                errors.push(err);
            }
        }

        errors.into_result()
    }

    /// Whether a struct-valued field without a column of its own has any
    /// of its fields present in the row.
    fn nested_has_data(&self, entry: &DispatchEntry, seen: &mut Vec<TypeId>) -> bool {
        match &entry.decode {
            DecodeStrategy::Pointer(inner) => self.nested_has_data(&inner.get(), seen),
            DecodeStrategy::Struct(fields) => {
                if self.active.contains(&entry.type_id) || seen.contains(&entry.type_id) {
                    return false;
                }
                seen.push(entry.type_id);
                let found = fields.get().iter().any(|spec| {
                    let present = self
                        .title
                        .columns(&spec.name)
                        .is_some_and(|columns| has_data(&collect_cells(self.cells, columns)));
                    present || self.nested_has_data(&spec.codec.get(), seen)
                });
                seen.pop();
                found
            }
            _ => false,
        }
    }

    /// Decodes the cells of one title block into `target`. `cells` are
    /// positional: fixed-size arrays read column i into element i, every
    /// other kind reads only the non-empty cells.
    fn decode_value(
        &mut self,
        entry: &DispatchEntry,
        target: &mut dyn Reflect,
        cells: &[String],
    ) -> SheetResult<()> {
        let items = collect_items(cells);
        match &entry.decode {
            DecodeStrategy::Hook(unmarshal) => {
                unmarshal(target, &items).map_err(|source| SheetError::UnmarshalHookFailed {
                    type_name: entry.type_name,
                    field: self.field.clone(),
                    source,
                })
            }
            DecodeStrategy::Literal(kind) => match items.first() {
                Some(text) => self.decode_literal(*kind, entry.type_name, target, text),
                None => Ok(()),
            },
            DecodeStrategy::DateTime => match items.first() {
                Some(text) => self.decode_time(entry.type_name, target, text),
                None => Ok(()),
            },
            DecodeStrategy::Bytes => {
                let (Some(text), ValueMut::Seq(seq)) = (items.first(), target.value_mut()) else {
                    return Ok(());
                };
                let bytes = text.as_bytes();
                let len = seq.set_len(bytes.len());
                for (i, byte) in bytes.iter().enumerate().take(len) {
                    if let Some(ValueMut::Scalar(slot)) = seq.get_mut(i).map(|s| s.value_mut()) {
                        slot.assign(Scalar::Uint(u64::from(*byte))).map_err(|reason| {
                            self.mismatch(text, entry.type_name, reason)
                        })?;
                    }
                }
                Ok(())
            }
            DecodeStrategy::Seq {
                elem,
                len: Some(_),
            } => {
                let ValueMut::Seq(seq) = target.value_mut() else {
                    return Ok(());
                };
                let elem = elem.get();
                let len = seq.set_len(0);
                for (i, cell) in cells.iter().enumerate().take(len) {
                    if cell.is_empty() {
                        continue;
                    }
                    if let Some(slot) = seq.get_mut(i) {
                        self.decode_value(&elem, slot, std::slice::from_ref(cell))?;
                    }
                }
                Ok(())
            }
            DecodeStrategy::Seq { elem, len: None } => {
                let ValueMut::Seq(seq) = target.value_mut() else {
                    return Ok(());
                };
                let elem = elem.get();
                let len = seq.set_len(items.len());
                for (i, item) in items.iter().enumerate().take(len) {
                    if let Some(slot) = seq.get_mut(i) {
                        self.decode_value(&elem, slot, std::slice::from_ref(item))?;
                    }
                }
                Ok(())
            }
            DecodeStrategy::Map(_) => Err(self.mismatch(
                items.first().map(String::as_str).unwrap_or_default(),
                entry.type_name,
                "map fields cannot be read from cells".to_string(),
            )),
            DecodeStrategy::Pointer(inner) => match target.value_mut() {
                ValueMut::Pointer(ptr) => self.decode_value(&inner.get(), ptr.get_or_alloc(), cells),
                _ => Ok(()),
            },
            DecodeStrategy::Struct(fields) => {
                if self.active.contains(&entry.type_id) {
                    return Ok(());
                }
                self.active.push(entry.type_id);
                let field = self.field.clone();
                let result = self.decode_struct(&fields.get(), target);
                self.active.pop();
                self.field = field;
                result
            }
            DecodeStrategy::Unsupported => Err(SheetError::UnsupportedType {
                type_name: entry.type_name,
            }),
        }
    }

    fn decode_literal(
        &self,
        kind: LiteralKind,
        type_name: &'static str,
        target: &mut dyn Reflect,
        text: &str,
    ) -> SheetResult<()> {
        let ValueMut::Scalar(slot) = target.value_mut() else {
            return Ok(());
        };
        let scalar = match kind {
            LiteralKind::Int => text
                .parse::<i64>()
                .map(Scalar::Int)
                .map_err(|e| self.mismatch(text, type_name, e.to_string()))?,
            LiteralKind::Uint => text
                .parse::<u64>()
                .map(Scalar::Uint)
                .map_err(|e| self.mismatch(text, type_name, e.to_string()))?,
            LiteralKind::Float { .. } => text
                .parse::<f64>()
                .map(Scalar::Float)
                .map_err(|e| self.mismatch(text, type_name, e.to_string()))?,
            LiteralKind::Bool => match &self.opts.bool_conv {
                Some(conv) => Scalar::Bool(conv(&self.field, text).map_err(|source| {
                    SheetError::ConversionFailed {
                        value: text.to_string(),
                        field: self.field.clone(),
                        source,
                    }
                })?),
                None => Scalar::Bool(parse_bool(text).ok_or_else(|| {
                    self.mismatch(text, type_name, "invalid boolean syntax".to_string())
                })?),
            },
            LiteralKind::Str => match &self.opts.string_conv {
                Some(conv) => Scalar::Str(conv(&self.field, text).map_err(|source| {
                    SheetError::ConversionFailed {
                        value: text.to_string(),
                        field: self.field.clone(),
                        source,
                    }
                })?),
                None => Scalar::Str(text.to_string()),
            },
        };
        slot.assign(scalar)
            .map_err(|reason| self.mismatch(text, type_name, reason))
    }

    fn decode_time(
        &self,
        type_name: &'static str,
        target: &mut dyn Reflect,
        text: &str,
    ) -> SheetResult<()> {
        let ValueMut::Scalar(slot) = target.value_mut() else {
            return Ok(());
        };
        let parsed = match &self.opts.time_conv {
            Some(conv) => conv(text).map_err(|e| e.to_string()),
            None => parse_default_time(text),
        };
        let dt = parsed.map_err(|reason| self.mismatch(text, type_name, reason))?;
        slot.assign(Scalar::DateTime(dt))
            .map_err(|reason| self.mismatch(text, type_name, reason))
    }

    fn mismatch(&self, value: &str, type_name: &'static str, reason: String) -> SheetError {
        SheetError::TypeMismatch {
            value: value.to_string(),
            field: self.field.clone(),
            type_name,
            reason,
        }
    }
}

/// Trimmed cells at the given 1-based columns, one per column; columns
/// past the end of the row read as empty.
pub(crate) fn collect_cells(cells: &[String], columns: &[u32]) -> Vec<String> {
    columns
        .iter()
        .map(|&col| {
            cells
                .get(col as usize - 1)
                .map(|cell| cell.trim().to_string())
                .unwrap_or_default()
        })
        .collect()
}

/// The non-empty cells of a block, in column order.
pub(crate) fn collect_items(cells: &[String]) -> Vec<String> {
    cells.iter().filter(|cell| !cell.is_empty()).cloned().collect()
}

fn has_data(cells: &[String]) -> bool {
    cells.iter().any(|cell| !cell.is_empty())
}

/// Boolean cell text: `1 t T TRUE true True` or `0 f F FALSE false False`.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Follows a field index path, allocating null pointers on the way.
fn field_path_mut<'v>(
    mut value: &'v mut dyn Reflect,
    index: &[usize],
) -> SheetResult<&'v mut dyn Reflect> {
    for &i in index {
        value = deref_mut(value)?;
        value = match value.value_mut() {
            ValueMut::Struct(fields) => fields.field_mut(i).ok_or(SheetError::InvalidTarget {
                type_name: "struct field",
            })?,
            _ => {
                return Err(SheetError::InvalidTarget {
                    type_name: "struct field",
                })
            }
        };
    }
    Ok(value)
}

fn deref_mut(value: &mut dyn Reflect) -> SheetResult<&mut dyn Reflect> {
    if !matches!(value.value_ref(), ValueRef::Pointer(_)) {
        return Ok(value);
    }
    match value.value_mut() {
        ValueMut::Pointer(ptr) => deref_mut(ptr.get_or_alloc()),
        _ => Err(SheetError::InvalidTarget {
            type_name: "pointer",
        }),
    }
}
