//! Workspaces
//!
//! An [`Encoder`] owns the title layout of one sheet while records are
//! written into it; a [`Decoder`] reads records back from a sheet through a
//! forward-only row cursor. Both work against any [`SheetBackend`] and
//! default to the in-memory [`Workbook`].

use crate::backend::{RowCursor, SheetBackend};
use crate::book::Workbook;
use crate::decode::DecodeState;
use crate::dispatch::dispatch;
use crate::encode::EncodeState;
use crate::error::{SheetError, SheetResult};
use crate::fields::type_fields;
use crate::options::{DecodeOptions, EncodeOptions, Orientation, DEFAULT_DATE_FORMAT};
use crate::reflect::{Kind, Reflect};
use crate::title::TitleIndex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

/// Writes records of type `T` into one sheet.
///
/// Titles are written when the encoder is created. Validations, widths
/// and styles depend on everything written, so they are applied by
/// [`Encoder::close`] (or [`Encoder::finish`]).
pub struct Encoder<'a, T: Reflect, B: SheetBackend = Workbook> {
    backend: &'a mut B,
    title: TitleIndex,
    opts: EncodeOptions,
    /// Title → number format of datetime fields.
    num_formats: HashMap<String, String>,
    /// Next record row in row orientation.
    row: u32,
    closed: bool,
    /// Message of the error the first close returned.
    close_error: Option<String>,
    _record: PhantomData<fn(&T)>,
}

impl<'a, T: Reflect, B: SheetBackend> Encoder<'a, T, B> {
    pub fn new(backend: &'a mut B, opts: EncodeOptions) -> SheetResult<Self> {
        let opts = opts.normalized();
        backend.ensure_sheet(&opts.sheet_name)?;

        let shape = T::shape();
        let target = shape.pointee();
        let mut num_formats = HashMap::new();
        let names: Vec<String> = match &target.kind {
            Kind::Struct { .. } => {
                let fields = type_fields(&target, &opts.tag);
                let names = if opts.title_names.is_empty() {
                    fields.names().into_iter().map(str::to_string).collect()
                } else {
                    if let Some(unknown) = opts.title_names.iter().find(|n| !fields.contains(n)) {
                        return Err(SheetError::TitleNotFound {
                            name: unknown.clone(),
                        });
                    }
                    opts.title_names.clone()
                };
                let date_format = opts.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                for name in &names {
                    let is_date = fields
                        .get(name)
                        .is_some_and(|spec| matches!(spec.shape.pointee().kind, Kind::DateTime));
                    if is_date {
                        num_formats.insert(name.clone(), date_format.to_string());
                    }
                }
                names
            }
            Kind::Map { .. } => {
                if opts.title_names.is_empty() {
                    return Err(SheetError::Config(format!(
                        "map record {} needs explicit title_names",
                        shape.name
                    )));
                }
                opts.title_names.clone()
            }
            _ => {
                return Err(SheetError::UnsupportedType {
                    type_name: shape.name,
                })
            }
        };
        for (name, format) in &opts.title_num_fmt {
            num_formats.insert(name.clone(), format.clone());
        }

        let title = TitleIndex::new(&opts.sheet_name, opts.title_row, &names);
        title.write_titles(&mut *backend, &|name: &str| opts.convert_title(name))?;
        debug!(
            sheet = %opts.sheet_name,
            record = shape.name,
            titles = names.len(),
            "opened encoder"
        );

        Ok(Self {
            backend,
            row: title.first_data_row(),
            title,
            opts,
            num_formats,
            closed: false,
            close_error: None,
            _record: PhantomData,
        })
    }

    /// Writes one record.
    ///
    /// On error the cells already written for this record stay in the
    /// backend, and the next record is written over the same row.
    pub fn encode(&mut self, record: &T) -> SheetResult<()> {
        let entry = dispatch(&T::shape(), &self.opts.tag);
        let result = EncodeState::new(&mut *self.backend, &mut self.title, &self.opts, self.row)
            .encode_record(&entry, record);
        if result.is_ok() && self.opts.orientation == Orientation::Row {
            self.row += 1;
        }
        result
    }

    /// Writes records in order, stopping at the first error.
    pub fn encode_all(&mut self, records: &[T]) -> SheetResult<()> {
        for record in records {
            self.encode(record)?;
        }
        Ok(())
    }

    /// Absolute range of a field's written values, e.g. `Sheet1!$A$2:$A$9`,
    /// usable as a list source for validations on other sheets.
    pub fn sqref(&self, name: &str) -> SheetResult<String> {
        self.title.sqref(name)
    }

    pub fn title(&self) -> &TitleIndex {
        &self.title
    }

    /// Applies data validations, auto widths and styles. Runs once; later
    /// calls return the outcome of the first one.
    pub fn close(&mut self) -> SheetResult<()> {
        if self.closed {
            return match &self.close_error {
                Some(message) => Err(SheetError::CloseFailed(message.clone())),
                None => Ok(()),
            };
        }
        self.closed = true;

        let result = self.apply_close();
        if let Err(err) = &result {
            self.close_error = Some(err.to_string());
        }
        result
    }

    fn apply_close(&mut self) -> SheetResult<()> {
        if let Some(rule) = &self.opts.data_validation {
            self.title.apply_validations(
                &mut *self.backend,
                rule.as_ref(),
                self.opts.validation_over_row,
            )?;
        }

        if self.opts.scale_auto_width.is_some() {
            let max_width = self.opts.title_max_width.clone();
            self.title.apply_widths(&mut *self.backend, &|name: &str| match &max_width {
                Some(max_width) => max_width(name),
                None => -1.0,
            })?;
        }

        self.apply_styles()?;
        debug!(
            sheet = %self.opts.sheet_name,
            max_row = self.title.max_row(),
            "closed encoder"
        );
        Ok(())
    }

    /// Closes the workspace and hands back its title layout.
    pub fn finish(mut self) -> SheetResult<TitleIndex> {
        self.close()?;
        Ok(self.title)
    }

    fn apply_styles(&mut self) -> SheetResult<()> {
        for entry in self.title.entries() {
            let num_format = self.num_formats.get(&entry.name).cloned();
            let mut style = self.opts.cell_style.clone().unwrap_or_default();
            if num_format.is_some() {
                style.num_format = num_format.clone();
            }

            if let Some(style_name) = self.opts.title_style.get(&entry.name) {
                let mut named = self.opts.styles.get(style_name).cloned().ok_or_else(|| {
                    SheetError::Config(format!(
                        "style {:?} for title {:?} is not defined",
                        style_name, entry.name
                    ))
                })?;
                if named.num_format.is_none() {
                    named.num_format = num_format;
                }
                style = named;
            }

            if style.is_plain() {
                continue;
            }
            let Some(range) = self.title.block_range(&entry.name) else {
                continue;
            };
            self.backend.set_style(self.title.sheet(), range, &style)?;
        }
        Ok(())
    }
}

/// Reads records of type `T` from one sheet, one row at a time.
pub struct Decoder<'a, T: Reflect, B: SheetBackend = Workbook> {
    backend: &'a B,
    cursor: RowCursor<'a>,
    title: TitleIndex,
    opts: DecodeOptions,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: Reflect, B: SheetBackend> Decoder<'a, T, B> {
    pub fn new(backend: &'a B, opts: DecodeOptions) -> SheetResult<Self> {
        let opts = opts.normalized();
        if !backend.has_sheet(&opts.sheet_name) {
            return Err(SheetError::SheetNotFound(opts.sheet_name));
        }

        let mut cursor = backend.rows(&opts.sheet_name)?;
        let (_, header) = cursor
            .nth(opts.title_row as usize - 1)
            .ok_or(SheetError::TitleRowOutOfRange {
                row: opts.title_row,
            })?;
        let title = TitleIndex::from_header(&opts.sheet_name, opts.title_row, &header, &|name: &str| {
            opts.convert_title(name)
        });

        let shape = T::shape();
        let target = shape.pointee();
        match &target.kind {
            Kind::Struct { .. } => {
                if opts.disallow_unknown_columns {
                    let fields = type_fields(&target, &opts.tag);
                    if let Some(unknown) = title.names().into_iter().find(|n| !fields.contains(n)) {
                        return Err(SheetError::TitleNotFound {
                            name: unknown.to_string(),
                        });
                    }
                }
            }
            Kind::Map { .. } => {}
            _ => {
                return Err(SheetError::InvalidTarget {
                    type_name: shape.name,
                })
            }
        }

        debug!(
            sheet = %opts.sheet_name,
            record = shape.name,
            titles = title.len(),
            "opened decoder"
        );
        Ok(Self {
            backend,
            cursor,
            title,
            opts,
            _record: PhantomData,
        })
    }

    /// Decodes the next row into `record`. `Ok(false)` once rows run out.
    ///
    /// A [`SheetError::Row`] error leaves every field that did convert in
    /// `record`.
    pub fn decode(&mut self, record: &mut T) -> SheetResult<bool> {
        let Some((row, cells)) = self.cursor.next() else {
            return Ok(false);
        };
        let entry = dispatch(&T::shape(), &self.opts.tag);
        DecodeState::new(&self.opts, &self.title, row, &cells).decode_row(&entry, record)?;
        Ok(true)
    }

    /// Decodes every remaining row, appending to `out`.
    ///
    /// A row with conversion errors is still appended before its
    /// [`SheetError::Row`] is returned.
    pub fn decode_all(&mut self, out: &mut Vec<T>) -> SheetResult<()>
    where
        T: Default,
    {
        loop {
            let mut record = T::default();
            match self.decode(&mut record) {
                Ok(true) => out.push(record),
                Ok(false) => return Ok(()),
                Err(SheetError::Row(err)) => {
                    out.push(record);
                    return Err(SheetError::Row(err));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Number of data rows below the title row, independent of the cursor.
    pub fn count(&self) -> usize {
        match self.backend.rows(&self.opts.sheet_name) {
            Ok(rows) => rows.skip(self.opts.title_row as usize).count(),
            Err(_) => 0,
        }
    }

    pub fn title(&self) -> &TitleIndex {
        &self.title
    }
}

/// Reads every record of a sheet in an .xlsx file.
pub fn read_file<T: Reflect + Default>(
    path: impl AsRef<Path>,
    opts: DecodeOptions,
) -> SheetResult<Vec<T>> {
    let book = Workbook::open(path)?;
    let mut decoder = Decoder::<T>::new(&book, opts)?;
    let mut records = Vec::new();
    decoder.decode_all(&mut records)?;
    Ok(records)
}

/// Writes records to a sheet of an .xlsx file, creating the file if needed
/// and keeping its other sheets.
pub fn write_file<T: Reflect>(
    path: impl AsRef<Path>,
    records: &[T],
    opts: EncodeOptions,
) -> SheetResult<TitleIndex> {
    let path = path.as_ref();
    let mut book = Workbook::open_or_create(path)?;
    let mut encoder = Encoder::<T>::new(&mut book, opts)?;
    encoder.encode_all(records)?;
    let title = encoder.finish()?;
    book.save(path)?;
    Ok(title)
}
