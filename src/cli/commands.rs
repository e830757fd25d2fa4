use crate::book::Workbook;
use crate::coords::column_name;
use crate::error::{SheetError, SheetResult};
use crate::options::{DecodeOptions, EncodeOptions, WorkspaceConfig};
use crate::workspace::{Decoder, Encoder};
use colored::Colorize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A decoded row: title → non-empty cell texts of its columns.
pub type StringRecord = BTreeMap<String, Vec<String>>;

/// Output format of the dump command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Execute the sheets command
pub fn sheets(file: PathBuf) -> SheetResult<()> {
    let book = Workbook::open(&file)?;

    println!("{}", "📗 Sheets".bold().green());
    println!("   File: {}\n", file.display());
    for sheet in book.sheets() {
        println!(
            "   {} ({} rows, {} columns)",
            sheet.name.bright_blue().bold(),
            sheet.max_row(),
            sheet.max_col()
        );
    }
    println!();
    Ok(())
}

/// Execute the headers command
pub fn headers(file: PathBuf, sheet: Option<String>, title_row: Option<u32>) -> SheetResult<()> {
    let book = Workbook::open(&file)?;
    let opts = decode_options(None, sheet, title_row)?;
    let decoder = Decoder::<StringRecord>::new(&book, opts)?;
    let title = decoder.title();

    println!("{}", "📋 Title layout".bold().green());
    println!("   File:  {}", file.display());
    println!("   Sheet: {} (title row {})\n", title.sheet(), title.title_row());

    for entry in title.entries() {
        let letters: Vec<String> = entry.columns().iter().map(|&c| column_name(c)).collect();
        println!("   {:<24} {}", entry.name.cyan(), letters.join(", ").bold());
    }
    println!("\n   {} data rows", decoder.count());
    Ok(())
}

/// Execute the dump command
pub fn dump(
    file: PathBuf,
    sheet: Option<String>,
    title_row: Option<u32>,
    config: Option<PathBuf>,
    format: OutputFormat,
) -> SheetResult<()> {
    let book = Workbook::open(&file)?;
    let opts = decode_options(config.as_deref(), sheet, title_row)?;
    let mut decoder = Decoder::<StringRecord>::new(&book, opts)?;

    let mut records = Vec::new();
    decoder.decode_all(&mut records)?;

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&records)
            .map_err(|e| SheetError::Export(format!("Failed to render JSON: {}", e)))?,
        OutputFormat::Yaml => serde_yaml::to_string(&records)?,
    };
    println!("{}", text);
    Ok(())
}

/// Execute the load command
pub fn load(
    input: PathBuf,
    output: PathBuf,
    sheet: Option<String>,
    config: Option<PathBuf>,
    verbose: bool,
) -> SheetResult<()> {
    println!("{}", "📥 Loading records".bold().green());
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let mut opts = match &config {
        Some(path) => WorkspaceConfig::load(path)?.encode_options(),
        None => EncodeOptions::default(),
    };
    if let Some(sheet) = sheet {
        opts.sheet_name = sheet;
    }

    let text = std::fs::read_to_string(&input)?;
    let (records, titles) = parse_records(&text)?;
    if opts.title_names.is_empty() {
        opts.title_names = titles;
    }
    if verbose {
        println!(
            "   Found {} records, {} titles",
            records.len(),
            opts.title_names.len()
        );
    }

    let mut book = Workbook::open_or_create(&output)?;
    let mut encoder = Encoder::<StringRecord>::new(&mut book, opts)?;
    encoder.encode_all(&records)?;
    let title = encoder.finish()?;
    book.save(&output)?;

    println!("{}", "✅ Load complete".bold().green());
    println!(
        "   Sheet {}: {} rows written\n",
        title.sheet().bright_blue(),
        title.max_row() - title.title_row()
    );
    Ok(())
}

fn decode_options(
    config: Option<&Path>,
    sheet: Option<String>,
    title_row: Option<u32>,
) -> SheetResult<DecodeOptions> {
    let mut opts = match config {
        Some(path) => WorkspaceConfig::load(path)?.decode_options(),
        None => DecodeOptions::default(),
    };
    if let Some(sheet) = sheet {
        opts.sheet_name = sheet;
    }
    if let Some(row) = title_row {
        opts.title_row = row;
    }
    Ok(opts)
}

/// Parses a YAML (or JSON) list of flat records. Scalars become one cell,
/// lists one cell per item. Titles are returned in first-seen key order.
pub fn parse_records(text: &str) -> SheetResult<(Vec<StringRecord>, Vec<String>)> {
    let value: Value = serde_yaml::from_str(text)?;
    let Value::Sequence(items) = value else {
        return Err(SheetError::Config(
            "Expected a list of records at the top level".to_string(),
        ));
    };

    let mut titles: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Value::Mapping(mapping) = item else {
            return Err(SheetError::Config(format!("Record {} is not a mapping", i + 1)));
        };
        let mut record = StringRecord::new();
        for (key, value) in mapping {
            let key = scalar_text(&key).ok_or_else(|| {
                SheetError::Config(format!("Record {} has a non-scalar key", i + 1))
            })?;
            let cells = match &value {
                Value::Sequence(values) => values.iter().filter_map(scalar_text).collect(),
                other => scalar_text(other).into_iter().collect(),
            };
            if !titles.contains(&key) {
                titles.push(key.clone());
            }
            record.insert(key, cells);
        }
        records.push(record);
    }
    Ok((records, titles))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
