use clap::{Parser, Subcommand};
use royalbit_sheetmap::cli::{self, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetmap")]
#[command(about = "Map spreadsheet rows to records and back.")]
#[command(long_about = "Sheetmap - tag-driven record mapping for .xlsx workbooks

Reads sheets through the same title index the library uses: every title
owns one or more columns, repeated titles group into one field, and data
starts on the row below the title row.

COMMANDS:
  sheets   - List the sheets of a workbook
  headers  - Show the title layout of a sheet (title → column letters)
  dump     - Decode every row as a record and print JSON or YAML
  load     - Write a YAML/JSON list of records into a sheet

EXAMPLES:
  sheetmap sheets staff.xlsx
  sheetmap headers staff.xlsx --sheet Employees --title-row 2
  sheetmap dump staff.xlsx --format yaml
  sheetmap load records.yaml staff.xlsx --config sheet.yaml

Set RUST_LOG=royalbit_sheetmap=debug (or pass --verbose) for engine logs.")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Path to Excel file (.xlsx)
        file: PathBuf,
    },

    /// Show the title layout of a sheet
    Headers {
        /// Path to Excel file (.xlsx)
        file: PathBuf,

        /// Sheet name (default: Sheet1)
        #[arg(short, long)]
        sheet: Option<String>,

        /// 1-based title row (default: 1)
        #[arg(short, long)]
        title_row: Option<u32>,
    },

    #[command(long_about = "Decode every data row of a sheet and print it.

Each row becomes a map from title to the non-empty cell texts of that
title's columns. Empty cells are skipped, so a row with nothing under a
title has no entry for it.

A YAML or JSON workspace config (--config) supplies the sheet, the title
row and the tag; --sheet and --title-row override it.

EXAMPLE:
  sheetmap dump staff.xlsx --sheet Employees --format json")]
    /// Decode rows and print them as JSON or YAML
    Dump {
        /// Path to Excel file (.xlsx)
        file: PathBuf,

        /// Sheet name (default: Sheet1)
        #[arg(short, long)]
        sheet: Option<String>,

        /// 1-based title row (default: 1)
        #[arg(short, long)]
        title_row: Option<u32>,

        /// Workspace config file (.yaml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    #[command(long_about = "Write a list of records into a sheet.

The input is a YAML (or JSON) list of flat mappings. Scalar values take
one cell; list values spread over as many columns as they need, growing
the title block and shifting later titles right.

Titles come from the config's title_names, or else from the record keys
in first-seen order. Other sheets of an existing workbook are kept.

EXAMPLE:
  sheetmap load staff.yaml staff.xlsx --sheet Employees")]
    /// Write YAML/JSON records into a sheet
    Load {
        /// Path to YAML or JSON list of records
        input: PathBuf,

        /// Output Excel file path (.xlsx)
        output: PathBuf,

        /// Sheet name (default: Sheet1)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Workspace config file (.yaml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "royalbit_sheetmap=debug"
    } else {
        "royalbit_sheetmap=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sheets { file } => cli::sheets(file)?,

        Commands::Headers {
            file,
            sheet,
            title_row,
        } => cli::headers(file, sheet, title_row)?,

        Commands::Dump {
            file,
            sheet,
            title_row,
            config,
            format,
        } => cli::dump(file, sheet, title_row, config, format)?,

        Commands::Load {
            input,
            output,
            sheet,
            config,
        } => cli::load(input, output, sheet, config, cli.verbose)?,
    }
    Ok(())
}
