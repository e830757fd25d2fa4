//! Sheetmap - tag-driven mapping between typed records and spreadsheet rows
//!
//! Record types describe themselves through [`Reflect`] (usually via the
//! [`record!`] macro); field tags decide which title each field maps to.
//! An [`Encoder`] writes records below a title row, growing a title's
//! column block when a field needs more cells than it has. A [`Decoder`]
//! reads the title row back and fills records row by row, collecting
//! per-field conversion failures instead of stopping at the first.
//!
//! # Features
//!
//! - `name[,omitempty][,inline]` field tags, with inline (flattened) structs
//! - Scalars, datetimes, sequences, fixed arrays, string-keyed maps, pointers
//! - Custom marshal/unmarshal hooks per type
//! - Row and column orientations
//! - Data validations, auto column widths and styles on close
//! - In-memory [`Workbook`] backend with .xlsx import/export
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetmap::{read_file, record, write_file, DecodeOptions, EncodeOptions};
//!
//! record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Employee {
//!         #[tag(excel = "id")]
//!         pub id: i64,
//!         #[tag(excel = "name")]
//!         pub name: String,
//!         #[tag(excel = "skills")]
//!         pub skills: Vec<String>,
//!     }
//! }
//!
//! let staff = vec![Employee {
//!     id: 1,
//!     name: "Ada".to_string(),
//!     skills: vec!["math".to_string(), "engines".to_string()],
//! }];
//! write_file("staff.xlsx", &staff, EncodeOptions::default())?;
//!
//! let back: Vec<Employee> = read_file("staff.xlsx", DecodeOptions::default())?;
//! assert_eq!(back, staff);
//! # Ok::<(), royalbit_sheetmap::SheetError>(())
//! ```

pub mod backend;
pub mod book;
pub mod cli;
pub mod coords;
mod decode;
pub mod dispatch;
mod encode;
pub mod error;
pub mod excel;
pub mod fields;
pub mod options;
pub mod reflect;
pub mod registry;
pub mod title;
pub mod workspace;

// Re-export commonly used types
pub use backend::{CellStyle, CellValue, SheetBackend, Validation};
pub use book::Workbook;
pub use error::{BoxError, RowError, SheetError, SheetResult};
pub use options::{DecodeOptions, EncodeOptions, Orientation, WorkspaceConfig};
pub use reflect::{CellMarshal, CellUnmarshal, Reflect};
pub use title::TitleIndex;
pub use workspace::{read_file, write_file, Decoder, Encoder};
