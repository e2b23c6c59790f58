//! Writes header and data rows into the first worksheet of an `.xlsx` template
//! and colors the header row.
//!
//! ```no_run
//! use std::path::Path;
//! use sheetrows::{apply_header_fill, load_template, write_output, write_rows, Job};
//!
//! # fn main() -> sheetrows::Result<()> {
//! let job = Job::sample();
//! let template = load_template(Path::new("Sample.xlsx"))?;
//! let filled = write_rows(template, &job)?;
//! let styled = apply_header_fill(filled, &job.fill)?;
//! write_output(&styled, Path::new("output.xlsx"))?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod column;
pub mod error;
pub mod job;
pub mod package;
pub mod styles;
pub mod value;
pub mod writer;

pub use column::{cell_ref, column_label};
pub use error::{Error, Result};
pub use job::{ColumnPlacement, HeaderMapping, Job, Record};
pub use styles::{FillColor, HeaderFill, apply_header_fill, apply_header_fill_detailed};
pub use value::CellValue;
pub use writer::{load_template, write_output, write_rows, write_rows_with};
