//! Template loading, row writing and output.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::column::cell_ref;
use crate::error::{Error, Result};
use crate::job::{ColumnPlacement, HeaderMapping, Job, Record};
use crate::package::{DEFAULT_STYLESHEET, Package};

pub const HEADER_ROW: u32 = 1;

/// Reads the whole template into memory.
pub fn load_template(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::MissingTemplate(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

/// Creates or truncates `path` and writes the full buffer.
pub fn write_output(bytes: &[u8], path: &Path) -> Result<()> {
    fs::write(path, bytes)?;
    Ok(())
}

pub fn write_rows(template: Vec<u8>, job: &Job) -> Result<Vec<u8>> {
    write_rows_with(template, &job.headers, &job.records, job.placement)
}

/// Writes the header row and one row per record into the first worksheet and
/// returns the saved package.
///
/// Row 1 holds the header labels. Record `i` goes to row `i + 2`; keys missing
/// from `headers` are skipped. Everything is written as text. A template
/// without a style part gets a default one first.
pub fn write_rows_with(
    template: Vec<u8>,
    headers: &HeaderMapping,
    records: &[Record],
    placement: ColumnPlacement,
) -> Result<Vec<u8>> {
    let template = with_style_part(template)?;
    let mut book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(template), true)?;
    let sheet = book.get_sheet_mut(&0).ok_or(Error::MissingWorksheet)?;

    for (col, label) in headers.values().enumerate() {
        let addr = cell_ref(col as u32, HEADER_ROW);
        sheet.get_cell_mut(addr.as_str()).set_value_string(label.as_str());
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + HEADER_ROW + 1;
        // Rows without any matching key still exist in the sheet.
        sheet.get_row_dimension_mut(&row);

        let mut next_col = 0u32;
        for (key, value) in record {
            let Some(header_col) = headers.get_index_of(key) else {
                continue;
            };
            let col = match placement {
                ColumnPlacement::Sequential => {
                    let col = next_col;
                    next_col += 1;
                    col
                }
                ColumnPlacement::HeaderAligned => header_col as u32,
            };
            let addr = cell_ref(col, row);
            sheet.get_cell_mut(addr.as_str()).set_value_string(value.render());
        }
    }

    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)?;
    Ok(out.into_inner())
}

/// umya-spreadsheet refuses packages without `xl/styles.xml`.
fn with_style_part(template: Vec<u8>) -> Result<Vec<u8>> {
    let mut package = Package::open(&template)?;
    if package.styles_path()?.is_some() {
        return Ok(template);
    }
    package.ensure_styles_with(DEFAULT_STYLESHEET)?;
    package.save()
}
