//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No file exists at the template path.
    #[error("template not found: {}", .0.display())]
    MissingTemplate(PathBuf),

    /// The package has no worksheet to write into.
    #[error("workbook contains no worksheet")]
    MissingWorksheet,

    /// A package part is absent or not shaped the way SpreadsheetML requires.
    #[error("malformed part {part}: {reason}")]
    MalformedPart { part: String, reason: String },

    #[error("invalid fill color {0:?}, expected RRGGBB or AARRGGBB hex")]
    InvalidColor(String),

    #[error("invalid job description: {0}")]
    Job(#[from] serde_json::Error),

    #[error("spreadsheet: {0}")]
    Spreadsheet(#[from] umya_spreadsheet::XlsxError),

    #[error("zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(part: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPart {
            part: part.into(),
            reason: reason.into(),
        }
    }
}
