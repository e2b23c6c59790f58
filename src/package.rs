//! In-memory OPC package: every zip entry of an `.xlsx`, addressable by part name.

use std::io::{Cursor, Read, Write};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

const CONTENT_TYPES: &str = "[Content_Types].xml";
const ROOT_RELS: &str = "_rels/.rels";
const DEFAULT_WORKBOOK: &str = "xl/workbook.xml";

const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_WORKSHEET: &str = "/worksheet";
const REL_STYLES: &str = "/styles";
const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Style part written when a package has none: the four lists, all empty.
pub const EMPTY_STYLESHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="0"/><fills count="0"/><borders count="0"/><cellXfs count="0"/>"#,
    "</styleSheet>",
);

/// The smallest style table spreadsheet applications accept without repair:
/// one font, the two reserved fills, one border and the Normal cell style.
pub const DEFAULT_STYLESHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    "</styleSheet>",
);

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    last_modified: Option<DateTime>,
    unix_mode: Option<u32>,
    is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)?;
            }
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    fn required_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| Error::malformed(name, "part is missing from the package"))
    }

    /// Replaces a part's contents, or appends a new deflated part.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| !e.is_dir && e.name == name) {
            entry.data = data;
            return;
        }
        self.entries.push(Entry {
            name: name.to_string(),
            data,
            compression: CompressionMethod::Deflated,
            last_modified: None,
            unix_mode: None,
            is_dir: false,
        });
    }

    /// Relationships declared for `part`; empty when it has no `.rels` part.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>> {
        let rels_path = rels_path_for(part);
        match self.part(&rels_path) {
            Some(xml) => parse_relationships(&rels_path, xml),
            None => Ok(Vec::new()),
        }
    }

    pub fn workbook_path(&self) -> Result<String> {
        let found = self
            .relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(REL_OFFICE_DOCUMENT))
            .map(|rel| resolve_target("", &rel.target));
        Ok(found.unwrap_or_else(|| DEFAULT_WORKBOOK.to_string()))
    }

    /// Part name of the first `<sheet>` listed in the workbook.
    pub fn first_worksheet_path(&self) -> Result<String> {
        let workbook = self.workbook_path()?;
        let xml = self.required_part(&workbook)?;
        let rid = first_sheet_rid(&workbook, xml)?.ok_or(Error::MissingWorksheet)?;

        let rel = self
            .relationships(&workbook)?
            .into_iter()
            .find(|rel| rel.id == rid)
            .ok_or_else(|| {
                Error::malformed(&workbook, format!("sheet relationship {rid} is not declared"))
            })?;
        if !rel.rel_type.ends_with(REL_WORKSHEET) {
            return Err(Error::MissingWorksheet);
        }

        let path = resolve_target(&workbook, &rel.target);
        if self.part(&path).is_none() {
            return Err(Error::MissingWorksheet);
        }
        Ok(path)
    }

    pub fn styles_path(&self) -> Result<Option<String>> {
        let workbook = self.workbook_path()?;
        let found = self
            .relationships(&workbook)?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(REL_STYLES))
            .map(|rel| resolve_target(&workbook, &rel.target));
        Ok(found.filter(|path| self.part(path).is_some()))
    }

    /// Returns the style part's name, creating an empty style table first if the
    /// workbook has none.
    pub fn ensure_styles(&mut self) -> Result<String> {
        self.ensure_styles_with(EMPTY_STYLESHEET)
    }

    /// Like [`Package::ensure_styles`], seeding a missing style part with `stylesheet`.
    pub fn ensure_styles_with(&mut self, stylesheet: &str) -> Result<String> {
        if let Some(path) = self.styles_path()? {
            return Ok(path);
        }

        let workbook = self.workbook_path()?;
        let path = resolve_target(&workbook, "styles.xml");
        self.set_part(&path, stylesheet.as_bytes().to_vec());

        let rels_path = rels_path_for(&workbook);
        let rels = self.relationships(&workbook)?;
        let id = next_relationship_id(&rels);
        let rel = format!(r#"<Relationship Id="{id}" Type="{STYLES_REL_TYPE}" Target="styles.xml"/>"#);
        let rels_xml = match self.part(&rels_path) {
            Some(xml) => insert_before_close(xml, &rels_path, b"</Relationships>", &rel)?,
            None => format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    "\n",
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                ),
                rel
            )
            .into_bytes(),
        };
        self.set_part(&rels_path, rels_xml);

        let types = self.required_part(CONTENT_TYPES)?;
        let override_tag =
            format!(r#"<Override PartName="/{path}" ContentType="{STYLES_CONTENT_TYPE}"/>"#);
        let types = insert_before_close(types, CONTENT_TYPES, b"</Types>", &override_tag)?;
        self.set_part(CONTENT_TYPES, types);

        Ok(path)
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let mut opts = SimpleFileOptions::default().compression_method(entry.compression);
            if let Some(dt) = entry.last_modified {
                opts = opts.last_modified_time(dt);
            }
            if let Some(mode) = entry.unix_mode {
                opts = opts.unix_permissions(mode);
            }

            if entry.is_dir {
                out.add_directory(entry.name.as_str(), opts)?;
                continue;
            }
            out.start_file(entry.name.as_str(), opts)?;
            out.write_all(&entry.data)?;
        }

        Ok(out.finish()?.into_inner())
    }
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`; the package itself -> `_rels/.rels`.
fn rels_path_for(part: &str) -> String {
    if part.is_empty() {
        return ROOT_RELS.to_string();
    }
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target against the part that declares it.
pub fn resolve_target(source: &str, target: &str) -> String {
    let joined = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        match source.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{target}"),
            None => target.to_string(),
        }
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn attr(part: &str, e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == local {
            let value = a
                .unescape_value()
                .map_err(|err| Error::malformed(part, err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_relationships(part: &str, xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let (Some(id), Some(rel_type), Some(target)) = (
                    attr(part, &e, b"Id")?,
                    attr(part, &e, b"Type")?,
                    attr(part, &e, b"Target")?,
                ) else {
                    return Err(Error::malformed(part, "relationship lacks Id, Type or Target"));
                };
                rels.push(Relationship { id, rel_type, target });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn first_sheet_rid(part: &str, xml: &[u8]) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                // r:id, whatever the relationships prefix is bound to.
                return attr(part, &e, b"id")?
                    .map(Some)
                    .ok_or_else(|| Error::malformed(part, "<sheet> has no relationship id"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn next_relationship_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

fn insert_before_close(xml: &[u8], part: &str, close: &[u8], insert: &str) -> Result<Vec<u8>> {
    let pos = xml
        .windows(close.len())
        .rposition(|w| w == close)
        .ok_or_else(|| {
            Error::malformed(part, format!("{} not found", String::from_utf8_lossy(close)))
        })?;
    let mut out = Vec::with_capacity(xml.len() + insert.len());
    out.extend_from_slice(&xml[..pos]);
    out.extend_from_slice(insert.as_bytes());
    out.extend_from_slice(&xml[pos..]);
    Ok(out)
}
