#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use sheetrows::package::Package;
use zip::{ZipArchive, ZipWriter};
use zip::write::SimpleFileOptions;

/// A fresh workbook with one empty worksheet, as umya-spreadsheet writes it.
pub fn blank_template() -> Vec<u8> {
    let book = umya_spreadsheet::new_file();
    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out).unwrap();
    out.into_inner()
}

/// Copies a package entry by entry. `edit` gets each part's name and text and
/// returns the replacement, or `None` to drop the part.
pub fn rewrite_parts(bytes: &[u8], edit: impl Fn(&str, String) -> Option<String>) -> Vec<u8> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        let edited = match String::from_utf8(data) {
            Ok(text) => edit(&name, text).map(String::into_bytes),
            Err(err) => Some(err.into_bytes()),
        };
        if let Some(data) = edited {
            out.start_file(name, SimpleFileOptions::default()).unwrap();
            out.write_all(&data).unwrap();
        }
    }
    out.finish().unwrap().into_inner()
}

/// `blank_template()` with its style part, relationship and content-type override removed.
pub fn template_without_styles() -> Vec<u8> {
    let rel = Regex::new(r#"<Relationship [^>]*/styles"[^>]*/>"#).unwrap();
    let over = Regex::new(r#"<Override [^>]*styles\+xml"[^>]*/>"#).unwrap();
    rewrite_parts(&blank_template(), |name, text| match name {
        "xl/styles.xml" => None,
        "xl/_rels/workbook.xml.rels" => Some(rel.replace_all(&text, "").into_owned()),
        "[Content_Types].xml" => Some(over.replace_all(&text, "").into_owned()),
        _ => Some(text),
    })
}

/// `blank_template()` whose workbook lists no sheets.
pub fn template_without_sheets() -> Vec<u8> {
    let sheets = Regex::new(r"(?s)<sheets>.*</sheets>").unwrap();
    rewrite_parts(&blank_template(), |name, text| match name {
        "xl/workbook.xml" => Some(sheets.replace(&text, "<sheets/>").into_owned()),
        _ => Some(text),
    })
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Id</t></is></c><c r="B1" t="inlineStr"><is><t>Name</t></is></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>1</t></is></c></row></sheetData></worksheet>"#;

/// A hand-built package without a style part. `with_sheet` controls whether the
/// workbook lists any worksheet.
pub fn bare_package(with_sheet: bool) -> Vec<u8> {
    let sheets = if with_sheet {
        r#"<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>"#
    } else {
        "<sheets/>"
    };
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{sheets}</workbook>"#
    );

    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    let mut parts = vec![
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
    ];
    if with_sheet {
        parts.push(("xl/worksheets/sheet1.xml", SHEET.to_string()));
    }
    for (name, data) in parts {
        out.start_file(name, opts).unwrap();
        out.write_all(data.as_bytes()).unwrap();
    }
    out.finish().unwrap().into_inner()
}

pub fn part_text(bytes: &[u8], name: &str) -> String {
    let package = Package::open(bytes).unwrap();
    let part = package.part(name).unwrap_or_else(|| panic!("{name} missing"));
    String::from_utf8(part.to_vec()).unwrap()
}

/// (entries actually present, declared `count`) for a top-level stylesheet list.
pub fn list_counts(styles: &str, list: &[u8], item: &[u8]) -> (u32, Option<u32>) {
    let mut reader = Reader::from_str(styles);
    let mut depth = 0usize;
    let mut in_list = false;
    let mut entries = 0;
    let mut declared = None;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => {
                if depth == 1 && e.local_name().as_ref() == list {
                    in_list = true;
                    declared = count_attr(&e);
                } else if depth == 2 && in_list && e.local_name().as_ref() == item {
                    entries += 1;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == list {
                    declared = count_attr(&e);
                } else if depth == 2 && in_list && e.local_name().as_ref() == item {
                    entries += 1;
                }
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 1 {
                    in_list = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    (entries, declared)
}

fn count_attr(e: &quick_xml::events::BytesStart<'_>) -> Option<u32> {
    e.try_get_attribute("count")
        .unwrap()
        .map(|a| String::from_utf8(a.value.to_vec()).unwrap().parse().unwrap())
}

/// Cell reference -> `s` attribute for every cell in the sheet.
pub fn cell_styles(sheet: &str) -> Vec<(String, Option<u32>)> {
    let mut reader = Reader::from_str(sheet);
    let mut cells = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let get = |key: &str| {
                    e.try_get_attribute(key)
                        .unwrap()
                        .map(|a| String::from_utf8(a.value.to_vec()).unwrap())
                };
                let reference = get("r").unwrap();
                let style = get("s").map(|s| s.parse().unwrap());
                cells.push((reference, style));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    cells
}

/// `r` attribute of every `<row>` and how many cells it holds.
pub fn rows(sheet: &str) -> Vec<(u32, usize)> {
    let mut reader = Reader::from_str(sheet);
    let mut rows = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let r = e.try_get_attribute("r").unwrap().unwrap();
                let r = String::from_utf8(r.value.to_vec()).unwrap().parse().unwrap();
                rows.push((r, 0));
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                rows.last_mut().unwrap().1 += 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    rows
}
