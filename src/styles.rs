//! Header fill injection: one new solid fill, one new cell format using it,
//! and every cell of the sheet's first row pointed at that format.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;

use crate::error::{Error, Result};
use crate::package::Package;

const STYLESHEET: &str = "styleSheet";
const WORKSHEET: &str = "worksheet";

// CT_Stylesheet child order; a missing list is inserted before the first of its followers.
const FILLS_FOLLOWERS: &[&[u8]] = &[
    b"borders",
    b"cellStyleXfs",
    b"cellXfs",
    b"cellStyles",
    b"dxfs",
    b"tableStyles",
    b"colors",
    b"extLst",
];
const CELL_XFS_FOLLOWERS: &[&[u8]] = &[b"cellStyles", b"dxfs", b"tableStyles", b"colors", b"extLst"];

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9A-Fa-f]{2})?[0-9A-Fa-f]{6}$").expect("valid regex"));

/// An ARGB fill color, e.g. `FF00FF00`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillColor(String);

impl FillColor {
    /// Accepts `RRGGBB` or `AARRGGBB`, with or without a leading `#`.
    /// Six-digit colors get an opaque alpha channel.
    pub fn parse(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !HEX_COLOR.is_match(digits) {
            return Err(Error::InvalidColor(hex.to_string()));
        }
        let argb = if digits.len() == 6 {
            format!("FF{digits}")
        } else {
            digits.to_string()
        };
        Ok(Self(argb.to_ascii_uppercase()))
    }

    pub fn argb(&self) -> &str {
        &self.0
    }
}

impl Default for FillColor {
    fn default() -> Self {
        Self("FF00FF00".to_string())
    }
}

impl FromStr for FillColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a header fill pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFill {
    pub fill_id: u32,
    pub format_id: u32,
    pub cells_styled: usize,
}

/// Adds the header fill to a saved workbook and returns the re-saved bytes.
pub fn apply_header_fill(bytes: Vec<u8>, color: &FillColor) -> Result<Vec<u8>> {
    apply_header_fill_detailed(bytes, color).map(|(bytes, _)| bytes)
}

pub fn apply_header_fill_detailed(
    bytes: Vec<u8>,
    color: &FillColor,
) -> Result<(Vec<u8>, HeaderFill)> {
    let mut package = Package::open(&bytes)?;
    drop(bytes);

    let sheet_path = package.first_worksheet_path()?;
    let styles_path = package.ensure_styles()?;

    let styles = package
        .part(&styles_path)
        .ok_or_else(|| Error::malformed(&styles_path, "part is missing from the package"))?;
    let (styles, fill_id) = append_fill(styles, color)?;
    let (styles, format_id) = append_cell_format(&styles, fill_id)?;
    package.set_part(&styles_path, styles);

    let sheet = package
        .part(&sheet_path)
        .ok_or_else(|| Error::malformed(&sheet_path, "part is missing from the package"))?;
    let (sheet, cells_styled) = style_first_row(sheet, format_id)?;
    package.set_part(&sheet_path, sheet);

    let report = HeaderFill {
        fill_id,
        format_id,
        cells_styled,
    };
    Ok((package.save()?, report))
}

/// Appends a solid fill to `<fills>` and returns the new XML with the fill's index.
pub fn append_fill(styles_xml: &[u8], color: &FillColor) -> Result<(Vec<u8>, u32)> {
    append_to_list(styles_xml, b"fills", b"fill", FILLS_FOLLOWERS, |w| {
        let mut pattern = BytesStart::new("patternFill");
        pattern.push_attribute(("patternType", "solid"));
        let mut fg = BytesStart::new("fgColor");
        fg.push_attribute(("rgb", color.argb()));
        let mut bg = BytesStart::new("bgColor");
        bg.push_attribute(("indexed", "64"));

        w.write_event(Event::Start(BytesStart::new("fill")))?;
        w.write_event(Event::Start(pattern))?;
        w.write_event(Event::Empty(fg))?;
        w.write_event(Event::Empty(bg))?;
        w.write_event(Event::End(BytesEnd::new("patternFill")))?;
        w.write_event(Event::End(BytesEnd::new("fill")))?;
        Ok(())
    })
}

/// Appends a cell format referencing `fill_id` to `<cellXfs>` and returns the new
/// XML with the format's index.
///
/// `fontId`, `borderId` and `xfId` point at entry 0 of their lists and are left
/// out when that list is empty.
pub fn append_cell_format(styles_xml: &[u8], fill_id: u32) -> Result<(Vec<u8>, u32)> {
    let fill_id = fill_id.to_string();
    let has_font = count_entries(styles_xml, b"fonts", b"font")?.unwrap_or(0) > 0;
    let has_border = count_entries(styles_xml, b"borders", b"border")?.unwrap_or(0) > 0;
    let has_style_xf = count_entries(styles_xml, b"cellStyleXfs", b"xf")?.unwrap_or(0) > 0;

    append_to_list(styles_xml, b"cellXfs", b"xf", CELL_XFS_FOLLOWERS, |w| {
        let mut xf = BytesStart::new("xf");
        xf.push_attribute(("numFmtId", "0"));
        if has_font {
            xf.push_attribute(("fontId", "0"));
        }
        xf.push_attribute(("fillId", fill_id.as_str()));
        if has_border {
            xf.push_attribute(("borderId", "0"));
        }
        if has_style_xf {
            xf.push_attribute(("xfId", "0"));
        }
        xf.push_attribute(("applyFill", "1"));
        w.write_event(Event::Empty(xf))?;
        Ok(())
    })
}

/// Sets `s="{format_id}"` on every cell of the first `<row>` in `<sheetData>`.
/// Returns the rewritten XML and how many cells were styled; a sheet without
/// rows comes back unchanged apart from serialization.
pub fn style_first_row(sheet_xml: &[u8], format_id: u32) -> Result<(Vec<u8>, usize)> {
    let style = format_id.to_string();
    let mut reader = Reader::from_reader(sheet_xml);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len() + 64));
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut sheet_data_depth = None;
    let mut saw_sheet_data = false;
    let mut row_depth = None;
    let mut row_done = false;
    let mut styled = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                let is_cell = row_depth == Some(depth.wrapping_sub(1)) && name == b"c";
                if sheet_data_depth.is_none() && name == b"sheetData" {
                    sheet_data_depth = Some(depth);
                    saw_sheet_data = true;
                } else if sheet_data_depth == Some(depth.wrapping_sub(1))
                    && name == b"row"
                    && !row_done
                {
                    row_depth = Some(depth);
                }
                if is_cell {
                    writer.write_event(Event::Start(with_attr(&e, "s", &style)?))?;
                    styled += 1;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                let is_cell = row_depth == Some(depth.wrapping_sub(1)) && name == b"c";
                if sheet_data_depth.is_none() && name == b"sheetData" {
                    saw_sheet_data = true;
                } else if sheet_data_depth == Some(depth.wrapping_sub(1)) && name == b"row" {
                    row_done = true;
                }
                if is_cell {
                    writer.write_event(Event::Empty(with_attr(&e, "s", &style)?))?;
                    styled += 1;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if row_depth == Some(depth) {
                    row_depth = None;
                    row_done = true;
                } else if sheet_data_depth == Some(depth) {
                    sheet_data_depth = None;
                }
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(Error::malformed(WORKSHEET, "<sheetData> not found"));
    }
    Ok((writer.into_inner(), styled))
}

/// Copy of `e` with attribute `key` set to `value`, replacing any previous value.
fn with_attr(e: &BytesStart<'_>, key: &str, value: &str) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = BytesStart::new(name);
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() != key.as_bytes() {
            elem.push_attribute(a);
        }
    }
    elem.push_attribute((key, value));
    Ok(elem)
}

/// Counts the direct `item` children of the stylesheet's `list` element.
/// `None` when the list is absent.
fn count_entries(xml: &[u8], list: &[u8], item: &[u8]) -> Result<Option<u32>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_list = false;
    let mut count = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name();
                if depth == 0 && name.as_ref() != STYLESHEET.as_bytes() {
                    return Err(Error::malformed(STYLESHEET, "root element is not <styleSheet>"));
                }
                if depth == 1 && name.as_ref() == list && count.is_none() {
                    in_list = true;
                    count = Some(0);
                } else if depth == 2 && in_list && name.as_ref() == item {
                    count = count.map(|n| n + 1);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if depth == 0 {
                    return Err(Error::malformed(STYLESHEET, "stylesheet has no content"));
                }
                if depth == 1 && name.as_ref() == list && count.is_none() {
                    count = Some(0);
                } else if depth == 2 && in_list && name.as_ref() == item {
                    count = count.map(|n| n + 1);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    in_list = false;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(Error::malformed(STYLESHEET, "unexpected end of document"));
    }
    Ok(count)
}

/// Appends one entry to a top-level stylesheet list, creating the list when
/// absent, and rewrites its `count` to the actual number of entries.
fn append_to_list<F>(
    xml: &[u8],
    list: &[u8],
    item: &[u8],
    followers: &[&[u8]],
    write_item: F,
) -> Result<(Vec<u8>, u32)>
where
    F: Fn(&mut Writer<Vec<u8>>) -> std::io::Result<()>,
{
    let existing = count_entries(xml, list, item)?;
    let index = existing.unwrap_or(0);
    let count = (index + 1).to_string();
    let list_name = String::from_utf8_lossy(list).into_owned();

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_list = false;
    let mut done = false;

    // Writes a complete `<list count="1">entry</list>`.
    let write_new_list = |w: &mut Writer<Vec<u8>>| -> std::io::Result<()> {
        let mut start = BytesStart::new(list_name.as_str());
        start.push_attribute(("count", count.as_str()));
        w.write_event(Event::Start(start))?;
        write_item(w)?;
        w.write_event(Event::End(BytesEnd::new(list_name.as_str())))
    };

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let is_list = depth == 1 && e.local_name().as_ref() == list;
                if depth == 1 && !done && existing.is_none() && followers.contains(&e.local_name().as_ref()) {
                    write_new_list(&mut writer)?;
                    done = true;
                }
                if is_list && !done {
                    writer.write_event(Event::Start(with_attr(&e, "count", &count)?))?;
                    in_list = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let is_list = depth == 1 && e.local_name().as_ref() == list;
                if depth == 1 && !done && existing.is_none() && followers.contains(&e.local_name().as_ref()) {
                    write_new_list(&mut writer)?;
                    done = true;
                }
                if is_list && !done {
                    // `<fills/>` becomes `<fills count="1"><fill>..</fill></fills>`.
                    let start = with_attr(&e, "count", &count)?;
                    let end = start.to_end().into_owned();
                    writer.write_event(Event::Start(start))?;
                    write_item(&mut writer)?;
                    writer.write_event(Event::End(end))?;
                    done = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if in_list && depth == 1 {
                    write_item(&mut writer)?;
                    in_list = false;
                    done = true;
                } else if depth == 0 && !done {
                    write_new_list(&mut writer)?;
                    done = true;
                }
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !done {
        return Err(Error::malformed(
            STYLESHEET,
            format!("could not place a new <{}> entry", String::from_utf8_lossy(item)),
        ));
    }
    Ok((writer.into_inner(), index))
}
