//! XLSX reader
//!
//! [`XlsxReader::open`] reads only the workbook index: sheet names, their
//! part paths, the shared string table and the date flags of cell formats.
//! Worksheet parts are decoded one at a time by [`XlsxWorkbook::read_sheet`].

mod styles;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use styles::{read_cell_formats, CellFormats};
use tally_core::{CellAddress, CellError, CellValue, SharedString, SheetGrid, DATE1904_OFFSET};

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '_' || chars.peek() != Some(&'x') {
            result.push(c);
            continue;
        }
        chars.next(); // consume 'x'

        // Try to read 4 hex digits
        let mut hex_chars = String::new();
        while hex_chars.len() < 4 {
            match chars.peek() {
                Some(&ch) if ch.is_ascii_hexdigit() => {
                    hex_chars.push(ch);
                    chars.next();
                }
                _ => break,
            }
        }

        let decoded = if hex_chars.len() == 4 && chars.peek() == Some(&'_') {
            u32::from_str_radix(&hex_chars, 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            None
        };

        match decoded {
            Some(ch) => {
                chars.next(); // consume closing '_'
                result.push(ch);
            }
            None => {
                // Not a valid escape sequence, output what we consumed
                result.push_str("_x");
                result.push_str(&hex_chars);
            }
        }
    }

    result
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Open a workbook from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<XlsxWorkbook<BufReader<File>>> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Open a workbook from any seekable reader
    pub fn from_reader<R: Read + Seek>(reader: R) -> XlsxResult<XlsxWorkbook<R>> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = read_shared_strings(&mut archive)?;
        let formats = match archive.by_name("xl/styles.xml") {
            Ok(file) => read_cell_formats(file)?,
            // No stylesheet means every cell uses the General format
            Err(_) => CellFormats::default(),
        };
        let WorkbookIndex { sheets: sheet_info, date1904 } = read_workbook_xml(&mut archive)?;
        let sheet_paths = read_workbook_rels(&mut archive)?;

        let mut sheets = Vec::with_capacity(sheet_info.len());
        for (name, r_id) in sheet_info {
            match sheet_paths.get(&r_id) {
                Some(path) => sheets.push(SheetEntry {
                    name,
                    path: path.clone(),
                }),
                // Chart sheets and dialog sheets have no worksheet relationship
                None => tracing::debug!(sheet = %name, "skipping sheet without worksheet part"),
            }
        }

        Ok(XlsxWorkbook {
            archive,
            sheets,
            context: DecodeContext {
                shared_strings,
                formats,
                date1904,
            },
        })
    }
}

#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    path: String,
}

/// Workbook-wide tables needed to turn raw cell text into values
#[derive(Debug, Default)]
struct DecodeContext {
    shared_strings: Vec<SharedString>,
    formats: CellFormats,
    date1904: bool,
}

/// An opened XLSX workbook whose worksheets are decoded on demand.
pub struct XlsxWorkbook<R> {
    archive: zip::ZipArchive<R>,
    sheets: Vec<SheetEntry>,
    context: DecodeContext,
}

impl<R: Read + Seek> XlsxWorkbook<R> {
    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Whether the workbook has a worksheet with this exact name
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    /// Decode a worksheet into a positional grid anchored at A1
    pub fn read_sheet(&mut self, name: &str) -> XlsxResult<SheetGrid> {
        let path = self
            .sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.path.clone())
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))?;

        read_worksheet(&mut self.archive, &path, &self.context)
    }
}

/// Read the shared strings table
fn read_shared_strings<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> XlsxResult<Vec<SharedString>> {
    let mut strings = Vec::new();

    let file = match archive.by_name("xl/sharedStrings.xml") {
        Ok(f) => f,
        Err(_) => return Ok(strings), // No shared strings is valid
    };

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(false);

    let mut buf = Vec::new();
    let mut current_string = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_rph = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current_string.clear();
                }
                // Phonetic runs are reading hints, not part of the text
                b"rPh" => in_rph = true,
                b"t" if in_si && !in_rph => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(SharedString::new(""));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(SharedString::new(decode_excel_escapes(&current_string)));
                    current_string.clear();
                    in_si = false;
                }
                b"rPh" => in_rph = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_t => {
                if let Ok(text) = e.unescape() {
                    current_string.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Sheet list and date system from workbook.xml
struct WorkbookIndex {
    /// `(name, rId)` in workbook order
    sheets: Vec<(String, String)>,
    date1904: bool,
}

/// Read workbook.xml to get sheet names, rIds and the date system
fn read_workbook_xml<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> XlsxResult<WorkbookIndex> {
    let file = archive
        .by_name("xl/workbook.xml")
        .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut date1904 = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"workbookPr" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"date1904" {
                        let value = attr.unescape_value().ok();
                        date1904 = matches!(value.as_deref(), Some("1") | Some("true"));
                    }
                }
            }
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut r_id = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        b"r:id" => {
                            r_id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        _ => {}
                    }
                }

                if let (Some(name), Some(r_id)) = (name, r_id) {
                    sheets.push((name, r_id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(WorkbookIndex { sheets, date1904 })
}

/// Read workbook.xml.rels to get worksheet part paths keyed by rId
fn read_workbook_rels<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> XlsxResult<HashMap<String, String>> {
    let file = archive
        .by_name("xl/_rels/workbook.xml.rels")
        .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;

                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().ok().map(|s| s.to_string());
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Target" => target = value,
                        b"Type" => rel_type = value,
                        _ => {}
                    }
                }

                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        // Target is relative to xl/ unless absolute
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        };
                        rels.insert(id, full_path);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// A `<c>` element being assembled while its children stream past
struct PendingCell {
    row: u32,
    col: u16,
    cell_type: Option<String>,
    /// Index into `cellXfs` from the `s` attribute
    style: Option<usize>,
    raw: Option<String>,
}

/// Read one worksheet part into a grid
fn read_worksheet<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
    context: &DecodeContext,
) -> XlsxResult<SheetGrid> {
    let file = archive
        .by_name(path)
        .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(false);

    let mut buf = Vec::new();
    let mut cells: Vec<(u32, u16, CellValue)> = Vec::new();

    let mut current_row: Option<u32> = None;
    let mut next_col: u16 = 0;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_str = false;
    let mut in_inline_text = false;
    let mut in_rph = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = Some(row_index(&e, current_row)?);
                    next_col = 0;
                }
                b"c" => {
                    pending = Some(start_cell(&e, current_row, &mut next_col)?);
                }
                b"v" if pending.is_some() => in_value = true,
                b"is" if pending.is_some() => in_inline_str = true,
                b"rPh" => in_rph = true,
                b"t" if in_inline_str && !in_rph => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = Some(row_index(&e, current_row)?);
                    next_col = 0;
                }
                b"c" => {
                    // A bare <c/> only carries a style; it still occupies a column slot
                    start_cell(&e, current_row, &mut next_col)?;
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = decode_cell(&cell, context)?;
                        cells.push((cell.row, cell.col, value));
                    }
                    in_value = false;
                    in_inline_str = false;
                    in_inline_text = false;
                }
                b"v" => in_value = false,
                b"is" => in_inline_str = false,
                b"rPh" => in_rph = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_value || in_inline_text => {
                if let Some(cell) = pending.as_mut() {
                    let text = e.unescape()?;
                    cell.raw.get_or_insert_with(String::new).push_str(&text);
                    if in_inline_text {
                        cell.cell_type = Some("inlineStr".to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(SheetGrid::from_sparse(cells)?)
}

/// Resolve the zero-based index of a `<row>`; rows without `r` follow the previous one
fn row_index(e: &BytesStart, previous: Option<u32>) -> XlsxResult<u32> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"r" {
            let value = attr
                .unescape_value()
                .map_err(|e| XlsxError::Parse(format!("Invalid row attribute: {}", e)))?;
            let r: u32 = value
                .parse()
                .map_err(|_| XlsxError::Parse(format!("Invalid row number '{}'", value)))?;
            return Ok(r.saturating_sub(1));
        }
    }
    Ok(previous.map_or(0, |r| r + 1))
}

/// Resolve the position and type of a `<c>` element
fn start_cell(
    e: &BytesStart,
    current_row: Option<u32>,
    next_col: &mut u16,
) -> XlsxResult<PendingCell> {
    let mut address = None;
    let mut cell_type = None;
    let mut style = None;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                let value = attr.unescape_value().ok().map(|s| s.to_string());
                if let Some(value) = value {
                    let addr = CellAddress::parse(&value).map_err(|e| {
                        XlsxError::Parse(format!("Invalid cell reference '{}': {}", value, e))
                    })?;
                    address = Some(addr);
                }
            }
            b"t" => {
                cell_type = attr.unescape_value().ok().map(|s| s.to_string());
            }
            b"s" => {
                style = attr.unescape_value().ok().and_then(|s| s.parse().ok());
            }
            _ => {}
        }
    }

    let (row, col) = match address {
        Some(addr) => (addr.row, addr.col),
        None => (current_row.unwrap_or(0), *next_col),
    };
    *next_col = col.saturating_add(1);

    Ok(PendingCell {
        row,
        col,
        cell_type,
        style,
        raw: None,
    })
}

/// Turn the raw text of a cell into a value according to its `t` attribute.
/// Numbers whose cell format is a date become [`CellValue::DateTime`].
fn decode_cell(cell: &PendingCell, context: &DecodeContext) -> XlsxResult<CellValue> {
    let Some(raw) = cell.raw.as_deref() else {
        // Formula without cached value, or a style-only cell
        return Ok(CellValue::Empty);
    };

    let value = match cell.cell_type.as_deref() {
        // Shared string
        Some("s") => {
            let idx: usize = raw.trim().parse().map_err(|_| {
                XlsxError::Parse(format!("Invalid shared string index: {}", raw))
            })?;
            let s = context.shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
            })?;
            CellValue::String(s.clone())
        }

        Some("b") => {
            let raw = raw.trim();
            CellValue::Boolean(raw == "1" || raw.eq_ignore_ascii_case("true"))
        }

        Some("e") => CellError::parse(raw.trim())
            .map(CellValue::Error)
            .unwrap_or_else(|| CellValue::string(raw)),

        Some("inlineStr") | Some("str") => CellValue::string(decode_excel_escapes(raw)),

        // Number (default type or explicit "n")
        None | Some("n") => match raw.trim().parse::<f64>() {
            Ok(n) if cell.style.is_some_and(|xf| context.formats.is_date(xf)) => {
                CellValue::DateTime(if context.date1904 {
                    n + DATE1904_OFFSET
                } else {
                    n
                })
            }
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::string(raw),
        },

        // ISO dates ("d") and unknown types are kept as text
        Some(_) => CellValue::string(raw),
    };

    Ok(value)
}
