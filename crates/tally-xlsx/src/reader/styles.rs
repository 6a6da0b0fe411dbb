//! Number formats from `xl/styles.xml`
//!
//! Only one thing is read from the stylesheet: which cell formats (`xf`
//! entries under `cellXfs`) display their number as a date or time.

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

/// Date flags for every cell format, indexed by a cell's `s` attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CellFormats {
    date_xfs: Vec<bool>,
}

impl CellFormats {
    /// Whether the cell format at `xf` displays a date or time
    pub(crate) fn is_date(&self, xf: usize) -> bool {
        self.date_xfs.get(xf).copied().unwrap_or(false)
    }
}

/// Whether a built-in or custom number format displays a date or time
fn is_date_format(id: u32, custom: Option<&str>) -> bool {
    match custom {
        Some(code) => is_date_format_code(code),
        None => matches!(id, 14..=22 | 45..=47),
    }
}

/// Whether a format code has date or time placeholders outside quoted text,
/// bracketed colors or conditions, and escaped characters.
fn is_date_format_code(code: &str) -> bool {
    // Only the positive section decides
    let mut chars = code.chars();
    let mut in_quote = false;
    let mut in_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            _ if in_bracket => {}
            // Escaped literal, padding or fill character
            '\\' | '_' | '*' => {
                chars.next();
            }
            ';' => return false,
            _ if matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's') => return true,
            _ => {}
        }
    }
    false
}

/// Read `xl/styles.xml` into per-`xf` date flags
pub(crate) fn read_cell_formats<R: Read>(reader: R) -> XlsxResult<CellFormats> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut numfmts: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => xf_formats.push(num_fmt_id(&e)),
                b"numFmt" => insert_numfmt(&e, &mut numfmts),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"xf" if in_cell_xfs => xf_formats.push(num_fmt_id(&e)),
                b"numFmt" => insert_numfmt(&e, &mut numfmts),
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let date_xfs = xf_formats
        .into_iter()
        .map(|id| is_date_format(id, numfmts.get(&id).map(String::as_str)))
        .collect();
    Ok(CellFormats { date_xfs })
}

fn num_fmt_id(e: &BytesStart) -> u32 {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"numFmtId")
        .and_then(|attr| attr.unescape_value().ok().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

fn insert_numfmt(e: &BytesStart, numfmts: &mut HashMap<u32, String>) {
    let mut id = None;
    let mut code = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"numFmtId" => id = attr.unescape_value().ok().and_then(|s| s.parse().ok()),
            b"formatCode" => code = attr.unescape_value().ok().map(|s| s.to_string()),
            _ => {}
        }
    }
    if let (Some(id), Some(code)) = (id, code) {
        numfmts.insert(id, code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_date_formats() {
        assert!(is_date_format(14, None));
        assert!(is_date_format(22, None));
        assert!(is_date_format(46, None));
        assert!(!is_date_format(0, None));
        assert!(!is_date_format(4, None));
        assert!(!is_date_format(49, None));
    }

    #[test]
    fn test_custom_date_format_codes() {
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("[$-409]d-mmm-yy;@"));
        assert!(is_date_format_code("h:mm AM/PM"));
        assert!(!is_date_format_code("#,##0.00_);[Red](#,##0.00)"));
        assert!(!is_date_format_code("0.00\" days\""));
        assert!(!is_date_format_code("#,##0\\h"));
        assert!(!is_date_format_code("General"));
    }

    #[test]
    fn test_read_cell_formats() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="2">
    <numFmt numFmtId="164" formatCode="yyyy&quot;年&quot;m&quot;月&quot;"/>
    <numFmt numFmtId="165" formatCode="0.0%"/>
  </numFmts>
  <cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs>
  <cellXfs count="5">
    <xf numFmtId="0"/>
    <xf numFmtId="14" applyNumberFormat="1"/>
    <xf numFmtId="164"><alignment horizontal="center"/></xf>
    <xf numFmtId="165"/>
    <xf/>
  </cellXfs>
</styleSheet>"#;
        let formats = read_cell_formats(xml.as_bytes()).unwrap();
        let flags: Vec<bool> = (0..6).map(|i| formats.is_date(i)).collect();
        assert_eq!(flags, vec![false, true, true, false, false, false]);
    }
}
