//! XLSX writer

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};
use tally_core::{CellAddress, CellValue, SheetGrid};

/// Excel refuses sheet names longer than this
const MAX_SHEET_NAME_LEN: usize = 31;

/// Index of the date cell format in the stylesheet written below
const DATE_STYLE: usize = 1;

/// XLSX file writer
///
/// Every grid becomes one worksheet, written from A1 with no header row or
/// column. Empty cells are omitted. Sheet names must be unique ignoring
/// case, as Excel compares them that way.
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write named grids to a file path
    pub fn write_file<'a, P, I>(sheets: I, path: P) -> XlsxResult<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (&'a str, &'a SheetGrid)>,
    {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write(sheets, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write named grids to a writer
    pub fn write<'a, W, I>(sheets: I, writer: W) -> XlsxResult<()>
    where
        W: Write + Seek,
        I: IntoIterator<Item = (&'a str, &'a SheetGrid)>,
    {
        let sheets: Vec<(&str, &SheetGrid)> = sheets.into_iter().collect();
        if sheets.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "a workbook needs at least one sheet".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for (name, _) in &sheets {
            Self::validate_sheet_name(name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(XlsxError::InvalidFormat(format!(
                    "duplicate sheet name '{}'",
                    name
                )));
            }
        }

        let mut zip = zip::ZipWriter::new(writer);

        Self::write_content_types(&mut zip, sheets.len())?;
        Self::write_root_rels(&mut zip)?;
        Self::write_workbook_xml(&mut zip, &sheets)?;
        Self::write_workbook_rels(&mut zip, sheets.len())?;
        Self::write_styles_xml(&mut zip)?;

        for (i, (_, grid)) in sheets.iter().enumerate() {
            Self::write_worksheet(&mut zip, i, grid)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn validate_sheet_name(name: &str) -> XlsxResult<()> {
        if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(XlsxError::InvalidFormat(format!(
                "sheet name '{}' must be 1 to {} characters",
                name, MAX_SHEET_NAME_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        {
            return Err(XlsxError::InvalidFormat(format!(
                "sheet name '{}' contains '{}'",
                name, c
            )));
        }
        Ok(())
    }

    fn write_content_types<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        sheet_count: usize,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );

        for i in 0..sheet_count {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        content.push_str("\n</Types>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_root_rels<W: Write + Seek>(zip: &mut zip::ZipWriter<W>) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("_rels/.rels", options)?;

        let content = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_workbook_xml<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        sheets: &[(&str, &SheetGrid)],
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/workbook.xml", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
        );

        for (i, (name, _)) in sheets.iter().enumerate() {
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(name),
                i + 1,
                i + 1
            ));
        }

        content.push_str(
            r#"
    </sheets>
</workbook>"#,
        );

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_workbook_rels<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        sheet_count: usize,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for i in 0..sheet_count {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
            sheet_count + 1
        ));

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Minimal stylesheet with a General and a date cell format
    fn write_styles_xml<W: Write + Seek>(zip: &mut zip::ZipWriter<W>) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/styles.xml", options)?;

        let content = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd h:mm:ss"/></numFmts>
    <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
    <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
    <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
    <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
    <cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
    <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_worksheet<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        index: usize,
        grid: &SheetGrid,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if grid.rows() > 0 && grid.cols() > 0 {
            let last = CellAddress::new(grid.rows() as u32 - 1, grid.cols() as u16 - 1);
            content.push_str(&format!("\n    <dimension ref=\"A1:{}\"/>", last));
        }
        content.push_str("\n    <sheetData>");

        // Write cell data (sparse, row-major)
        let mut current_row: Option<usize> = None;
        for (row, col, value) in grid.iter_cells() {
            if current_row != Some(row) {
                if current_row.is_some() {
                    content.push_str("\n        </row>");
                }
                content.push_str(&format!("\n        <row r=\"{}\">", row + 1));
                current_row = Some(row);
            }

            let cell_ref = CellAddress::new(row as u32, col as u16).to_a1_string();
            Self::write_cell(&mut content, &cell_ref, value);
        }

        if current_row.is_some() {
            content.push_str("\n        </row>");
        }

        content.push_str("\n    </sheetData>\n</worksheet>");
        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_cell(content: &mut String, cell_ref: &str, value: &CellValue) {
        match value {
            CellValue::Number(n) if n.is_finite() => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\"><v>{}</v></c>",
                    cell_ref, n
                ));
            }
            CellValue::DateTime(d) if d.is_finite() => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\" s=\"{}\"><v>{}</v></c>",
                    cell_ref, DATE_STYLE, d
                ));
            }
            // NaN and infinities have no xsd:double spelling Excel accepts
            CellValue::Number(n) | CellValue::DateTime(n) => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    cell_ref, n
                ));
            }
            CellValue::String(s) => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    cell_ref,
                    escape_xml(s.as_str())
                ));
            }
            CellValue::Boolean(b) => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\" t=\"b\"><v>{}</v></c>",
                    cell_ref,
                    if *b { 1 } else { 0 }
                ));
            }
            CellValue::Error(e) => {
                content.push_str(&format!(
                    "\n            <c r=\"{}\" t=\"e\"><v>{}</v></c>",
                    cell_ref,
                    escape_xml(e.as_str())
                ));
            }
            CellValue::Empty => {}
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
