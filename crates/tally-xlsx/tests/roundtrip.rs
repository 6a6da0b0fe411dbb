//! Reading and writing grids through real XLSX packages.

use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use tally_core::{CellError, CellValue, SheetGrid};
use tally_xlsx::{XlsxError, XlsxReader, XlsxWriter};

/// Build a minimal workbook package from raw worksheet XML.
fn package(sheets: &[(&str, &str)], shared_strings: Option<&str>) -> Vec<u8> {
    let parts: Vec<(&str, &str)> = shared_strings
        .map(|sst| ("xl/sharedStrings.xml", sst))
        .into_iter()
        .collect();
    package_with(sheets, &parts, "")
}

/// Like [`package`], with extra parts by path and raw XML placed before
/// `<sheets>` in workbook.xml.
fn package_with(sheets: &[(&str, &str)], parts: &[(&str, &str)], workbook_head: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#).unwrap();

        let mut workbook = String::from(r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
        workbook.push_str(workbook_head);
        workbook.push_str("<sheets>");
        let mut rels = String::from(r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        for (i, (name, _)) in sheets.iter().enumerate() {
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                name,
                i + 1,
                i + 1
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }
        workbook.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(workbook.as_bytes()).unwrap();
        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();

        for (path, xml) in parts {
            zip.start_file(*path, options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }

        for (i, (_, xml)) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }

        zip.finish().unwrap();
    }
    buf
}

fn worksheet(sheet_data: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_data
    )
}

#[test]
fn test_sheet_names_in_workbook_order() {
    let empty = worksheet("");
    let bytes = package(&[("Cafeteria", &empty), ("Canteen", &empty)], None);
    let book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();

    assert_eq!(book.sheet_names(), vec!["Cafeteria", "Canteen"]);
    assert!(book.has_sheet("Canteen"));
    assert!(!book.has_sheet("canteen"));
}

#[test]
fn test_read_sheet_with_shared_strings_and_gaps() {
    let sst = r#"<?xml version="1.0"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Hdr</t></si><si><r><t>Rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si></sst>"#;
    let xml = worksheet(
        r#"<row r="1"><c r="A1"><v>10</v></c><c r="B1" t="s"><v>0</v></c></row>
           <row r="3"><c r="C3" t="s"><v>1</v></c><c r="D3" s="2"/></row>"#,
    );
    let bytes = package(&[("S", &xml)], Some(sst));
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();
    let grid = book.read_sheet("S").unwrap();

    assert_eq!(grid.shape(), (3, 3));
    assert_eq!(grid.get(0, 0), Some(&CellValue::Number(10.0)));
    assert_eq!(grid.get(0, 1), Some(&CellValue::string("Hdr")));
    assert_eq!(grid.get(1, 1), Some(&CellValue::Empty));
    assert_eq!(grid.get(2, 2), Some(&CellValue::string("Rich text")));
}

#[test]
fn test_read_sheet_uses_cached_formula_values() {
    let xml = worksheet(
        r#"<row r="1"><c r="A1"><f>SUM(B1:C1)</f><v>7</v></c><c r="B1" t="str"><f>"x"</f><v>x</v></c><c r="C1"><f>NOW()</f></c></row>"#,
    );
    let bytes = package(&[("S", &xml)], None);
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();
    let grid = book.read_sheet("S").unwrap();

    assert_eq!(
        grid,
        SheetGrid::from_rows(vec![vec![CellValue::Number(7.0), CellValue::string("x")]])
    );
}

#[test]
fn test_read_sheet_without_cell_references() {
    let xml = worksheet(
        r#"<row><c><v>1</v></c><c t="inlineStr"><is><t> padded </t></is></c></row><row><c/><c t="e"><v>#N/A</v></c></row>"#,
    );
    let bytes = package(&[("S", &xml)], None);
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();
    let grid = book.read_sheet("S").unwrap();

    assert_eq!(grid.shape(), (2, 2));
    assert_eq!(grid.get(0, 1), Some(&CellValue::string(" padded ")));
    assert_eq!(grid.get(1, 1), Some(&CellValue::Error(CellError::Na)));
}

#[test]
fn test_read_missing_sheet_is_an_error() {
    let bytes = package(&[("S", &worksheet(""))], None);
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();

    assert!(matches!(
        book.read_sheet("Other"),
        Err(XlsxError::SheetNotFound(name)) if name == "Other"
    ));
}

#[test]
fn test_non_zip_input_is_rejected() {
    let result = XlsxReader::from_reader(Cursor::new(b"not a workbook".to_vec()));
    assert!(matches!(result, Err(XlsxError::Zip(_))));
}

#[test]
fn test_write_then_read_preserves_grids() {
    let summary = SheetGrid::from_rows(vec![
        vec![CellValue::Number(30.0), CellValue::string("Hdr & <more>")],
        vec![CellValue::Empty, CellValue::Number(0.125)],
        vec![CellValue::Boolean(true), CellValue::Error(CellError::Div0)],
    ]);
    let other = SheetGrid::from_rows(vec![vec![CellValue::Empty, CellValue::Empty, CellValue::Number(-2.5)]]);

    let mut buf = Vec::new();
    XlsxWriter::write([("局食堂", &summary), ("Other", &other)], Cursor::new(&mut buf)).unwrap();

    let mut book = XlsxReader::from_reader(Cursor::new(buf)).unwrap();
    assert_eq!(book.sheet_names(), vec!["局食堂", "Other"]);
    assert_eq!(book.read_sheet("局食堂").unwrap(), summary);
    assert_eq!(book.read_sheet("Other").unwrap(), other);
}

#[test]
fn test_write_file_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    let grid = SheetGrid::from_rows(vec![vec![CellValue::string("  keep spaces  ")]]);

    XlsxWriter::write_file([("S", &grid)], &path).unwrap();

    let mut book = XlsxReader::open(&path).unwrap();
    assert_eq!(book.read_sheet("S").unwrap(), grid);
}

const DATE_STYLES: &str = r#"<?xml version="1.0"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy/m/d"/></numFmts><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/><xf numFmtId="164" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

#[test]
fn test_read_typed_cells_with_styles() {
    let sheet = worksheet(
        r##"<row r="1"><c r="A1" s="1"><v>45292</v></c><c r="B1" s="2"><v>45292.5</v></c><c r="C1" s="0"><v>45292</v></c></row>
            <row r="2"><c r="A2" s="1" t="b"><v>1</v></c><c r="B2" t="e"><v>#REF!</v></c><c r="C2"><v>7</v></c></row>"##,
    );
    let bytes = package_with(&[("S", &sheet)], &[("xl/styles.xml", DATE_STYLES)], "");
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();

    assert_eq!(
        book.read_sheet("S").unwrap(),
        SheetGrid::from_rows(vec![
            vec![
                CellValue::DateTime(45292.0),
                CellValue::DateTime(45292.5),
                CellValue::Number(45292.0),
            ],
            vec![
                CellValue::Boolean(true),
                CellValue::Error(CellError::Ref),
                CellValue::Number(7.0),
            ],
        ])
    );
}

#[test]
fn test_read_1904_date_system() {
    let sheet = worksheet(r#"<row r="1"><c r="A1" s="1"><v>43830</v></c></row>"#);
    let bytes = package_with(
        &[("S", &sheet)],
        &[("xl/styles.xml", DATE_STYLES)],
        r#"<workbookPr date1904="1"/>"#,
    );
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();

    let grid = book.read_sheet("S").unwrap();
    assert_eq!(grid.get(0, 0), Some(&CellValue::DateTime(45292.0)));
    assert_eq!(grid.get(0, 0).unwrap().to_string(), "2024-01-01 00:00:00");
}

#[test]
fn test_write_then_read_preserves_dates() {
    let grid = SheetGrid::from_rows(vec![vec![
        CellValue::DateTime(45292.25),
        CellValue::Number(45292.0),
    ]]);

    let mut buf = Vec::new();
    XlsxWriter::write([("S", &grid)], Cursor::new(&mut buf)).unwrap();

    let mut book = XlsxReader::from_reader(Cursor::new(buf)).unwrap();
    assert_eq!(book.read_sheet("S").unwrap(), grid);
}

#[test]
fn test_far_away_cell_is_an_error_not_an_allocation() {
    let sheet = worksheet(r#"<row r="1048576"><c r="XFD1048576"><v>1</v></c></row>"#);
    let bytes = package(&[("S", &sheet), ("T", &worksheet(r#"<row r="1"><c r="A1"><v>1</v></c></row>"#))], None);
    let mut book = XlsxReader::from_reader(Cursor::new(bytes)).unwrap();

    assert!(matches!(
        book.read_sheet("S"),
        Err(XlsxError::Core(tally_core::Error::GridTooLarge { .. }))
    ));
    // The workbook stays usable
    assert_eq!(book.read_sheet("T").unwrap().shape(), (1, 1));
}
