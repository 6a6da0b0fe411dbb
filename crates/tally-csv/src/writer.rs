//! CSV writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use tally_core::{CellValue, SheetGrid};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write a grid to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        grid: &SheetGrid,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(grid, BufWriter::new(file), options)
    }

    /// Write a grid to a writer, one record per row
    pub fn write<W: Write>(
        grid: &SheetGrid,
        mut writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        if options.byte_order_mark {
            writer.write_all(UTF8_BOM)?;
        }

        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .flexible(true)
            .from_writer(writer);

        for row in grid.iter_rows() {
            let record: Vec<String> = row.iter().map(format_value).collect();
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Render a cell for delimited text.
///
/// Numbers use the shortest representation that round-trips and always
/// carry a decimal point (`10.0`, `0.12`), so a column of sums reads as
/// floating point.
pub fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => format!("{:?}", n),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> SheetGrid {
        SheetGrid::from_rows(vec![
            vec![CellValue::string("文件名"), CellValue::string("S_A1")],
            vec![CellValue::string("a, b.xlsx"), CellValue::Number(10.0)],
            vec![CellValue::string("合计"), CellValue::Number(0.12)],
        ])
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&CellValue::Number(30.0)), "30.0");
        assert_eq!(format_value(&CellValue::Number(0.12)), "0.12");
        assert_eq!(format_value(&CellValue::Empty), "");
        assert_eq!(format_value(&CellValue::Boolean(false)), "FALSE");
        assert_eq!(format_value(&CellValue::DateTime(45292.0)), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_write_with_bom_and_quoting() {
        let mut out = Vec::new();
        CsvWriter::write(&table(), &mut out, &CsvWriteOptions::default()).unwrap();

        assert!(out.starts_with(UTF8_BOM));
        let text = String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "文件名,S_A1\n\"a, b.xlsx\",10.0\n合计,0.12\n");
    }

    #[test]
    fn test_write_without_bom_semicolon_crlf() {
        let options = CsvWriteOptions {
            delimiter: b';',
            line_terminator: LineTerminator::CRLF,
            byte_order_mark: false,
            ..Default::default()
        };
        let mut out = Vec::new();
        CsvWriter::write(&table(), &mut out, &options).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "文件名;S_A1\r\na, b.xlsx;10.0\r\n合计;0.12\r\n");
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detail.csv");
        CsvWriter::write_file(&table(), &path, &CsvWriteOptions::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert!(String::from_utf8_lossy(&bytes).contains("合计,0.12"));
    }
}
