//! Decoding uploaded CSV and Excel files into a raw header/row table

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Only Excel (.xlsx, .xls) and CSV (.csv) files are allowed")]
    UnsupportedFormat,
    #[error("No data found in {0} file")]
    Empty(&'static str),
    #[error("Failed to read CSV: {0}")]
    Csv(String),
    #[error("Failed to read workbook: {0}")]
    Workbook(String),
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Workbook,
}

impl FileFormat {
    /// Detect the format from the file name, falling back to the
    /// client-supplied MIME type when the extension is not recognised
    pub fn detect(file_name: &str, mime: Option<&str>) -> Result<Self, TableError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") {
            return Ok(FileFormat::Csv);
        }
        if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            return Ok(FileFormat::Workbook);
        }

        let mime = mime.map(|m| m.split(';').next().unwrap_or(m).trim().to_lowercase());
        match mime.as_deref() {
            Some("text/csv" | "application/csv") => Ok(FileFormat::Csv),
            Some(XLSX_MIME | XLS_MIME) => Ok(FileFormat::Workbook),
            _ => Err(TableError::UnsupportedFormat),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FileFormat::Csv => "CSV",
            FileFormat::Workbook => "Excel",
        }
    }
}

/// Headers plus data rows, all cells rendered as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cell text at `column`, empty when the row is short
    pub fn cell<'a>(row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|c| row.get(c))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Decode an uploaded file
pub fn decode(bytes: &[u8], format: FileFormat) -> Result<RawTable, TableError> {
    let table = match format {
        FileFormat::Csv => decode_csv(bytes)?,
        FileFormat::Workbook => decode_workbook(bytes)?,
    };

    if table.rows.is_empty() {
        return Err(TableError::Empty(format.label()));
    }
    debug!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        format = format.label(),
        "Decoded upload"
    );
    Ok(table)
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn decode_csv(bytes: &[u8]) -> Result<RawTable, TableError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| TableError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| TableError::Csv(e.to_string()))?;
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if !is_blank_row(&row) {
            rows.push(row);
        }
    }

    Ok(RawTable { headers, rows })
}

fn decode_workbook(bytes: &[u8]) -> Result<RawTable, TableError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TableError::Workbook(e.to_string()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(TableError::Empty("Excel"));
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| TableError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| cell_text(c).trim().to_string())
            .collect(),
        None => return Err(TableError::Empty("Excel")),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|row| !is_blank_row(row))
        .collect();

    Ok(RawTable { headers, rows })
}

/// Render a cell as text; integral numbers lose the fractional part
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(FileFormat::detect("data.CSV", None), Ok(FileFormat::Csv));
        assert_eq!(
            FileFormat::detect("upload", Some("text/csv; charset=utf-8")),
            Ok(FileFormat::Csv)
        );
        assert_eq!(FileFormat::detect("q1.xlsx", None), Ok(FileFormat::Workbook));
        assert_eq!(
            FileFormat::detect("blob", Some(XLS_MIME)),
            Ok(FileFormat::Workbook)
        );
        assert_eq!(
            FileFormat::detect("notes.txt", Some("text/plain")),
            Err(TableError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_decode_csv_trims_headers_and_skips_blank_rows() {
        let csv = "\u{feff} FY ,Month,BDE\n2025,April,Asha\n,,\n2025,May,Ravi\n";
        let table = decode(csv.as_bytes(), FileFormat::Csv).unwrap();

        assert_eq!(table.headers, vec!["FY", "Month", "BDE"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2025", "May", "Ravi"]);
    }

    #[test]
    fn test_decode_csv_allows_ragged_rows() {
        let csv = "FY,Month,BDE\n2025,April\n";
        let table = decode(csv.as_bytes(), FileFormat::Csv).unwrap();

        assert_eq!(RawTable::cell(&table.rows[0], Some(1)), "April");
        assert_eq!(RawTable::cell(&table.rows[0], Some(2)), "");
        assert_eq!(RawTable::cell(&table.rows[0], None), "");
    }

    #[test]
    fn test_header_only_csv_is_empty() {
        let result = decode(b"FY,Month,BDE\n", FileFormat::Csv);
        assert_eq!(result, Err(TableError::Empty("CSV")));
        assert_eq!(
            result.unwrap_err().to_string(),
            "No data found in CSV file"
        );
    }

    #[test]
    fn test_extension_wins_over_mime() {
        assert_eq!(
            FileFormat::detect("may.xlsx", Some("text/csv")),
            Ok(FileFormat::Workbook)
        );
        assert_eq!(
            FileFormat::detect("may.csv", Some(XLSX_MIME)),
            Ok(FileFormat::Csv)
        );
    }

    #[test]
    fn test_decode_workbook_reads_first_sheet() {
        let bytes = include_bytes!("../../tests/fixtures/performance.xlsx");
        let table = decode(bytes, FileFormat::Workbook).unwrap();

        assert_eq!(table.headers.len(), 13);
        assert_eq!(table.headers[3], "Team Leader");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "2025");
        assert_eq!(table.rows[0][4], "Asha");
        assert_eq!(table.rows[0][11], "15");
        assert_eq!(table.rows[1][1], "June");
        assert_eq!(table.rows[1][4], "Vikram");
    }

    #[test]
    fn test_garbage_workbook_is_an_error() {
        let result = decode(b"definitely not a zip", FileFormat::Workbook);
        assert!(matches!(result, Err(TableError::Workbook(_))));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(2025.0), "2025");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(-3.0), "-3");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(45.0)), "45");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::String("Asha".into())), "Asha");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
