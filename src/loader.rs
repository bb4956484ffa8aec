use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, open_workbook};
use tracing::{debug, info};

use crate::domain::RVError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xlsx,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
}

pub fn get_file_info(path: PathBuf) -> Result<FileInfo, RVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RVError::FileNotFound,
        ErrorKind::PermissionDenied => RVError::PermissionDenied,
        _ => RVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(RVError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, RVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::Csv),
        Some("XLSX") => Ok(FileType::Xlsx),
        _ => Err(RVError::UnknownFileType),
    }
}

/// Decode the file into a header row and raw data rows of text.
///
/// The first source row becomes the header. Rows are handed over as
/// read, ragged lengths included; padding is the Store's job. A fully
/// empty source yields an empty header and no rows.
pub fn read_rows(info: &FileInfo) -> Result<(Vec<String>, Vec<Vec<String>>), RVError> {
    debug!(
        "Decoding {:?} ({} bytes) as {:?}",
        info.path, info.file_size, info.file_type
    );
    let mut raw = match info.file_type {
        FileType::Csv => read_csv(&info.path)?,
        FileType::Xlsx => read_xlsx(&info.path)?,
    };
    if raw.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let header = raw.remove(0);
    Ok((header, raw))
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>, RVError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RVError::SourceDecode(format!("Failed to open CSV file: {e}")))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| RVError::SourceDecode(format!("CSV parse error: {e}")))?;
        rows.push(record.iter().map(normalize_cell).collect());
    }
    Ok(rows)
}

/// Single sheet XLSX support: only the first worksheet is read.
fn read_xlsx(path: &Path) -> Result<Vec<Vec<String>>, RVError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| RVError::SourceDecode(format!("Failed to open XLSX file: {e}")))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| RVError::SourceDecode("XLSX file contains no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| RVError::SourceDecode(format!("Failed to read sheet {sheet:?}: {e}")))?;

    let mut rows = Vec::with_capacity(range.height());
    for row in range.rows() {
        rows.push(
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => normalize_cell(&other.to_string()),
                })
                .collect(),
        );
    }
    info!("Read {} rows from sheet {:?}", rows.len(), sheet);
    Ok(rows)
}

// Embedded line breaks would tear the grid apart when rendered.
fn normalize_cell(s: impl AsRef<str>) -> String {
    s.as_ref().replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_file_types_case_insensitively() {
        assert_eq!(
            detect_file_type(Path::new("data.csv")).unwrap(),
            FileType::Csv
        );
        assert_eq!(
            detect_file_type(Path::new("DATA.XLSX")).unwrap(),
            FileType::Xlsx
        );
        assert!(matches!(
            detect_file_type(Path::new("data.parquet")),
            Err(RVError::UnknownFileType)
        ));
        assert!(matches!(
            detect_file_type(Path::new("noext")),
            Err(RVError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_reports_not_found() {
        assert!(matches!(
            get_file_info(PathBuf::from("/no/such/file.csv")),
            Err(RVError::FileNotFound)
        ));
    }

    #[test]
    fn normalizes_embedded_newlines() {
        assert_eq!(normalize_cell("a\nb"), "a ↵ b");
        assert_eq!(normalize_cell("a\r\nb"), "a ↵ b");
        assert_eq!(normalize_cell("plain"), "plain");
    }

    fn fixture(name: &str) -> FileInfo {
        get_file_info(PathBuf::from(format!("tests/fixtures/{name}"))).unwrap()
    }

    #[test]
    fn reads_csv_fixture() {
        let (header, rows) = read_rows(&fixture("people.csv")).unwrap();
        assert_eq!(header, vec!["Name", "Age", "City"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "Bo");
    }

    #[test]
    fn ragged_csv_rows_are_passed_through() {
        let (header, rows) = read_rows(&fixture("ragged.csv")).unwrap();
        assert_eq!(header.len(), 3);
        // Shorter and longer rows reach the caller as read; padding and
        // column growth are the Store's job.
        assert_eq!(rows[0], vec!["X"]);
        assert_eq!(rows[1].len(), 4);
    }

    #[test]
    fn quoted_csv_fields_are_unescaped() {
        let (_, rows) = read_rows(&fixture("quoted.csv")).unwrap();
        assert_eq!(rows[0][0], "Doe, Jane");
        assert_eq!(rows[0][1], "said \"hi\"");
    }

    #[test]
    fn empty_csv_yields_nothing() {
        let (header, rows) = read_rows(&fixture("empty.csv")).unwrap();
        assert!(header.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn header_only_csv_yields_zero_rows() {
        let (header, rows) = read_rows(&fixture("header_only.csv")).unwrap();
        assert_eq!(header, vec!["Name", "Age"]);
        assert!(rows.is_empty());
    }

    #[test]
    fn reads_first_sheet_of_xlsx() {
        let (header, rows) = read_rows(&fixture("people.xlsx")).unwrap();
        assert_eq!(header, vec!["Name", "Age", "City"]);
        assert_eq!(rows[0][0], "Ann");
        assert_eq!(rows[0][1], "30");
        // A missing trailing cell comes back empty, never dropped.
        assert_eq!(rows[1][2], "");
    }
}
