//! CSV ingestion with encoding and delimiter detection.
//!
//! Turns CSV text into a [`Table`]. The first record is the header, blank
//! lines are skipped, and quoted fields follow RFC 4180 (embedded delimiters,
//! doubled quotes and line breaks are all fine).

use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::{IngestionError, PipelineResult, ReadError, TableError};
use crate::models::{Cell, Row, Table};

/// Options controlling ingestion.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Field delimiter; `None` auto-detects from the header line.
    pub delimiter: Option<char>,
    /// Convert numeric/boolean/empty fields to typed cells.
    pub dynamic_typing: bool,
    /// Reject inputs larger than this many bytes.
    pub max_bytes: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: Some(','),
            dynamic_typing: true,
            max_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl ParseResult {
    pub fn headers(&self) -> &[String] {
        self.table.columns()
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, IngestionError> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            let (text, _, malformed) = encoding_rs::ISO_8859_15.decode(bytes);
            if malformed {
                return Err(IngestionError::Encoding(format!("invalid {} sequence", encoding)));
            }
            text.into_owned()
        }
        "windows-1252" | "cp1252" => {
            let (text, _, malformed) = encoding_rs::WINDOWS_1252.decode(bytes);
            if malformed {
                return Err(IngestionError::Encoding(format!("invalid {} sequence", encoding)));
            }
            text.into_owned()
        }
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Reject paths that do not end in `.csv` (case-insensitive).
pub fn ensure_csv_extension(path: &Path) -> Result<(), IngestionError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        Ok(())
    } else {
        Err(IngestionError::NotCsv(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        ))
    }
}

/// Parse comma-separated text with dynamic typing.
///
/// # Example
/// ```ignore
/// use tabclean::csv_to_table;
///
/// let table = csv_to_table("name,age\nAlice,30\nBob,25").unwrap();
///
/// assert_eq!(table.row_count(), 2);
/// assert_eq!(table.columns(), &["name", "age"]);
/// ```
pub fn csv_to_table(csv: &str) -> Result<Table, IngestionError> {
    parse_csv(csv, ',', true)
}

/// Parse CSV text into a table.
pub fn parse_csv(content: &str, delimiter: char, dynamic_typing: bool) -> Result<Table, IngestionError> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| IngestionError::Malformed {
            line: 1,
            message: format!("delimiter '{}' is not a single ASCII character", delimiter),
        })?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true) // Short rows pad with null, long rows are cut
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    // Get headers from first non-blank record
    let header_record = loop {
        match records.next() {
            None => return Err(IngestionError::NoHeaders),
            Some(Err(e)) => return Err(malformed(&e)),
            Some(Ok(record)) if is_blank(&record) => continue,
            Some(Ok(record)) => break record,
        }
    };

    let headers: Vec<String> = header_record.iter().map(|h| h.to_string()).collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestionError::NoHeaders);
    }

    // Parse data rows
    let mut rows = Vec::new();

    for result in records {
        let record = result.map_err(|e| malformed(&e))?;

        if is_blank(&record) {
            continue;
        }

        let row: Row = (0..headers.len())
            .map(|i| {
                record
                    .get(i)
                    .map(|raw| Cell::from_raw(raw, dynamic_typing))
                    .unwrap_or(Cell::Null)
            })
            .collect();

        rows.push(row);
    }

    if rows.is_empty() {
        return Err(IngestionError::Empty);
    }

    Table::new(headers, rows).map_err(|e| match e {
        TableError::DuplicateColumn(c) => IngestionError::DuplicateColumn(c),
        other => IngestionError::Malformed {
            line: 1,
            message: other.to_string(),
        },
    })
}

/// Parse CSV bytes: size check, encoding detection, delimiter, then [`parse_csv`].
pub fn parse_bytes(bytes: &[u8], options: &IngestOptions) -> Result<ParseResult, IngestionError> {
    if let Some(limit) = options.max_bytes {
        if bytes.len() > limit {
            return Err(IngestionError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
    }

    // Detect encoding
    let encoding = detect_encoding(bytes);

    // Decode content
    let content = decode_content(bytes, &encoding)?;

    // Detect delimiter
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let table = parse_csv(&content, delimiter, options.dynamic_typing)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file from disk.
///
/// Read failures come back as [`ReadError`], everything else as
/// [`IngestionError`], both wrapped in the pipeline error.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file("/path/to/file.csv", &IngestOptions::default())?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.row_count());
/// ```
pub fn parse_csv_file<P: AsRef<Path>>(path: P, options: &IngestOptions) -> PipelineResult<ParseResult> {
    let path = path.as_ref();
    ensure_csv_extension(path)?;

    let bytes = std::fs::read(path).map_err(|source| ReadError::File {
        path: path.display().to_string(),
        source,
    })?;

    Ok(parse_bytes(&bytes, options)?)
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|f| f.is_empty()) && record.len() <= 1
}

fn malformed(err: &csv::Error) -> IngestionError {
    IngestionError::Malformed {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let table = csv_to_table("name,age\nAlice,30\nBob,25").unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, "name"), Some(&Cell::text("Alice")));
        assert_eq!(table.value(0, "age"), Some(&Cell::Number(30.0)));
        assert_eq!(table.value(1, "name"), Some(&Cell::text("Bob")));
        assert_eq!(table.value(1, "age"), Some(&Cell::Number(25.0)));
    }

    #[test]
    fn test_without_dynamic_typing() {
        let table = parse_csv("a,b\n1,\n", ',', false).unwrap();

        assert_eq!(table.value(0, "a"), Some(&Cell::text("1")));
        assert_eq!(table.value(0, "b"), Some(&Cell::text("")));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,note\n\"Smith, Jane\",\"said \"\"hi\"\"\"";
        let table = csv_to_table(csv).unwrap();

        assert_eq!(table.value(0, "name"), Some(&Cell::text("Smith, Jane")));
        assert_eq!(table.value(0, "note"), Some(&Cell::text("said \"hi\"")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = csv_to_table("a,b\n1,2\n\n   \n3,4\n").unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_missing_values() {
        let table = csv_to_table("a,b,c\n1,,3").unwrap();

        assert_eq!(table.value(0, "a"), Some(&Cell::Number(1.0)));
        assert_eq!(table.value(0, "b"), Some(&Cell::Null));
        assert_eq!(table.value(0, "c"), Some(&Cell::Number(3.0)));
    }

    #[test]
    fn test_short_rows_padded() {
        let table = csv_to_table("a,b,c\n1").unwrap();
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.value(0, "c"), Some(&Cell::Null));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let table = csv_to_table("a,b\n1,2,3,4").unwrap();

        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows()[0].len(), 2);
        assert_eq!(table.value(0, "b"), Some(&Cell::Number(2.0)));
    }

    #[test]
    fn test_header_only_is_empty_error() {
        let err = csv_to_table("a,b\n\n").unwrap_err();
        assert!(matches!(err, IngestionError::Empty));
    }

    #[test]
    fn test_empty_input_has_no_headers() {
        assert!(matches!(csv_to_table("").unwrap_err(), IngestionError::NoHeaders));
        assert!(matches!(csv_to_table(",,\n1,2,3").unwrap_err(), IngestionError::NoHeaders));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = csv_to_table("a,b,a\n1,2,3").unwrap_err();
        assert!(matches!(err, IngestionError::DuplicateColumn(c) if c == "a"));
    }

    #[test]
    fn test_headers_trimmed() {
        let table = csv_to_table(" name , age \nAlice,30").unwrap();
        assert_eq!(table.columns(), &["name", "age"]);
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_delimiter_default() {
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_parse_bytes_auto_delimiter() {
        let options = IngestOptions {
            delimiter: None,
            ..IngestOptions::default()
        };
        let result = parse_bytes(b"name;age\nAlice;30\nBob;25", &options).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.headers(), &["name", "age"]);
    }

    #[test]
    fn test_parse_bytes_too_large() {
        let options = IngestOptions {
            max_bytes: Some(4),
            ..IngestOptions::default()
        };
        let err = parse_bytes(b"a,b\n1,2", &options).unwrap_err();
        assert!(matches!(err, IngestionError::TooLarge { size: 7, limit: 4 }));
    }

    #[test]
    fn test_bom_stripped() {
        let result = parse_bytes("\u{feff}id,name\n1,x".as_bytes(), &IngestOptions::default()).unwrap();
        assert_eq!(result.headers(), &["id", "name"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_extension_check() {
        assert!(ensure_csv_extension(Path::new("data/sales.CSV")).is_ok());
        let err = ensure_csv_extension(Path::new("data/sales.xlsx")).unwrap_err();
        assert!(matches!(err, IngestionError::NotCsv(name) if name == "sales.xlsx"));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name,age").unwrap();
        writeln!(file, "Alice,30").unwrap();

        let result = parse_csv_file(&path, &IngestOptions::default()).unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_csv_file(dir.path().join("absent.csv"), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Read(ReadError::File { .. })));
    }

    #[test]
    fn test_wrong_extension_is_ingestion_error() {
        let err = parse_csv_file("report.json", &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(IngestionError::NotCsv(_))));
    }
}
