//! Portfolio spreadsheet (CSV) parser with encoding and delimiter auto-detection.
//!
//! Rows become [`Record`]s keyed by the header row. Cells are typed on the
//! way in: empty cells are null, numeric text becomes a number, anything
//! else stays text.

use serde_json::{Number, Value};
use std::path::Path;

use crate::error::CsvResult;
use crate::models::Record;

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// How to read an upload.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Lines dropped before the header row.
    pub skip_rows: usize,
    /// Field delimiter; detected from the header line when `None`.
    pub delimiter: Option<char>,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, made unique
    pub headers: Vec<String>,
}

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// True for workbook uploads, which only the backend can read.
///
/// Decided by file extension, or by the zip (`PK\x03\x04`) or OLE2
/// signature when the name says nothing.
pub fn is_spreadsheet(file_name: Option<&str>, bytes: &[u8]) -> bool {
    let by_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| SPREADSHEET_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));
    match by_name {
        Some(known) => known,
        None => bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]),
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
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

/// Drop the first `count` lines.
fn skip_lines(content: &str, count: usize) -> &str {
    if count == 0 {
        return content;
    }
    match content.match_indices('\n').nth(count - 1) {
        Some((idx, _)) => &content[idx + 1..],
        None => "",
    }
}

/// Make header names unique and non-empty.
///
/// Repeats get a `.1`, `.2`... suffix; blank names become `Unnamed: <index>`.
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

/// Typed value of one raw cell.
pub fn infer_cell(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    if has_leading_zero(text) {
        return Value::String(text.to_string());
    }
    if is_integer_text(text) {
        // past the i64 range a float would round the digits
        return match text.parse::<i64>() {
            Ok(i) => Value::Number(Number::from(i)),
            Err(_) => Value::String(text.to_string()),
        };
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

// Identifiers like "00123" must keep their zeros.
fn has_leading_zero(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(|c| c == '-' || c == '+').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, skip_rows: usize) -> CsvResult<(Vec<String>, Vec<Record>)> {
    let content = skip_lines(content, skip_rows);
    let header_line = skip_rows + 1;

    if content.trim().is_empty() {
        return Err(CsvError::new(header_line, "Empty CSV file"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(header_line, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if raw_headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(header_line, "No headers found"));
    }
    let headers = unique_headers(raw_headers);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize + skip_rows).unwrap_or(0);
            CsvError::new(line, format!("Cannot read line: {}", e))
        })?;

        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).map(infer_cell).unwrap_or(Value::Null);
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    Ok((headers, records))
}

/// Parse CSV bytes, detecting encoding and (unless given) the delimiter.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(skip_lines(&content, options.skip_rows)));

    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Delimiter must be ASCII, got '{}'", delimiter)));
    }

    let (headers, records) = parse_str(&content, delimiter, options.skip_rows)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file from disk.
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;

    parse_bytes(&bytes, options)
}
