//! In-memory tabular data read from a delimited text file
//!
//! A [`Frame`] keeps every cell as text. Type coercion happens in the
//! warehouse when the rows are copied into a typed table.

use crate::schema::normalize_column_name;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Reader settings for source files
///
/// Encoding (UTF-8) and the line terminator (`\n`, optionally preceded by
/// `\r`) are fixed; only the field delimiter is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter byte
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Errors that can occur when reading a source file
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Malformed CSV{}: {message}", .line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Malformed { line: Option<u64>, message: String },

    #[error("CSV has no header row")]
    MissingHeader,

    #[error("Header {index} is blank")]
    BlankHeader { index: usize },
}

impl ParseError {
    fn from_csv(err: csv::Error) -> Self {
        ParseError::Malformed {
            line: err.position().map(|p| p.line()),
            message: err.to_string(),
        }
    }
}

/// Header row plus string cells, one `Vec` per data row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Column headers, in file order
    pub headers: Vec<String>,

    /// Data rows; every row has `headers.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    /// Create a frame from headers and rows
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a delimited file with a header row
    pub fn from_path(path: &Path, options: &CsvOptions) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ParseError::NotFound(path.to_path_buf()),
            _ => ParseError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

        Self::from_reader(file, options)
    }

    /// Read delimited text with a header row from any reader
    pub fn from_reader<R: Read>(reader: R, options: &CsvOptions) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(ParseError::from_csv)?
            .iter()
            .map(str::to_string)
            .collect();
        let headers = strip_carriage_return(headers);

        if headers.is_empty() {
            return Err(ParseError::MissingHeader);
        }
        if let Some(index) = headers.iter().position(|h| h.trim().is_empty()) {
            return Err(ParseError::BlankHeader { index });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(ParseError::from_csv)?;
            rows.push(strip_carriage_return(record.iter().map(str::to_string).collect()));
        }

        Ok(Self { headers, rows })
    }

    /// Upper-case and trim every header in place
    pub fn normalize_headers(&mut self) {
        for header in &mut self.headers {
            *header = normalize_column_name(header);
        }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a header
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Write the frame back out as CSV (header row first)
    pub fn write_csv<W: Write>(&self, writer: W, options: &CsvOptions) -> Result<(), ParseError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(writer);

        writer.write_record(&self.headers).map_err(ParseError::from_csv)?;
        for row in &self.rows {
            writer.write_record(row).map_err(ParseError::from_csv)?;
        }

        writer.flush().map_err(|e| ParseError::Malformed {
            line: None,
            message: e.to_string(),
        })
    }
}

/// Drop the `\r` a CRLF line ending leaves on the last field
fn strip_carriage_return(mut fields: Vec<String>) -> Vec<String> {
    if let Some(last) = fields.last_mut() {
        if last.ends_with('\r') {
            last.pop();
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<Frame, ParseError> {
        Frame::from_reader(text.as_bytes(), &CsvOptions::default())
    }

    #[test]
    fn reads_headers_and_rows() {
        let frame = parse("Bus_Date,Venue_Code\n2024-01-01,V001\n2024-01-02,V002\n").unwrap();

        assert_eq!(frame.headers, vec!["Bus_Date", "Venue_Code"]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows[1], vec!["2024-01-02", "V002"]);
    }

    #[test]
    fn crlf_line_endings() {
        let frame = parse("Bus_Date,Games_Played_Sum\r\n2024-03-01,200\r\n2024-03-02,\"201\"\r\n").unwrap();

        assert_eq!(frame.headers, vec!["Bus_Date", "Games_Played_Sum"]);
        assert_eq!(frame.rows, vec![vec!["2024-03-01", "200"], vec!["2024-03-02", "201"]]);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let frame = parse("EGM_DESCRIPTION,FP\n\"Dragon, Gold\",12\n").unwrap();
        assert_eq!(frame.rows[0][0], "Dragon, Gold");
    }

    #[test]
    fn normalizes_headers() {
        let mut frame = parse(" bus_date , Venue_Code\n2024-01-01,V001\n").unwrap();
        frame.normalize_headers();
        assert_eq!(frame.headers, vec!["BUS_DATE", "VENUE_CODE"]);
        assert_eq!(frame.column_index("VENUE_CODE"), Some(1));
    }

    #[test]
    fn ragged_row_is_malformed() {
        let result = parse("A,B\n1,2\n3\n");
        match result {
            Err(ParseError::Malformed { line, .. }) => assert!(line.is_some()),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(parse(""), Err(ParseError::MissingHeader)));
    }

    #[test]
    fn blank_header_is_rejected() {
        assert!(matches!(parse("A, ,C\n1,2,3\n"), Err(ParseError::BlankHeader { index: 1 })));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let bytes: &[u8] = b"A,B\n\xff\xfe,2\n";
        let result = Frame::from_reader(bytes, &CsvOptions::default());
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = Frame::from_path(Path::new("/nonexistent/input.csv"), &CsvOptions::default());
        assert!(matches!(result, Err(ParseError::NotFound(_))));
    }

    #[test]
    fn custom_delimiter() {
        let options = CsvOptions { delimiter: b';' };
        let frame = Frame::from_reader("A;B\n1;2\n".as_bytes(), &options).unwrap();
        assert_eq!(frame.rows[0], vec!["1", "2"]);
    }

    #[test]
    fn write_csv_reproduces_frame() {
        let frame = Frame::new(
            vec!["VENUE_CODE".to_string(), "EGM_DESCRIPTION".to_string()],
            vec![vec!["V001".to_string(), "Lucky \"7\", deluxe".to_string()]],
        );

        let mut out = Vec::new();
        frame.write_csv(&mut out, &CsvOptions::default()).unwrap();

        let reread = Frame::from_reader(out.as_slice(), &CsvOptions::default()).unwrap();
        assert_eq!(reread, frame);
    }
}
