//! Tabular parser: raw comma-delimited bytes to rows of text cells.
//!
//! Decoding is done by the `csv` crate. Its reader is lenient about stray
//! quotes, so the input is first scanned with a strict quoting check and
//! rejected when a quote is out of place:
//!
//! ```text
//! a,b"c        bare quote inside an unquoted field
//! "a"b,c       extraneous character after a closing quote
//! "a,b         quoted field never closed
//! ```

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::CqError;

/// Quoting state while scanning one field.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Quoting {
    FieldStart,
    Unquoted,
    Quoted,
    /// Just saw a `"` inside a quoted field: either an escape or the close.
    QuoteInQuoted,
}

/// Scan `input` for quoting errors.
///
/// Line and column numbers in the message are 1-based; columns count
/// characters, not bytes.
fn check_quoting(input: &[u8]) -> Result<(), String> {
    let mut state = Quoting::FieldStart;
    let mut line = 1;
    let mut col = 0;
    let mut open_line = 1;

    for &b in input {
        // Skip UTF-8 continuation bytes when counting columns
        if b & 0xC0 != 0x80 {
            col += 1;
        }

        state = match (state, b) {
            (Quoting::FieldStart, b'"') => {
                open_line = line;
                Quoting::Quoted
            }
            (Quoting::FieldStart | Quoting::Unquoted | Quoting::QuoteInQuoted, b',' | b'\n') => {
                Quoting::FieldStart
            }
            (Quoting::FieldStart | Quoting::QuoteInQuoted, b'\r') => Quoting::FieldStart,
            (Quoting::Unquoted, b'"') => {
                return Err(format!(
                    "line {line}, column {col}: bare \" in non-quoted field"
                ));
            }
            (Quoting::FieldStart | Quoting::Unquoted, _) => Quoting::Unquoted,
            (Quoting::Quoted, b'"') => Quoting::QuoteInQuoted,
            (Quoting::Quoted, _) => Quoting::Quoted,
            (Quoting::QuoteInQuoted, b'"') => Quoting::Quoted,
            (Quoting::QuoteInQuoted, _) => {
                return Err(format!(
                    "line {line}, column {col}: extraneous or missing \" in quoted field"
                ));
            }
        };

        if b == b'\n' {
            line += 1;
            col = 0;
        }
    }

    if state == Quoting::Quoted {
        return Err(format!(
            "line {open_line}: quoted field is never closed"
        ));
    }

    Ok(())
}

/// Cell text with quoted `\r\n` line breaks folded to `\n`.
fn record_cells(record: &StringRecord) -> Vec<String> {
    record
        .iter()
        .map(|cell| {
            if cell.contains('\r') {
                cell.replace("\r\n", "\n")
            } else {
                cell.to_string()
            }
        })
        .collect()
}

fn reader(input: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input)
}

/// Parse the whole input into rows of cells.
///
/// The first row is returned like any other; header handling happens in
/// [`crate::header`]. Rows may differ in length.
pub fn parse_table(input: &[u8]) -> Result<Vec<Vec<String>>, CqError> {
    check_quoting(input).map_err(CqError::MalformedInput)?;

    let mut rows = Vec::new();
    for result in reader(input).records() {
        let record = result.map_err(|e| CqError::MalformedInput(e.to_string()))?;
        rows.push(record_cells(&record));
    }

    debug!(rows = rows.len(), bytes = input.len(), "parsed csv input");
    Ok(rows)
}

/// Parse only the first row of the input.
///
/// Everything after the first record is left unread and unchecked, so a
/// malformed data row cannot fail a header-only run. Returns `None` when the
/// input holds no records at all.
pub fn read_header(input: &[u8]) -> Result<Option<Vec<String>>, CqError> {
    let mut rdr = reader(input);
    let mut record = StringRecord::new();

    // Decoding first tells us where the header record ends
    let found = rdr.read_record(&mut record);
    let end = (rdr.position().byte() as usize).min(input.len());
    check_quoting(&input[..end]).map_err(CqError::MalformedInput)?;

    let found = found.map_err(|e| CqError::MalformedInput(e.to_string()))?;
    if !found {
        return Ok(None);
    }

    debug!(columns = record.len(), "parsed csv header");
    Ok(Some(record_cells(&record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple() {
        let rows = parse_table(b"a,b\n1,2\n3,4\n").unwrap();
        assert_eq!(rows, vec![cells(&["a", "b"]), cells(&["1", "2"]), cells(&["3", "4"])]);
    }

    #[test]
    fn test_parse_quoted_delimiter_and_newline() {
        let rows = parse_table(b"name,note\n\"Doe, Jane\",\"line one\nline two\"\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Doe, Jane");
        assert_eq!(rows[1][1], "line one\nline two");
    }

    #[test]
    fn test_parse_doubled_quote() {
        let rows = parse_table(b"q\n\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(rows[1][0], "say \"hi\"");
    }

    #[test]
    fn test_parse_crlf() {
        let rows = parse_table(b"a,b\r\n1,2\r\n").unwrap();
        assert_eq!(rows, vec![cells(&["a", "b"]), cells(&["1", "2"])]);
    }

    #[test]
    fn test_parse_crlf_inside_quoted_field() {
        let rows = parse_table(b"a\r\n\"x\r\ny\"\r\n").unwrap();
        assert_eq!(rows, vec![cells(&["a"]), cells(&["x\ny"])]);
    }

    #[test]
    fn test_parse_no_trailing_newline() {
        let rows = parse_table(b"a\n1").unwrap();
        assert_eq!(rows, vec![cells(&["a"]), cells(&["1"])]);
    }

    #[test]
    fn test_parse_uneven_rows_allowed() {
        let rows = parse_table(b"a\n1,2\n").unwrap();
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_parse_empty_input() {
        let rows = parse_table(b"").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unterminated_quote_rejected() {
        let err = parse_table(b"a,b\n\"1,2\n").unwrap_err();
        match err {
            CqError::MalformedInput(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("Expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_quote_rejected() {
        let err = parse_table(b"a,b\n1,x\"y\n").unwrap_err();
        match err {
            CqError::MalformedInput(msg) => {
                assert!(msg.contains("line 2, column 4"), "{msg}");
                assert!(msg.contains("bare"));
            }
            other => panic!("Expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_extraneous_quote_rejected() {
        let err = parse_table(b"\"a\"b,c\n").unwrap_err();
        assert!(matches!(err, CqError::MalformedInput(_)));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = parse_table(b"a\n\xff\xfe\n").unwrap_err();
        assert!(matches!(err, CqError::MalformedInput(_)));
    }

    #[test]
    fn test_read_header_ignores_later_rows() {
        let header = read_header(b"First Name,Age\n\"broken,row\n").unwrap();
        assert_eq!(header, Some(cells(&["First Name", "Age"])));
    }

    #[test]
    fn test_read_header_checks_header_quoting() {
        let err = read_header(b"a\"b,c\n1,2\n").unwrap_err();
        assert!(matches!(err, CqError::MalformedInput(_)));
    }

    #[test]
    fn test_read_header_empty_input() {
        assert_eq!(read_header(b"").unwrap(), None);
    }
}
