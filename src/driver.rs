//! Run a whole cq invocation: read input, index headers, render rows.
//!
//! Everything here returns `Result`; exiting the process is left to the
//! binary.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::CqError;
use crate::header::HeaderIndex;
use crate::row::RowCollection;
use crate::table::{parse_table, read_header};
use crate::template::CompiledTemplate;

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Output format; required unless `show_headers` is set.
    pub format: Option<String>,
    /// List the columns instead of rendering rows.
    pub show_headers: bool,
}

/// Print the column listing for a header.
pub fn write_headers<W: Write>(header: &HeaderIndex, out: &mut W) -> Result<(), CqError> {
    writeln!(out, "This spreadsheet has the following columns:")?;
    writeln!(out)?;
    for column in header.columns() {
        writeln!(
            out,
            "- {}, {} - Use: '{}'",
            column.position,
            column.name,
            column.placeholder()
        )?;
    }
    Ok(())
}

/// Run cq over `input`, writing to `out`.
///
/// Rows are rendered in input order. Output already written for earlier
/// rows stays in `out` if a later row fails.
pub fn run<R: Read, W: Write>(config: &RunConfig, mut input: R, mut out: W) -> Result<(), CqError> {
    let format = match (&config.format, config.show_headers) {
        (Some(format), _) => Some(format.as_str()),
        (None, true) => None,
        (None, false) => return Err(CqError::Usage),
    };

    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;

    if config.show_headers {
        let cells = read_header(&bytes)?
            .filter(|cells| !cells.is_empty())
            .ok_or(CqError::EmptyInput)?;
        write_headers(&HeaderIndex::from_row(&cells), &mut out)?;
        out.flush()?;
        return Ok(());
    }

    let records = parse_table(&bytes)?;
    let Some((first, data)) = records.split_first() else {
        return Err(CqError::EmptyInput);
    };
    if first.is_empty() {
        return Err(CqError::EmptyInput);
    }

    let header = HeaderIndex::from_row(first);
    debug!(columns = header.len(), "indexed header");

    let rows = RowCollection::from_records(data, &header)?;
    let template = CompiledTemplate::compile(format.unwrap_or_default())?;

    for (number, row) in rows.iter() {
        template.render(number, row, &mut out)?;
    }
    out.flush()?;

    debug!(rows = rows.len(), "rendered all rows");
    Ok(())
}
