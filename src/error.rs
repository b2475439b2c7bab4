//! Error taxonomy for cq.
//!
//! Every failure is fatal. Library code returns `CqError` up to a single
//! handler in the binary, which prints the message and maps the variant to
//! an exit status via [`CqError::exit_code`].

use thiserror::Error;

/// All the ways a cq run can fail.
#[derive(Debug, Error)]
pub enum CqError {
    /// No format string was supplied on the command line.
    #[error("please provide an output format")]
    Usage,

    /// Input is not valid delimited text.
    #[error("error parsing csv: {0}")]
    MalformedInput(String),

    /// Input has no rows, or the header row has no cells.
    #[error("your csv should have columns and rows")]
    EmptyInput,

    /// A data row has a cell at a position the header never defined.
    #[error("row {row}: could not find column {position}")]
    UnknownColumn { row: usize, position: usize },

    /// Format string is not a valid template after shorthand rewriting.
    #[error("template: {0}")]
    TemplateSyntax(String),

    /// Template failed while rendering a row.
    #[error("template: row {row}: {message}")]
    TemplateExecution { row: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CqError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CqError::Usage => 2,
            _ => 1,
        }
    }
}
