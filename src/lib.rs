//! # cq-rs
//!
//! Render CSV rows through a text template.
//!
//! The first input row names the columns. Each name is normalized into an
//! identifier (`"First Name"` becomes `first_name`) and every following row
//! is rendered through a format string that refers to columns by that
//! identifier.
//!
//! ## Overview
//!
//! - **Table**: comma-delimited input parsed into rows of cells
//! - **Header index**: column positions, raw names and identifiers
//! - **Rows**: each data row as an identifier-keyed mapping
//! - **Template**: `\(.field)` shorthand or `{{ .field }}` native actions,
//!   with `join`/`replace` helpers and `if`/`with`/`range` blocks
//!
//! ## Example
//!
//! ```
//! use cq_rs::{RunConfig, run};
//!
//! let input = "Name,Age\nAda,36\nAlan,41\n";
//! let config = RunConfig {
//!     format: Some(r"\(.LINENUM): \(.name) is \(.age)".to_string()),
//!     show_headers: false,
//! };
//!
//! let mut out = Vec::new();
//! run(&config, input.as_bytes(), &mut out).unwrap();
//! assert_eq!(out, b"1: Ada is 36\n2: Alan is 41\n");
//! ```

pub mod driver;
pub mod error;
pub mod header;
pub mod row;
pub mod table;
pub mod template;

pub use driver::{RunConfig, run, write_headers};
pub use error::CqError;
pub use header::{Column, HeaderIndex, slugify};
pub use row::{Row, RowCollection, materialize};
pub use table::{parse_table, read_header};
pub use template::{CompiledTemplate, LINENUM};
