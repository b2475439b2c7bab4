//! Template renderer.
//!
//! A format string is compiled once and rendered for every row. Two
//! placeholder syntaxes are accepted:
//!
//! - shorthand `\(.field)`, rewritten textually to `{{ .field }}` before
//!   parsing;
//! - native double-brace actions with pipelines, `if`/`with`/`range`
//!   blocks and the functions in [`funcs`].
//!
//! ```
//! use cq_rs::template::CompiledTemplate;
//! use cq_rs::{HeaderIndex, materialize};
//!
//! let header = HeaderIndex::from_row(&["First Name".to_string()]);
//! let row = materialize(&["Ada".to_string()], &header).unwrap();
//!
//! let tmpl = CompiledTemplate::compile(r"\(.LINENUM): \(.first_name)").unwrap();
//! let mut out = Vec::new();
//! tmpl.render(1, &row, &mut out).unwrap();
//! assert_eq!(out, b"1: Ada\n");
//! ```

pub mod exec;
pub mod funcs;
pub mod lexer;
pub mod parse;
pub mod value;

use std::collections::BTreeMap;
use std::io::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::CqError;
use crate::row::Row;

use parse::Node;
use value::Value;

/// Name of the synthetic field holding the 1-based row number.
pub const LINENUM: &str = "LINENUM";

static SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\((\..*?)\)").expect("shorthand pattern is valid"));

/// Rewrite every `\(.x)` into `{{ .x }}` in a single pass.
///
/// Only the text between `\(` and the first following `)` is carried
/// over; nothing else in the format string is touched.
pub fn rewrite_shorthand(format: &str) -> String {
    SHORTHAND.replace_all(format, "{{ ${1} }}").into_owned()
}

/// Append a newline unless the template already ends with one.
pub fn ensure_trailing_newline(mut source: String) -> String {
    if !source.ends_with('\n') {
        source.push('\n');
    }
    source
}

/// A format string parsed and ready to render rows.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    /// Rewrite shorthand placeholders, terminate with a newline, and parse.
    pub fn compile(format: &str) -> Result<Self, CqError> {
        let source = ensure_trailing_newline(rewrite_shorthand(format));
        let items = lexer::lex(&source).map_err(CqError::TemplateSyntax)?;
        let nodes = parse::parse(items).map_err(CqError::TemplateSyntax)?;

        debug!(template = %source.escape_debug(), nodes = nodes.len(), "compiled template");
        Ok(Self { source, nodes })
    }

    /// Template text after shorthand rewriting.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render one row to `out`, with `LINENUM` bound to `linenum`.
    ///
    /// The row is rendered into a buffer first, so a failing row writes
    /// nothing.
    pub fn render<W: Write>(&self, linenum: usize, row: &Row, out: &mut W) -> Result<(), CqError> {
        let mut scope: BTreeMap<String, Value> = row
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        scope.insert(
            LINENUM.to_string(),
            Value::Int(i64::try_from(linenum).unwrap_or(i64::MAX)),
        );
        let root = Value::Map(scope);

        let mut rendered = String::new();
        exec::execute(&self.nodes, &root, &mut rendered).map_err(|message| {
            CqError::TemplateExecution {
                row: linenum,
                message,
            }
        })?;

        out.write_all(rendered.as_bytes())?;
        trace!(row = linenum, bytes = rendered.len(), "rendered row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderIndex;
    use crate::row::materialize;

    fn row(names: &[&str], cells: &[&str]) -> Row {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let cells: Vec<String> = cells.iter().map(|s| s.to_string()).collect();
        materialize(&cells, &HeaderIndex::from_row(&names)).unwrap()
    }

    fn render(format: &str, linenum: usize, row: &Row) -> Result<String, CqError> {
        let tmpl = CompiledTemplate::compile(format)?;
        let mut out = Vec::new();
        tmpl.render(linenum, row, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_rewrite_shorthand() {
        assert_eq!(rewrite_shorthand(r"\(.a)-\(.b)"), "{{ .a }}-{{ .b }}");
    }

    #[test]
    fn test_rewrite_leaves_native_syntax() {
        let native = r#"{{ if .a }}{{ replace "x" "y" .a }}{{ end }}"#;
        assert_eq!(rewrite_shorthand(native), native);
    }

    #[test]
    fn test_rewrite_requires_dot() {
        assert_eq!(rewrite_shorthand(r"\(a)"), r"\(a)");
    }

    #[test]
    fn test_rewrite_stops_at_first_paren() {
        assert_eq!(rewrite_shorthand(r"\(.a))"), "{{ .a }})");
    }

    #[test]
    fn test_trailing_newline() {
        assert_eq!(ensure_trailing_newline("x".to_string()), "x\n");
        assert_eq!(ensure_trailing_newline("x\n".to_string()), "x\n");
        assert_eq!(ensure_trailing_newline(String::new()), "\n");
    }

    #[test]
    fn test_compile_source() {
        let tmpl = CompiledTemplate::compile(r"\(.a)").unwrap();
        assert_eq!(tmpl.source(), "{{ .a }}\n");
    }

    #[test]
    fn test_shorthand_matches_native() {
        let r = row(&["foo"], &["bar"]);
        assert_eq!(
            render(r"<\(.foo)>", 1, &r).unwrap(),
            render("<{{ .foo }}>", 1, &r).unwrap()
        );
    }

    #[test]
    fn test_render_linenum() {
        let r = row(&["a"], &["x"]);
        assert_eq!(render(r"\(.LINENUM)=\(.a)", 2, &r).unwrap(), "2=x\n");
    }

    #[test]
    fn test_render_helpers() {
        let r = row(&["First Name", "Last Name"], &["Ada", "Lovelace"]);
        let out = render(
            r#"{{ join " " .first_name .last_name | replace "a" "4" }}"#,
            1,
            &r,
        )
        .unwrap();
        assert_eq!(out, "Ad4 Lovel4ce\n");
    }

    #[test]
    fn test_render_missing_field() {
        let r = row(&["a"], &["x"]);
        let err = render(r"\(.b)", 4, &r).unwrap_err();
        match err {
            CqError::TemplateExecution { row, message } => {
                assert_eq!(row, 4);
                assert!(message.contains("\"b\""), "{message}");
            }
            other => panic!("Expected TemplateExecution, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_render_writes_nothing() {
        let r = row(&["a"], &["x"]);
        let tmpl = CompiledTemplate::compile(r"\(.a) \(.b)").unwrap();
        let mut out = Vec::new();
        assert!(tmpl.render(1, &r, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_compile_syntax_error() {
        let err = CompiledTemplate::compile("{{ if .a }}x").unwrap_err();
        assert!(matches!(err, CqError::TemplateSyntax(_)));
        let err = CompiledTemplate::compile("{{ .a").unwrap_err();
        assert!(matches!(err, CqError::TemplateSyntax(_)));
    }

    #[test]
    fn test_compile_unknown_function() {
        let err = CompiledTemplate::compile("{{ upper .a }}").unwrap_err();
        assert!(err.to_string().contains("not defined"));
    }

    #[test]
    fn test_embedded_newlines_kept() {
        let r = row(&["a", "b"], &["1", "2"]);
        assert_eq!(render("a=\\(.a)\nb=\\(.b)", 1, &r).unwrap(), "a=1\nb=2\n");
    }
}
