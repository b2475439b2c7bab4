//! Header index: column positions, raw names and normalized identifiers.
//!
//! The first input row names the columns. Each name is normalized into a
//! slug that templates use to refer to the column:
//!
//! ```
//! use cq_rs::header::slugify;
//!
//! assert_eq!(slugify("First Name"), "first_name");
//! assert_eq!(slugify("  Odd--Name!!"), "odd_name");
//! ```

use std::collections::HashMap;

use crate::error::CqError;

/// Normalize a raw header name into a field identifier.
///
/// Non-ASCII letters are transliterated first (`Café` gives `cafe`). The
/// result is lowercased, every run of other characters becomes a single
/// `_`, and separators are stripped from both ends.
pub fn slugify(raw: &str) -> String {
    slug::slugify(raw).replace('-', "_")
}

/// One header column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub position: usize,
    /// Name as it appeared in the input.
    pub name: String,
    /// Normalized identifier used in templates.
    pub ident: String,
}

impl Column {
    /// The shorthand placeholder a format string uses for this column.
    pub fn placeholder(&self) -> String {
        format!("\\(.{})", self.ident)
    }
}

/// Maps header positions to names and identifiers.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: Vec<Column>,
    /// Raw name to position; a repeated raw name keeps its last position.
    ids: HashMap<String, usize>,
}

impl HeaderIndex {
    /// Build the index from the first input row.
    pub fn from_row(cells: &[String]) -> Self {
        let mut columns = Vec::with_capacity(cells.len());
        let mut ids = HashMap::with_capacity(cells.len());

        for (position, name) in cells.iter().enumerate() {
            columns.push(Column {
                position,
                name: name.clone(),
                ident: slugify(name),
            });
            ids.insert(name.clone(), position);
        }

        Self { columns, ids }
    }

    /// Identifier for a column position.
    ///
    /// Fails with `UnknownColumn` for a position past the end of the header.
    /// The row number in the error is left at 0 for the caller to fill in.
    pub fn get(&self, position: usize) -> Result<&str, CqError> {
        self.columns
            .get(position)
            .map(|c| c.ident.as_str())
            .ok_or(CqError::UnknownColumn { row: 0, position })
    }

    /// Raw display name for a column position.
    pub fn name(&self, position: usize) -> Option<&str> {
        self.columns.get(position).map(|c| c.name.as_str())
    }

    /// Position of a raw header name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    /// Columns in ascending position order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> HeaderIndex {
        let cells: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        HeaderIndex::from_row(&cells)
    }

    #[test]
    fn test_slugify_spaces() {
        assert_eq!(slugify("First Name"), "first_name");
    }

    #[test]
    fn test_slugify_punctuation_runs() {
        assert_eq!(slugify("  Odd--Name!!"), "odd_name");
        assert_eq!(slugify("E-mail / Address"), "e_mail_address");
    }

    #[test]
    fn test_slugify_keeps_digits_and_transliterates() {
        assert_eq!(slugify("Q3 2024"), "q3_2024");
        assert_eq!(slugify("Café Owner"), "cafe_owner");
        assert_eq!(slugify("São Paulo Café"), "sao_paulo_cafe");
    }

    #[test]
    fn test_slugify_underscores_are_separators() {
        assert_eq!(slugify("__a__b__"), "a_b");
    }

    #[test]
    fn test_slugify_idempotent() {
        for raw in ["First Name", "  Odd--Name!!", "already_slug", "ÀB c"] {
            let once = slugify(raw);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_slugify_all_punctuation() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_from_row() {
        let h = header(&["First Name", "Age"]);
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).unwrap(), "first_name");
        assert_eq!(h.get(1).unwrap(), "age");
        assert_eq!(h.name(0), Some("First Name"));
        assert_eq!(h.position_of("Age"), Some(1));
    }

    #[test]
    fn test_get_unknown_position() {
        let h = header(&["a"]);
        match h.get(1) {
            Err(CqError::UnknownColumn { position, .. }) => assert_eq!(position, 1),
            other => panic!("Expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_raw_name_last_wins() {
        let h = header(&["id", "name", "id"]);
        assert_eq!(h.position_of("id"), Some(2));
        // Both positions still resolve
        assert_eq!(h.get(0).unwrap(), "id");
        assert_eq!(h.get(2).unwrap(), "id");
    }

    #[test]
    fn test_columns_in_position_order() {
        let h = header(&["c", "b", "a"]);
        let positions: Vec<usize> = h.columns().iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_placeholder() {
        let h = header(&["First Name"]);
        assert_eq!(h.columns()[0].placeholder(), "\\(.first_name)");
    }
}
