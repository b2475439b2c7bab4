//! Row materializer: data rows to identifier-keyed mappings.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::CqError;
use crate::header::HeaderIndex;

/// One data row, keyed by normalized column identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, String>,
}

impl Row {
    /// Cell text for an identifier.
    pub fn get(&self, ident: &str) -> Option<&str> {
        self.fields.get(ident).map(String::as_str)
    }

    /// Fields in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Map one row of cells onto the header's identifiers.
///
/// A cell past the end of the header fails with `UnknownColumn`. When two
/// columns share an identifier the later one wins.
pub fn materialize(cells: &[String], header: &HeaderIndex) -> Result<Row, CqError> {
    let mut fields = BTreeMap::new();
    for (position, cell) in cells.iter().enumerate() {
        let ident = header.get(position)?;
        fields.insert(ident.to_string(), cell.clone());
    }
    Ok(Row { fields })
}

/// All data rows of one input, numbered from 1 after the header.
#[derive(Debug, Clone, Default)]
pub struct RowCollection {
    rows: Vec<Row>,
}

impl RowCollection {
    /// Materialize every data row.
    ///
    /// `records` are the rows after the header. The first error aborts the
    /// whole collection.
    pub fn from_records(records: &[Vec<String>], header: &HeaderIndex) -> Result<Self, CqError> {
        let mut rows = Vec::with_capacity(records.len());
        for (offset, cells) in records.iter().enumerate() {
            let row = materialize(cells, header).map_err(|e| match e {
                CqError::UnknownColumn { position, .. } => CqError::UnknownColumn {
                    row: offset + 1,
                    position,
                },
                other => other,
            })?;
            rows.push(row);
        }

        debug!(rows = rows.len(), "materialized rows");
        Ok(Self { rows })
    }

    /// Row by its 1-based number.
    pub fn get(&self, number: usize) -> Option<&Row> {
        number.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    /// Rows with their numbers, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().enumerate().map(|(i, row)| (i + 1, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
