use std::sync::Arc;

use crate::types::{ColumnInfo, RowValues};

/// Rows produced by one statement.
///
/// Column metadata is shared by all rows; `insert_id` is the backend's last inserted row id
/// after the statement ran.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Vec<RowValues>>,
    /// Last inserted row id reported by the connection
    pub insert_id: i64,
    columns: Arc<Vec<ColumnInfo>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            insert_id: 0,
            columns: Arc::new(Vec::new()),
        }
    }

    /// Set the columns for this result set (shared by all rows)
    pub fn set_columns(&mut self, columns: Arc<Vec<ColumnInfo>>) {
        self.columns = columns;
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Add a row to the result set
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        self.results.push(row_values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
