use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::capability::{QueryColumn, QueryStatus};

/// One result row: column name to value, in result-set column order.
/// `None` is SQL NULL.
pub type Row = IndexMap<String, Option<String>>;

/// Fully collected result set of a finished query.
///
/// Every row in `rows` has one cell per entry in `columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Final execution status, including scan statistics.
    pub metadata: QueryStatus,
}

/// Athena pricing: $5 per TB scanned.
const DOLLARS_PER_BYTE: f64 = 5.0 / (1024.0 * 1024.0 * 1024.0 * 1024.0);

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value at `row` / `col`. `None` for out-of-range, unknown column, or NULL.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&str> {
        let col_idx = self.column_index(col)?;
        self.rows.get(row)?.get(col_idx)?.as_deref()
    }

    /// Rows keyed by column name.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows.iter().map(|r| zip_row(&self.columns, r)).collect()
    }

    pub fn cost_estimate_usd(&self) -> f64 {
        self.metadata.bytes_scanned as f64 * DOLLARS_PER_BYTE
    }
}

/// Pair cells with column names. Short rows are padded with NULL.
pub(crate) fn zip_row(columns: &[QueryColumn], cells: &[Option<String>]) -> Row {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), cells.get(i).cloned().flatten()))
        .collect()
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return write!(f, "(empty result set)");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell.as_deref().unwrap_or("NULL").len());
            }
        }

        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:<width$}", col.name, width = widths[i])?;
        }
        writeln!(f)?;

        for (i, w) in widths.iter().enumerate() {
            if i > 0 {
                write!(f, "-+-")?;
            }
            write!(f, "{}", "-".repeat(*w))?;
        }
        writeln!(f)?;

        for row in &self.rows {
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                let value = row.get(i).and_then(|c| c.as_deref()).unwrap_or("NULL");
                write!(f, "{:<width$}", value, width = *width)?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        write!(
            f,
            "Query {} | {} rows | {:.3} MB scanned | {}ms | ${:.6}",
            self.metadata.query_id,
            self.rows.len(),
            self.metadata.bytes_scanned as f64 / (1024.0 * 1024.0),
            self.metadata.execution_time_ms,
            self.cost_estimate_usd(),
        )
    }
}
