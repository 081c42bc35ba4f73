//! Read-only summary of a result table.

use crate::table::{ResultTable, STATUS};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOverview {
    pub rows: usize,
    pub complete: usize,
    /// Incomplete rows that have never been attempted.
    pub pending: usize,
    pub columns: Vec<String>,
    /// Status text -> row count. Rows without a status are left out.
    pub by_status: BTreeMap<String, usize>,
}

impl TableOverview {
    pub fn from_table(table: &ResultTable) -> Self {
        let mut overview = TableOverview {
            rows: table.len(),
            columns: table.columns().to_vec(),
            ..TableOverview::default()
        };
        for row in 0..table.len() {
            let complete = table.is_complete(row);
            if complete {
                overview.complete += 1;
            }
            match table.get(row, STATUS).map(str::trim) {
                Some(status) if !status.is_empty() => {
                    *overview.by_status.entry(status.to_string()).or_insert(0) += 1;
                }
                _ if !complete => overview.pending += 1,
                _ => {}
            }
        }
        overview
    }

    /// Rows the next run would actually execute.
    pub fn remaining(&self) -> usize {
        self.rows - self.complete
    }
}
