//! Column-by-column grid assembly.
//!
//! The assembler folds a stream of parsed builds (most recent first)
//! into the dense grid: one column record per build, one row per display
//! name, results kept as a canonical run-length encoding that always
//! covers every column position. Rows absent from a column are padded
//! with NO_RESULT; rows first seen mid-stream are backfilled the same
//! way. Cell ids, messages and icons are placeholder content drawn from
//! a counter scoped to this grid, so assembling the same columns twice
//! yields identical bytes.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::column::Column;
use crate::naming::NameConfig;
use crate::sortorder::natural_cmp;
use crate::state::{self, Grid, Metric, TestResult};

/// `Commit` is surfaced to dashboards from the `repo-commit` metadata
/// key, shortened the way humans quote commits.
const COMMIT_HEADER: &str = "Commit";
const COMMIT_KEY: &str = "repo-commit";
const COMMIT_LEN: usize = 9;

/// Builds one group's [`Grid`] from a sequence of columns.
pub struct GridAssembler {
    grid: Grid,
    headers: Vec<String>,
    names: NameConfig,
    /// Display name → position in `grid.rows`.
    index: HashMap<String, usize>,
    /// Placeholder cell content counter, scoped to this grid.
    cell_seq: u64,
}

impl GridAssembler {
    pub fn new(headers: Vec<String>, names: NameConfig) -> Self {
        Self {
            grid: Grid::default(),
            headers,
            names,
            index: HashMap::new(),
            cell_seq: 0,
        }
    }

    /// Number of columns appended so far.
    pub fn columns(&self) -> usize {
        self.grid.columns.len()
    }

    /// Append one build's column and fold its row entries into the grid.
    pub fn append_column(&mut self, col: &Column) {
        let mut record = state::Column {
            build: col.id.clone(),
            started: col.started as f64 * 1000.0,
            extra: Vec::with_capacity(self.headers.len()),
        };
        for header in &self.headers {
            record.extra.push(self.header_value(col, header));
        }
        self.grid.columns.push(record);

        // Every known row must gain exactly one run entry this column;
        // whatever is left unassigned at the end gets NO_RESULT padding.
        let mut missing: BTreeSet<String> = self.index.keys().cloned().collect();
        let mut used: HashSet<String> = HashSet::new();

        for (target, entries) in &col.rows {
            for entry in entries {
                let prefix = self.names.render(entry, &col.metadata);
                let mut name = prefix.clone();
                // Uniqueness is per column: a second "foo" in the same
                // build becomes "foo [1]", a third "foo [2]", while the
                // same name in another build maps onto the same row.
                for n in 1.. {
                    if !used.contains(&name) {
                        break;
                    }
                    name = format!("{prefix} [{n}]");
                }
                used.insert(name.clone());
                missing.remove(&name);

                let pos = match self.index.get(&name).copied() {
                    Some(pos) => pos,
                    None => self.add_row(name, target),
                };
                let row = &mut self.grid.rows[pos];
                append_result(row, entry.result, 1, &mut self.cell_seq);

                for (metric_name, value) in &entry.metrics {
                    // Cell indices count only cells that contributed
                    // placeholder content, i.e. non-NO_RESULT cells.
                    let idx = row.messages.len() as i32 - 1;
                    let at = match row.metrics.iter().position(|m| m.name == *metric_name) {
                        Some(at) => at,
                        None => {
                            row.metrics.push(Metric {
                                name: metric_name.clone(),
                                ..Metric::default()
                            });
                            row.metrics.len() - 1
                        }
                    };
                    append_metric(&mut row.metrics[at], idx, *value);
                }
            }
        }

        for name in missing {
            let pos = self.index[&name];
            append_result(
                &mut self.grid.rows[pos],
                TestResult::NoResult,
                1,
                &mut self.cell_seq,
            );
        }
    }

    /// Sort rows into natural name order and hand over the grid.
    pub fn finish(mut self) -> Grid {
        self.grid.rows.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        self.grid
    }

    fn header_value(&self, col: &Column, header: &str) -> String {
        if col.finished == 0 {
            return String::new();
        }
        let (key, trunc) = if header == COMMIT_HEADER {
            (COMMIT_KEY, COMMIT_LEN)
        } else {
            (header, 0)
        };
        let value = match col.metadata.get(key) {
            Some(v) => v.clone(),
            None => {
                warn!(build = %col.id, header = key, "column metadata missing header value");
                "missing".to_string()
            }
        };
        if trunc > 0 {
            truncate_chars(value, trunc)
        } else {
            value
        }
    }

    fn add_row(&mut self, name: String, target: &str) -> usize {
        let pos = self.grid.rows.len();
        self.grid.rows.push(state::Row {
            name: name.clone(),
            id: target.to_string(),
            ..state::Row::default()
        });
        self.index.insert(name, pos);
        // Rows first seen now were absent from every earlier column.
        let backfill = self.grid.columns.len() - 1;
        append_result(
            &mut self.grid.rows[pos],
            TestResult::NoResult,
            backfill,
            &mut self.cell_seq,
        );
        pos
    }
}

/// Extend the row's result RLE by `count` cells of `result`, reusing the
/// tail run when the code matches. Non-NO_RESULT cells also push one
/// entry onto each of the parallel placeholder lists.
fn append_result(row: &mut state::Row, result: TestResult, count: usize, seq: &mut u64) {
    if count == 0 {
        return;
    }
    let code = result as i32;
    let n = row.results.len();
    if n == 0 || row.results[n - 2] != code {
        row.results.push(code);
        row.results.push(count as i32);
    } else {
        row.results[n - 1] += count as i32;
    }
    if result != TestResult::NoResult {
        for _ in 0..count {
            row.cell_ids.push(seq.to_string());
            row.messages.push(format!("message {seq}"));
            row.icons.push(char::from(b'A' + (*seq % 26) as u8).to_string());
            *seq += 1;
        }
    }
}

/// Record `value` at cell `idx`, extending the tail index run when the
/// cells are contiguous.
fn append_metric(metric: &mut Metric, idx: i32, value: f64) {
    let n = metric.indices.len();
    if n == 0 || metric.indices[n - 2] + metric.indices[n - 1] != idx {
        metric.indices.push(idx);
        metric.indices.push(1);
    } else {
        metric.indices[n - 1] += 1;
    }
    metric.values.push(value);
}

fn truncate_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((at, _)) => s[..at].to_string(),
        None => s,
    }
}
