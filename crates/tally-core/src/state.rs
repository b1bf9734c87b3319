//! Wire schema for the serialized grid and the dashboard configuration.
//!
//! Messages are declared directly with prost derives rather than a
//! `.proto` codegen step; field tags are part of the stored-object
//! contract and must not be renumbered.

use prost::Message;

/// Result code of a single cell.
///
/// The numeric values are the stored wire codes; `results` lists on a
/// [`Row`] interleave them with run lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TestResult {
    NoResult = 0,
    Pass = 1,
    PassWithSkips = 3,
    Running = 4,
    Fail = 12,
}

impl TestResult {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NoResult),
            1 => Some(Self::Pass),
            3 => Some(Self::PassWithSkips),
            4 => Some(Self::Running),
            12 => Some(Self::Fail),
            _ => None,
        }
    }
}

/// The aggregated per-group result matrix: columns are builds, rows are
/// test names.
#[derive(Clone, PartialEq, Message)]
pub struct Grid {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<Column>,
    #[prost(message, repeated, tag = "2")]
    pub rows: Vec<Row>,
}

/// One build's header in the grid.
#[derive(Clone, PartialEq, Message)]
pub struct Column {
    /// Build id: the last path segment of the build prefix.
    #[prost(string, tag = "1")]
    pub build: String,
    /// Start time in epoch milliseconds.
    #[prost(double, tag = "2")]
    pub started: f64,
    /// Extra values aligned with the group's configured column headers.
    #[prost(string, repeated, tag = "3")]
    pub extra: Vec<String>,
}

/// One test's row across every column.
///
/// `results` is a canonical run-length encoding: `(code, count)` pairs
/// flattened into a single list, adjacent pairs never sharing a code,
/// counts summing to the number of columns. `cell_ids`, `messages` and
/// `icons` are parallel lists with one entry per non-NO_RESULT cell.
#[derive(Clone, PartialEq, Message)]
pub struct Row {
    /// Display name, unique within the grid.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Original target key as emitted by the parser.
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(int32, repeated, tag = "3")]
    pub results: Vec<i32>,
    #[prost(string, repeated, tag = "4")]
    pub cell_ids: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    pub messages: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    pub icons: Vec<String>,
    #[prost(message, repeated, tag = "7")]
    pub metrics: Vec<Metric>,
}

/// A named metric over a row's dense cell stream.
///
/// `indices` holds `(start_cell_index, run_length)` pairs flattened into
/// one list; `values` holds one float per covered cell.
#[derive(Clone, PartialEq, Message)]
pub struct Metric {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, repeated, tag = "2")]
    pub indices: Vec<i32>,
    #[prost(double, repeated, tag = "3")]
    pub values: Vec<f64>,
}

/// Top-level dashboard configuration, stored as a protobuf object.
#[derive(Clone, PartialEq, Message)]
pub struct Configuration {
    #[prost(message, repeated, tag = "1")]
    pub test_groups: Vec<TestGroup>,
}

/// One test group: where its builds live and how to present them.
#[derive(Clone, PartialEq, Message)]
pub struct TestGroup {
    /// Unique group name; also the output object's name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Object-store path of the group root, without the `gs://` scheme.
    #[prost(string, tag = "2")]
    pub gcs_prefix: String,
    /// Metadata keys surfaced as extra per-column values, in order.
    #[prost(message, repeated, tag = "3")]
    pub column_header: Vec<ColumnHeader>,
    #[prost(message, optional, tag = "4")]
    pub test_name_config: Option<TestNameConfig>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ColumnHeader {
    #[prost(string, tag = "1")]
    pub configuration_value: String,
}

/// Template for deriving display names from metadata parts.
#[derive(Clone, PartialEq, Message)]
pub struct TestNameConfig {
    #[prost(message, repeated, tag = "1")]
    pub name_elements: Vec<TestNameElement>,
    /// printf-style format with one `%s` per name element.
    #[prost(string, tag = "2")]
    pub name_format: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TestNameElement {
    #[prost(string, tag = "1")]
    pub target_config: String,
}

impl TestGroup {
    /// The configured header keys, in order.
    pub fn headers(&self) -> Vec<String> {
        self.column_header
            .iter()
            .map(|h| h.configuration_value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_round_trip() {
        for r in [
            TestResult::NoResult,
            TestResult::Pass,
            TestResult::PassWithSkips,
            TestResult::Running,
            TestResult::Fail,
        ] {
            assert_eq!(TestResult::from_code(r as i32), Some(r));
        }
        assert_eq!(TestResult::from_code(2), None);
    }

    #[test]
    fn grid_proto_round_trip() {
        let grid = Grid {
            columns: vec![Column {
                build: "1234".into(),
                started: 1_000_000.0,
                extra: vec!["linux".into()],
            }],
            rows: vec![Row {
                name: "Overall".into(),
                id: "Overall".into(),
                results: vec![TestResult::Pass as i32, 1],
                cell_ids: vec!["0".into()],
                messages: vec!["message 0".into()],
                icons: vec!["A".into()],
                metrics: vec![Metric {
                    name: "seconds-elapsed".into(),
                    indices: vec![0, 1],
                    values: vec![60.0],
                }],
            }],
        };
        let buf = grid.encode_to_vec();
        let back = Grid::decode(buf.as_slice()).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn group_headers_preserve_order() {
        let tg = TestGroup {
            name: "g".into(),
            gcs_prefix: "bucket/logs/g".into(),
            column_header: vec![
                ColumnHeader {
                    configuration_value: "Commit".into(),
                },
                ColumnHeader {
                    configuration_value: "infra-commit".into(),
                },
            ],
            test_name_config: None,
        };
        assert_eq!(tg.headers(), vec!["Commit", "infra-commit"]);
    }
}
