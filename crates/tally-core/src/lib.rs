//! Grid aggregation engine for the tally test-results dashboard.
//!
//! A dashboard grid has one column per build and one row per test name.
//! This crate owns everything between a parsed build and the compressed
//! bytes written back to the object store: the wire schema, JUnit
//! parsing, display-name configuration, the column-by-column assembler
//! and the zlib/CRC32C serializer. Object-store I/O lives in
//! `tally-store`.

pub mod column;
pub mod encode;
pub mod grid;
pub mod junit;
pub mod naming;
pub mod sortorder;
pub mod state;

pub use column::{
    Column, Finished, MetaValue, Metadata, RowEntry, Started, ELAPSED_KEY, OVERALL, TESTS_NAME_KEY,
};
pub use encode::{crc32c_of, marshal_grid, unmarshal_grid, EncodeError};
pub use grid::GridAssembler;
pub use naming::NameConfig;
pub use state::{Configuration, Grid, TestGroup, TestResult};
