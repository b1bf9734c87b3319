//! One build's contribution to the grid, before assembly.
//!
//! A build directory carries a `started.json` marker, an optional
//! `finished.json` marker and JUnit artifacts. The reader in
//! `tally-store` turns those into a [`Column`]; this module owns the
//! marker models, the overall-result rule and the JUnit row extraction.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::junit::{self, JunitError};
use crate::state::TestResult;

/// Reserved metric name for elapsed wall-clock seconds.
pub const ELAPSED_KEY: &str = "seconds-elapsed";

/// Synthetic target key summarizing a build's status.
pub const OVERALL: &str = "Overall";

/// Metadata key every row entry carries: the parsed test's display name.
pub const TESTS_NAME_KEY: &str = "Tests name";

/// A build older than this without a finished marker counts as failed.
const RUNNING_TIMEOUT_SECS: i64 = 24 * 60 * 60;

/// `started.json`: written when a build begins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Started {
    /// Epoch seconds.
    pub timestamp: i64,
    #[serde(default, rename = "repo-version")]
    pub repo_version: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub pull: String,
    /// {repo: branch_or_pull}
    #[serde(default)]
    pub repos: BTreeMap<String, String>,
}

/// `finished.json`: written when a build completes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Finished {
    /// Epoch seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default, rename = "job-version")]
    pub job_version: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Heterogeneous finished-build metadata: infra-commit, repos,
/// repo-commit and whatever else the job wrote.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata(pub BTreeMap<String, MetaValue>);

/// A metadata value: a string, a nested map, or some other JSON scalar.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    String(String),
    Nested(BTreeMap<String, MetaValue>),
    Other(serde_json::Value),
}

impl Metadata {
    /// The string value under `name`, if present and string-valued.
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(MetaValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The nested map under `name`, if present and map-valued.
    pub fn nested(&self, name: &str) -> Option<&BTreeMap<String, MetaValue>> {
        match self.0.get(name) {
            Some(MetaValue::Nested(m)) => Some(m),
            _ => None,
        }
    }

    /// Flat projection keeping only string-valued entries; nested maps
    /// and other scalars are dropped.
    pub fn column_metadata(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(k, v)| match v {
                MetaValue::String(s) => Some((k.clone(), s.clone())),
                _ => None,
            })
            .collect()
    }
}

/// One parsed result within a build.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEntry {
    pub result: TestResult,
    pub metrics: BTreeMap<String, f64>,
    /// Always contains `"Tests name"`.
    pub metadata: BTreeMap<String, String>,
}

impl RowEntry {
    fn named(name: &str, result: TestResult) -> Self {
        Self {
            result,
            metrics: BTreeMap::new(),
            metadata: BTreeMap::from([(TESTS_NAME_KEY.to_string(), name.to_string())]),
        }
    }
}

/// One build, parsed: identity, timing, pass state, string metadata and
/// the per-target row entries (a target may emit several results within
/// one build).
#[derive(Debug, Clone, Default)]
pub struct Column {
    /// Last path segment of the build prefix.
    pub id: String,
    /// Epoch seconds.
    pub started: i64,
    /// Epoch seconds; zero means the build has not finished.
    pub finished: i64,
    pub passed: bool,
    pub metadata: BTreeMap<String, String>,
    pub rows: BTreeMap<String, Vec<RowEntry>>,
}

impl Column {
    /// Start a column for a build that has a started marker.
    pub fn new(id: impl Into<String>, started: i64) -> Self {
        Self {
            id: id.into(),
            started,
            ..Self::default()
        }
    }

    /// Overall result of the build as of `now` (epoch seconds):
    /// finished builds pass or fail on their marker, unfinished builds
    /// run until they are a day old, then count as failed.
    pub fn overall(&self, now: i64) -> TestResult {
        if self.finished > 0 {
            if self.passed {
                TestResult::Pass
            } else {
                TestResult::Fail
            }
        } else if self.started < now - RUNNING_TIMEOUT_SECS {
            TestResult::Fail
        } else {
            TestResult::Running
        }
    }

    /// Attach the synthetic `Overall` row. Finished builds also get the
    /// elapsed-seconds metric.
    pub fn set_overall(&mut self, now: i64) {
        let mut entry = RowEntry::named(OVERALL, self.overall(now));
        if self.finished > 0 {
            entry
                .metrics
                .insert(ELAPSED_KEY.to_string(), (self.finished - self.started) as f64);
        }
        self.rows.insert(OVERALL.to_string(), vec![entry]);
    }

    /// Parse `buf` as JUnit and merge its cases into this column's rows,
    /// overlaying `artifact_meta` (keys derived from the artifact file
    /// name) onto each entry's metadata.
    pub fn extract_rows(
        &mut self,
        buf: &[u8],
        artifact_meta: &BTreeMap<String, String>,
    ) -> Result<(), ExtractError> {
        let suites = junit::parse(buf)?;
        for suite in suites.suites {
            for case in suite.cases {
                // A skipped case with no reason text is dropped entirely.
                if case.skipped.as_deref() == Some("") {
                    continue;
                }

                let name = if suite.name.is_empty() {
                    case.name.clone()
                } else {
                    format!("{}.{}", suite.name, case.name)
                };

                let result = if case.failure.is_some() {
                    TestResult::Fail
                } else if case.skipped.is_some() {
                    TestResult::PassWithSkips
                } else {
                    TestResult::Pass
                };

                let mut entry = RowEntry::named(&name, result);
                if case.time > 0.0 {
                    entry.metrics.insert(ELAPSED_KEY.to_string(), case.time);
                }
                for (k, v) in artifact_meta {
                    entry.metadata.insert(k.clone(), v.clone());
                }
                self.rows.entry(name).or_default().push(entry);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Junit(#[from] JunitError),
}
