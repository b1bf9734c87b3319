//! Per-build reading: markers, artifacts, JUnit.
//!
//! Turns one build directory into a [`Column`]: the started/finished
//! markers drive timing and the synthetic Overall row, and every
//! artifact whose name looks like a JUnit file contributes row entries.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use tally_core::column::{Column, ExtractError, Finished, Started};

use crate::builds::BuildRef;
use crate::client::StorageClient;
use crate::error::StoreError;

/// Artifacts above this size fail the whole build.
const MAX_ARTIFACT_SIZE: u64 = 50_000_000;

lazy_static! {
    /// junit_CONTEXT_TIMESTAMP_THREAD.xml, every suffix optional.
    static ref JUNIT_NAME: Regex =
        Regex::new(r".+/junit(_[^_]+)?(_\d+-\d+)?(_\d+)?\.xml$").unwrap();
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("build has not started")]
    NotStarted,
    #[error("could not decode started.json: {0}")]
    BadStarted(#[source] serde_json::Error),
    #[error("could not decode finished.json: {0}")]
    BadFinished(#[source] serde_json::Error),
    #[error("could not read {name}: {source}")]
    Marker {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to list artifacts: {0}")]
    ListArtifacts(#[source] StoreError),
    #[error("could not read {name}: {source}")]
    Artifact {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to parse {name}: {source}")]
    Junit {
        name: String,
        #[source]
        source: ExtractError,
    },
}

/// Metadata derived from a JUnit artifact name, or `None` when the name
/// does not match the pattern.
///
/// `pre/artifacts/junit_context_20180102-1256_07.xml` yields
/// `{Context: "context", Timestamp: "20180102-1256", Thread: "07"}`.
pub fn artifact_metadata(name: &str) -> Option<BTreeMap<String, String>> {
    let caps = JUNIT_NAME.captures(name)?;
    let part = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().trim_start_matches('_').to_string())
            .unwrap_or_default()
    };
    Some(BTreeMap::from([
        ("Context".to_string(), part(1)),
        ("Timestamp".to_string(), part(2)),
        ("Thread".to_string(), part(3)),
    ]))
}

/// Read one build into a column. `now` is epoch seconds, used by the
/// Overall timeout rule.
pub async fn read_build(
    client: &StorageClient,
    build: &BuildRef,
    now: i64,
) -> Result<Column, ReadError> {
    let started_name = build.object("started.json");
    let started_buf = client
        .get_opt(&build.bucket, &started_name)
        .await
        .map_err(|source| ReadError::Marker {
            name: started_name.clone(),
            source,
        })?
        .ok_or(ReadError::NotStarted)?;
    let started: Started =
        serde_json::from_slice(&started_buf).map_err(ReadError::BadStarted)?;

    let mut col = Column::new(build.id(), started.timestamp);

    let finished_name = build.object("finished.json");
    let finished_buf = client
        .get_opt(&build.bucket, &finished_name)
        .await
        .map_err(|source| ReadError::Marker {
            name: finished_name.clone(),
            source,
        })?;
    let Some(finished_buf) = finished_buf else {
        // Still running (or abandoned); only the Overall row exists.
        col.set_overall(now);
        return Ok(col);
    };
    let finished: Finished =
        serde_json::from_slice(&finished_buf).map_err(ReadError::BadFinished)?;
    col.finished = finished.timestamp;
    col.passed = finished.passed;
    col.metadata = finished.metadata.column_metadata();
    col.set_overall(now);

    let names = client
        .list_objects(&build.bucket, &build.object("artifacts/"))
        .await
        .map_err(ReadError::ListArtifacts)?;
    let mut artifacts = BTreeMap::new();
    for name in names {
        if let Some(meta) = artifact_metadata(&name) {
            artifacts.insert(name, meta);
        }
    }

    for (name, meta) in &artifacts {
        let buf = client
            .get_limited(&build.bucket, name, MAX_ARTIFACT_SIZE)
            .await
            .map_err(|source| ReadError::Artifact {
                name: name.clone(),
                source,
            })?;
        col.extract_rows(&buf, meta)
            .map_err(|source| ReadError::Junit {
                name: name.clone(),
                source,
            })?;
    }

    Ok(col)
}
