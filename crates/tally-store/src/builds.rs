//! Build discovery under a group root.
//!
//! Builds are the immediate child "directories" of the root prefix.
//! They are expected to arrive in monotonically increasing natural
//! order, so `build9` is followed by `build10` or `build888` but never
//! `build8`; listing emits them newest first.

use tally_core::sortorder::natural_cmp;
use tracing::info;

use crate::client::StorageClient;
use crate::error::StoreError;
use crate::path::GcsPath;

/// One build directory: a bucket plus a prefix ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRef {
    pub bucket: String,
    pub prefix: String,
}

impl BuildRef {
    /// The build id: the last path segment of the prefix.
    pub fn id(&self) -> &str {
        self.prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    /// Object name of `name` inside this build directory.
    pub fn object(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// List the builds under `root`, most recent first.
///
/// A listing failure discards any partial results.
pub async fn list_builds(
    client: &StorageClient,
    root: &GcsPath,
) -> Result<Vec<BuildRef>, StoreError> {
    let mut prefix = root.object().to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    info!(bucket = root.bucket(), prefix = %prefix, "listing builds");

    let dirs = client.list_dirs(root.bucket(), &prefix).await?;
    let mut builds: Vec<BuildRef> = dirs
        .into_iter()
        .map(|prefix| BuildRef {
            bucket: root.bucket().to_string(),
            prefix,
        })
        .collect();

    builds.sort_by(|a, b| natural_cmp(&a.prefix, &b.prefix));
    builds.reverse();
    Ok(builds)
}
