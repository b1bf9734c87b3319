//! Per-group update pipeline and the cross-group worker pool.
//!
//! One group's update is: list builds (newest first), read them through
//! an order-preserving bounded fan-out, fold the columns into the grid
//! assembler, serialize, upload. Groups themselves run on a bounded
//! pool; a failing group is logged and never takes the others down.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::{Duration, Utc};
use futures::StreamExt;
use prost::Message;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use tally_core::{
    crc32c_of, marshal_grid, Configuration, Grid, GridAssembler, NameConfig, TestGroup,
};
use tally_store::{list_builds, read_build, BuildRef, GcsPath, StorageClient};

/// Tuning for one updater run.
#[derive(Debug, Clone)]
pub struct UpdaterOpts {
    /// Upload updated grids; false serializes and logs only.
    pub confirm: bool,
    /// Consume at most this many builds per group.
    pub max_results: usize,
    /// Stop consuming once a build started before `now - window`.
    pub window: Duration,
    /// Parallel build reads within one group.
    pub build_concurrency: usize,
}

impl Default for UpdaterOpts {
    fn default() -> Self {
        Self {
            confirm: false,
            max_results: 50,
            window: Duration::days(7),
            build_concurrency: 4,
        }
    }
}

/// Find `name` in the configuration.
pub fn find_group<'a>(cfg: &'a Configuration, name: &str) -> Option<&'a TestGroup> {
    cfg.test_groups.iter().find(|g| g.name == name)
}

/// Fetch and decode the dashboard configuration proto.
pub async fn read_config(
    client: &StorageClient,
    path: &GcsPath,
) -> anyhow::Result<Configuration> {
    let buf = client
        .get(path.bucket(), path.object())
        .await
        .context("failed to open config")?;
    Configuration::decode(buf).context("failed to parse config")
}

/// Update every group (or just `group_filter`) on a pool of
/// `group_concurrency` workers. Group failures are logged, not
/// propagated; an unknown `group_filter` is an error.
pub async fn update_all(
    client: Arc<StorageClient>,
    cfg: &Configuration,
    config_path: &GcsPath,
    group_filter: Option<&str>,
    group_concurrency: usize,
    opts: &UpdaterOpts,
) -> anyhow::Result<()> {
    let groups: Vec<TestGroup> = match group_filter {
        Some(name) => {
            let group = find_group(cfg, name)
                .with_context(|| format!("failed to find {name} in {config_path}"))?;
            vec![group.clone()]
        }
        None => cfg.test_groups.clone(),
    };

    let sem = Arc::new(Semaphore::new(group_concurrency.max(1)));
    let mut join_set = JoinSet::new();
    for group in groups {
        let permit = sem.clone().acquire_owned().await?;
        let client = Arc::clone(&client);
        let out = config_path.sibling(&group.name);
        let opts = opts.clone();
        join_set.spawn(async move {
            let _permit = permit;
            if let Err(e) = update_group(&client, &group, &out, &opts).await {
                error!(group = %group.name, "update failed: {e:#}");
            }
        });
    }
    while let Some(res) = join_set.join_next().await {
        if let Err(e) = res {
            error!("group worker died: {e}");
        }
    }
    Ok(())
}

/// Rebuild one group's grid and write it to `out`.
pub async fn update_group(
    client: &StorageClient,
    group: &TestGroup,
    out: &GcsPath,
    opts: &UpdaterOpts,
) -> anyhow::Result<()> {
    let root = GcsPath::parse(&format!("gs://{}", group.gcs_prefix)).with_context(|| {
        format!(
            "group {} has an invalid gcs_prefix {:?}",
            group.name, group.gcs_prefix
        )
    })?;

    let builds = list_builds(client, &root)
        .await
        .with_context(|| format!("failed to list {} builds", group.name))?;

    let grid = read_builds(client, group, builds, opts).await;

    let buf = marshal_grid(&grid)
        .with_context(|| format!("failed to marshal {} grid", group.name))?;

    if !opts.confirm {
        info!(
            group = %group.name,
            columns = grid.columns.len(),
            rows = grid.rows.len(),
            bytes = buf.len(),
            path = %out,
            "not uploading without --confirm"
        );
        return Ok(());
    }

    let crc = crc32c_of(&buf);
    info!(group = %group.name, bytes = buf.len(), path = %out, "uploading grid");
    client
        .put_with_crc32c(out, buf.into(), crc)
        .await
        .with_context(|| format!("upload {} to {out} failed", group.name))?;
    Ok(())
}

/// Fold builds into a grid, newest first, bounded by the result ceiling
/// and the freshness window. Reads run `build_concurrency` wide, but
/// the stream yields in listing order, so the assembler sees builds
/// exactly as listed. Failed reads skip their build.
async fn read_builds(
    client: &StorageClient,
    group: &TestGroup,
    mut builds: Vec<BuildRef>,
    opts: &UpdaterOpts,
) -> Grid {
    let now = Utc::now().timestamp();
    let stop = now - opts.window.num_seconds();
    info!(group = %group.name, builds = builds.len(), stop, "reading builds");

    if builds.len() > opts.max_results {
        info!(group = %group.name, max = opts.max_results, "hit results ceiling");
        builds.truncate(opts.max_results);
    }

    let mut asm = GridAssembler::new(
        group.headers(),
        NameConfig::from_group(group.test_name_config.as_ref()),
    );

    let mut columns = futures::stream::iter(
        builds
            .into_iter()
            .map(|build| async move { (read_build(client, &build, now).await, build) }),
    )
    .buffered(opts.build_concurrency.max(1));

    while let Some((result, build)) = columns.next().await {
        let col = match result {
            Ok(col) => col,
            Err(e) => {
                warn!(prefix = %build.prefix, "skipping build: {e}");
                continue;
            }
        };
        asm.append_column(&col);
        info!(
            build = %col.id,
            passed = col.passed,
            started = col.started,
            finished = col.finished,
            rows = col.rows.len(),
            "found"
        );
        if col.started < stop {
            info!(group = %group.name, "latest result is past the freshness window");
            break;
        }
    }
    // Dropping the stream aborts any reads still in flight.
    drop(columns);

    asm.finish()
}
