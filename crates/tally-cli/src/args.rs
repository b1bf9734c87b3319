//! Command-line flags.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use tally_store::GcsPath;

/// Dashboard config objects must not live in the production bucket the
/// serving stack owns.
const RESERVED_BUCKET: &str = "k8s-testgrid";

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Rebuilds per-group test-result grids from an object store"
)]
pub struct Cli {
    /// gs://path/to/config.pb
    #[arg(long)]
    pub config: GcsPath,

    /// /path/to/gcp/credentials.json; empty uses ambient credentials
    #[arg(long)]
    pub gcp_service_account: Option<PathBuf>,

    /// Upload updated grids (without this, serialize and log only)
    #[arg(long)]
    pub confirm: bool,

    /// Only update the named group
    #[arg(long)]
    pub test_group: Option<String>,

    /// Number of groups to update concurrently; 0 means 4 x CPUs
    #[arg(long, default_value_t = 0)]
    pub group_concurrency: usize,
}

impl Cli {
    /// Reject unusable flag combinations and resolve defaults.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.config.bucket() == RESERVED_BUCKET {
            bail!(
                "--config={} may not live under gs://{RESERVED_BUCKET}",
                self.config
            );
        }
        if self.group_concurrency == 0 {
            let cpus = std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1);
            self.group_concurrency = 4 * cpus;
        }
        Ok(())
    }
}
