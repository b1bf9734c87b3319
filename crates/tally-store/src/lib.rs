//! Object-store access for the tally updater.
//!
//! Wraps the `object_store` crate behind a small client (GCS in
//! production, in-memory for tests) and layers the updater's read-side
//! vocabulary on top: `gs://` paths, build listing in reverse natural
//! order, and the per-build reader that turns markers and JUnit
//! artifacts into a [`tally_core::Column`].

pub mod builds;
pub mod client;
pub mod error;
pub mod path;
pub mod reader;

pub use builds::{list_builds, BuildRef};
pub use client::StorageClient;
pub use error::StoreError;
pub use path::{GcsPath, PathError};
pub use reader::{read_build, ReadError};
