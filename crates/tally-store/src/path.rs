//! Typed `gs://bucket/object` paths.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// A validated `gs://bucket/path/to/object` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsPath {
    url: Url,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid gs:// url {input:?}: {reason}")]
pub struct PathError {
    pub input: String,
    pub reason: String,
}

impl PathError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl GcsPath {
    /// Parse and validate. Only plain `gs://bucket/object` forms are
    /// accepted: no port, no user-info, no query, no fragment, no
    /// opaque (`gs:bucket`) spelling.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let url = Url::parse(input).map_err(|e| PathError::new(input, e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(PathError::new(input, "url must start with gs://"));
        }
        if url.scheme() != "gs" {
            return Err(PathError::new(input, "must use a gs:// url"));
        }
        if url.port().is_some() {
            return Err(PathError::new(input, "gs://bucket may not contain a port"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(PathError::new(
                input,
                "gs://bucket may not contain an user@ prefix",
            ));
        }
        if url.query().is_some() {
            return Err(PathError::new(
                input,
                "gs:// url may not contain a ?query suffix",
            ));
        }
        if url.fragment().is_some() {
            return Err(PathError::new(
                input,
                "gs:// url may not contain a #fragment suffix",
            ));
        }
        if url.host_str().unwrap_or("").is_empty() {
            return Err(PathError::new(input, "gs:// url is missing a bucket"));
        }
        Ok(Self { url })
    }

    /// The bucket in `gs://bucket/object`.
    pub fn bucket(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// The object in `gs://bucket/object`, without the leading `/`.
    pub fn object(&self) -> &str {
        let path = self.url.path();
        path.strip_prefix('/').unwrap_or(path)
    }

    /// The path next to this one with the last segment replaced by
    /// `name`; per-group outputs live beside the config object.
    pub fn sibling(&self, name: &str) -> GcsPath {
        let dir = match self.object().rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        let mut url = self.url.clone();
        if dir.is_empty() {
            url.set_path(&format!("/{name}"));
        } else {
            url.set_path(&format!("/{dir}/{name}"));
        }
        Self { url }
    }
}

impl fmt::Display for GcsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

impl FromStr for GcsPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
