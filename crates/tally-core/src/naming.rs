//! Display-name configuration for test rows.
//!
//! A group may configure a printf-style template plus an ordered list of
//! metadata keys; each row's display name is the template with the keys'
//! values substituted in order.

use std::collections::BTreeMap;

use crate::column::{RowEntry, TESTS_NAME_KEY};
use crate::state::TestNameConfig;

/// Format template and the metadata keys feeding its `%s` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConfig {
    format: String,
    parts: Vec<String>,
}

impl Default for NameConfig {
    /// The plain test name, unchanged.
    fn default() -> Self {
        Self {
            format: "%s".to_string(),
            parts: vec![TESTS_NAME_KEY.to_string()],
        }
    }
}

impl NameConfig {
    /// Build from a group's optional `test_name_config`.
    pub fn from_group(tnc: Option<&TestNameConfig>) -> Self {
        match tnc {
            None => Self::default(),
            Some(tnc) => Self {
                format: tnc.name_format.clone(),
                parts: tnc
                    .name_elements
                    .iter()
                    .map(|e| e.target_config.clone())
                    .collect(),
            },
        }
    }

    /// Render the display name for `entry`: each part resolves from the
    /// entry's own metadata first, then the column metadata, then the
    /// empty string, and the values substitute into the `%s`
    /// placeholders in order.
    pub fn render(&self, entry: &RowEntry, column_meta: &BTreeMap<String, String>) -> String {
        let mut args = self.parts.iter().map(|part| {
            entry
                .metadata
                .get(part)
                .or_else(|| column_meta.get(part))
                .map(String::as_str)
                .unwrap_or("")
        });

        let mut out = String::with_capacity(self.format.len());
        let mut rest = self.format.as_str();
        while let Some(at) = rest.find("%s") {
            out.push_str(&rest[..at]);
            out.push_str(args.next().unwrap_or(""));
            rest = &rest[at + 2..];
        }
        out.push_str(rest);
        out
    }
}
