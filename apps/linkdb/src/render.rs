//! # Output Rendering
//!
//! Text and JSON forms of command results. Every function returns the
//! rendered string; printing is left to the command.

use crate::config::Backend;
use linkdb_core::{Change, Link, LinkError};
use serde::Serialize;

// =============================================================================
// JSON DOCUMENTS
// =============================================================================

/// One change with absent sides as `null`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeView {
    pub before: Option<Link>,
    pub after: Option<Link>,
}

impl From<&Change> for ChangeView {
    fn from(change: &Change) -> Self {
        Self {
            before: change.before_link(),
            after: change.after_link(),
        }
    }
}

/// Result of the `query` command. Only requested sections are present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<ChangeView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Vec<Link>>,
}

/// Result of the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub database: String,
    pub backend: Backend,
    pub persistent: bool,
    pub link_count: usize,
}

/// Result of the `structure` command.
#[derive(Debug, Clone, Serialize)]
pub struct StructureReport {
    pub index: u64,
    pub link: Link,
    pub structure: String,
}

/// Pretty-printed JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, LinkError> {
    serde_json::to_string_pretty(value).map_err(|e| LinkError::SerializationError(e.to_string()))
}

// =============================================================================
// TEXT
// =============================================================================

/// One `(i: s t)` per line.
#[must_use]
pub fn links_text(links: &[Link]) -> String {
    lines(links.iter().map(ToString::to_string))
}

/// One `((before) (after))` per line.
#[must_use]
pub fn changes_text(changes: &[Change]) -> String {
    lines(changes.iter().map(ToString::to_string))
}

#[must_use]
pub fn query_text(report: &QueryReport, changes: &[Change]) -> String {
    let mut sections = Vec::new();
    if let Some(before) = &report.before {
        sections.push(format!("Before:\n{}", links_text(before)));
    }
    if report.changes.is_some() {
        sections.push(format!("Changes:\n{}", changes_text(changes)));
    }
    if let Some(after) = &report.after {
        sections.push(format!("After:\n{}", links_text(after)));
    }
    sections.join("\n")
}

#[must_use]
pub fn status_text(report: &StatusReport) -> String {
    format!(
        "linkdb Status\n=============\nDatabase: {}\nBackend:  {}\n\nLinks:    {}\n",
        report.database, report.backend, report.link_count
    )
}

fn lines(items: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&item);
        out.push('\n');
    }
    out
}
