//! Shared lookup entities (subjects and tags).

use serde::Serialize;

/// The two globally shared lookup tables. Rows are keyed by unique name and
/// linked to projects through a join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Subject,
    Tag,
}

impl LookupKind {
    pub fn label(&self) -> &'static str {
        match self {
            LookupKind::Subject => "subject",
            LookupKind::Tag => "tag",
        }
    }
}

/// A subject or tag row with the number of projects referencing it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupEntry {
    pub id: String,
    pub name: String,
    pub project_count: i64,
}
