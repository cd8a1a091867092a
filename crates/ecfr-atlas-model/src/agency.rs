// SPDX-License-Identifier: Apache-2.0

/// One `(title, chapter)` pair declared by an agency. The same pair may be
/// declared by several agencies (the mapping is N:N).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CfrReference {
    pub title: u16,
    pub chapter: String,
}

/// One node of the agency forest as published upstream. The document is
/// recursive: `children` nest arbitrarily deep.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgencyNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub sortable_name: String,
    pub slug: String,
    #[serde(default)]
    pub children: Vec<AgencyNode>,
    #[serde(default)]
    pub cfr_references: Vec<CfrReference>,
}

impl AgencyNode {
    /// Stored agency name: `display_name` when present, else `name`.
    #[must_use]
    pub fn stored_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Root of the upstream agencies JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgencyRoot {
    #[serde(default)]
    pub agencies: Vec<AgencyNode>,
}

impl AgencyRoot {
    /// Total node count across the forest, children included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn walk(nodes: &[AgencyNode]) -> usize {
            nodes.len() + nodes.iter().map(|n| walk(&n.children)).sum::<usize>()
        }
        walk(&self.agencies)
    }
}

/// A flattened agency row as stored relationally.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Agency {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub sortable_name: String,
    pub parent_id: Option<String>,
}

/// One output row of the agency aggregation query.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgencyMetric {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub total_words: i64,
    pub avg_rscs: f64,
    pub lsa_counts: i64,
}
