// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;

/// A section as emitted by the Title XML parser, before metrics.
///
/// `chapter` is the `N` attribute of the nearest enclosing element with
/// `TYPE="CHAPTER"`, or empty when the section appears before any chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    pub id: String,
    pub chapter: String,
    pub text: String,
    pub rev_date: Option<NaiveDate>,
}

/// The fact row of the system: one section, one snapshot.
///
/// `chapter` is stored as `agency_id` in the relational store; it is the
/// raw chapter tag used by the agency join, not a foreign key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub chapter: String,
    pub text: String,
    pub rev_date: Option<NaiveDate>,
    /// Hex SHA-256 of the normalized text, never of the original bytes.
    pub checksum: String,
    pub word_count: u32,
    pub def_count: u32,
    pub xref_count: u32,
    pub modal_count: u32,
    pub rscs_raw: u32,
    pub rscs_per_1k: f64,
    pub snapshot_date: String,
}
