// SPDX-License-Identifier: Apache-2.0

//! Archive object layout.
//!
//! ```text
//! {prefix}/{YYYY-MM-DD}/{title}.parquet
//! {prefix}/{YYYY-MM-DD}/{title}_diffs.parquet
//! {prefix}/{YYYY-MM-DD}/agency_lsa.parquet
//! {prefix}/{YYYY-MM-DD}/summaries.parquet
//! ```
//!
//! Keys are `/`-joined object names, never OS paths; the local backend maps
//! them onto the filesystem.

use ecfr_atlas_core::SnapshotDate;

use crate::title::TitleId;

fn join(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), rest)
    }
}

/// `{prefix}/{YYYY-MM-DD}`
#[must_use]
pub fn snapshot_prefix(prefix: &str, snapshot: SnapshotDate) -> String {
    join(prefix, &snapshot.to_string())
}

#[must_use]
pub fn sections_object(prefix: &str, snapshot: SnapshotDate, title: TitleId) -> String {
    join(prefix, &format!("{snapshot}/{}.parquet", title.key()))
}

#[must_use]
pub fn diffs_object(prefix: &str, snapshot: SnapshotDate, title: TitleId) -> String {
    join(prefix, &format!("{snapshot}/{}_diffs.parquet", title.key()))
}

#[must_use]
pub fn agency_lsa_object(prefix: &str, snapshot: SnapshotDate) -> String {
    join(prefix, &format!("{snapshot}/agency_lsa.parquet"))
}

#[must_use]
pub fn summaries_object(prefix: &str, snapshot: SnapshotDate) -> String {
    join(prefix, &format!("{snapshot}/summaries.parquet"))
}

/// Raw bulk-data XML object name: `{prefix}/ECFR-title{n}.xml`.
#[must_use]
pub fn raw_title_object(prefix: &str, title: TitleId) -> String {
    join(prefix, &format!("ECFR-title{}.xml", title.number()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecfr_atlas_core::SnapshotDate;

    fn d(raw: &str) -> SnapshotDate {
        SnapshotDate::parse(raw).expect("date")
    }

    fn t(n: u16) -> TitleId {
        TitleId::new(n).expect("title")
    }

    #[test]
    fn layout_matches_the_archive_contract() {
        let snap = d("2024-01-01");
        assert_eq!(sections_object("cfr", snap, t(40)), "cfr/2024-01-01/40.parquet");
        assert_eq!(diffs_object("cfr", snap, t(40)), "cfr/2024-01-01/40_diffs.parquet");
        assert_eq!(agency_lsa_object("cfr", snap), "cfr/2024-01-01/agency_lsa.parquet");
        assert_eq!(summaries_object("cfr", snap), "cfr/2024-01-01/summaries.parquet");
        assert_eq!(raw_title_object("raw", t(7)), "raw/ECFR-title7.xml");
    }

    #[test]
    fn empty_prefix_produces_bare_keys() {
        let snap = d("2024-01-01");
        assert_eq!(sections_object("", snap, t(1)), "2024-01-01/1.parquet");
    }

    #[test]
    fn trailing_slash_on_prefix_is_tolerated() {
        let snap = d("2024-01-01");
        assert_eq!(summaries_object("cfr/", snap), "cfr/2024-01-01/summaries.parquet");
    }
}
