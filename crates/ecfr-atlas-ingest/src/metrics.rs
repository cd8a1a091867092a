// SPDX-License-Identifier: Apache-2.0

//! Regulatory-complexity metrics over a raw section.
//!
//! Normalization (lowercase, punctuation to spaces, collapsed whitespace)
//! feeds the word count and the content checksum; the definition, cross
//! reference, and modal counts run case-insensitively over the original
//! text, where `§` and periods still exist to be matched.

use regex::Regex;

use ecfr_atlas_core::{sha256_hex, SnapshotDate};
use ecfr_atlas_model::{RawSection, Section, TitleId};

const DEF_WEIGHT: u32 = 20;
const XREF_WEIGHT: u32 = 50;
const MODAL_WEIGHT: u32 = 100;

/// Pure section → metrics function with its regex set compiled once.
///
/// Construct one per process and share it; the compiled patterns are
/// `Sync` and the metricize call holds no state.
pub struct Metricizer {
    punctuation: Regex,
    whitespace: Regex,
    def_heading: Regex,
    def_means: Regex,
    xref: Regex,
    modal: Regex,
}

impl Metricizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            punctuation: Regex::new(r"\p{P}").expect("punctuation pattern"),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern"),
            def_heading: Regex::new(r"(?i)^(definitions\.?|as used in this (part|subpart|section))")
                .expect("definition heading pattern"),
            def_means: Regex::new(r"(?i)\b[a-z][\w\- ]{1,80}\b\s+means\b")
                .expect("definition means pattern"),
            xref: Regex::new(r"(?i)(§\s*\d+(?:\.\d+)*|\b\d+\s*cfr\s*\d+(?:\.\d+)*)")
                .expect("cross reference pattern"),
            modal: Regex::new(r"(?i)\b(shall|must|may not|must not)\b").expect("modal pattern"),
        }
    }

    /// Lowercase, punctuation replaced by spaces, whitespace collapsed,
    /// trimmed.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let depunct = self.punctuation.replace_all(&lower, " ");
        let collapsed = self.whitespace.replace_all(&depunct, " ");
        collapsed.trim().to_string()
    }

    #[must_use]
    pub fn metricize(
        &self,
        raw: &RawSection,
        title: TitleId,
        snapshot: SnapshotDate,
    ) -> Section {
        let normalized = self.normalize(&raw.text);
        let word_count = normalized.split_whitespace().count() as u32;
        let checksum = sha256_hex(normalized.as_bytes());

        let def_count = (self.def_heading.find_iter(&raw.text).count()
            + self.def_means.find_iter(&raw.text).count()) as u32;
        let xref_count = self.xref.find_iter(&raw.text).count() as u32;
        let modal_count = self.modal.find_iter(&raw.text).count() as u32;

        let rscs_raw = word_count
            + DEF_WEIGHT * def_count
            + XREF_WEIGHT * xref_count
            + MODAL_WEIGHT * modal_count;
        let rscs_per_1k = if word_count > 0 {
            1000.0 * f64::from(rscs_raw) / f64::from(word_count)
        } else {
            0.0
        };

        Section {
            id: raw.id.clone(),
            title: title.key(),
            chapter: raw.chapter.clone(),
            text: raw.text.clone(),
            rev_date: raw.rev_date,
            checksum,
            word_count,
            def_count,
            xref_count,
            modal_count,
            rscs_raw,
            rscs_per_1k,
            snapshot_date: snapshot.to_string(),
        }
    }
}

impl Default for Metricizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Metricizer;
    use ecfr_atlas_core::SnapshotDate;
    use ecfr_atlas_model::{RawSection, TitleId};
    use proptest::prelude::*;

    fn raw(text: &str) -> RawSection {
        RawSection {
            id: "§ 1.1".to_string(),
            chapter: "I".to_string(),
            text: text.to_string(),
            rev_date: None,
        }
    }

    fn metricize(text: &str) -> ecfr_atlas_model::Section {
        let m = Metricizer::new();
        m.metricize(
            &raw(text),
            TitleId::new(40).expect("title"),
            SnapshotDate::parse("2024-01-01").expect("date"),
        )
    }

    #[test]
    fn empty_text_produces_all_zeros_and_the_empty_checksum() {
        let s = metricize("");
        assert_eq!(s.word_count, 0);
        assert_eq!(s.def_count, 0);
        assert_eq!(s.xref_count, 0);
        assert_eq!(s.modal_count, 0);
        assert_eq!(s.rscs_raw, 0);
        assert_eq!(s.rscs_per_1k, 0.0);
        assert_eq!(
            s.checksum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn may_not_counts_once_not_twice() {
        let s = metricize(
            "The operator shall comply. Reports must be filed. No person may not enter.",
        );
        assert_eq!(s.modal_count, 3);
    }

    #[test]
    fn section_symbol_and_cfr_citation_both_count() {
        let s = metricize("See § 123.45 and 40 CFR 1.1.");
        assert_eq!(s.xref_count, 2);
    }

    #[test]
    fn definitions_heading_counts_only_at_the_start() {
        let heading = metricize("Definitions. In this part, widget means a device.");
        assert_eq!(heading.def_count, 2);
        let buried = metricize("See the definitions elsewhere.");
        assert_eq!(buried.def_count, 0);
        let as_used = metricize("As used in this subpart, operator means the licensee.");
        assert_eq!(as_used.def_count, 2);
    }

    #[test]
    fn score_identity_holds() {
        let s = metricize("The permittee shall file reports under § 122.41. Discharge means any addition.");
        assert_eq!(
            s.rscs_raw,
            s.word_count + 20 * s.def_count + 50 * s.xref_count + 100 * s.modal_count
        );
        let expected = 1000.0 * f64::from(s.rscs_raw) / f64::from(s.word_count);
        assert!((s.rscs_per_1k - expected).abs() < 1e-9);
    }

    #[test]
    fn normalization_collapses_punctuation_and_whitespace() {
        let m = Metricizer::new();
        assert_eq!(m.normalize("  The  Operator—shall,\n comply.  "), "the operator shall comply");
        assert_eq!(m.normalize("§ 40.1"), "40 1");
    }

    #[test]
    fn metricize_is_deterministic() {
        let a = metricize("The operator shall comply with 40 CFR 1.1.");
        let b = metricize("The operator shall comply with 40 CFR 1.1.");
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn checksum_ignores_case_and_whitespace_edits(words in proptest::collection::vec("[a-z]{1,8}", 1..12)) {
            let base = words.join(" ");
            let spaced = words.join("   \t");
            let upper = base.to_uppercase();
            let baseline = metricize(&base);
            prop_assert_eq!(&metricize(&spaced).checksum, &baseline.checksum);
            prop_assert_eq!(&metricize(&upper).checksum, &baseline.checksum);
            let grown = format!("{base} extra");
            prop_assert_ne!(&metricize(&grown).checksum, &baseline.checksum);
        }

        #[test]
        fn word_count_matches_normalized_tokens(text in "[ a-zA-Z.,;:§\\-]{0,120}") {
            let m = Metricizer::new();
            let s = metricize(&text);
            prop_assert_eq!(s.word_count as usize, m.normalize(&text).split_whitespace().count());
        }
    }
}
