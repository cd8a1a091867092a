// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use ecfr_atlas_core::{Result, SnapshotDate};
use ecfr_atlas_model::{Section, SectionDiff, TitleId};
use ecfr_atlas_store::ArchiveRepo;

/// Per-section deltas for `(snapshot, title)` against the immediately
/// preceding snapshot in the archive.
///
/// Current rows come from the archive, not from memory, so the columnar
/// write for this Title must have completed first. A Title absent from
/// the previous snapshot (or a first-ever snapshot) makes every current
/// section an appearance: `changed = true`, delta = full word count.
/// Sections that disappeared since the previous snapshot produce no row.
pub async fn compute_diffs(
    archive: &ArchiveRepo,
    snapshot: SnapshotDate,
    title: TitleId,
) -> Result<Vec<SectionDiff>> {
    let current = archive.read_sections(snapshot, title).await?;

    let previous = match archive.previous_snapshot(snapshot).await? {
        None => Vec::new(),
        Some(prev) => match archive.read_sections(prev, title).await {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        },
    };

    let prev_by_id: HashMap<&str, &Section> =
        previous.iter().map(|s| (s.id.as_str(), s)).collect();

    Ok(current
        .iter()
        .map(|c| match prev_by_id.get(c.id.as_str()) {
            None => SectionDiff {
                section_id: c.id.clone(),
                delta_word_count: i64::from(c.word_count),
                changed: true,
            },
            Some(p) => SectionDiff {
                section_id: c.id.clone(),
                delta_word_count: i64::from(c.word_count) - i64::from(p.word_count),
                changed: c.checksum != p.checksum,
            },
        })
        .collect())
}
