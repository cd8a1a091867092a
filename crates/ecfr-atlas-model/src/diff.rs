/// Per-section delta against the immediately preceding snapshot.
///
/// Sections absent from the previous snapshot carry `changed = true` and a
/// delta equal to their full word count. Sections present previously but
/// absent now are not emitted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SectionDiff {
    pub section_id: String,
    pub delta_word_count: i64,
    pub changed: bool,
}
