// SPDX-License-Identifier: Apache-2.0

use std::num::NonZeroUsize;
use std::thread;

use ecfr_atlas_core::SnapshotDate;
use ecfr_atlas_model::{RawSection, Section, TitleId};

use crate::metrics::Metricizer;

/// Clamp a requested worker count to `[1, hardware parallelism]`.
/// `0` means "use the hardware parallelism".
#[must_use]
pub fn effective_parallelism(requested: usize) -> usize {
    let hardware = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    if requested == 0 {
        hardware
    } else {
        requested.min(hardware).max(1)
    }
}

/// Metricize every raw section on a bounded pool of scoped threads.
///
/// The result vector is pre-allocated and each worker writes a disjoint
/// slice of it, so output order matches input order without locks.
#[must_use]
pub fn metricize_all(
    metricizer: &Metricizer,
    title: TitleId,
    snapshot: SnapshotDate,
    raws: &[RawSection],
    max_threads: usize,
) -> Vec<Section> {
    if raws.is_empty() {
        return Vec::new();
    }
    let workers = effective_parallelism(max_threads).min(raws.len());
    let chunk = raws.len().div_ceil(workers);

    let mut out: Vec<Option<Section>> = (0..raws.len()).map(|_| None).collect();
    thread::scope(|scope| {
        for (raw_chunk, out_chunk) in raws.chunks(chunk).zip(out.chunks_mut(chunk)) {
            scope.spawn(move || {
                for (raw, slot) in raw_chunk.iter().zip(out_chunk.iter_mut()) {
                    *slot = Some(metricizer.metricize(raw, title, snapshot));
                }
            });
        }
    });
    out.into_iter()
        .map(|slot| slot.expect("metricize fills every slot"))
        .collect()
}
