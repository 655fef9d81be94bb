//! Slide index normalization
//!
//! Indices across all slides must form the dense range `0..N`. These
//! functions assume the caller holds the store's reorder lock; use the
//! [`SlideStore`](super::SlideStore) wrappers from outside this module.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info};

use super::directory::list_records;
use super::record::Slide;
use super::store::SlideContext;
use super::types::{SlideError, SlideResult};

/// Sort by index and renumber to `0..slides.len()`, writing every slide.
///
/// Equal indices are ordered by slide ID.
pub(crate) fn normalize_indices(slides: &mut [Slide]) -> SlideResult<()> {
    slides.sort_by(|a, b| {
        a.index()
            .cmp(&b.index())
            .then_with(|| a.id().cmp(b.id()))
    });

    for (position, slide) in slides.iter_mut().enumerate() {
        slide.set_index(position as i64)?;
        slide.write()?;
    }
    Ok(())
}

/// Renumber every slide in storage while keeping `keep_id` where the caller put it.
///
/// The other slides are normalized first. If one of them then sits at the
/// kept slide's index, it and everything after it move up by one; otherwise
/// the kept slide is appended after the last one.
pub(crate) fn juggle_indices(ctx: &Arc<SlideContext>, keep_id: Option<&str>) -> SlideResult<()> {
    let start = Instant::now();
    counter!("signage_reindex_total").increment(1);

    let mut slides = list_records(ctx)?;

    // The pass assigns 0..slides.len(); refuse before writing anything.
    let max_index = ctx.limits.max_index;
    if slides.len() > max_index as usize + 1 {
        return Err(SlideError::integrity(
            keep_id.unwrap_or("<collection>"),
            format!(
                "{} slides can't be numbered within 0..={max_index}",
                slides.len()
            ),
        ));
    }

    let keep = match keep_id {
        Some(id) => {
            let pos = slides
                .iter()
                .position(|s| s.id() == id)
                .ok_or_else(|| SlideError::NotFound(id.to_string()))?;
            Some(slides.remove(pos))
        }
        None => None,
    };

    normalize_indices(&mut slides)?;

    if let Some(mut keep) = keep {
        let keep_index = keep.index();
        let mut clash = false;

        for slide in slides.iter_mut() {
            clash |= slide.index() == keep_index;
            if slide.index() >= keep_index
                && let Some(index) = slide.index()
            {
                slide.set_index(i64::from(index) + 1)?;
                slide.write()?;
            }
        }

        if clash {
            debug!("Kept slide {} at index {:?}", keep.id(), keep_index);
        } else {
            let last = slides.len() as i64;
            keep.set_index(last)?;
            keep.write()?;
            debug!("Appended slide {} at index {}", keep.id(), last);
        }
    }

    histogram!("signage_reindex_duration_seconds").record(start.elapsed());
    info!(
        "Reindexed slides in {:?} (kept: {:?})",
        start.elapsed(),
        keep_id
    );
    Ok(())
}
