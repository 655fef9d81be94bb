//! Enumeration of the slides present in storage

use std::fs;
use std::sync::Arc;

use tracing::{debug, warn};

use super::record::Slide;
use super::store::SlideContext;
use super::types::SlideResult;

/// List every slide ID under the storage root, skipping hidden entries.
///
/// IDs are returned in ascending order.
pub fn list_ids(ctx: &SlideContext) -> SlideResult<Vec<String>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(&ctx.root)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 entry {:?} in {:?}", entry.path(), ctx.root);
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        ids.push(name);
    }

    ids.sort_unstable();
    debug!("Found {} slides in {:?}", ids.len(), ctx.root);
    Ok(ids)
}

/// Load every slide in storage.
///
/// A single unreadable slide fails the whole listing.
pub fn list_records(ctx: &Arc<SlideContext>) -> SlideResult<Vec<Slide>> {
    list_ids(ctx)?
        .iter()
        .map(|id| Slide::load(ctx, id))
        .collect()
}
