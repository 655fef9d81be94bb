//! Storage-root handle for the slide collection
//!
//! Reordering touches every slide, so `normalize`, `reindex`, `save` and
//! `delete` run inside one collection-wide reorder scope: an in-process
//! mutex plus an exclusive lock on `<root>/.reorder.lock` for other
//! processes sharing the same root. `load` and `list_records` take the same
//! scope, since loading may write back an expired slide and a listing must
//! not observe a slide halfway through removal.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::{SlideLimits, StorageConfig};
use crate::storage::{FileLockGuard, FileStore, LockedFs};
use crate::users::{FsUserDirectory, UserDirectory};

use super::directory;
use super::order;
use super::record::Slide;
use super::types::SlideResult;

const REORDER_LOCK_FILE: &str = ".reorder.lock";

/// Everything a slide needs to validate and persist itself
pub struct SlideContext {
    pub(crate) root: PathBuf,
    pub(crate) limits: SlideLimits,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) files: Arc<dyn FileStore>,
}

impl fmt::Debug for SlideContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideContext")
            .field("root", &self.root)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Held for the duration of a reorder scope
struct ReorderGuard<'a> {
    _file: FileLockGuard,
    _local: MutexGuard<'a, ()>,
}

/// Handle to one slide storage root
#[derive(Debug)]
pub struct SlideStore {
    ctx: Arc<SlideContext>,
    reorder: Mutex<()>,
}

impl SlideStore {
    /// Open the configured slides directory with filesystem-backed users and files.
    pub fn open(storage: &StorageConfig, limits: SlideLimits) -> SlideResult<Self> {
        Self::with_parts(
            &storage.slides_dir,
            limits,
            Arc::new(FsUserDirectory::new(&storage.users_dir)),
            Arc::new(LockedFs),
        )
    }

    /// Open `root` with explicit collaborators, creating the directory if needed.
    pub fn with_parts(
        root: &Path,
        limits: SlideLimits,
        users: Arc<dyn UserDirectory>,
        files: Arc<dyn FileStore>,
    ) -> SlideResult<Self> {
        fs::create_dir_all(root)?;
        info!("Opened slide store at {:?}", root);

        Ok(Self {
            ctx: Arc::new(SlideContext {
                root: root.to_path_buf(),
                limits,
                users,
                files,
            }),
            reorder: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.ctx.root
    }

    pub fn limits(&self) -> &SlideLimits {
        &self.ctx.limits
    }

    /// New unsaved slide with a fresh ID
    pub fn create(&self) -> SlideResult<Slide> {
        Slide::create(&self.ctx)
    }

    pub fn load(&self, id: &str) -> SlideResult<Slide> {
        let _guard = self.lock_reorder()?;
        Slide::load(&self.ctx, id)
    }

    pub fn list_ids(&self) -> SlideResult<Vec<String>> {
        directory::list_ids(&self.ctx)
    }

    pub fn list_records(&self) -> SlideResult<Vec<Slide>> {
        let _guard = self.lock_reorder()?;
        directory::list_records(&self.ctx)
    }

    /// Sort `slides` by index and renumber them densely from zero.
    pub fn normalize(&self, slides: &mut [Slide]) -> SlideResult<()> {
        let _guard = self.lock_reorder()?;
        order::normalize_indices(slides)
    }

    /// Renumber all slides, keeping `keep_id` at the index it currently holds.
    pub fn reindex(&self, keep_id: Option<&str>) -> SlideResult<()> {
        let _guard = self.lock_reorder()?;
        order::juggle_indices(&self.ctx, keep_id)
    }

    /// Write `slide` and renumber the collection around it.
    pub fn save(&self, slide: &Slide) -> SlideResult<()> {
        let _guard = self.lock_reorder()?;
        slide.write()?;
        order::juggle_indices(&self.ctx, Some(slide.id()))
    }

    /// Remove `slide` and close the gap it leaves.
    pub fn delete(&self, slide: Slide) -> SlideResult<()> {
        let _guard = self.lock_reorder()?;
        slide.remove()?;
        order::juggle_indices(&self.ctx, None)
    }

    fn lock_reorder(&self) -> SlideResult<ReorderGuard<'_>> {
        let local = self.reorder.lock();
        let file = FileLockGuard::acquire(&self.ctx.root.join(REORDER_LOCK_FILE))?;
        debug!("Acquired reorder lock on {:?}", self.ctx.root);
        Ok(ReorderGuard {
            _file: file,
            _local: local,
        })
    }
}
