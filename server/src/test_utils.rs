//! Test Utilities Module
//!
//! Fixtures shared by the unit tests. This module is only compiled when running tests.

#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use crate::config::SlideLimits;
use crate::slide::{Slide, SlideStore, SlideUpdate};
use crate::storage::LockedFs;
use crate::users::StaticUserDirectory;

/// Users known to every test store
pub const TEST_USERS: &[&str] = &["admin", "user", "display"];

/// A slide store rooted in a temporary directory
pub struct TestStore {
    pub store: SlideStore,
    _dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_limits(SlideLimits::default())
    }

    pub fn with_limits(limits: SlideLimits) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = SlideStore::with_parts(
            &dir.path().join("slides"),
            limits,
            Arc::new(StaticUserDirectory::new(TEST_USERS.iter().copied())),
            Arc::new(LockedFs),
        )
        .expect("Failed to open test store");
        Self { store, _dir: dir }
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Create and write a slide without renumbering the collection
    pub fn saved_slide(&self, name: &str, index: u32) -> Slide {
        let mut slide = self.store.create().expect("Failed to create slide");
        slide
            .apply(test_update(name, i64::from(index)))
            .expect("Failed to apply test fields");
        slide.write().expect("Failed to write slide");
        slide
    }
}

/// Valid field values for a slide named `name` at `index`
pub fn test_update(name: &str, index: i64) -> SlideUpdate {
    SlideUpdate {
        name: name.to_string(),
        index,
        time: 5000,
        owner: "admin".to_string(),
        markup: format!("[h1]{name}[/h1]"),
        enabled: false,
        expires: false,
        expire_t: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_starts_empty() {
        let t = TestStore::new();
        assert!(t.root().is_dir());
        assert!(t.store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn test_saved_slide_is_loadable() {
        let t = TestStore::new();
        let slide = t.saved_slide("fixture", 2);
        let loaded = t.store.load(slide.id()).unwrap();
        assert_eq!(loaded.name(), Some("fixture"));
        assert_eq!(loaded.index(), Some(2));
    }
}
