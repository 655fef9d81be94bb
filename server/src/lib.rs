//! Signage Server Library
//!
//! This module exports the slide storage core and its HTTP routes for use in
//! the server binary, integration tests and external tooling.

pub mod config;
pub mod slide;
pub mod storage;
pub mod users;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::{Config, SlideLimits, StorageConfig};
pub use slide::{
    Slide, SlideAppState, SlideData, SlideError, SlideErrorKind, SlideStore, SlideUpdate,
    slide_routes,
};
pub use storage::{FileStore, LockedFs};
pub use users::{FsUserDirectory, StaticUserDirectory, UserDirectory};
