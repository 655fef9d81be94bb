//! Slide storage module
//!
//! This module provides:
//! - `Slide` records persisted as one directory per slide
//! - `SlideStore`, the handle for one storage root and its reorder lock
//! - Index normalization that keeps slide indices dense and unique
//! - HTTP routes exposing slide CRUD

mod directory;
mod order;
mod record;
pub mod routes;
mod store;
mod types;

pub use record::{Slide, now_secs};
pub use routes::{SlideAppState, slide_routes};
pub use store::{SlideContext, SlideStore};
pub use types::{
    CONF_KEYS, SlideConf, SlideData, SlideError, SlideErrorKind, SlideListItem, SlideResult,
    SlideUpdate,
};
