//! Slide-related types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with slides
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("Slide not found: {0}")]
    NotFound(String),

    #[error("Invalid slide {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Slide {id} is corrupt: {reason}")]
    Integrity { id: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a [`SlideError`]
///
/// `NotFound` and `Validation` are caller-correctable; `Integrity` means
/// storage is damaged or something failed internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideErrorKind {
    NotFound,
    Validation,
    Integrity,
}

impl SlideError {
    pub fn kind(&self) -> SlideErrorKind {
        match self {
            SlideError::NotFound(_) => SlideErrorKind::NotFound,
            SlideError::Validation { .. } => SlideErrorKind::Validation,
            SlideError::Integrity { .. } | SlideError::IoError(_) => SlideErrorKind::Integrity,
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        SlideError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(id: &str, reason: impl Into<String>) -> Self {
        SlideError::Integrity {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SlideResult<T> = Result<T, SlideError>;

/// Keys of `conf.json`, in their stored order
pub const CONF_KEYS: &[&str] = &[
    "name", "index", "time", "owner", "enabled", "expires", "expire_t",
];

/// On-disk slide config (`conf.json`)
///
/// Integers are kept signed so out-of-range stored values reach the field
/// setters instead of failing inside serde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlideConf {
    pub name: String,
    pub index: i64,
    pub time: i64,
    pub owner: String,
    pub enabled: bool,
    pub expires: bool,
    pub expire_t: i64,
}

/// Plain snapshot of every slide field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideData {
    pub id: String,
    pub markup: String,
    pub name: Option<String>,
    pub index: Option<u32>,
    pub time: Option<u32>,
    pub owner: Option<String>,
    pub enabled: bool,
    pub expires: bool,
    pub expire_t: u64,
}

/// Summary info for slide listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideListItem {
    pub id: String,
    pub name: Option<String>,
    pub index: Option<u32>,
    pub owner: Option<String>,
    pub enabled: bool,
}

impl From<SlideData> for SlideListItem {
    fn from(d: SlideData) -> Self {
        Self {
            id: d.id,
            name: d.name,
            index: d.index,
            owner: d.owner,
            enabled: d.enabled,
        }
    }
}

/// Caller-supplied field values for creating or updating a slide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideUpdate {
    pub name: String,
    pub index: i64,
    pub time: i64,
    pub owner: String,
    #[serde(default)]
    pub markup: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub expires: bool,
    #[serde(default)]
    pub expire_t: i64,
}
