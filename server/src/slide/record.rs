//! A single slide and its two backing files
//!
//! Each slide lives in `<slides_dir>/<id>/` as `conf.json` (every field
//! except markup) and `markup.dat` (the raw markup).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::directory::list_ids;
use super::store::SlideContext;
use super::types::{CONF_KEYS, SlideConf, SlideData, SlideError, SlideResult, SlideUpdate};

const CONF_FILE: &str = "conf.json";
const MARKUP_FILE: &str = "markup.dat";

/// Attempts at drawing an unused slide ID before giving up
const MAX_ID_ATTEMPTS: usize = 16;

/// Current Unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// File locations derived from a slide ID
#[derive(Debug, Clone)]
struct SlidePaths {
    dir: PathBuf,
    conf: PathBuf,
    markup: PathBuf,
}

impl SlidePaths {
    fn new(root: &Path, id: &str) -> Self {
        let dir = root.join(id);
        Self {
            conf: dir.join(CONF_FILE),
            markup: dir.join(MARKUP_FILE),
            dir,
        }
    }

    fn exist(&self) -> bool {
        self.dir.is_dir() && self.conf.is_file() && self.markup.is_file()
    }
}

/// In-memory slide bound to a storage root
///
/// Setters validate their input and leave the field untouched on error.
pub struct Slide {
    ctx: Arc<SlideContext>,
    id: String,
    paths: SlidePaths,

    name: Option<String>,
    index: Option<u32>,
    time: Option<u32>,
    owner: Option<String>,
    markup: String,
    enabled: bool,
    expires: bool,
    expire_t: u64,
}

impl Slide {
    /// Create a fresh slide with a newly allocated, unused ID.
    ///
    /// Nothing is written until [`Slide::write`] is called.
    pub fn create(ctx: &Arc<SlideContext>) -> SlideResult<Self> {
        let existing = list_ids(ctx)?;
        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| Uuid::new_v4().simple().to_string())
            .find(|candidate| !existing.contains(candidate))
            .ok_or_else(|| {
                SlideError::integrity("<new>", "failed to allocate an unused slide ID")
            })?;

        debug!("Allocated slide ID {}", id);
        Ok(Self::blank(ctx, id))
    }

    /// Load a slide from storage, validating every field and applying expiry.
    pub fn load(ctx: &Arc<SlideContext>, id: &str) -> SlideResult<Self> {
        if !is_valid_id(id) {
            return Err(SlideError::NotFound(id.to_string()));
        }
        let mut slide = Self::blank(ctx, id.to_string());
        if !slide.paths.exist() {
            return Err(SlideError::NotFound(id.to_string()));
        }

        let raw_conf = ctx
            .files
            .read_locked(&slide.paths.conf)
            .map_err(|e| SlideError::integrity(id, format!("config read failed: {e}")))?
            .ok_or_else(|| SlideError::integrity(id, "config disappeared while loading"))?;
        let conf = parse_conf(id, &raw_conf)?;

        let raw_markup = ctx
            .files
            .read_locked(&slide.paths.markup)
            .map_err(|e| SlideError::integrity(id, format!("markup read failed: {e}")))?
            .ok_or_else(|| SlideError::integrity(id, "markup disappeared while loading"))?;
        let markup = String::from_utf8(raw_markup)
            .map_err(|_| SlideError::integrity(id, "markup is not valid UTF-8"))?;

        slide
            .apply_stored(conf, markup)
            .map_err(|e| match e {
                SlideError::Validation { field, reason } => {
                    SlideError::integrity(id, format!("stored {field} rejected: {reason}"))
                }
                other => other,
            })?;

        counter!("signage_slide_loads_total").increment(1);
        slide.check_expired()?;
        Ok(slide)
    }

    fn blank(ctx: &Arc<SlideContext>, id: String) -> Self {
        Self {
            paths: SlidePaths::new(&ctx.root, &id),
            ctx: Arc::clone(ctx),
            id,
            name: None,
            index: None,
            time: None,
            owner: None,
            markup: String::new(),
            enabled: false,
            expires: false,
            expire_t: 0,
        }
    }

    fn apply_stored(&mut self, conf: SlideConf, markup: String) -> SlideResult<()> {
        self.set_markup(markup)?;
        self.set_name(conf.name)?;
        self.set_index(conf.index)?;
        self.set_time(conf.time)?;
        self.set_owner(conf.owner)?;
        self.set_enabled(conf.enabled);
        self.set_expires(conf.expires);
        self.set_expire_t(conf.expire_t)?;
        Ok(())
    }

    /// Apply every field of a caller-supplied update.
    ///
    /// Stops at the first rejected field; earlier fields stay applied.
    pub fn apply(&mut self, update: SlideUpdate) -> SlideResult<()> {
        self.set_name(update.name)?;
        self.set_index(update.index)?;
        self.set_time(update.time)?;
        self.set_owner(update.owner)?;
        self.set_markup(update.markup)?;
        self.set_enabled(update.enabled);
        self.set_expires(update.expires);
        self.set_expire_t(update.expire_t)?;
        Ok(())
    }

    /// Rebind this slide to another ID that already exists in storage.
    pub fn set_id(&mut self, id: &str) -> SlideResult<()> {
        if !list_ids(&self.ctx)?.iter().any(|existing| existing == id) {
            return Err(SlideError::NotFound(id.to_string()));
        }
        self.id = id.to_string();
        self.paths = SlidePaths::new(&self.ctx.root, id);
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> SlideResult<()> {
        let name = name.into();
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(SlideError::validation(
                "name",
                format!("invalid character {c:?}"),
            ));
        }
        if name.len() > self.ctx.limits.name_max_len {
            return Err(SlideError::validation(
                "name",
                format!("longer than {} bytes", self.ctx.limits.name_max_len),
            ));
        }
        self.name = Some(name);
        Ok(())
    }

    pub fn set_index(&mut self, index: i64) -> SlideResult<()> {
        let max = self.ctx.limits.max_index;
        match u32::try_from(index) {
            Ok(i) if i <= max => {
                self.index = Some(i);
                Ok(())
            }
            _ => Err(SlideError::validation(
                "index",
                format!("{index} outside 0..={max}"),
            )),
        }
    }

    pub fn set_time(&mut self, time: i64) -> SlideResult<()> {
        let (min, max) = (self.ctx.limits.min_time, self.ctx.limits.max_time);
        match u32::try_from(time) {
            Ok(t) if (min..=max).contains(&t) => {
                self.time = Some(t);
                Ok(())
            }
            _ => Err(SlideError::validation(
                "time",
                format!("{time} outside {min}..={max}"),
            )),
        }
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) -> SlideResult<()> {
        let owner = owner.into();
        if !self.ctx.users.user_exists(&owner) {
            return Err(SlideError::validation(
                "owner",
                format!("user {owner:?} doesn't exist"),
            ));
        }
        self.owner = Some(owner);
        Ok(())
    }

    pub fn set_markup(&mut self, markup: impl Into<String>) -> SlideResult<()> {
        let markup = markup.into();
        if markup.len() > self.ctx.limits.markup_max_len {
            return Err(SlideError::validation(
                "markup",
                format!("longer than {} bytes", self.ctx.limits.markup_max_len),
            ));
        }
        self.markup = markup;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_expires(&mut self, expires: bool) {
        self.expires = expires;
    }

    pub fn set_expire_t(&mut self, expire_t: i64) -> SlideResult<()> {
        let expire_t = u64::try_from(expire_t).map_err(|_| {
            SlideError::validation("expire_t", "negative expiration timestamp")
        })?;
        self.expire_t = expire_t;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn time(&self) -> Option<u32> {
        self.time
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn expires(&self) -> bool {
        self.expires
    }

    pub fn expire_t(&self) -> u64 {
        self.expire_t
    }

    /// Snapshot of all fields
    pub fn as_data(&self) -> SlideData {
        SlideData {
            id: self.id.clone(),
            markup: self.markup.clone(),
            name: self.name.clone(),
            index: self.index,
            time: self.time,
            owner: self.owner.clone(),
            enabled: self.enabled,
            expires: self.expires,
            expire_t: self.expire_t,
        }
    }

    /// Disable the slide and persist it if it has expired.
    ///
    /// Returns whether the slide was disabled by this call.
    pub fn check_expired(&mut self) -> SlideResult<bool> {
        self.check_expired_at(now_secs())
    }

    pub(crate) fn check_expired_at(&mut self, now: u64) -> SlideResult<bool> {
        if !(self.expires && self.enabled && now >= self.expire_t) {
            return Ok(false);
        }

        info!("Slide {} expired at {}, disabling", self.id, self.expire_t);
        self.enabled = false;
        self.write()?;
        counter!("signage_slide_expired_total").increment(1);
        Ok(true)
    }

    /// Write both backing files, overwriting any previous contents.
    pub fn write(&self) -> SlideResult<()> {
        let conf = SlideConf {
            name: required("name", self.name.clone())?,
            index: i64::from(required("index", self.index)?),
            time: i64::from(required("time", self.time)?),
            owner: required("owner", self.owner.clone())?,
            enabled: self.enabled,
            expires: self.expires,
            expire_t: i64::try_from(self.expire_t)
                .map_err(|_| SlideError::integrity(&self.id, "expire_t overflows storage"))?,
        };
        let encoded = serde_json::to_vec(&conf)
            .map_err(|e| SlideError::integrity(&self.id, format!("config encoding failed: {e}")))?;

        self.ctx.files.write_locked(&self.paths.conf, &encoded)?;
        self.ctx
            .files
            .write_locked(&self.paths.markup, self.markup.as_bytes())?;

        counter!("signage_slide_writes_total").increment(1);
        debug!("Wrote slide {} (index {:?})", self.id, self.index);
        Ok(())
    }

    /// Delete the slide directory and everything in it.
    pub fn remove(&self) -> SlideResult<()> {
        match fs::remove_dir_all(&self.paths.dir) {
            Ok(()) => {
                info!("Removed slide {}", self.id);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Slide {} already removed", self.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for Slide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slide")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("index", &self.index)
            .field("time", &self.time)
            .field("owner", &self.owner)
            .field("enabled", &self.enabled)
            .field("expires", &self.expires)
            .field("expire_t", &self.expire_t)
            .finish_non_exhaustive()
    }
}

/// IDs name a direct child of the storage root and are never hidden
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\'])
}

fn required<T>(field: &'static str, value: Option<T>) -> SlideResult<T> {
    value.ok_or_else(|| SlideError::validation(field, "not set"))
}

/// Decode `conf.json`, requiring exactly [`CONF_KEYS`] in order.
fn parse_conf(id: &str, raw: &[u8]) -> SlideResult<SlideConf> {
    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| SlideError::integrity(id, format!("config decode failed: {e}")))?;

    let keys: Vec<&str> = value
        .as_object()
        .ok_or_else(|| SlideError::integrity(id, "config is not a JSON object"))?
        .keys()
        .map(String::as_str)
        .collect();
    if keys != CONF_KEYS {
        return Err(SlideError::integrity(
            id,
            format!("config keys {keys:?} don't match {CONF_KEYS:?}"),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| SlideError::integrity(id, format!("invalid config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slide::types::SlideErrorKind;
    use crate::test_utils::{TEST_USERS, TestStore, test_update};
    use proptest::prelude::*;

    #[test]
    fn test_write_then_load_round_trip() {
        let t = TestStore::new();
        let mut slide = t.store.create().unwrap();
        slide.apply(test_update("intro", 3)).unwrap();
        slide.set_markup("[h1]Hello[/h1]").unwrap();
        slide.set_expires(true);
        slide.set_expire_t(i64::MAX / 2).unwrap();
        slide.write().unwrap();

        let loaded = t.store.load(slide.id()).unwrap();
        assert_eq!(loaded.as_data(), slide.as_data());
    }

    #[test]
    fn test_create_allocates_distinct_ids() {
        let t = TestStore::new();
        let a = t.store.create().unwrap();
        let b = t.store.create().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 32);
    }

    #[test]
    fn test_invalid_name_keeps_previous_value() {
        let t = TestStore::new();
        let mut slide = t.store.create().unwrap();
        slide.set_name("valid_name-1").unwrap();

        let err = slide.set_name("bad name!").unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Validation);
        assert!(matches!(err, SlideError::Validation { field: "name", .. }));
        assert_eq!(slide.name(), Some("valid_name-1"));
    }

    #[test]
    fn test_setter_bounds() {
        let t = TestStore::new();
        let limits = t.store.limits();
        let mut slide = t.store.create().unwrap();

        assert!(slide.set_index(-1).is_err());
        assert!(slide.set_index(i64::from(limits.max_index) + 1).is_err());
        assert!(slide.set_index(i64::from(limits.max_index)).is_ok());

        assert!(slide.set_time(i64::from(limits.min_time) - 1).is_err());
        assert!(slide.set_time(i64::from(limits.max_time) + 1).is_err());
        assert!(slide.set_time(i64::from(limits.min_time)).is_ok());

        assert!(slide.set_name("x".repeat(limits.name_max_len + 1)).is_err());
        assert!(slide.set_markup("x".repeat(limits.markup_max_len + 1)).is_err());
        assert!(slide.set_expire_t(-5).is_err());
        assert_eq!(slide.expire_t(), 0);
    }

    #[test]
    fn test_unknown_owner_rejected() {
        let t = TestStore::new();
        let mut slide = t.store.create().unwrap();
        let err = slide.set_owner("ghost").unwrap_err();
        assert!(matches!(err, SlideError::Validation { field: "owner", .. }));
        assert_eq!(slide.owner(), None);
    }

    #[test]
    fn test_write_requires_fields() {
        let t = TestStore::new();
        let mut slide = t.store.create().unwrap();
        slide.set_name("incomplete").unwrap();
        let err = slide.write().unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Validation);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let t = TestStore::new();
        let err = t.store.load("does-not-exist").unwrap_err();
        assert!(matches!(err, SlideError::NotFound(_)));
    }

    #[test]
    fn test_load_missing_markup_is_not_found() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        fs::remove_file(t.root().join(slide.id()).join(MARKUP_FILE)).unwrap();

        let err = t.store.load(slide.id()).unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::NotFound);
    }

    #[test]
    fn test_load_garbage_config_is_integrity_error() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        fs::write(t.root().join(slide.id()).join(CONF_FILE), b"{not json").unwrap();

        let err = t.store.load(slide.id()).unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Integrity);
    }

    #[test]
    fn test_load_config_with_missing_key_is_integrity_error() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        fs::write(
            t.root().join(slide.id()).join(CONF_FILE),
            br#"{"name":"a","index":0,"time":1000,"owner":"admin","enabled":true,"expires":false}"#,
        )
        .unwrap();

        let err = t.store.load(slide.id()).unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Integrity);
    }

    #[test]
    fn test_load_config_with_reordered_keys_is_integrity_error() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        fs::write(
            t.root().join(slide.id()).join(CONF_FILE),
            br#"{"index":0,"name":"a","time":1000,"owner":"admin","enabled":true,"expires":false,"expire_t":0}"#,
        )
        .unwrap();

        let err = t.store.load(slide.id()).unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Integrity);
    }

    #[test]
    fn test_load_out_of_range_stored_value_is_integrity_error() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        fs::write(
            t.root().join(slide.id()).join(CONF_FILE),
            br#"{"name":"a","index":-3,"time":1000,"owner":"admin","enabled":true,"expires":false,"expire_t":0}"#,
        )
        .unwrap();

        let err = t.store.load(slide.id()).unwrap_err();
        assert_eq!(err.kind(), SlideErrorKind::Integrity);
    }

    #[test]
    fn test_expired_slide_disabled_on_load() {
        let t = TestStore::new();
        let mut slide = t.store.create().unwrap();
        slide.apply(test_update("expiring", 0)).unwrap();
        slide.set_enabled(true);
        slide.set_expires(true);
        slide.set_expire_t(1).unwrap();
        slide.write().unwrap();

        let loaded = t.store.load(slide.id()).unwrap();
        assert!(!loaded.enabled());

        // The disabled flag was persisted, not just applied in memory.
        let raw = fs::read(t.root().join(slide.id()).join(CONF_FILE)).unwrap();
        let conf: SlideConf = serde_json::from_slice(&raw).unwrap();
        assert!(!conf.enabled);
    }

    #[test]
    fn test_check_expired_respects_deadline() {
        let t = TestStore::new();
        let mut slide = t.saved_slide("a", 0);
        slide.set_enabled(true);
        slide.set_expires(true);
        slide.set_expire_t(100).unwrap();

        assert!(!slide.check_expired_at(99).unwrap());
        assert!(slide.enabled());
        assert!(slide.check_expired_at(100).unwrap());
        assert!(!slide.enabled());
    }

    #[test]
    fn test_set_id_requires_existing_slide() {
        let t = TestStore::new();
        let existing = t.saved_slide("a", 0);
        let mut slide = t.store.create().unwrap();

        assert!(matches!(
            slide.set_id("nope"),
            Err(SlideError::NotFound(_))
        ));
        slide.set_id(existing.id()).unwrap();
        assert_eq!(slide.id(), existing.id());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let t = TestStore::new();
        let slide = t.saved_slide("a", 0);
        slide.remove().unwrap();
        assert!(!t.root().join(slide.id()).exists());
        slide.remove().unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_load_after_write_returns_same_fields(
            name in "[A-Za-z0-9_-]{0,32}",
            index in 0i64..=65536,
            time in 1000i64..=20000,
            owner in proptest::sample::select(TEST_USERS),
            markup in "\\PC{0,512}",
            enabled in any::<bool>(),
            expires in any::<bool>(),
            // Either long past or far in the future, never "now".
            expire_t in prop_oneof![0i64..1_000_000, 4_000_000_000i64..i64::MAX],
        ) {
            let t = TestStore::new();
            let mut slide = t.store.create().unwrap();
            slide.set_name(name).unwrap();
            slide.set_index(index).unwrap();
            slide.set_time(time).unwrap();
            slide.set_owner(owner).unwrap();
            slide.set_markup(markup).unwrap();
            slide.set_enabled(enabled);
            slide.set_expires(expires);
            slide.set_expire_t(expire_t).unwrap();
            slide.write().unwrap();

            let mut expected = slide.as_data();
            expected.enabled = enabled && !(expires && expire_t < 1_000_000);
            prop_assert_eq!(t.store.load(slide.id()).unwrap().as_data(), expected);
        }
    }
}
