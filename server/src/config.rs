//! Server configuration
//!
//! Configuration is loaded from environment variables on top of the defaults below.

use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Storage locations
    pub storage: StorageConfig,

    /// Slide field limits
    pub limits: SlideLimits,
}

/// Storage-related configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per slide
    pub slides_dir: PathBuf,
    /// Directory holding one subdirectory per user
    pub users_dir: PathBuf,
}

/// Bounds enforced by the slide field setters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideLimits {
    /// Largest allowed slide index
    pub max_index: u32,
    /// Shortest display time in milliseconds
    pub min_time: u32,
    /// Longest display time in milliseconds
    pub max_time: u32,
    /// Maximum slide name length in bytes
    pub name_max_len: usize,
    /// Maximum markup length in bytes
    pub markup_max_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageConfig::default(),
            limits: SlideLimits::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            slides_dir: PathBuf::from("./data/slides"),
            users_dir: PathBuf::from("./data/users"),
        }
    }
}

impl Default for SlideLimits {
    fn default() -> Self {
        Self {
            max_index: 65536,
            min_time: 1000,
            max_time: 20000,
            name_max_len: 32,
            markup_max_len: 2048,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Storage config
        if let Ok(path) = env::var("SLIDES_DIR")
            && !path.is_empty()
        {
            config.storage.slides_dir = PathBuf::from(path);
        }
        if let Ok(path) = env::var("USERS_DIR")
            && !path.is_empty()
        {
            config.storage.users_dir = PathBuf::from(path);
        }

        // Slide limits
        if let Ok(val) = env::var("SLIDE_MAX_INDEX")
            && let Ok(v) = val.parse()
        {
            config.limits.max_index = v;
        }
        if let Ok(val) = env::var("SLIDE_MIN_TIME")
            && let Ok(v) = val.parse()
        {
            config.limits.min_time = v;
        }
        if let Ok(val) = env::var("SLIDE_MAX_TIME")
            && let Ok(v) = val.parse()
        {
            config.limits.max_time = v;
        }
        if let Ok(val) = env::var("SLIDE_NAME_MAX_LEN")
            && let Ok(v) = val.parse()
        {
            config.limits.name_max_len = v;
        }
        if let Ok(val) = env::var("SLIDE_MARKUP_MAX_LEN")
            && let Ok(v) = val.parse()
        {
            config.limits.markup_max_len = v;
        }

        config
    }
}
