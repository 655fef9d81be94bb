//! User existence lookups
//!
//! Slides reference their owner by user name. Only existence matters here;
//! account management lives elsewhere.

use std::collections::HashSet;
use std::path::PathBuf;

/// Answers whether a user exists
pub trait UserDirectory: Send + Sync {
    fn user_exists(&self, name: &str) -> bool;
}

/// Users stored as one directory per user under a common root
#[derive(Debug, Clone)]
pub struct FsUserDirectory {
    users_dir: PathBuf,
}

impl FsUserDirectory {
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_dir: users_dir.into(),
        }
    }
}

impl UserDirectory for FsUserDirectory {
    fn user_exists(&self, name: &str) -> bool {
        // Names that could escape the users directory never match.
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return false;
        }
        self.users_dir.join(name).is_dir()
    }
}

/// Fixed in-memory user set
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: HashSet<String>,
}

impl StaticUserDirectory {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserDirectory for StaticUserDirectory {
    fn user_exists(&self, name: &str) -> bool {
        self.users.contains(name)
    }
}
