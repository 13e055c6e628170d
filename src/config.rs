//! Runtime Server Configuration
//!
//! Holds the configuration values clients can read and change with
//! `CONFIG GET` / `CONFIG SET`. The values are opaque: the server stores and
//! reports them but never opens anything at that location.
//!
//! | Parameter    | Meaning                          | Default     |
//! |--------------|----------------------------------|-------------|
//! | `dir`        | Directory for the database file  | `""`        |
//! | `dbfilename` | Name of the database file        | `dump.rdb`  |

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Name of the directory parameter
pub const DIR: &str = "dir";

/// Name of the database file name parameter
pub const DBFILENAME: &str = "dbfilename";

/// Default database file name
pub const DEFAULT_DBFILENAME: &str = "dump.rdb";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Values {
    dir: String,
    dbfilename: String,
}

/// Configuration shared by every connection.
///
/// # Example
///
/// ```
/// use driftkv::config::ServerConfig;
///
/// let config = ServerConfig::new("/tmp/redis-files", "dump.rdb");
/// assert_eq!(config.get("dir").as_deref(), Some("/tmp/redis-files"));
///
/// assert!(config.set("dbfilename", "other.rdb"));
/// assert_eq!(config.dbfilename(), "other.rdb");
///
/// assert!(!config.set("maxmemory", "1gb"));
/// ```
#[derive(Debug)]
pub struct ServerConfig {
    values: RwLock<Values>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("", DEFAULT_DBFILENAME)
    }
}

impl ServerConfig {
    pub fn new(dir: impl Into<String>, dbfilename: impl Into<String>) -> Self {
        Self {
            values: RwLock::new(Values {
                dir: dir.into(),
                dbfilename: dbfilename.into(),
            }),
        }
    }

    fn with_values<T>(&self, f: impl FnOnce(&Values) -> T) -> T {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        f(&*values)
    }

    fn with_values_mut<T>(&self, f: impl FnOnce(&mut Values) -> T) -> T {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *values)
    }

    pub fn dir(&self) -> String {
        self.with_values(|v| v.dir.clone())
    }

    pub fn dbfilename(&self) -> String {
        self.with_values(|v| v.dbfilename.clone())
    }

    pub fn set_dir(&self, dir: impl Into<String>) {
        let dir = dir.into();
        self.with_values_mut(|v| v.dir = dir);
    }

    pub fn set_dbfilename(&self, name: impl Into<String>) {
        let name = name.into();
        self.with_values_mut(|v| v.dbfilename = name);
    }

    /// Location of the database file: `dir` joined with `dbfilename`.
    ///
    /// An empty `dir` yields the bare file name, relative to the working directory.
    pub fn db_path(&self) -> PathBuf {
        self.with_values(|v| Path::new(&v.dir).join(&v.dbfilename))
    }

    /// Looks up a parameter by name. Returns `None` for unknown parameters.
    pub fn get(&self, param: &str) -> Option<String> {
        match param {
            DIR => Some(self.dir()),
            DBFILENAME => Some(self.dbfilename()),
            _ => None,
        }
    }

    /// Sets a parameter by name.
    ///
    /// # Returns
    ///
    /// `false` if the parameter is unknown; nothing is changed in that case.
    pub fn set(&self, param: &str, value: impl Into<String>) -> bool {
        match param {
            DIR => self.set_dir(value),
            DBFILENAME => self.set_dbfilename(value),
            _ => return false,
        }
        true
    }
}
