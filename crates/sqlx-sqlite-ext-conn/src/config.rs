//! Configuration for opening a SQLite connection handle

use serde::{Deserialize, Serialize};

/// Configuration for [`ConnectionHandle::open`](crate::ConnectionHandle::open)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_ext_conn::ConnectionConfig;
///
/// // Use defaults
/// let config = ConnectionConfig::default();
///
/// // Override just one field
/// let config = ConnectionConfig {
///     read_only: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
   /// Create the database file when it does not exist yet
   ///
   /// Ignored when `read_only` is set, since a read-only connection cannot
   /// create the file.
   ///
   /// Default: true
   pub create_if_missing: bool,

   /// Open the database read-only
   ///
   /// Default: false
   pub read_only: bool,

   /// How long a statement waits on a locked database before failing (in milliseconds)
   ///
   /// Default: 5000
   pub busy_timeout_ms: u64,
}

impl Default for ConnectionConfig {
   fn default() -> Self {
      Self {
         create_if_missing: true,
         read_only: false,
         busy_timeout_ms: 5000,
      }
   }
}
