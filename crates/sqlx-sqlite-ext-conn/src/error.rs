//! Error types for sqlx-sqlite-ext-conn

use thiserror::Error;

/// Errors that may occur when working with a [`ConnectionHandle`](crate::ConnectionHandle)
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// The database or extension path cannot be used (empty, not UTF-8, interior NUL)
   #[error("Invalid path: {0}")]
   InvalidPath(String),

   /// Handle has been closed and cannot be used
   #[error("Connection handle has been closed")]
   HandleClosed,

   /// A load was attempted before extension loading was enabled on the handle
   #[error("Extension loading has not been enabled on this connection")]
   LoadingNotEnabled,

   /// The backend cannot load extensions at runtime (sandboxed host)
   #[error("Runtime extension loading is not supported by this backend")]
   LoadingUnsupported,

   /// SQLite rejected the extension (missing file, bad ABI, missing entry point)
   #[error("SQLite rejected the extension: {0}")]
   LoadRejected(String),

   /// Any other failure reported by the backend
   #[error("Backend error: {0}")]
   Backend(String),
}
