//! # sqlx-sqlite-ext-conn
//!
//! An owned SQLite connection handle for applications that load native
//! extensions at runtime.
//!
//! ## Core Types
//!
//! - **[`ConnectionHandle`]**: Exclusive owner of one connection, tracking lifecycle
//!   state and whether extension loading has been enabled
//! - **[`SqliteBackend`]**: The narrow driver surface a handle drives
//!   (enable loading, load extension, query rows, close)
//! - **[`NativeBackend`]**: sqlx-backed implementation for native processes
//! - **[`ConnectionConfig`]**: Open-time configuration
//! - **[`Error`]**: Error type for handle operations
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_sqlite_ext_conn::{ConnectionHandle, SqliteValue};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_ext_conn::Result<()> {
//!     let mut handle = ConnectionHandle::open(":memory:", None).await?;
//!
//!     // Idempotent; only the first call reaches SQLite
//!     handle.enable_loading().await?;
//!     handle.enable_loading().await?;
//!
//!     handle.load_extension(Path::new("./js"), None).await?;
//!
//!     if let SqliteValue::Text(version) = handle.query_scalar("SELECT js_version()").await? {
//!         println!("js_version(): {version}");
//!     }
//!
//!     handle.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Principles
//!
//! - Uses sqlx's `SqliteConnectOptions` for connection flags and configuration
//! - Per-call extension loading goes through the raw handle, since sqlx only
//!   loads extensions while connecting
//! - Loading is enabled once and never disabled for the lifetime of a handle
//! - `close` is idempotent and the connection is released on every exit path
//!
mod backend;
mod config;
mod error;
mod ffi;
mod handle;
mod native;

// Re-export public types
pub use backend::{QueryRows, SqliteBackend, SqliteValue};
pub use config::ConnectionConfig;
pub use error::Error;
pub use ffi::lib_version;
pub use handle::{ConnectionHandle, HandleState};
pub use native::NativeBackend;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
