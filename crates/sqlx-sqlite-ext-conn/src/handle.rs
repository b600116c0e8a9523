//! Connection handle tracking lifecycle and extension-loading state

use std::fmt;
use std::path::Path;

use tracing::{debug, trace};

use crate::Result;
use crate::backend::{QueryRows, SqliteBackend, SqliteValue};
use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::native::NativeBackend;

/// Lifecycle state of a [`ConnectionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
   Open,
   Closed,
}

/// Exclusive owner of one database connection.
///
/// The handle keeps its own "loading enabled" flag so callers never need to know
/// whether a particular driver enables extension loading by default. All
/// mutating operations take `&mut self`: a handle cannot be driven from two
/// tasks at once without external synchronization.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_ext_conn::ConnectionHandle;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), sqlx_sqlite_ext_conn::Error> {
/// let mut handle = ConnectionHandle::open("example.db", None).await?;
///
/// handle.enable_loading().await?;
/// handle.load_extension(Path::new("./vector.so"), None).await?;
///
/// let version = handle.query_scalar("SELECT vector_version()").await?;
/// println!("vector_version(): {:?}", version);
///
/// // Safe to call more than once
/// handle.close().await?;
/// handle.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionHandle<B: SqliteBackend> {
   backend: Option<B>,
   loading_enabled: bool,
   target: String,
}

impl ConnectionHandle<NativeBackend> {
   /// Open a native connection to the database at `path`
   ///
   /// # Arguments
   ///
   /// * `path` - Path to the SQLite database file, or `:memory:`
   /// * `custom_config` - Optional connection configuration. Pass `None` to use
   ///   defaults (create if missing, read-write, 5 second busy timeout).
   pub async fn open(
      path: impl AsRef<Path>,
      custom_config: Option<ConnectionConfig>,
   ) -> Result<Self> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref();
      let backend = NativeBackend::open(path, &config).await?;
      Ok(Self::from_backend(backend, path.display().to_string()))
   }
}

impl<B: SqliteBackend> ConnectionHandle<B> {
   /// Wrap an already opened backend connection.
   ///
   /// `target` is a human-readable name for diagnostics (path, worker db id).
   pub fn from_backend(backend: B, target: impl Into<String>) -> Self {
      Self {
         backend: Some(backend),
         loading_enabled: false,
         target: target.into(),
      }
   }

   pub fn state(&self) -> HandleState {
      if self.backend.is_some() {
         HandleState::Open
      } else {
         HandleState::Closed
      }
   }

   pub fn is_open(&self) -> bool {
      self.backend.is_some()
   }

   /// Whether `enable_loading` has succeeded on this handle
   pub fn loading_enabled(&self) -> bool {
      self.loading_enabled
   }

   /// What this handle was opened against
   pub fn target(&self) -> &str {
      &self.target
   }

   /// Whether the backend can load extensions at runtime. Always false once closed.
   pub fn supports_runtime_loading(&self) -> bool {
      self
         .backend
         .as_ref()
         .is_some_and(SqliteBackend::supports_runtime_loading)
   }

   /// Mutable access to the backend for driver-specific operations
   pub fn backend_mut(&mut self) -> Result<&mut B> {
      self.backend.as_mut().ok_or(Error::HandleClosed)
   }

   /// Enable extension loading. Idempotent: once enabled, further calls return
   /// immediately without touching the backend.
   ///
   /// Loading is never disabled again for the lifetime of the handle.
   pub async fn enable_loading(&mut self) -> Result<()> {
      let backend = self.backend.as_mut().ok_or(Error::HandleClosed)?;

      if self.loading_enabled {
         trace!(db = %self.target, "Extension loading already enabled");
         return Ok(());
      }

      if !backend.supports_runtime_loading() {
         return Err(Error::LoadingUnsupported);
      }

      backend.enable_loading().await?;
      self.loading_enabled = true;

      debug!(db = %self.target, "Extension loading enabled");
      Ok(())
   }

   /// Load the shared library at `path` into this connection.
   ///
   /// Fails with [`Error::LoadingNotEnabled`] unless [`enable_loading`](Self::enable_loading)
   /// succeeded first.
   pub async fn load_extension(&mut self, path: &Path, entry_point: Option<&str>) -> Result<()> {
      let backend = self.backend.as_mut().ok_or(Error::HandleClosed)?;

      if !self.loading_enabled {
         return Err(Error::LoadingNotEnabled);
      }

      backend.load_extension(path, entry_point).await
   }

   /// Execute `sql` and collect every row
   pub async fn query_rows(&mut self, sql: &str) -> Result<QueryRows> {
      let backend = self.backend.as_mut().ok_or(Error::HandleClosed)?;
      backend.query_rows(sql).await
   }

   /// Execute `sql` and return the first column of the first row (`Null` if none)
   pub async fn query_scalar(&mut self, sql: &str) -> Result<SqliteValue> {
      Ok(self.query_rows(sql).await?.first_value())
   }

   /// Close the connection.
   ///
   /// Safe to call multiple times; only the first call releases the backend.
   pub async fn close(&mut self) -> Result<()> {
      self.loading_enabled = false;

      match self.backend.take() {
         Some(backend) => {
            debug!(db = %self.target, "Closing connection handle");
            backend.close().await
         }
         None => Ok(()),
      }
   }
}

impl<B: SqliteBackend> fmt::Debug for ConnectionHandle<B> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionHandle")
         .field("target", &self.target)
         .field("state", &self.state())
         .field("loading_enabled", &self.loading_enabled)
         .finish()
   }
}
