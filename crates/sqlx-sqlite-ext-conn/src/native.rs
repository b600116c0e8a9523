//! sqlx-backed native SQLite connection

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow, SqliteValueRef};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, Value, ValueRef};
use tracing::{debug, warn};

use crate::Result;
use crate::backend::{QueryRows, SqliteBackend, SqliteValue};
use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::ffi;

/// A single native SQLite connection opened through sqlx.
///
/// Dropping the backend without calling [`SqliteBackend::close`] still releases the
/// connection; sqlx closes it on its worker thread.
#[derive(Debug)]
pub struct NativeBackend {
   conn: SqliteConnection,
   path: PathBuf,
}

impl NativeBackend {
   /// Open (and by default create) the database at `path`.
   ///
   /// SQLite opens files lazily, so a schema read is issued right after connecting
   /// to surface "file is not a database" and permission problems here instead of
   /// on the first query. If that read fails the connection is closed before the
   /// error is returned.
   pub async fn open(path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<Self> {
      let path = path.as_ref();

      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      let options = SqliteConnectOptions::new()
         .filename(path)
         .create_if_missing(config.create_if_missing && !config.read_only)
         .read_only(config.read_only)
         .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

      let mut conn = options.connect().await?;

      if let Err(e) = sqlx::query("PRAGMA schema_version")
         .fetch_optional(&mut conn)
         .await
      {
         if let Err(close_err) = conn.close().await {
            warn!("Failed to close connection after open failure: {}", close_err);
         }
         return Err(Error::Sqlx(e));
      }

      debug!(path = %path.display(), "Opened native SQLite connection");

      Ok(Self {
         conn,
         path: path.to_path_buf(),
      })
   }

   /// Path this connection was opened with
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Register a zero-argument SQL function returning a fixed text value.
   pub async fn register_constant_function(&mut self, name: &str, value: &str) -> Result<()> {
      let mut handle = self.conn.lock_handle().await?;
      let db = handle.as_raw_handle().as_ptr();

      // SAFETY: db stays valid and exclusively ours while `handle` is held.
      unsafe { ffi::register_constant_function(db, name, value) }
   }
}

impl SqliteBackend for NativeBackend {
   fn supports_runtime_loading(&self) -> bool {
      true
   }

   async fn enable_loading(&mut self) -> Result<()> {
      let mut handle = self.conn.lock_handle().await?;
      let db = handle.as_raw_handle().as_ptr();

      // SAFETY: db stays valid and exclusively ours while `handle` is held.
      unsafe { ffi::enable_load_extension(db) }
   }

   async fn load_extension(&mut self, path: &Path, entry_point: Option<&str>) -> Result<()> {
      let file = path
         .to_str()
         .ok_or_else(|| Error::InvalidPath(format!("{} is not valid UTF-8", path.display())))?;
      let file = CString::new(file)
         .map_err(|_| Error::InvalidPath(format!("{} contains a NUL byte", path.display())))?;
      let entry_point = entry_point
         .map(CString::new)
         .transpose()
         .map_err(|_| Error::InvalidPath("entry point contains a NUL byte".to_string()))?;

      let mut handle = self.conn.lock_handle().await?;
      let db = handle.as_raw_handle().as_ptr();

      // SAFETY: db stays valid and exclusively ours while `handle` is held; the
      // CStrings outlive the call.
      unsafe { ffi::load_extension(db, &file, entry_point.as_deref()) }
   }

   async fn query_rows(&mut self, sql: &str) -> Result<QueryRows> {
      let rows: Vec<SqliteRow> = sqlx::query(sql).fetch_all(&mut self.conn).await?;

      let columns = rows
         .first()
         .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
         .unwrap_or_default();

      let mut values = Vec::with_capacity(rows.len());
      for row in &rows {
         let mut decoded = Vec::with_capacity(row.len());
         for index in 0..row.len() {
            decoded.push(decode_value(row.try_get_raw(index)?));
         }
         values.push(decoded);
      }

      Ok(QueryRows {
         columns,
         rows: values,
      })
   }

   async fn close(self) -> Result<()> {
      debug!(path = %self.path.display(), "Closing native SQLite connection");
      self.conn.close().await?;
      Ok(())
   }
}

/// Convert a raw SQLite value using its runtime storage class.
fn decode_value(value: SqliteValueRef<'_>) -> SqliteValue {
   if value.is_null() {
      return SqliteValue::Null;
   }

   match value.type_info().name() {
      "INTEGER" | "NUMERIC" | "BOOLEAN" => value
         .to_owned()
         .try_decode::<i64>()
         .map_or(SqliteValue::Null, SqliteValue::Integer),
      "REAL" => value
         .to_owned()
         .try_decode::<f64>()
         .map_or(SqliteValue::Null, SqliteValue::Real),
      "BLOB" => value
         .to_owned()
         .try_decode::<Vec<u8>>()
         .map_or(SqliteValue::Null, SqliteValue::Blob),
      // TEXT, DATE/TIME affinities and anything unknown come back as text
      _ => value
         .to_owned()
         .try_decode::<String>()
         .map_or(SqliteValue::Null, SqliteValue::Text),
   }
}
