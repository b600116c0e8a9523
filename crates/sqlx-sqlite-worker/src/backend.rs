use std::path::Path;

use sqlx_sqlite_ext_conn::{QueryRows, SqliteBackend};
use tracing::debug;

use crate::Error;
use crate::client::WorkerClient;

/// [`SqliteBackend`] for a database living inside a worker.
///
/// The worker models a sandboxed host: extensions exist only if they were part
/// of its image, so enabling or loading at runtime is always refused and never
/// reaches the worker.
pub struct WorkerBackend {
   client: WorkerClient,
   db_id: String,
}

impl WorkerBackend {
   pub(crate) fn new(client: WorkerClient, db_id: String) -> Self {
      Self { client, db_id }
   }

   /// Id the worker assigned to this database
   pub fn db_id(&self) -> &str {
      &self.db_id
   }
}

impl SqliteBackend for WorkerBackend {
   fn supports_runtime_loading(&self) -> bool {
      false
   }

   async fn enable_loading(&mut self) -> sqlx_sqlite_ext_conn::Result<()> {
      Err(sqlx_sqlite_ext_conn::Error::LoadingUnsupported)
   }

   async fn load_extension(
      &mut self,
      path: &Path,
      _entry_point: Option<&str>,
   ) -> sqlx_sqlite_ext_conn::Result<()> {
      debug!(db_id = %self.db_id, path = %path.display(), "Refusing runtime extension load in worker");
      Err(sqlx_sqlite_ext_conn::Error::LoadingUnsupported)
   }

   async fn query_rows(&mut self, sql: &str) -> sqlx_sqlite_ext_conn::Result<QueryRows> {
      self
         .client
         .exec(&self.db_id, sql)
         .await
         .map_err(into_connection_error)
   }

   async fn close(self) -> sqlx_sqlite_ext_conn::Result<()> {
      self
         .client
         .close_database(&self.db_id)
         .await
         .map_err(into_connection_error)
   }
}

fn into_connection_error(error: Error) -> sqlx_sqlite_ext_conn::Error {
   match error {
      Error::Connection(inner) => inner,
      other => sqlx_sqlite_ext_conn::Error::Backend(other.to_string()),
   }
}
