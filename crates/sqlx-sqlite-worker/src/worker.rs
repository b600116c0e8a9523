//! The worker task: sole owner of every connection opened through it.
//!
//! Requests are taken off a single channel and handled one at a time, so they
//! complete in exactly the order they were submitted.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use sqlx_sqlite_ext_conn::{ConnectionConfig, ConnectionHandle, NativeBackend, lib_version};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::image::WorkerImage;
use crate::message::{Action, ActionResult, ConfigInfo, VersionInfo, WorkerRequest, WorkerResponse};
use crate::{Error, Result};

pub(crate) struct Worker {
   image: WorkerImage,
   connection: ConnectionConfig,
   databases: HashMap<String, ConnectionHandle<NativeBackend>>,
}

impl Worker {
   pub(crate) fn new(image: WorkerImage, connection: ConnectionConfig) -> Self {
      Self {
         image,
         connection,
         databases: HashMap::new(),
      }
   }

   /// Serve requests until every client is gone, then close all databases.
   pub(crate) async fn run(
      mut self,
      mut requests: mpsc::Receiver<String>,
      responses: mpsc::Sender<String>,
   ) {
      debug!("SQLite worker started");

      while let Some(raw) = requests.recv().await {
         let response = self.handle_message(&raw).await;

         let text = match serde_json::to_string(&response) {
            Ok(text) => text,
            Err(e) => {
               error!("Failed to encode worker response: {}", e);
               continue;
            }
         };

         if responses.send(text).await.is_err() {
            debug!("Response channel closed - stopping worker");
            break;
         }
      }

      self.shutdown().await;
   }

   async fn handle_message(&mut self, raw: &str) -> WorkerResponse {
      let value: JsonValue = match serde_json::from_str(raw) {
         Ok(value) => value,
         Err(e) => return WorkerResponse::failure(0, None, &Error::Json(e)),
      };

      // Recover the id before full decoding so malformed requests still correlate
      let message_id = value
         .get("messageId")
         .and_then(JsonValue::as_u64)
         .unwrap_or(0);

      let request: WorkerRequest = match serde_json::from_value(value) {
         Ok(request) => request,
         Err(e) => {
            return WorkerResponse::failure(message_id, None, &Error::Protocol(e.to_string()));
         }
      };

      trace!(message_id, action = request.action.name(), "Worker request");

      let request_db_id = match &request.action {
         Action::Exec { db_id, .. } | Action::Close { db_id } => Some(db_id.clone()),
         Action::Open { .. } | Action::ConfigGet {} => None,
      };

      match self.dispatch(request.action).await {
         Ok((db_id, result)) => WorkerResponse::success(message_id, db_id.or(request_db_id), result),
         Err(e) => {
            debug!(message_id, error = %e, "Worker request failed");
            WorkerResponse::failure(message_id, request_db_id, &e)
         }
      }
   }

   async fn dispatch(&mut self, action: Action) -> Result<(Option<String>, ActionResult)> {
      match action {
         Action::Open { filename } => {
            let (db_id, path) = self.open(&filename).await?;
            Ok((Some(db_id), ActionResult::Opened { filename: path }))
         }
         Action::Exec { db_id, sql } => {
            let handle = self
               .databases
               .get_mut(&db_id)
               .ok_or_else(|| Error::UnknownDatabase(db_id.clone()))?;
            let rows = handle.query_rows(&sql).await?;
            Ok((None, ActionResult::Rows(rows)))
         }
         Action::ConfigGet {} => Ok((
            None,
            ActionResult::Config(ConfigInfo {
               version: VersionInfo {
                  lib_version: lib_version(),
               },
               bundled_extensions: self.image.extension_names(),
            }),
         )),
         Action::Close { db_id } => {
            let mut handle = self
               .databases
               .remove(&db_id)
               .ok_or_else(|| Error::UnknownDatabase(db_id.clone()))?;
            handle.close().await?;
            debug!(db_id = %db_id, "Worker closed database");
            Ok((None, ActionResult::Closed {}))
         }
      }
   }

   async fn open(&mut self, filename: &str) -> Result<(String, String)> {
      let path = strip_file_uri(filename);
      let mut handle = ConnectionHandle::open(path, Some(self.connection.clone())).await?;

      if let Err(e) = self.image.install(handle.backend_mut()?).await {
         if let Err(close_err) = handle.close().await {
            warn!("Failed to close database after image install failure: {}", close_err);
         }
         return Err(e.into());
      }

      let db_id = Uuid::new_v4().to_string();
      debug!(db_id = %db_id, path = %path, "Worker opened database");
      self.databases.insert(db_id.clone(), handle);

      Ok((db_id, path.to_string()))
   }

   async fn shutdown(&mut self) {
      let databases = std::mem::take(&mut self.databases);
      if !databases.is_empty() {
         debug!("Worker stopping - closing {} database(s)", databases.len());
      }

      for (db_id, mut handle) in databases {
         if let Err(e) = handle.close().await {
            warn!(db_id = %db_id, "Error closing database on worker shutdown: {}", e);
         }
      }
   }
}

/// `file:mydb.sqlite3?mode=rwc` → `mydb.sqlite3`
fn strip_file_uri(filename: &str) -> &str {
   let path = filename.strip_prefix("file:").unwrap_or(filename);
   path.split('?').next().unwrap_or(path)
}
