//! Caller side of the worker boundary.
//!
//! Every request gets a fresh `message_id`. A dispatcher task reads the
//! worker's responses and wakes whichever caller is waiting on that id, so each
//! call looks like a single awaited function even though the worker only
//! speaks in messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sqlx_sqlite_ext_conn::{ConnectionHandle, QueryRows};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::backend::WorkerBackend;
use crate::config::WorkerConfig;
use crate::image::WorkerImage;
use crate::message::{Action, ActionResult, ConfigInfo, WorkerRequest, WorkerResponse};
use crate::worker::Worker;
use crate::{Error, Result};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<WorkerResponse>>>>;

/// Handle to a running SQLite worker.
///
/// Cheap to clone; all clones talk to the same worker. The worker stops (closing
/// any databases it still holds) once every clone, including those held by open
/// [`WorkerBackend`]s, has been dropped.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_worker::{WorkerClient, WorkerConfig, WorkerImage};
///
/// # async fn example() -> Result<(), sqlx_sqlite_worker::Error> {
/// let image = WorkerImage::new().with_extension("cloudsync", "0.8.0");
/// let client = WorkerClient::spawn(image, WorkerConfig::default());
///
/// let config = client.config_get().await?;
/// println!("Running SQLite3 version {}", config.version.lib_version);
///
/// let db_id = client.open_database("file:mydb.sqlite3").await?;
/// let rows = client.exec(&db_id, "SELECT cloudsync_version();").await?;
/// println!("SQLite Sync version: {:?}", rows.first_value());
///
/// client.close_database(&db_id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkerClient {
   inner: Arc<ClientInner>,
}

struct ClientInner {
   requests: mpsc::Sender<String>,
   pending: PendingMap,
   next_message_id: AtomicU64,
   request_timeout: Option<Duration>,
}

impl WorkerClient {
   /// Spawn a worker running `image` on the current tokio runtime.
   ///
   /// # Panics
   ///
   /// Panics when called outside a tokio runtime.
   pub fn spawn(image: WorkerImage, config: WorkerConfig) -> Self {
      let capacity = config.channel_capacity.max(1);
      let (request_tx, request_rx) = mpsc::channel(capacity);
      let (response_tx, response_rx) = mpsc::channel(capacity);

      let worker = Worker::new(image, config.connection.clone());
      tokio::spawn(worker.run(request_rx, response_tx));

      let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
      tokio::spawn(dispatch_responses(response_rx, Arc::clone(&pending)));

      Self {
         inner: Arc::new(ClientInner {
            requests: request_tx,
            pending,
            next_message_id: AtomicU64::new(1),
            request_timeout: config.request_timeout_ms.map(Duration::from_millis),
         }),
      }
   }

   /// Send one request and wait for its correlated response.
   pub async fn request(&self, action: Action) -> Result<WorkerResponse> {
      let message_id = self.inner.next_message_id.fetch_add(1, Ordering::SeqCst);
      let text = serde_json::to_string(&WorkerRequest { message_id, action })?;

      let (tx, rx) = oneshot::channel();
      self.inner.pending.lock().insert(message_id, tx);

      if self.inner.requests.send(text).await.is_err() {
         self.inner.pending.lock().remove(&message_id);
         return Err(Error::WorkerGone);
      }

      let response = match self.inner.request_timeout {
         Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(response) => response,
            Err(_) => {
               self.inner.pending.lock().remove(&message_id);
               warn!(message_id, "Worker request timed out");
               return Err(Error::Timeout {
                  message_id,
                  timeout_ms: limit.as_millis() as u64,
               });
            }
         },
         None => rx.await,
      };

      response.map_err(|_| Error::WorkerGone)
   }

   /// SQLite version and bundled extensions of the worker image.
   pub async fn config_get(&self) -> Result<ConfigInfo> {
      match self.request(Action::ConfigGet {}).await?.into_result()? {
         ActionResult::Config(info) => Ok(info),
         other => Err(unexpected("config-get", &other)),
      }
   }

   /// Open a database inside the worker, returning its id.
   pub async fn open_database(&self, filename: &str) -> Result<String> {
      let response = self
         .request(Action::Open {
            filename: filename.to_string(),
         })
         .await?;

      let db_id = response.db_id.clone();
      match response.into_result()? {
         ActionResult::Opened { .. } => {
            db_id.ok_or_else(|| Error::Protocol("open response carried no dbId".to_string()))
         }
         other => Err(unexpected("open", &other)),
      }
   }

   /// Run SQL on a worker database and collect all rows.
   pub async fn exec(&self, db_id: &str, sql: &str) -> Result<QueryRows> {
      let action = Action::Exec {
         db_id: db_id.to_string(),
         sql: sql.to_string(),
      };
      match self.request(action).await?.into_result()? {
         ActionResult::Rows(rows) => Ok(rows),
         other => Err(unexpected("exec", &other)),
      }
   }

   pub async fn close_database(&self, db_id: &str) -> Result<()> {
      let action = Action::Close {
         db_id: db_id.to_string(),
      };
      match self.request(action).await?.into_result()? {
         ActionResult::Closed {} => Ok(()),
         other => Err(unexpected("close", &other)),
      }
   }

   /// Open a database and wrap it in a [`ConnectionHandle`].
   pub async fn open(&self, filename: &str) -> Result<ConnectionHandle<WorkerBackend>> {
      let db_id = self.open_database(filename).await?;
      let target = format!("worker:{db_id}");
      Ok(ConnectionHandle::from_backend(
         WorkerBackend::new(self.clone(), db_id),
         target,
      ))
   }
}

fn unexpected(action: &str, result: &ActionResult) -> Error {
   Error::Protocol(format!("unexpected result for {action}: {result:?}"))
}

/// Route worker responses to their waiting callers until the worker stops.
async fn dispatch_responses(mut responses: mpsc::Receiver<String>, pending: PendingMap) {
   while let Some(text) = responses.recv().await {
      let response: WorkerResponse = match serde_json::from_str(&text) {
         Ok(response) => response,
         Err(e) => {
            error!("Failed to decode worker response: {}", e);
            continue;
         }
      };

      let waiter = pending.lock().remove(&response.message_id);
      match waiter {
         Some(tx) => {
            trace!(message_id = response.message_id, "Delivering worker response");
            // Receiver may have given up (timeout); nothing left to do then
            let _ = tx.send(response);
         }
         None => warn!(
            message_id = response.message_id,
            "Dropping response with no waiting request"
         ),
      }
   }

   // Worker is gone: dropping the senders wakes every waiter with WorkerGone
   let abandoned = pending.lock().drain().count();
   debug!(abandoned, "Worker response channel closed");
}
