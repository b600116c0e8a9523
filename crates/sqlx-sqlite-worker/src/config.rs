use serde::{Deserialize, Serialize};
use sqlx_sqlite_ext_conn::ConnectionConfig;

/// Configuration for a spawned SQLite worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
   /// Capacity of the request and response channels.
   ///
   /// Callers wait for room when the worker falls this far behind.
   ///
   /// Default: 64.
   pub channel_capacity: usize,

   /// Upper bound on a single request/response round-trip, in milliseconds.
   ///
   /// `None` waits indefinitely. A timed-out request is abandoned by the caller
   /// but still runs on the worker, which processes requests in order.
   ///
   /// Default: None.
   pub request_timeout_ms: Option<u64>,

   /// Configuration used for every connection the worker opens.
   pub connection: ConnectionConfig,
}

impl Default for WorkerConfig {
   fn default() -> Self {
      Self {
         channel_capacity: 64,
         request_timeout_ms: None,
         connection: ConnectionConfig::default(),
      }
   }
}

impl WorkerConfig {
   /// Creates a new worker configuration with default settings.
   pub fn new() -> Self {
      Self::default()
   }

   /// Sets the request/response channel capacity.
   pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
      self.channel_capacity = capacity;
      self
   }

   /// Bounds each round-trip to the worker.
   pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
      self.request_timeout_ms = Some(timeout_ms);
      self
   }
}
