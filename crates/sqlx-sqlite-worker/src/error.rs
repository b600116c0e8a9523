//! Error types for the sqlx-sqlite-worker crate.

/// Errors that can occur on either side of the worker boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// A message could not be understood by the receiving side.
   #[error("Protocol error: {0}")]
   Protocol(String),

   /// Failed to encode or decode a message.
   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),

   /// A request referenced a database id the worker does not know.
   #[error("Unknown database id: {0}")]
   UnknownDatabase(String),

   /// The worker task has stopped and can no longer answer requests.
   #[error("Worker is no longer running")]
   WorkerGone,

   /// The worker did not answer within the configured round-trip timeout.
   #[error("Worker request {message_id} timed out after {timeout_ms}ms")]
   Timeout { message_id: u64, timeout_ms: u64 },

   /// The worker answered with an error response.
   #[error("{message} ({code})")]
   Remote { code: String, message: String },

   /// Error from a worker-owned connection.
   #[error(transparent)]
   Connection(#[from] sqlx_sqlite_ext_conn::Error),
}

impl Error {
   /// Machine-readable code carried in error responses.
   pub fn error_code(&self) -> String {
      match self {
         Error::Protocol(_) => "PROTOCOL_ERROR".to_string(),
         Error::Json(_) => "JSON_ERROR".to_string(),
         Error::UnknownDatabase(_) => "UNKNOWN_DATABASE".to_string(),
         Error::WorkerGone => "WORKER_GONE".to_string(),
         Error::Timeout { .. } => "TIMEOUT".to_string(),
         Error::Remote { code, .. } => code.clone(),
         Error::Connection(sqlx_sqlite_ext_conn::Error::LoadingUnsupported) => {
            "LOADING_UNSUPPORTED".to_string()
         }
         Error::Connection(_) => "CONNECTION_ERROR".to_string(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_remote_error_keeps_code() {
      let err = Error::Remote {
         code: "UNKNOWN_DATABASE".into(),
         message: "Unknown database id: abc".into(),
      };
      assert_eq!(err.error_code(), "UNKNOWN_DATABASE");
      assert!(err.to_string().contains("abc"));
   }

   #[test]
   fn test_timeout_message() {
      let err = Error::Timeout {
         message_id: 7,
         timeout_ms: 250,
      };
      assert_eq!(err.error_code(), "TIMEOUT");
      assert!(err.to_string().contains("250ms"));
   }
}
