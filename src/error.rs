use serde::{Serialize, Serializer};

use crate::platform::Platform;

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers that forward errors across a boundary.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Errors surfaced by the extension loader.
///
/// Every loader failure names the extension and platform involved so
/// misconfiguration can be diagnosed without native-level debugging. Nothing is
/// retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The database could not be opened, created or closed.
   #[error("connection error for extension {extension} on {platform}: {source}")]
   Connection {
      extension: String,
      platform: Platform,
      #[source]
      source: sqlx_sqlite_ext_conn::Error,
   },

   /// An operation was attempted out of sequence (e.g. load on a closed handle).
   #[error("cannot load extension {extension} on {platform}: {reason}")]
   NotReady {
      extension: String,
      platform: Platform,
      reason: String,
   },

   /// Runtime extension loading is impossible on this host.
   #[error(
      "extension {extension} cannot be loaded at runtime on {platform}; it must be compiled into the host image"
   )]
   UnsupportedPlatform { extension: String, platform: Platform },

   /// No file mapping exists for the requested name on this platform.
   #[error("unknown extension {extension} on {platform}")]
   UnknownExtension { extension: String, platform: Platform },

   /// SQLite rejected the extension (missing file, ABI mismatch, missing entry point).
   #[error("failed to load extension {extension} on {platform}: {reason}")]
   LoadFailed {
      extension: String,
      platform: Platform,
      reason: String,
   },

   /// The extension loaded but its verification symbol is missing or errored.
   #[error("extension {extension} on {platform} failed verification: {detail}")]
   VerificationFailed {
      extension: String,
      platform: Platform,
      detail: String,
   },

   /// Loader configuration is invalid.
   #[error("invalid loader configuration: {0}")]
   Config(String),

   /// I/O error reading configuration or probing the filesystem.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Machine-readable error code.
   pub fn error_code(&self) -> String {
      match self {
         Error::Connection { .. } => "CONNECTION_ERROR".to_string(),
         Error::NotReady { .. } => "NOT_READY".to_string(),
         Error::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM".to_string(),
         Error::UnknownExtension { .. } => "UNKNOWN_EXTENSION".to_string(),
         Error::LoadFailed { .. } => "LOAD_FAILED".to_string(),
         Error::VerificationFailed { .. } => "VERIFICATION_FAILED".to_string(),
         Error::Config(_) => "CONFIG_ERROR".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }

   /// Whether a caller may treat this as non-fatal.
   ///
   /// Only a failed verification qualifies (the extension may be absent on
   /// purpose). Everything else points at misconfiguration.
   pub fn is_recoverable(&self) -> bool {
      matches!(self, Error::VerificationFailed { .. })
   }

   /// Extension the error refers to, if any
   pub fn extension(&self) -> Option<&str> {
      match self {
         Error::Connection { extension, .. }
         | Error::NotReady { extension, .. }
         | Error::UnsupportedPlatform { extension, .. }
         | Error::UnknownExtension { extension, .. }
         | Error::LoadFailed { extension, .. }
         | Error::VerificationFailed { extension, .. } => Some(extension),
         Error::Config(_) | Error::Io(_) => None,
      }
   }

   /// Platform the error occurred on, if any
   pub fn platform(&self) -> Option<Platform> {
      match self {
         Error::Connection { platform, .. }
         | Error::NotReady { platform, .. }
         | Error::UnsupportedPlatform { platform, .. }
         | Error::UnknownExtension { platform, .. }
         | Error::LoadFailed { platform, .. }
         | Error::VerificationFailed { platform, .. } => Some(*platform),
         Error::Config(_) | Error::Io(_) => None,
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}
