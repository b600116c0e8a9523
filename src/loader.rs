//! Orchestrates enable → resolve → load → verify for one connection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx_sqlite_ext_conn::{ConnectionConfig, ConnectionHandle, NativeBackend, SqliteBackend};
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::probe::{ProbeResult, VerificationProbe};
use crate::resolve::PathResolver;

/// Stands in for the extension name on connection errors raised before any
/// extension was requested.
const NO_EXTENSIONS: &str = "<none>";

/// Outcome of loading one extension. Returned once per load call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
   /// Whether the verification symbol answered
   pub success: bool,
   pub extension: String,
   pub platform: Platform,
   /// Library that was loaded. `None` when the extension came from the host image.
   #[serde(skip_serializing_if = "Option::is_none")]
   pub path: Option<PathBuf>,
   /// Verification value, e.g. the extension's version string
   #[serde(skip_serializing_if = "Option::is_none")]
   pub value: Option<String>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub detail: Option<String>,
}

impl LoadResult {
   fn from_probe(
      descriptor: &ExtensionDescriptor,
      platform: Platform,
      path: Option<PathBuf>,
      probe: ProbeResult,
   ) -> Self {
      Self {
         success: probe.success,
         extension: descriptor.name.clone(),
         platform,
         path,
         value: probe.value,
         detail: probe.detail,
      }
   }

   /// Treat a failed verification as [`Error::VerificationFailed`].
   pub fn into_verified(self) -> Result<Self> {
      if self.success {
         return Ok(self);
      }

      Err(Error::VerificationFailed {
         extension: self.extension,
         platform: self.platform,
         detail: self
            .detail
            .unwrap_or_else(|| "verification failed".to_string()),
      })
   }
}

/// Loads extensions into connections according to a [`LoaderConfig`].
///
/// The loader holds only read-only state and can be shared across any number of
/// connections. Failures are returned immediately; nothing is retried.
///
/// # Example
///
/// ```no_run
/// use sqlite_ext_loader::{ExtensionDescriptor, ExtensionLoader, LoaderConfig, Platform};
/// use sqlx_sqlite_ext_conn::ConnectionHandle;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let loader = ExtensionLoader::new(
///    LoaderConfig::new(Platform::NativeDesktop)
///       .with_extension_dir("/opt/app/extensions")
///       .with_extension(ExtensionDescriptor::new("vector").with_default_files()),
/// )?;
///
/// let mut handle = ConnectionHandle::open("app.db", None).await?;
/// let result = loader.load_by_name(&mut handle, "vector").await?;
/// println!("vector_version(): {:?}", result.value);
///
/// handle.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionLoader {
   config: LoaderConfig,
   resolver: PathResolver,
}

impl ExtensionLoader {
   /// Build a loader, rejecting invalid configuration.
   pub fn new(config: LoaderConfig) -> Result<Self> {
      let config = config.validated()?;
      let resolver = PathResolver::new(&config);
      Ok(Self { config, resolver })
   }

   pub fn platform(&self) -> Platform {
      self.config.platform
   }

   pub fn config(&self) -> &LoaderConfig {
      &self.config
   }

   pub fn resolver(&self) -> &PathResolver {
      &self.resolver
   }

   /// Load `descriptor` into `handle` and verify it.
   ///
   /// Returns `Ok` with `success == false` when the library loaded but the
   /// verification symbol did not answer; see [`LoadResult::into_verified`].
   ///
   /// # Errors
   ///
   /// * [`Error::NotReady`] if the handle is closed
   /// * [`Error::UnsupportedPlatform`] if the host cannot load at runtime
   /// * [`Error::UnknownExtension`] if no file is mapped for this platform
   /// * [`Error::LoadFailed`] if the file is missing or SQLite rejects it
   pub async fn load<B: SqliteBackend>(
      &self,
      handle: &mut ConnectionHandle<B>,
      descriptor: &ExtensionDescriptor,
   ) -> Result<LoadResult> {
      let platform = self.platform();
      let name = descriptor.name.as_str();

      if !handle.is_open() {
         return Err(not_ready(name, platform, "connection is closed"));
      }

      if !handle.loading_enabled() {
         self.enable_loading(handle, name).await?;
      }

      let path = self.resolve_existing(descriptor)?;

      debug!(extension = name, %platform, path = %path.display(), "Loading extension");
      handle
         .load_extension(&path, descriptor.entry_point.as_deref())
         .await
         .map_err(|e| load_error(name, platform, e))?;

      let probe = VerificationProbe::check(handle, &descriptor.verify_symbol).await;
      if !probe.success {
         warn!(
            extension = name,
            %platform,
            symbol = %descriptor.verify_symbol,
            "Extension loaded but failed verification"
         );
      }

      Ok(LoadResult::from_probe(descriptor, platform, Some(path), probe))
   }

   /// [`load`](Self::load) a configured extension by its logical name.
   pub async fn load_by_name<B: SqliteBackend>(
      &self,
      handle: &mut ConnectionHandle<B>,
      name: &str,
   ) -> Result<LoadResult> {
      let descriptor = self.descriptor(name)?;
      self.load(handle, descriptor).await
   }

   /// Load several extensions in order, stopping at the first error.
   pub async fn load_all<B: SqliteBackend>(
      &self,
      handle: &mut ConnectionHandle<B>,
      descriptors: &[ExtensionDescriptor],
   ) -> Result<Vec<LoadResult>> {
      let mut results = Vec::with_capacity(descriptors.len());
      for descriptor in descriptors {
         results.push(self.load(handle, descriptor).await?);
      }
      Ok(results)
   }

   /// Make sure `descriptor` is usable on `handle`.
   ///
   /// On a sandboxed host the extension can only come from the host image, so
   /// this skips loading entirely and just probes. Elsewhere it is
   /// [`load`](Self::load).
   pub async fn ensure<B: SqliteBackend>(
      &self,
      handle: &mut ConnectionHandle<B>,
      descriptor: &ExtensionDescriptor,
   ) -> Result<LoadResult> {
      let platform = self.platform();
      if platform.allows_runtime_loading() {
         return self.load(handle, descriptor).await;
      }

      if !handle.is_open() {
         return Err(not_ready(&descriptor.name, platform, "connection is closed"));
      }

      debug!(extension = %descriptor.name, %platform, "Probing bundled extension");
      let probe = VerificationProbe::check(handle, &descriptor.verify_symbol).await;
      Ok(LoadResult::from_probe(descriptor, platform, None, probe))
   }

   /// Open a native connection with every named extension loaded and verified.
   ///
   /// If opening succeeds but any extension fails, the connection is closed
   /// before the error is returned.
   pub async fn open_with_extensions(
      &self,
      target: impl AsRef<Path>,
      connection: Option<ConnectionConfig>,
      names: &[&str],
   ) -> Result<(ConnectionHandle<NativeBackend>, Vec<LoadResult>)> {
      let descriptors = names
         .iter()
         .map(|name| self.descriptor(name).cloned())
         .collect::<Result<Vec<_>>>()?;

      let extension = if names.is_empty() {
         NO_EXTENSIONS.to_string()
      } else {
         names.join(",")
      };
      let mut handle = ConnectionHandle::open(target, connection)
         .await
         .map_err(|source| Error::Connection {
            extension,
            platform: self.platform(),
            source,
         })?;

      let mut results = Vec::with_capacity(descriptors.len());
      for descriptor in &descriptors {
         let loaded = match self.ensure(&mut handle, descriptor).await {
            Ok(result) => result.into_verified(),
            Err(e) => Err(e),
         };

         match loaded {
            Ok(result) => results.push(result),
            Err(e) => {
               if let Err(close_err) = handle.close().await {
                  warn!("Failed to close connection after extension failure: {}", close_err);
               }
               return Err(e);
            }
         }
      }

      Ok((handle, results))
   }

   fn descriptor(&self, name: &str) -> Result<&ExtensionDescriptor> {
      self
         .config
         .descriptor(name)
         .ok_or_else(|| Error::UnknownExtension {
            extension: name.to_string(),
            platform: self.platform(),
         })
   }

   async fn enable_loading<B: SqliteBackend>(
      &self,
      handle: &mut ConnectionHandle<B>,
      name: &str,
   ) -> Result<()> {
      let platform = self.platform();

      // Never ask a sandboxed host to enable anything
      if !platform.allows_runtime_loading() {
         return Err(Error::UnsupportedPlatform {
            extension: name.to_string(),
            platform,
         });
      }

      handle.enable_loading().await.map_err(|e| match e {
         sqlx_sqlite_ext_conn::Error::LoadingUnsupported => Error::UnsupportedPlatform {
            extension: name.to_string(),
            platform,
         },
         sqlx_sqlite_ext_conn::Error::HandleClosed => not_ready(name, platform, "connection is closed"),
         source => Error::Connection {
            extension: name.to_string(),
            platform,
            source,
         },
      })
   }

   /// Resolve the library path, falling back to the search paths when the
   /// primary location is empty. Overrides are used exactly as given.
   fn resolve_existing(&self, descriptor: &ExtensionDescriptor) -> Result<PathBuf> {
      let platform = self.platform();
      let path = self.resolver.resolve_descriptor(descriptor, platform)?;

      if descriptor.path_override().is_some() || path.is_file() {
         return Ok(path);
      }

      match self.resolver.locate_descriptor(descriptor, platform)? {
         Some(found) => {
            debug!(extension = %descriptor.name, path = %found.display(), "Found extension on search path");
            Ok(found)
         }
         None => Err(Error::LoadFailed {
            extension: descriptor.name.clone(),
            platform,
            reason: format!("extension file not found: {}", path.display()),
         }),
      }
   }
}

fn not_ready(name: &str, platform: Platform, reason: &str) -> Error {
   Error::NotReady {
      extension: name.to_string(),
      platform,
      reason: reason.to_string(),
   }
}

fn load_error(name: &str, platform: Platform, error: sqlx_sqlite_ext_conn::Error) -> Error {
   match error {
      sqlx_sqlite_ext_conn::Error::HandleClosed => not_ready(name, platform, "connection is closed"),
      sqlx_sqlite_ext_conn::Error::LoadingNotEnabled => {
         not_ready(name, platform, "extension loading is not enabled")
      }
      sqlx_sqlite_ext_conn::Error::LoadingUnsupported => Error::UnsupportedPlatform {
         extension: name.to_string(),
         platform,
      },
      sqlx_sqlite_ext_conn::Error::LoadRejected(reason) => Error::LoadFailed {
         extension: name.to_string(),
         platform,
         reason,
      },
      other => Error::LoadFailed {
         extension: name.to_string(),
         platform,
         reason: other.to_string(),
      },
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn descriptor() -> ExtensionDescriptor {
      ExtensionDescriptor::new("vector").with_default_files()
   }

   #[test]
   fn test_into_verified() {
      let ok = LoadResult {
         success: true,
         extension: "vector".into(),
         platform: Platform::NativeDesktop,
         path: Some("/opt/ext/vector.so".into()),
         value: Some("0.9.1".into()),
         detail: None,
      };
      assert_eq!(ok.clone().into_verified().unwrap(), ok);

      let failed = LoadResult {
         success: false,
         value: None,
         detail: Some("symbol not found or errored".into()),
         ..ok
      };
      let err = failed.into_verified().unwrap_err();
      assert!(err.is_recoverable());
      assert!(err.to_string().contains("symbol not found"));
   }

   #[test]
   fn test_duplicate_catalog_rejected() {
      let config = LoaderConfig::new(Platform::NativeDesktop)
         .with_extension(descriptor())
         .with_extension(descriptor());
      assert!(matches!(ExtensionLoader::new(config), Err(Error::Config(_))));
   }

   #[tokio::test]
   async fn test_load_on_closed_handle_is_not_ready() {
      let loader = ExtensionLoader::new(LoaderConfig::new(Platform::NativeDesktop)).unwrap();
      let mut handle = ConnectionHandle::open(":memory:", None).await.unwrap();
      handle.close().await.unwrap();

      let err = loader.load(&mut handle, &descriptor()).await.unwrap_err();
      assert_eq!(err.error_code(), "NOT_READY");
      assert!(!handle.loading_enabled());
   }

   #[tokio::test]
   async fn test_missing_file_is_load_failed() {
      let temp_dir = tempfile::TempDir::new().unwrap();
      let config = LoaderConfig {
         platform: Platform::NativeDesktop,
         extension_dir: Some(temp_dir.path().to_path_buf()),
         search_exe_dir: false,
         ..Default::default()
      };
      let loader = ExtensionLoader::new(config).unwrap();
      let mut handle = ConnectionHandle::open(":memory:", None).await.unwrap();

      let err = loader.load(&mut handle, &descriptor()).await.unwrap_err();
      match err {
         Error::LoadFailed { reason, extension, .. } => {
            assert_eq!(extension, "vector");
            assert!(reason.contains("extension file not found"));
         }
         other => panic!("expected LoadFailed, got {:?}", other),
      }

      handle.close().await.unwrap();
   }
}
