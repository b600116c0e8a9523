use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Loader configuration, passed explicitly instead of living in process-wide
/// driver settings.
///
/// # Example
///
/// ```
/// use sqlite_ext_loader::{ExtensionDescriptor, LoaderConfig, Platform};
///
/// let config = LoaderConfig {
///    platform: Platform::NativeDesktop,
///    extension_dir: Some("/opt/app/extensions".into()),
///    extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
///    ..Default::default()
/// };
///
/// assert!(config.descriptor("vector").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
   /// Host environment. Fixed for the lifetime of the loader.
   ///
   /// Default: detected from the compile target.
   pub platform: Platform,

   /// Directory that bare extension file names are resolved against.
   ///
   /// Default: None (file names resolve to `./<file>` in the working directory).
   pub extension_dir: Option<PathBuf>,

   /// Extra directories searched, in order, when the resolved file does not exist.
   ///
   /// Default: empty.
   pub search_paths: Vec<PathBuf>,

   /// Also search the directory holding the running executable.
   ///
   /// Default: true.
   pub search_exe_dir: bool,

   /// Operating system whose library suffix is appended, as named by
   /// [`std::env::consts::OS`].
   ///
   /// Default: the OS this crate was compiled for.
   pub target_os: String,

   /// Extensions the loader knows by name.
   pub extensions: Vec<ExtensionDescriptor>,
}

impl Default for LoaderConfig {
   fn default() -> Self {
      Self {
         platform: Platform::detect(),
         extension_dir: None,
         search_paths: Vec::new(),
         search_exe_dir: true,
         target_os: std::env::consts::OS.to_string(),
         extensions: Vec::new(),
      }
   }
}

impl LoaderConfig {
   /// Creates a configuration with default settings for `platform`.
   pub fn new(platform: Platform) -> Self {
      Self {
         platform,
         ..Default::default()
      }
   }

   /// Parse a configuration from JSON text.
   pub fn from_json_str(json: &str) -> Result<Self> {
      let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
      config.validated()
   }

   /// Read a configuration from a JSON file.
   pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
      let text = fs::read_to_string(path)?;
      Self::from_json_str(&text)
   }

   pub fn with_extension(mut self, descriptor: ExtensionDescriptor) -> Self {
      self.extensions.push(descriptor);
      self
   }

   pub fn with_extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
      self.extension_dir = Some(dir.into());
      self
   }

   pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
      self.search_paths.push(dir.into());
      self
   }

   /// Look up a configured descriptor by logical name.
   pub fn descriptor(&self, name: &str) -> Option<&ExtensionDescriptor> {
      self.extensions.iter().find(|ext| ext.name == name)
   }

   /// Reject empty or duplicate names and fill descriptor defaults.
   pub(crate) fn validated(mut self) -> Result<Self> {
      let mut seen = std::collections::HashSet::new();
      for descriptor in &self.extensions {
         if descriptor.name.is_empty() {
            return Err(Error::Config("extension name cannot be empty".to_string()));
         }
         if !seen.insert(descriptor.name.as_str()) {
            return Err(Error::Config(format!(
               "extension {} is configured more than once",
               descriptor.name
            )));
         }
      }

      self.extensions = self
         .extensions
         .into_iter()
         .map(ExtensionDescriptor::normalized)
         .collect();
      Ok(self)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use tempfile::TempDir;

   #[test]
   fn test_defaults() {
      let config = LoaderConfig::default();
      assert_eq!(config.platform, Platform::detect());
      assert!(config.search_exe_dir);
      assert_eq!(config.target_os, std::env::consts::OS);
      assert!(config.extensions.is_empty());
   }

   #[test]
   fn test_from_json_with_partial_fields() {
      let config = LoaderConfig::from_json_str(
         r#"{
            "platform": "native-mobile",
            "extensionDir": "/data/app/lib/arm64",
            "extensions": [
               { "name": "vector", "files": { "native-mobile": "vector" } },
               { "name": "js", "files": { "native-mobile": "js" }, "verifySymbol": "js_version" }
            ]
         }"#,
      )
      .unwrap();

      assert_eq!(config.platform, Platform::NativeMobile);
      assert_eq!(config.extension_dir, Some(PathBuf::from("/data/app/lib/arm64")));
      assert!(config.search_exe_dir);
      assert_eq!(
         config.descriptor("vector").unwrap().verify_symbol,
         "vector_version"
      );
      assert!(config.descriptor("missing").is_none());
   }

   #[test]
   fn test_duplicate_names_rejected() {
      let err = LoaderConfig::from_json_str(
         r#"{ "extensions": [ { "name": "vector" }, { "name": "vector" } ] }"#,
      )
      .unwrap_err();
      assert_eq!(err.error_code(), "CONFIG_ERROR");
   }

   #[test]
   fn test_malformed_json_is_config_error() {
      let err = LoaderConfig::from_json_str(r#"{ "platform": "toaster" }"#).unwrap_err();
      assert!(matches!(err, Error::Config(_)));
   }

   #[test]
   fn test_from_json_file() {
      let temp_dir = TempDir::new().unwrap();
      let path = temp_dir.path().join("loader.json");
      fs::write(&path, r#"{ "platform": "managed-runtime", "searchExeDir": false }"#).unwrap();

      let config = LoaderConfig::from_json_file(&path).unwrap();
      assert_eq!(config.platform, Platform::ManagedRuntime);
      assert!(!config.search_exe_dir);

      let missing = LoaderConfig::from_json_file(temp_dir.path().join("nope.json")).unwrap_err();
      assert!(matches!(missing, Error::Io(_)));
   }
}
