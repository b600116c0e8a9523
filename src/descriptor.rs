use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Everything needed to find, load and verify one extension.
///
/// Built from configuration and read-only afterwards. Loader components only ever
/// borrow it.
///
/// # Example
///
/// ```
/// use sqlite_ext_loader::{ExtensionDescriptor, Platform};
///
/// let vector = ExtensionDescriptor::new("vector")
///    .with_file(Platform::NativeDesktop, "vector")
///    .with_file(Platform::ManagedRuntime, "sqlite-vector");
///
/// assert_eq!(vector.verify_symbol, "vector_version");
/// assert_eq!(vector.file_for(Platform::ManagedRuntime), Some("sqlite-vector"));
/// assert_eq!(vector.file_for(Platform::NativeMobile), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
   /// Logical name (`vector`, `js`, `cloudsync`)
   pub name: String,

   /// File name per platform, with or without the OS library suffix
   #[serde(default)]
   pub files: HashMap<Platform, String>,

   /// Zero-argument SQL function the extension must expose once loaded.
   ///
   /// Defaults to `<name>_version`.
   #[serde(default)]
   pub verify_symbol: String,

   /// Entry point passed to SQLite's loader. `None` lets SQLite derive it
   /// from the file name.
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub entry_point: Option<String>,

   /// Absolute path used as-is instead of resolving `files`
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub path_override: Option<PathBuf>,
}

impl ExtensionDescriptor {
   /// A descriptor with no file mappings, verified through `<name>_version()`.
   pub fn new(name: impl Into<String>) -> Self {
      let name = name.into();
      Self {
         verify_symbol: default_verify_symbol(&name),
         name,
         files: HashMap::new(),
         entry_point: None,
         path_override: None,
      }
   }

   /// Maps every platform that can load at runtime to the logical name.
   ///
   /// Matches the common layout where `vector` ships as `vector.so`,
   /// `vector.dylib` and `vector.dll`.
   pub fn with_default_files(mut self) -> Self {
      for platform in Platform::ALL {
         if platform.allows_runtime_loading() {
            self.files.entry(platform).or_insert_with(|| self.name.clone());
         }
      }
      self
   }

   pub fn with_file(mut self, platform: Platform, file: impl Into<String>) -> Self {
      self.files.insert(platform, file.into());
      self
   }

   pub fn with_verify_symbol(mut self, symbol: impl Into<String>) -> Self {
      self.verify_symbol = symbol.into();
      self
   }

   pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
      self.entry_point = Some(entry_point.into());
      self
   }

   pub fn with_path_override(mut self, path: impl Into<PathBuf>) -> Self {
      self.path_override = Some(path.into());
      self
   }

   /// File name configured for `platform`
   pub fn file_for(&self, platform: Platform) -> Option<&str> {
      self.files.get(&platform).map(String::as_str)
   }

   pub fn path_override(&self) -> Option<&Path> {
      self.path_override.as_deref()
   }

   /// Fill in defaults left empty by deserialization.
   pub(crate) fn normalized(mut self) -> Self {
      if self.verify_symbol.is_empty() {
         self.verify_symbol = default_verify_symbol(&self.name);
      }
      self
   }
}

fn default_verify_symbol(name: &str) -> String {
   format!("{name}_version")
}
