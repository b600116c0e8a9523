//! Extensions compiled into the worker's host image.
//!
//! A sandboxed host cannot `dlopen` anything at runtime, so every extension it
//! offers has to be part of the image the worker was started with. The image is
//! installed on each connection the worker opens.

use serde::{Deserialize, Serialize};
use sqlx_sqlite_ext_conn::NativeBackend;
use tracing::trace;

/// A zero-argument SQL function that returns a fixed text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundledFunction {
   pub name: String,
   pub value: String,
}

/// An extension compiled into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundledExtension {
   pub name: String,
   pub functions: Vec<BundledFunction>,
}

/// The set of extensions available inside the worker.
///
/// # Example
///
/// ```
/// use sqlx_sqlite_worker::WorkerImage;
///
/// // Mirrors a WASM build shipping SQLite Sync and SQLite Vector
/// let image = WorkerImage::new()
///    .with_extension("cloudsync", "0.8.0")
///    .with_extension("vector", "0.9.1");
///
/// assert!(image.contains("vector"));
/// assert_eq!(image.extension_names(), vec!["cloudsync", "vector"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerImage {
   extensions: Vec<BundledExtension>,
}

impl WorkerImage {
   /// An image with no bundled extensions.
   pub fn new() -> Self {
      Self::default()
   }

   /// Bundles an extension exposing `<name>_version()` returning `version`.
   pub fn with_extension(self, name: impl Into<String>, version: impl Into<String>) -> Self {
      let name = name.into();
      let function = BundledFunction {
         name: format!("{name}_version"),
         value: version.into(),
      };
      self.with_bundled(BundledExtension {
         name,
         functions: vec![function],
      })
   }

   /// Bundles an extension with an explicit function list.
   pub fn with_bundled(mut self, extension: BundledExtension) -> Self {
      self.extensions.retain(|existing| existing.name != extension.name);
      self.extensions.push(extension);
      self
   }

   pub fn contains(&self, name: &str) -> bool {
      self.extensions.iter().any(|ext| ext.name == name)
   }

   pub fn extension_names(&self) -> Vec<String> {
      self.extensions.iter().map(|ext| ext.name.clone()).collect()
   }

   /// Registers every bundled function on a freshly opened connection.
   pub(crate) async fn install(&self, backend: &mut NativeBackend) -> sqlx_sqlite_ext_conn::Result<()> {
      for extension in &self.extensions {
         for function in &extension.functions {
            backend
               .register_constant_function(&function.name, &function.value)
               .await?;
         }
         trace!(extension = %extension.name, "Installed bundled extension");
      }
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_rebundling_replaces_extension() {
      let image = WorkerImage::new()
         .with_extension("vector", "0.9.0")
         .with_extension("vector", "0.9.1");

      assert_eq!(image.extension_names(), vec!["vector"]);
      assert_eq!(image.extensions[0].functions[0].value, "0.9.1");
      assert_eq!(image.extensions[0].functions[0].name, "vector_version");
   }

   #[test]
   fn test_empty_image() {
      let image = WorkerImage::new();
      assert!(!image.contains("vector"));
      assert!(image.extension_names().is_empty());
   }
}
