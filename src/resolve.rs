//! Mapping logical extension names to files on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::config::LoaderConfig;
use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::platform::{Platform, has_library_suffix, library_suffix};

/// Resolves extension names to library paths.
///
/// Holds read-only tables built from a [`LoaderConfig`]; resolution itself never
/// touches the filesystem. Use [`locate`](Self::locate) when the file's existence
/// matters.
#[derive(Debug, Clone)]
pub struct PathResolver {
   files: HashMap<Platform, HashMap<String, String>>,
   extension_dir: Option<PathBuf>,
   search_paths: Vec<PathBuf>,
   search_exe_dir: bool,
   suffix: Option<&'static str>,
}

impl PathResolver {
   pub fn new(config: &LoaderConfig) -> Self {
      let mut files: HashMap<Platform, HashMap<String, String>> = HashMap::new();
      for descriptor in &config.extensions {
         for (platform, file) in &descriptor.files {
            files
               .entry(*platform)
               .or_default()
               .insert(descriptor.name.clone(), file.clone());
         }
      }

      Self {
         files,
         extension_dir: config.extension_dir.clone(),
         search_paths: config.search_paths.clone(),
         search_exe_dir: config.search_exe_dir,
         suffix: library_suffix(&config.target_os),
      }
   }

   /// Resolve `name` for `platform`.
   ///
   /// * Sandboxed platforms always fail with [`Error::UnsupportedPlatform`], even
   ///   with an override.
   /// * An override is returned unchanged.
   /// * Otherwise the platform's file name gets the OS library suffix (unless it
   ///   already has one) and is joined onto the extension directory. Without
   ///   one the result is `./<file>`: the dynamic loader searches its library
   ///   path for names without a directory, never the working directory.
   pub fn resolve(&self, name: &str, platform: Platform, path_override: Option<&Path>) -> Result<PathBuf> {
      self.resolve_with(name, platform, path_override, None)
   }

   /// Resolve using the descriptor's own file mapping and override, falling back
   /// to the configured tables for platforms the descriptor does not map.
   pub fn resolve_descriptor(&self, descriptor: &ExtensionDescriptor, platform: Platform) -> Result<PathBuf> {
      self.resolve_with(
         &descriptor.name,
         platform,
         descriptor.path_override(),
         descriptor.file_for(platform),
      )
   }

   /// Every place the extension may live, in search order: the extension
   /// directory (or working directory), each search path, then the executable's
   /// directory.
   pub fn candidates(&self, name: &str, platform: Platform) -> Result<Vec<PathBuf>> {
      self.candidates_with(name, platform, None)
   }

   /// [`candidates`](Self::candidates) for a descriptor's own file mapping.
   pub fn descriptor_candidates(
      &self,
      descriptor: &ExtensionDescriptor,
      platform: Platform,
   ) -> Result<Vec<PathBuf>> {
      self.candidates_with(&descriptor.name, platform, descriptor.file_for(platform))
   }

   /// First candidate that exists on disk.
   pub fn locate(&self, name: &str, platform: Platform) -> Result<Option<PathBuf>> {
      Ok(first_existing(self.candidates(name, platform)?))
   }

   /// [`locate`](Self::locate) for a descriptor's own file mapping.
   pub fn locate_descriptor(
      &self,
      descriptor: &ExtensionDescriptor,
      platform: Platform,
   ) -> Result<Option<PathBuf>> {
      Ok(first_existing(self.descriptor_candidates(descriptor, platform)?))
   }

   /// Whether `name` has a file mapping for `platform`
   pub fn knows(&self, name: &str, platform: Platform) -> bool {
      self
         .files
         .get(&platform)
         .is_some_and(|table| table.contains_key(name))
   }

   fn resolve_with(
      &self,
      name: &str,
      platform: Platform,
      path_override: Option<&Path>,
      file: Option<&str>,
   ) -> Result<PathBuf> {
      if !platform.allows_runtime_loading() {
         return Err(Error::UnsupportedPlatform {
            extension: name.to_string(),
            platform,
         });
      }

      if let Some(path) = path_override {
         return Ok(path.to_path_buf());
      }

      let file_name = self.file_name(name, platform, file)?;
      let path = match &self.extension_dir {
         Some(dir) => dir.join(&file_name),
         None => Path::new(".").join(&file_name),
      };

      trace!(extension = name, %platform, path = %path.display(), "Resolved extension path");
      Ok(path)
   }

   fn candidates_with(&self, name: &str, platform: Platform, file: Option<&str>) -> Result<Vec<PathBuf>> {
      let primary = self.resolve_with(name, platform, None, file)?;
      let file_name = self.file_name(name, platform, file)?;

      let mut candidates = vec![primary];
      candidates.extend(self.search_paths.iter().map(|dir| dir.join(&file_name)));

      if self.search_exe_dir
         && let Some(dir) = exe_dir()
      {
         candidates.push(dir.join(&file_name));
      }

      candidates.dedup();
      Ok(candidates)
   }

   fn file_name(&self, name: &str, platform: Platform, file: Option<&str>) -> Result<String> {
      let file = file
         .or_else(|| {
            self
               .files
               .get(&platform)
               .and_then(|table| table.get(name))
               .map(String::as_str)
         })
         .ok_or_else(|| Error::UnknownExtension {
            extension: name.to_string(),
            platform,
         })?;

      Ok(match self.suffix {
         Some(suffix) if !has_library_suffix(file) => format!("{file}.{suffix}"),
         _ => file.to_string(),
      })
   }
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
   candidates.into_iter().find(|path| path.is_file())
}

fn exe_dir() -> Option<PathBuf> {
   std::env::current_exe()
      .ok()
      .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
   use super::*;

   fn resolver(os: &str) -> PathResolver {
      let config = LoaderConfig {
         target_os: os.to_string(),
         extension_dir: Some("/opt/ext".into()),
         search_exe_dir: false,
         extensions: vec![
            ExtensionDescriptor::new("vector")
               .with_default_files()
               .with_file(Platform::ManagedRuntime, "sqlite-vector"),
            ExtensionDescriptor::new("js").with_file(Platform::NativeMobile, "js.so"),
         ],
         ..Default::default()
      };
      PathResolver::new(&config)
   }

   #[test]
   fn test_suffix_per_os() {
      assert_eq!(
         resolver("linux").resolve("vector", Platform::NativeDesktop, None).unwrap(),
         PathBuf::from("/opt/ext/vector.so")
      );
      assert_eq!(
         resolver("macos").resolve("vector", Platform::NativeDesktop, None).unwrap(),
         PathBuf::from("/opt/ext/vector.dylib")
      );
      assert_eq!(
         resolver("windows").resolve("vector", Platform::ManagedRuntime, None).unwrap(),
         PathBuf::from("/opt/ext/sqlite-vector.dll")
      );
   }

   #[test]
   fn test_existing_suffix_not_doubled() {
      assert_eq!(
         resolver("android").resolve("js", Platform::NativeMobile, None).unwrap(),
         PathBuf::from("/opt/ext/js.so")
      );
   }

   #[test]
   fn test_unknown_os_keeps_file_name() {
      assert_eq!(
         resolver("plan9").resolve("vector", Platform::NativeDesktop, None).unwrap(),
         PathBuf::from("/opt/ext/vector")
      );
   }

   #[test]
   fn test_unknown_name_and_platform_pairs() {
      let resolver = resolver("linux");

      for (name, platform) in [
         ("nope", Platform::NativeDesktop),
         ("js", Platform::NativeDesktop),
         ("js", Platform::ManagedRuntime),
         ("", Platform::NativeMobile),
      ] {
         assert!(
            matches!(
               resolver.resolve(name, platform, None),
               Err(Error::UnknownExtension { .. })
            ),
            "{name} on {platform}"
         );
         assert!(!resolver.knows(name, platform));
      }
   }

   #[test]
   fn test_sandboxed_always_unsupported() {
      let resolver = resolver("linux");
      let override_path = Path::new("/abs/vector.so");

      for name in ["vector", "js", "nope", ""] {
         assert!(matches!(
            resolver.resolve(name, Platform::BrowserSandboxed, None),
            Err(Error::UnsupportedPlatform { .. })
         ));
         assert!(matches!(
            resolver.resolve(name, Platform::BrowserSandboxed, Some(override_path)),
            Err(Error::UnsupportedPlatform { .. })
         ));
      }
   }

   #[test]
   fn test_override_returned_unchanged() {
      let resolver = resolver("linux");
      let path = Path::new("/somewhere/else/custom-build");

      // Even for names the resolver has never heard of
      assert_eq!(
         resolver.resolve("nope", Platform::NativeDesktop, Some(path)).unwrap(),
         path
      );
   }

   #[test]
   fn test_descriptor_mapping_wins_over_tables() {
      let resolver = resolver("linux");
      let descriptor = ExtensionDescriptor::new("vector").with_file(Platform::NativeDesktop, "vector-dev");

      assert_eq!(
         resolver.resolve_descriptor(&descriptor, Platform::NativeDesktop).unwrap(),
         PathBuf::from("/opt/ext/vector-dev.so")
      );
      // Unmapped on the descriptor, mapped in the tables
      assert_eq!(
         resolver.resolve_descriptor(&descriptor, Platform::ManagedRuntime).unwrap(),
         PathBuf::from("/opt/ext/sqlite-vector.so")
      );

      let unknown = ExtensionDescriptor::new("sync");
      assert!(matches!(
         resolver.resolve_descriptor(&unknown, Platform::NativeDesktop),
         Err(Error::UnknownExtension { .. })
      ));
   }

   #[test]
   fn test_locate_finds_first_existing_candidate() {
      let temp_dir = tempfile::TempDir::new().unwrap();
      let second = temp_dir.path().join("second");
      std::fs::create_dir(&second).unwrap();
      std::fs::write(second.join("vector.so"), b"").unwrap();

      let config = LoaderConfig {
         target_os: "linux".into(),
         extension_dir: Some(temp_dir.path().join("missing")),
         search_paths: vec![temp_dir.path().join("first"), second.clone()],
         search_exe_dir: false,
         extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
         ..Default::default()
      };
      let resolver = PathResolver::new(&config);

      assert_eq!(
         resolver.locate("vector", Platform::NativeDesktop).unwrap(),
         Some(second.join("vector.so"))
      );
      assert!(resolver.locate("vector", Platform::BrowserSandboxed).is_err());
   }

   #[test]
   fn test_candidates_in_search_order() {
      let config = LoaderConfig {
         target_os: "linux".into(),
         search_paths: vec!["/a".into(), "/b".into()],
         search_exe_dir: false,
         extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
         ..Default::default()
      };
      let resolver = PathResolver::new(&config);

      assert_eq!(
         resolver.candidates("vector", Platform::NativeDesktop).unwrap(),
         vec![
            PathBuf::from("./vector.so"),
            PathBuf::from("/a/vector.so"),
            PathBuf::from("/b/vector.so"),
         ]
      );
   }

   #[test]
   fn test_no_extension_dir_is_explicitly_relative() {
      let config = LoaderConfig {
         target_os: "macos".into(),
         extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
         ..Default::default()
      };
      let resolver = PathResolver::new(&config);

      let path = resolver.resolve("vector", Platform::NativeDesktop, None).unwrap();
      assert_eq!(path, Path::new(".").join("vector.dylib"));
      assert_eq!(path.parent(), Some(Path::new(".")));
   }

   #[test]
   fn test_candidates_include_exe_dir() {
      let config = LoaderConfig {
         target_os: "windows".into(),
         extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
         ..Default::default()
      };
      let resolver = PathResolver::new(&config);

      let candidates = resolver.candidates("vector", Platform::ManagedRuntime).unwrap();
      let exe_dir = exe_dir().unwrap();
      assert_eq!(candidates.last(), Some(&exe_dir.join("vector.dll")));
   }
}
