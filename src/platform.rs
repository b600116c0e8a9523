use std::fmt;

use serde::{Deserialize, Serialize};

/// Host environment an extension is loaded into.
///
/// Chosen once (see [`LoaderConfig`](crate::LoaderConfig)) and never changed. The
/// platform decides whether native code may be loaded at runtime at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
   /// Desktop/server process (Linux, macOS, Windows)
   NativeDesktop,
   /// Android or iOS application
   NativeMobile,
   /// Browser WASM build behind a worker. Extensions must be in the build image.
   BrowserSandboxed,
   /// Managed language runtime hosting a native SQLite driver (.NET, JVM, Node)
   ManagedRuntime,
}

impl Platform {
   pub const ALL: [Platform; 4] = [
      Platform::NativeDesktop,
      Platform::NativeMobile,
      Platform::BrowserSandboxed,
      Platform::ManagedRuntime,
   ];

   /// Platform of the current compile target.
   pub fn detect() -> Self {
      if cfg!(target_family = "wasm") {
         Platform::BrowserSandboxed
      } else if cfg!(any(target_os = "android", target_os = "ios")) {
         Platform::NativeMobile
      } else {
         Platform::NativeDesktop
      }
   }

   /// Whether shared libraries can be loaded into a connection at runtime.
   pub fn allows_runtime_loading(self) -> bool {
      !matches!(self, Platform::BrowserSandboxed)
   }

   pub fn as_str(self) -> &'static str {
      match self {
         Platform::NativeDesktop => "native-desktop",
         Platform::NativeMobile => "native-mobile",
         Platform::BrowserSandboxed => "browser-sandboxed",
         Platform::ManagedRuntime => "managed-runtime",
      }
   }
}

impl Default for Platform {
   fn default() -> Self {
      Platform::detect()
   }
}

impl fmt::Display for Platform {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// Shared library suffix per operating system.
///
/// Adding an OS is a new row here, nothing else.
const LIBRARY_SUFFIXES: &[(&str, &str)] = &[
   ("linux", "so"),
   ("android", "so"),
   ("freebsd", "so"),
   ("macos", "dylib"),
   ("ios", "dylib"),
   ("windows", "dll"),
];

/// Suffix (without the dot) for shared libraries on `os`, as named by
/// [`std::env::consts::OS`].
pub fn library_suffix(os: &str) -> Option<&'static str> {
   LIBRARY_SUFFIXES
      .iter()
      .find(|(name, _)| *name == os)
      .map(|(_, suffix)| *suffix)
}

/// Whether `file_name` already ends in a known shared library suffix.
pub(crate) fn has_library_suffix(file_name: &str) -> bool {
   file_name
      .rsplit_once('.')
      .is_some_and(|(_, ext)| LIBRARY_SUFFIXES.iter().any(|(_, suffix)| *suffix == ext))
}
