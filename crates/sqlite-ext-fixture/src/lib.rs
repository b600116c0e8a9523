//! A real loadable SQLite extension for tests that need SQLite to open an
//! actual shared library.
//!
//! The build script compiles `vector.<suffix>` with two entry points:
//!
//! - `sqlite3_vector_init`, the default SQLite derives from the file name,
//!   registers `vector_version()` returning [`VECTOR_VERSION`]
//! - [`LITE_ENTRY_POINT`] registers only `vector_lite_version()`, returning
//!   [`VECTOR_VERSION`] with a `-lite` suffix
//!
//! Where no C toolchain was available [`vector_library`] returns `None` and
//! callers skip.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Value returned by `vector_version()`.
pub const VECTOR_VERSION: &str = env!("SQLITE_FIXTURE_VECTOR_VERSION");

/// Alternate entry point exported by the library.
pub const LITE_ENTRY_POINT: &str = "sqlite3_vector_lite_init";

/// Path of the compiled library inside the build directory.
pub fn vector_library() -> Option<&'static Path> {
   option_env!("SQLITE_FIXTURE_VECTOR_LIBRARY").map(Path::new)
}

/// Copy the compiled library into `dir`, keeping its file name.
///
/// Returns `Ok(None)` when the library was not built.
pub fn install_vector(dir: &Path) -> io::Result<Option<PathBuf>> {
   let Some(library) = vector_library() else {
      return Ok(None);
   };
   let file_name = library
      .file_name()
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "library path has no file name"))?;

   let installed = dir.join(file_name);
   fs::copy(library, &installed)?;
   Ok(Some(installed))
}
