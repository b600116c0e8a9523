//! Loading with no extension directory configured.
//!
//! These tests change the process working directory, so they live in their own
//! test binary and serialize on [`CWD`].

mod common;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::{Call, scripted_handle, write_library};
use sqlite_ext_loader::{ExtensionDescriptor, ExtensionLoader, LoaderConfig, Platform};
use sqlx_sqlite_ext_conn::ConnectionHandle;
use tempfile::TempDir;

static CWD: Mutex<()> = Mutex::new(());

fn loader_without_dir(target_os: &str) -> ExtensionLoader {
   let config = LoaderConfig {
      platform: Platform::NativeDesktop,
      extension_dir: None,
      search_exe_dir: false,
      target_os: target_os.to_string(),
      extensions: vec![ExtensionDescriptor::new("vector").with_default_files()],
      ..Default::default()
   };
   ExtensionLoader::new(config).unwrap()
}

#[tokio::test]
async fn test_library_in_working_directory_loads() {
   let _guard = CWD.lock().unwrap_or_else(|e| e.into_inner());
   let temp_dir = TempDir::new().unwrap();
   write_library(temp_dir.path(), "vector.so", &[("vector_version", "0.9.1")]);
   std::env::set_current_dir(temp_dir.path()).unwrap();

   let loader = loader_without_dir("linux");
   let (mut handle, log) = scripted_handle();

   let result = loader.load_by_name(&mut handle, "vector").await.unwrap();

   let expected = Path::new(".").join("vector.so");
   assert!(result.success);
   assert_eq!(result.path.as_deref(), Some(expected.as_path()));
   assert_eq!(result.value.as_deref(), Some("0.9.1"));

   // The backend is handed a path with a directory component, never the bare
   // file name the dynamic loader would look up on its search path
   assert!(log.calls().contains(&Call::Load {
      path: PathBuf::from("./vector.so"),
      entry_point: None,
   }));
}

#[tokio::test]
async fn test_compiled_library_in_working_directory_loads() {
   let _guard = CWD.lock().unwrap_or_else(|e| e.into_inner());
   let temp_dir = TempDir::new().unwrap();
   let Some(installed) = sqlite_ext_fixture::install_vector(temp_dir.path()).unwrap() else {
      eprintln!("fixture extension not built; skipping");
      return;
   };
   std::env::set_current_dir(temp_dir.path()).unwrap();

   let loader = loader_without_dir(std::env::consts::OS);
   let mut handle = ConnectionHandle::open(":memory:", None).await.unwrap();

   let result = loader.load_by_name(&mut handle, "vector").await.unwrap();

   let file_name = installed.file_name().unwrap();
   assert!(result.success);
   assert_eq!(result.path, Some(Path::new(".").join(file_name)));
   assert_eq!(result.value.as_deref(), Some(sqlite_ext_fixture::VECTOR_VERSION));

   handle.close().await.unwrap();
}
