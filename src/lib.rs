//! Discover, load and verify native SQLite extensions.
//!
//! An application describes each extension once ([`ExtensionDescriptor`]) and
//! hands the loader an open [`ConnectionHandle`](sqlx_sqlite_ext_conn::ConnectionHandle).
//! The loader then:
//!
//! 1. refuses closed handles ([`Error::NotReady`])
//! 2. enables extension loading on the handle if needed, refusing sandboxed hosts
//!    ([`Error::UnsupportedPlatform`])
//! 3. resolves the library file for the configured [`Platform`] ([`PathResolver`])
//! 4. asks SQLite to load it ([`Error::LoadFailed`] on rejection)
//! 5. calls the extension's verification function ([`VerificationProbe`])
//!
//! Sandboxed hosts (browser WASM behind a worker) cannot load native code at
//! runtime. For those, [`ExtensionLoader::ensure`] only verifies that the
//! extension was compiled into the host image.
//!
//! # Example
//!
//! ```no_run
//! use sqlite_ext_loader::{ExtensionDescriptor, ExtensionLoader, LoaderConfig, Platform};
//!
//! # async fn example() -> Result<(), sqlite_ext_loader::Error> {
//! let config = LoaderConfig::new(Platform::NativeMobile)
//!    .with_extension_dir("/data/app/lib/arm64")
//!    .with_extension(ExtensionDescriptor::new("vector").with_default_files())
//!    .with_extension(ExtensionDescriptor::new("js").with_default_files());
//! let loader = ExtensionLoader::new(config)?;
//!
//! let (mut handle, loaded) = loader
//!    .open_with_extensions("app.db", None, &["vector", "js"])
//!    .await?;
//!
//! for result in &loaded {
//!    println!("{}: {:?}", result.extension, result.value);
//! }
//!
//! # let _ = handle.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod descriptor;
mod error;
mod loader;
mod platform;
mod probe;
mod resolve;

pub use config::LoaderConfig;
pub use descriptor::ExtensionDescriptor;
pub use error::{Error, Result};
pub use loader::{ExtensionLoader, LoadResult};
pub use platform::{Platform, library_suffix};
pub use probe::{ProbeResult, VerificationProbe, is_valid_symbol};
pub use resolve::PathResolver;
