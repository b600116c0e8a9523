//! An isolated SQLite worker reached only through messages.
//!
//! This crate models hosts such as a browser, where SQLite runs inside a worker
//! and the application talks to it with request/response messages
//! (`open`, `exec`, `config-get`, `close`). Such hosts forbid loading native code
//! at runtime: every extension must be compiled into the [`WorkerImage`].
//!
//! # Ordering
//!
//! The worker handles one request at a time in submission order. Responses are
//! correlated to requests by `messageId`, so concurrent callers each get their
//! own answer.
//!
//! # Example
//!
//! ```no_run
//! use sqlx_sqlite_worker::{WorkerClient, WorkerConfig, WorkerImage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WorkerClient::spawn(
//!    WorkerImage::new().with_extension("vector", "0.9.1"),
//!    WorkerConfig::default(),
//! );
//!
//! let mut handle = client.open(":memory:").await?;
//! let version = handle.query_scalar("SELECT vector_version()").await?;
//! println!("vector_version(): {:?}", version);
//!
//! // Runtime loading is refused without a round-trip to the worker
//! assert!(handle.enable_loading().await.is_err());
//!
//! handle.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod image;
pub mod message;
mod worker;

pub use backend::WorkerBackend;
pub use client::WorkerClient;
pub use config::WorkerConfig;
pub use error::Error;
pub use image::{BundledExtension, BundledFunction, WorkerImage};
pub use message::{Action, ActionResult, ConfigInfo, VersionInfo, WorkerRequest, WorkerResponse};

pub type Result<T> = std::result::Result<T, Error>;
