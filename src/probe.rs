//! Post-load verification by calling a function the extension exposes.

use serde::{Deserialize, Serialize};
use sqlx_sqlite_ext_conn::{ConnectionHandle, SqliteBackend, SqliteValue};
use tracing::debug;

const NOT_FOUND: &str = "symbol not found or errored";

/// Outcome of one verification call. A failed probe is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
   pub success: bool,
   pub symbol: String,
   /// Text the symbol returned, when it returned something usable
   #[serde(skip_serializing_if = "Option::is_none")]
   pub value: Option<String>,
   /// Why the probe failed
   #[serde(skip_serializing_if = "Option::is_none")]
   pub detail: Option<String>,
}

impl ProbeResult {
   fn passed(symbol: &str, value: String) -> Self {
      Self {
         success: true,
         symbol: symbol.to_string(),
         value: Some(value),
         detail: None,
      }
   }

   fn failed(symbol: &str, detail: impl Into<String>) -> Self {
      Self {
         success: false,
         symbol: symbol.to_string(),
         value: None,
         detail: Some(detail.into()),
      }
   }
}

/// Confirms an extension is live by calling a zero-argument function on it.
pub struct VerificationProbe;

impl VerificationProbe {
   /// Call `SELECT <symbol>()` and judge the result.
   ///
   /// Non-empty text, integers and reals pass. `NULL`, empty text, blobs and SQL
   /// errors (including an undefined function) fail. Never returns an error.
   pub async fn check<B: SqliteBackend>(handle: &mut ConnectionHandle<B>, symbol: &str) -> ProbeResult {
      if !is_valid_symbol(symbol) {
         return ProbeResult::failed(symbol, format!("invalid symbol name: {symbol:?}"));
      }

      let sql = format!("SELECT {symbol}()");
      let result = match handle.query_scalar(&sql).await {
         Ok(value) => judge(symbol, value),
         Err(e) => ProbeResult::failed(symbol, format!("{NOT_FOUND}: {e}")),
      };

      debug!(
         db = %handle.target(),
         symbol,
         success = result.success,
         "Verification probe finished"
      );
      result
   }

   /// Probe `sqlite_version()`, which every SQLite build provides.
   pub async fn sqlite_version<B: SqliteBackend>(handle: &mut ConnectionHandle<B>) -> ProbeResult {
      Self::check(handle, "sqlite_version").await
   }
}

fn judge(symbol: &str, value: SqliteValue) -> ProbeResult {
   match value.to_text() {
      Some(text) if !text.is_empty() => ProbeResult::passed(symbol, text),
      Some(_) => ProbeResult::failed(symbol, format!("{NOT_FOUND}: empty result")),
      None if value.is_null() => ProbeResult::failed(symbol, format!("{NOT_FOUND}: returned NULL")),
      None => ProbeResult::failed(symbol, format!("{NOT_FOUND}: returned a blob")),
   }
}

/// Plain SQL identifier: ASCII letters, digits and underscores, not starting with
/// a digit. Anything else could smuggle SQL into the probe statement.
pub fn is_valid_symbol(symbol: &str) -> bool {
   let mut chars = symbol.chars();
   match chars.next() {
      Some(first) if first.is_ascii_alphabetic() || first == '_' => {
         chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
      }
      _ => false,
   }
}
