//! The narrow database surface a connection handle drives.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A SQLite value returned from a query.
///
/// Serializes untagged so rows crossing a message boundary look like plain JSON
/// (`null`, numbers, strings, byte arrays).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqliteValue {
   Null,
   Integer(i64),
   Real(f64),
   Text(String),
   Blob(Vec<u8>),
}

impl SqliteValue {
   pub fn is_null(&self) -> bool {
      matches!(self, SqliteValue::Null)
   }

   /// Text rendering of scalar values. `Null` and `Blob` have none.
   pub fn to_text(&self) -> Option<String> {
      match self {
         SqliteValue::Integer(v) => Some(v.to_string()),
         SqliteValue::Real(v) => Some(v.to_string()),
         SqliteValue::Text(v) => Some(v.clone()),
         SqliteValue::Null | SqliteValue::Blob(_) => None,
      }
   }
}

/// Rows produced by a single SQL execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRows {
   /// Column names of the result set (empty when no rows came back)
   pub columns: Vec<String>,
   pub rows: Vec<Vec<SqliteValue>>,
}

impl QueryRows {
   /// First column of the first row, or `Null` when the result is empty.
   pub fn first_value(&self) -> SqliteValue {
      self
         .rows
         .first()
         .and_then(|row| row.first())
         .cloned()
         .unwrap_or(SqliteValue::Null)
   }
}

/// Operations a database driver must provide for extension loading.
///
/// Implementations own exactly one underlying connection. They are driven
/// through [`ConnectionHandle`](crate::ConnectionHandle), which tracks the
/// lifecycle and the loading flag, so backends never see out-of-sequence calls.
pub trait SqliteBackend: Send {
   /// Whether extensions can be loaded into this connection at runtime.
   fn supports_runtime_loading(&self) -> bool;

   /// Allow `load_extension` on this connection.
   fn enable_loading(&mut self) -> impl Future<Output = Result<()>> + Send;

   /// Load the shared library at `path`, optionally through a named entry point.
   fn load_extension(
      &mut self,
      path: &Path,
      entry_point: Option<&str>,
   ) -> impl Future<Output = Result<()>> + Send;

   /// Execute `sql` and collect every row it produces.
   fn query_rows(&mut self, sql: &str) -> impl Future<Output = Result<QueryRows>> + Send;

   /// Release the underlying connection.
   fn close(self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_first_value_of_empty_rows_is_null() {
      assert_eq!(QueryRows::default().first_value(), SqliteValue::Null);
   }

   #[test]
   fn test_to_text() {
      assert_eq!(SqliteValue::Integer(3).to_text().as_deref(), Some("3"));
      assert_eq!(SqliteValue::Text("0.9.1".into()).to_text().as_deref(), Some("0.9.1"));
      assert_eq!(SqliteValue::Blob(vec![1, 2]).to_text(), None);
      assert_eq!(SqliteValue::Null.to_text(), None);
   }

   #[test]
   fn test_value_json_shape() {
      let rows = QueryRows {
         columns: vec!["v".into()],
         rows: vec![vec![
            SqliteValue::Null,
            SqliteValue::Integer(7),
            SqliteValue::Real(1.5),
            SqliteValue::Text("x".into()),
         ]],
      };

      let json = serde_json::to_string(&rows).unwrap();
      assert_eq!(json, r#"{"columns":["v"],"rows":[[null,7,1.5,"x"]]}"#);

      let back: QueryRows = serde_json::from_str(&json).unwrap();
      assert_eq!(back, rows);
   }
}
