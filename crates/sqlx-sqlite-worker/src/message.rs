//! Messages exchanged with the worker.
//!
//! Both directions travel as JSON text, the same shape a browser worker sees
//! through `postMessage`:
//!
//! ```text
//! → {"messageId":1,"action":"open","params":{"filename":"file:mydb.sqlite3"}}
//! ← {"messageId":1,"dbId":"6f1c…","result":{"filename":"mydb.sqlite3"}}
//! → {"messageId":2,"action":"exec","params":{"dbId":"6f1c…","sql":"SELECT cloudsync_version();"}}
//! ← {"messageId":2,"dbId":"6f1c…","result":{"columns":["cloudsync_version()"],"rows":[["0.8.0"]]}}
//! → {"messageId":3,"action":"exec","params":{"dbId":"nope","sql":"SELECT 1"}}
//! ← {"messageId":3,"error":{"code":"UNKNOWN_DATABASE","message":"Unknown database id: nope"}}
//! ```

use serde::{Deserialize, Serialize};
use sqlx_sqlite_ext_conn::QueryRows;

use crate::Error;

/// A request to the worker, correlated with its response by `message_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
   pub message_id: u64,
   #[serde(flatten)]
   pub action: Action,
}

/// What the worker is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "kebab-case")]
pub enum Action {
   /// Open a database and register the image's bundled functions on it.
   Open { filename: String },
   /// Run SQL and return every row in a single response.
   #[serde(rename_all = "camelCase")]
   Exec { db_id: String, sql: String },
   /// Report the SQLite version and the extensions compiled into the image.
   ConfigGet {},
   /// Close a database opened earlier.
   #[serde(rename_all = "camelCase")]
   Close { db_id: String },
}

impl Action {
   pub fn name(&self) -> &'static str {
      match self {
         Action::Open { .. } => "open",
         Action::Exec { .. } => "exec",
         Action::ConfigGet {} => "config-get",
         Action::Close { .. } => "close",
      }
   }
}

/// The worker's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
   pub message_id: u64,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub db_id: Option<String>,
   #[serde(flatten)]
   pub outcome: Outcome,
}

impl WorkerResponse {
   pub fn success(message_id: u64, db_id: Option<String>, result: ActionResult) -> Self {
      Self {
         message_id,
         db_id,
         outcome: Outcome::Result(result),
      }
   }

   pub fn failure(message_id: u64, db_id: Option<String>, error: &Error) -> Self {
      Self {
         message_id,
         db_id,
         outcome: Outcome::Error(ErrorPayload {
            code: error.error_code(),
            message: error.to_string(),
         }),
      }
   }

   /// Split into the result payload or a [`Error::Remote`].
   pub fn into_result(self) -> Result<ActionResult, Error> {
      match self.outcome {
         Outcome::Result(result) => Ok(result),
         Outcome::Error(payload) => Err(Error::Remote {
            code: payload.code,
            message: payload.message,
         }),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
   Result(ActionResult),
   Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
   pub code: String,
   pub message: String,
}

/// Result payloads, one shape per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult {
   Rows(QueryRows),
   Config(ConfigInfo),
   Opened { filename: String },
   Closed {},
}

/// Answer to `config-get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
   pub version: VersionInfo,
   /// Names of extensions compiled into the worker image
   #[serde(default)]
   pub bundled_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
   pub lib_version: String,
}

#[cfg(test)]
mod tests {
   use super::*;
   use sqlx_sqlite_ext_conn::SqliteValue;

   #[test]
   fn test_request_wire_shape() {
      let request = WorkerRequest {
         message_id: 2,
         action: Action::Exec {
            db_id: "db-1".into(),
            sql: "SELECT 1".into(),
         },
      };

      let json = serde_json::to_value(&request).unwrap();
      assert_eq!(
         json,
         serde_json::json!({
            "messageId": 2,
            "action": "exec",
            "params": { "dbId": "db-1", "sql": "SELECT 1" }
         })
      );
   }

   #[test]
   fn test_config_get_accepts_empty_params() {
      let request: WorkerRequest =
         serde_json::from_str(r#"{"messageId":1,"action":"config-get","params":{}}"#).unwrap();
      assert_eq!(request.action, Action::ConfigGet {});
      assert_eq!(request.action.name(), "config-get");
   }

   #[test]
   fn test_unknown_action_rejected() {
      let result: Result<WorkerRequest, _> =
         serde_json::from_str(r#"{"messageId":1,"action":"load-extension","params":{}}"#);
      assert!(result.is_err());
   }

   #[test]
   fn test_response_payloads_decode_to_matching_shape() {
      let rows = WorkerResponse::success(
         3,
         Some("db-1".into()),
         ActionResult::Rows(QueryRows {
            columns: vec!["v".into()],
            rows: vec![vec![SqliteValue::Text("0.8.0".into())]],
         }),
      );
      let text = serde_json::to_string(&rows).unwrap();
      let back: WorkerResponse = serde_json::from_str(&text).unwrap();
      assert_eq!(back, rows);

      let opened = WorkerResponse::success(
         1,
         Some("db-1".into()),
         ActionResult::Opened {
            filename: "mydb.sqlite3".into(),
         },
      );
      let text = serde_json::to_string(&opened).unwrap();
      let back: WorkerResponse = serde_json::from_str(&text).unwrap();
      assert_eq!(back.into_result().unwrap(), ActionResult::Opened {
         filename: "mydb.sqlite3".into()
      });
   }

   #[test]
   fn test_error_response_becomes_remote_error() {
      let response = WorkerResponse::failure(9, None, &Error::UnknownDatabase("nope".into()));
      let text = serde_json::to_string(&response).unwrap();
      assert!(text.contains(r#""error":{"code":"UNKNOWN_DATABASE""#));

      let back: WorkerResponse = serde_json::from_str(&text).unwrap();
      match back.into_result() {
         Err(Error::Remote { code, message }) => {
            assert_eq!(code, "UNKNOWN_DATABASE");
            assert!(message.contains("nope"));
         }
         other => panic!("expected remote error, got {:?}", other),
      }
   }
}
