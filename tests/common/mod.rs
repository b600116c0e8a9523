//! Scripted backend used where a real compiled extension would be needed.
//!
//! A "library" is a text file starting with [`LIBRARY_HEADER`] followed by
//! `function=value` lines. Loading it registers those zero-argument functions;
//! anything else is rejected the way SQLite rejects a bad shared object.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sqlx_sqlite_ext_conn::{ConnectionHandle, Error, QueryRows, Result, SqliteBackend, SqliteValue};

pub const LIBRARY_HEADER: &str = "#scripted-sqlite-extension";

/// Calls that reached the backend, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
   Enable,
   Load { path: PathBuf, entry_point: Option<String> },
   Query(String),
   Close,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
   fn push(&self, call: Call) {
      self.0.lock().unwrap().push(call);
   }

   pub fn calls(&self) -> Vec<Call> {
      self.0.lock().unwrap().clone()
   }

   pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
      self.calls().iter().filter(|call| pred(call)).count()
   }

   pub fn loads(&self) -> usize {
      self.count(|call| matches!(call, Call::Load { .. }))
   }

   pub fn enables(&self) -> usize {
      self.count(|call| matches!(call, Call::Enable))
   }
}

pub struct ScriptedBackend {
   runtime_loading: bool,
   enabled: bool,
   functions: HashMap<String, SqliteValue>,
   log: CallLog,
}

impl ScriptedBackend {
   pub fn new(log: CallLog) -> Self {
      let mut functions = HashMap::new();
      functions.insert("sqlite_version".to_string(), SqliteValue::Text("3.46.0".into()));
      Self {
         runtime_loading: true,
         enabled: false,
         functions,
         log,
      }
   }

   /// A backend that, like a browser build, cannot load at runtime
   pub fn sandboxed(log: CallLog) -> Self {
      Self {
         runtime_loading: false,
         ..Self::new(log)
      }
   }

   /// Function compiled into the backend from the start
   pub fn with_function(mut self, name: &str, value: SqliteValue) -> Self {
      self.functions.insert(name.to_string(), value);
      self
   }
}

impl SqliteBackend for ScriptedBackend {
   fn supports_runtime_loading(&self) -> bool {
      self.runtime_loading
   }

   async fn enable_loading(&mut self) -> Result<()> {
      self.log.push(Call::Enable);
      if !self.runtime_loading {
         return Err(Error::LoadingUnsupported);
      }
      self.enabled = true;
      Ok(())
   }

   async fn load_extension(&mut self, path: &Path, entry_point: Option<&str>) -> Result<()> {
      self.log.push(Call::Load {
         path: path.to_path_buf(),
         entry_point: entry_point.map(str::to_string),
      });

      if !self.enabled {
         return Err(Error::LoadRejected("not authorized".to_string()));
      }

      // Like dlopen: a name without a directory is looked up on the library
      // search path, never in the working directory
      let has_dir = path.parent().is_some_and(|dir| !dir.as_os_str().is_empty());
      if !has_dir {
         return Err(Error::LoadRejected(format!(
            "{}: cannot open shared object file: No such file or directory",
            path.display()
         )));
      }

      let text = std::fs::read_to_string(path).map_err(|_| {
         Error::LoadRejected(format!(
            "{}: cannot open shared object file: No such file or directory",
            path.display()
         ))
      })?;

      let mut lines = text.lines();
      if lines.next() != Some(LIBRARY_HEADER) {
         return Err(Error::LoadRejected(format!(
            "{}: invalid ELF header",
            path.display()
         )));
      }

      for line in lines {
         if let Some((name, value)) = line.split_once('=') {
            self
               .functions
               .insert(name.to_string(), SqliteValue::Text(value.to_string()));
         }
      }
      Ok(())
   }

   async fn query_rows(&mut self, sql: &str) -> Result<QueryRows> {
      self.log.push(Call::Query(sql.to_string()));

      let function = sql
         .strip_prefix("SELECT ")
         .and_then(|rest| rest.strip_suffix("()"))
         .ok_or_else(|| Error::Backend(format!("unsupported statement: {sql}")))?;

      let value = self
         .functions
         .get(function)
         .cloned()
         .ok_or_else(|| Error::Backend(format!("no such function: {function}")))?;

      Ok(QueryRows {
         columns: vec![format!("{function}()")],
         rows: vec![vec![value]],
      })
   }

   async fn close(self) -> Result<()> {
      self.log.push(Call::Close);
      Ok(())
   }
}

/// Open handle over a fresh scripted backend, plus its call log.
pub fn scripted_handle() -> (ConnectionHandle<ScriptedBackend>, CallLog) {
   let log = CallLog::default();
   let handle = ConnectionHandle::from_backend(ScriptedBackend::new(log.clone()), "scripted");
   (handle, log)
}

/// Write a scripted library exposing `functions` to `dir/file_name`.
pub fn write_library(dir: &Path, file_name: &str, functions: &[(&str, &str)]) -> PathBuf {
   let mut text = format!("{LIBRARY_HEADER}\n");
   for (name, value) in functions {
      text.push_str(&format!("{name}={value}\n"));
   }

   let path = dir.join(file_name);
   std::fs::write(&path, text).unwrap();
   path
}
