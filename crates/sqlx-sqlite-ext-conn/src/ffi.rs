//! Raw SQLite extension APIs that sqlx does not expose per call.
//!
//! sqlx only loads extensions while a connection is being established
//! (`SqliteConnectOptions::extension`). Loading into an already open connection
//! and registering image-provided functions both go through the raw handle.
//!
//! Every function here takes a raw `sqlite3` pointer obtained from
//! `SqliteConnection::lock_handle`, and the caller must hold that lock for the
//! duration of the call.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::panic::catch_unwind;
use std::ptr;

use libsqlite3_sys::{
   SQLITE_DBCONFIG_ENABLE_LOAD_EXTENSION, SQLITE_DETERMINISTIC, SQLITE_OK, SQLITE_TRANSIENT,
   SQLITE_UTF8, sqlite3, sqlite3_context, sqlite3_create_function_v2, sqlite3_db_config,
   sqlite3_errmsg, sqlite3_free, sqlite3_libversion, sqlite3_load_extension,
   sqlite3_result_null, sqlite3_result_text, sqlite3_user_data, sqlite3_value,
};
use tracing::{debug, trace};

use crate::Error;
use crate::Result;

/// Version string of the linked SQLite library (e.g. `3.46.0`).
pub fn lib_version() -> String {
   // SAFETY: sqlite3_libversion returns a pointer to a static NUL-terminated string.
   let version = unsafe { CStr::from_ptr(sqlite3_libversion()) };
   version.to_string_lossy().into_owned()
}

/// Reads the most recent error message recorded on the connection.
///
/// # Safety
///
/// `db` must be a valid, open sqlite3 connection.
unsafe fn last_error(db: *mut sqlite3) -> String {
   // SAFETY: db is valid (guaranteed by caller); sqlite3_errmsg never returns
   // a dangling pointer for an open connection.
   let msg = unsafe { sqlite3_errmsg(db) };
   if msg.is_null() {
      return "unknown error".to_string();
   }
   unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// Turns on `sqlite3_load_extension` for this connection.
///
/// Only the C API is enabled. The SQL function `load_extension()` stays
/// unauthorized, so statements run on the connection cannot load libraries.
///
/// # Safety
///
/// `db` must be a valid, open sqlite3 connection locked by the caller.
pub unsafe fn enable_load_extension(db: *mut sqlite3) -> Result<()> {
   // SAFETY: db is valid (guaranteed by caller); the option takes an int and a
   // nullable int* that receives the new setting.
   let rc = unsafe {
      sqlite3_db_config(
         db,
         SQLITE_DBCONFIG_ENABLE_LOAD_EXTENSION,
         1 as c_int,
         ptr::null_mut::<c_int>(),
      )
   };
   if rc != SQLITE_OK {
      return Err(Error::Backend(format!(
         "SQLITE_DBCONFIG_ENABLE_LOAD_EXTENSION failed: {}",
         unsafe { last_error(db) }
      )));
   }

   trace!("Extension loading enabled on connection");
   Ok(())
}

/// Loads the shared library `file` into the connection.
///
/// SQLite's own message (dlopen failure, missing entry point, init error) is
/// returned as [`Error::LoadRejected`].
///
/// # Safety
///
/// `db` must be a valid, open sqlite3 connection locked by the caller, with
/// extension loading enabled.
pub unsafe fn load_extension(
   db: *mut sqlite3,
   file: &CStr,
   entry_point: Option<&CStr>,
) -> Result<()> {
   let mut err_msg: *mut c_char = ptr::null_mut();
   let entry_ptr = entry_point.map_or(ptr::null(), CStr::as_ptr);

   // SAFETY: db is valid, file/entry_ptr are NUL-terminated for the call duration,
   // and err_msg is a valid out pointer.
   let rc = unsafe { sqlite3_load_extension(db, file.as_ptr(), entry_ptr, &mut err_msg) };
   if rc == SQLITE_OK {
      return Ok(());
   }

   let reason = if err_msg.is_null() {
      unsafe { last_error(db) }
   } else {
      // SAFETY: err_msg was allocated by SQLite and must be released with sqlite3_free.
      let reason = unsafe { CStr::from_ptr(err_msg) }.to_string_lossy().into_owned();
      unsafe { sqlite3_free(err_msg as *mut c_void) };
      reason
   };

   debug!(rc, reason = %reason, "sqlite3_load_extension failed");
   Err(Error::LoadRejected(reason))
}

/// Registers a zero-argument SQL function that always returns `value`.
///
/// This is how extensions compiled into a host image announce themselves
/// (`vector_version()`, `cloudsync_version()`, ...).
///
/// # Safety
///
/// `db` must be a valid, open sqlite3 connection locked by the caller.
pub unsafe fn register_constant_function(db: *mut sqlite3, name: &str, value: &str) -> Result<()> {
   let c_name = CString::new(name)
      .map_err(|_| Error::Backend(format!("function name '{name}' contains a NUL byte")))?;
   let c_value = CString::new(value)
      .map_err(|_| Error::Backend(format!("value for '{name}' contains a NUL byte")))?;

   // Ownership moves to SQLite; it calls destroy_constant with this pointer when the
   // function is replaced, the connection closes, or registration fails.
   let user_data = Box::into_raw(Box::new(c_value)) as *mut c_void;

   // SAFETY: db is valid (guaranteed by caller); callbacks match the expected signatures.
   let rc = unsafe {
      sqlite3_create_function_v2(
         db,
         c_name.as_ptr(),
         0,
         SQLITE_UTF8 | SQLITE_DETERMINISTIC,
         user_data,
         Some(constant_callback),
         None,
         None,
         Some(destroy_constant),
      )
   };

   if rc != SQLITE_OK {
      return Err(Error::Backend(format!(
         "failed to register function '{name}': {}",
         unsafe { last_error(db) }
      )));
   }

   trace!(function = %name, "Registered constant SQL function");
   Ok(())
}

unsafe extern "C" fn constant_callback(
   ctx: *mut sqlite3_context,
   _argc: c_int,
   _argv: *mut *mut sqlite3_value,
) {
   // Catch any panics to prevent unwinding across the FFI boundary (which is UB).
   let result = catch_unwind(|| {
      // SAFETY: user data is the CString boxed in register_constant_function and lives
      // until destroy_constant runs.
      let value = unsafe { sqlite3_user_data(ctx) } as *const CString;
      if value.is_null() {
         unsafe { sqlite3_result_null(ctx) };
         return;
      }
      let value = unsafe { &*value };
      unsafe { sqlite3_result_text(ctx, value.as_ptr(), -1, SQLITE_TRANSIENT()) };
   });

   if result.is_err() {
      eprintln!("sqlx-sqlite-ext-conn: panic in constant_callback (absorbed to prevent UB)");
   }
}

unsafe extern "C" fn destroy_constant(user_data: *mut c_void) {
   if !user_data.is_null() {
      // SAFETY: created by Box::into_raw in register_constant_function; SQLite calls
      // the destructor exactly once.
      let _ = unsafe { Box::from_raw(user_data as *mut CString) };
   }
}
