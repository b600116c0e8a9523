//! Compiles `c/vector.c` into a shared library SQLite can load at runtime.
//!
//! The path is exported as `SQLITE_FIXTURE_VECTOR_LIBRARY`. Without a usable C
//! toolchain the variable is left unset and the crate reports the library as
//! unavailable instead of failing the build.

use std::env;
use std::path::PathBuf;
use std::process::Command;

const VECTOR_VERSION: &str = "0.9.1";

fn main() {
   println!("cargo:rerun-if-changed=c/vector.c");
   println!("cargo:rerun-if-changed=build.rs");
   println!("cargo:rustc-env=SQLITE_FIXTURE_VECTOR_VERSION={VECTOR_VERSION}");

   let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
   // Exported by libsqlite3-sys's bundled build: the directory holding sqlite3ext.h
   let include = env::var("DEP_SQLITE3_INCLUDE").expect("libsqlite3-sys exports its headers");
   let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

   let (suffix, link_flags): (&str, &[&str]) = match target_os.as_str() {
      "macos" | "ios" => ("dylib", &["-dynamiclib"]),
      "windows" => ("dll", &["-shared"]),
      _ => ("so", &["-shared", "-fPIC"]),
   };
   let library = out_dir.join(format!("vector.{suffix}"));

   let compiler = match cc::Build::new().warnings(false).opt_level(0).try_get_compiler() {
      Ok(compiler) => compiler,
      Err(e) => {
         println!("cargo:warning=fixture extension not built: {e}");
         return;
      }
   };
   if compiler.is_like_msvc() {
      println!("cargo:warning=fixture extension not built: MSVC toolchains are not supported");
      return;
   }

   let mut command: Command = compiler.to_command();
   command
      .args(link_flags)
      .arg(format!("-DVECTOR_FIXTURE_VERSION=\"{VECTOR_VERSION}\""))
      .arg("-I")
      .arg(&include)
      .arg("c/vector.c")
      .arg("-o")
      .arg(&library);

   match command.status() {
      Ok(status) if status.success() => {
         println!(
            "cargo:rustc-env=SQLITE_FIXTURE_VECTOR_LIBRARY={}",
            library.display()
         );
      }
      Ok(status) => println!("cargo:warning=fixture extension not built: compiler exited with {status}"),
      Err(e) => println!("cargo:warning=fixture extension not built: {e}"),
   }
}
