//! Polylint core library.
//!
//! A heuristic, line-oriented lint engine for fourteen languages plus the
//! file runner and printers used by the `polylint` binary.
//!
//! High-level modules:
//! - `engine`: scanner trait, dispatcher, diagnostic sink and shared lexical machinery.
//! - `scanners`: one syntax/semantic scanner pair per language.
//! - `language`: the closed set of language ids and extension mapping.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `lint`: File expansion and parallel linting.
//! - `models`: Diagnostics and lint output structs.
//! - `output`: Human/JSON printers.
//! - `error`: Error types at the engine boundary.
//! - `utils`: Supporting helpers.
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod lint;
pub mod models;
pub mod output;
pub mod scanners;
pub mod utils;

pub use engine::{lint, lint_as};
pub use error::LintError;
pub use language::LanguageId;
pub use models::{Diagnostic, Severity};
