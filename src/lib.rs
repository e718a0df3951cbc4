//! `fmtgen` — a data-driven code/text generator. A document (JSON or YAML)
//! declares one or more templates together with passes (parameter sets) and
//! a base data object; for every (template, pass) pair the template body
//! and its output path are rendered through a small format-tag language
//! (`<$ ... $>`) and the result is written to disk.
//!
//! The template language pipeline — [`lexer`], [`value`], [`env`],
//! [`eval`] and [`filecache`] — is the core of this crate; [`driver`] and
//! [`document`] wire it up to a decoded document, and [`io`] is the only
//! place that touches the filesystem.

pub mod document;
pub mod driver;
pub mod env;
pub mod error;
pub mod eval;
pub mod filecache;
pub mod io;
pub mod lexer;
pub mod token;
pub mod value;
