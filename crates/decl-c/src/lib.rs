//! Declaration processing for a C11 compiler front-end.
//!
//! This crate owns everything between the preprocessor's token stream
//! and the code emitter, for declarations: it parses declaration
//! specifiers and declarators, resolves them into canonical types,
//! maintains lexical scopes, enforces the storage-class and linkage
//! rules across redeclarations, lays out struct, union and enum types,
//! tracks tentative definitions, and hands finished objects and
//! functions to a back-end.
//!
//! It deliberately does not contain an expression parser, a statement
//! parser, an initializer parser or a code generator; those are
//! supplied by the embedding front-end through the [`hooks::Hooks`]
//! and [`backend::Backend`] traits, sharing this crate's token cursor.
//!
//! All state with translation-unit lifetime, the target descriptor
//! included, lives in a [`context::Context`], so several translation
//! units can be processed in one process.

pub mod backend;
pub mod context;
pub mod decl;
pub mod error;
pub mod hooks;
pub mod parser;
pub mod scope;
pub mod span;
pub mod target;
pub mod token;
pub mod types;

pub use crate::context::Context;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::parser::Parser;

#[cfg(test)]
mod tests;
