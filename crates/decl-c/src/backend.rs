//! Interface to the code emitter.
//!
//! The declaration processor never generates code itself; finished
//! objects and functions are handed to a [`Backend`] implementation.

use crate::decl::DeclRef;
use crate::scope::ScopeRef;
use crate::types::TypeRef;

/// Opaque handle into the back-end symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(pub u64);

/// Back-end representation class of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repr {
    None,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// A function definition in progress.
///
/// Created by [`Backend::make_func`] before the statement parser runs
/// over the body, finished by [`Backend::emit_func`].
#[derive(Debug)]
pub struct Func {
    pub name: String,
    pub ty: TypeRef,
    pub value: Value,
}

/// One node of a structured initializer, as produced by the
/// initializer parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Init {
    pub offset: u64,
    pub size: u64,
    pub value: InitValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitValue {
    Zeroed,
    Int(u64),
    Bytes(Vec<u8>),
    List(Vec<Init>),
}

pub trait Backend {
    /// Create a symbol for a named object or function. Private symbols
    /// do not participate in linking.
    fn make_global(&mut self, name: &str, private: bool) -> Value;

    /// Create an integer constant of the given representation class.
    fn make_int_const(&mut self, repr: Repr, value: u64) -> Value;

    /// Begin a function definition. The back-end installs the
    /// function's parameters into `scope` so the body can refer to
    /// them.
    fn make_func(&mut self, name: &str, ty: &TypeRef, scope: &ScopeRef) -> Func;

    /// Emit an object with static storage duration. `init` of `None`
    /// means zero-initialized.
    fn emit_data(&mut self, decl: &DeclRef, init: Option<&Init>);

    /// Finish a function definition.
    fn emit_func(&mut self, func: &Func, external: bool);

    /// Define a block-scope object without linkage inside `func`.
    fn func_init(&mut self, func: &mut Func, decl: &DeclRef, init: Option<&Init>);
}
