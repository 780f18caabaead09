//! Collaborating parsers.
//!
//! Initializers, constant expressions and statements belong to other
//! parts of the front-end. The declaration processor calls back into
//! them through this trait; implementations share the token stream by
//! receiving the parser itself.

use crate::backend::{Func, Init};
use crate::error::Result;
use crate::parser::Parser;
use crate::scope::ScopeRef;
use crate::types::TypeRef;

/// A string-literal expression, as handed over by the expression
/// parser. `data` holds the literal's raw bytes, embedded NULs
/// included.
#[derive(Debug, Clone)]
pub struct StringLit {
    pub data: Vec<u8>,
    pub ty: TypeRef,
}

pub trait Hooks {
    /// Parse and evaluate an integer constant expression (C11 6.6).
    fn int_const_expr(&self, p: &mut Parser<'_>, scope: &ScopeRef) -> Result<u64>;

    /// Parse an initializer for an object of type `ty` (C11 6.7.9).
    ///
    /// Returns the object's type along with the initializer: an
    /// incomplete array type comes back completed with the length
    /// inferred from the initializer.
    fn parse_init(&self, p: &mut Parser<'_>, scope: &ScopeRef, ty: &TypeRef)
        -> Result<(TypeRef, Init)>;

    /// Parse a function body, starting at the `{` token.
    fn stmt(&self, p: &mut Parser<'_>, func: &mut Func, scope: &ScopeRef) -> Result<()>;
}
