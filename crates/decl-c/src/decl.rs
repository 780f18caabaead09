//! Declarations.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::backend::Value;
use crate::types::TypeRef;

pub type DeclRef = Rc<Decl>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Object,
    Func,
    Typedef,
    EnumConst,
}

/// Identifier linkage (C11 6.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    None,
    Internal,
    External,
}

/// A declared name.
///
/// Linkage is fixed at creation; redeclarations must agree. The type
/// is replaced by the composite type on each compatible redeclaration.
#[derive(Debug)]
pub struct Decl {
    pub kind: DeclKind,
    pub linkage: Linkage,
    pub ty: RefCell<TypeRef>,
    pub align: Cell<u64>,
    pub value: Cell<Option<Value>>,
    pub defined: Cell<bool>,
    pub tentative: Cell<bool>,
}

impl Decl {
    pub fn new(kind: DeclKind, ty: TypeRef, linkage: Linkage) -> DeclRef {
        Rc::new(Decl {
            kind,
            linkage,
            ty: RefCell::new(ty),
            align: Cell::new(0),
            value: Cell::new(None),
            defined: Cell::new(false),
            tentative: Cell::new(false),
        })
    }

    pub fn ty(&self) -> TypeRef {
        self.ty.borrow().clone()
    }
}
