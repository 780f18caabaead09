//! Lexical scopes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::decl::DeclRef;
use crate::types::TypeRef;

pub type ScopeRef = Rc<Scope>;

/// One level of lexical scope: ordinary identifiers and tags live in
/// separate name spaces (C11 6.2.3). Installing never removes an
/// existing entry; shadowing happens only through nesting.
#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeRef>,
    decls: RefCell<HashMap<String, DeclRef>>,
    tags: RefCell<HashMap<String, TypeRef>>,
}

impl Scope {
    /// The distinguished root scope of a translation unit.
    pub fn file() -> ScopeRef {
        Rc::new(Scope {
            parent: None,
            decls: RefCell::new(HashMap::new()),
            tags: RefCell::new(HashMap::new()),
        })
    }

    pub fn push(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            decls: RefCell::new(HashMap::new()),
            tags: RefCell::new(HashMap::new()),
        })
    }

    pub fn pop(scope: &ScopeRef) -> Option<ScopeRef> {
        scope.parent.clone()
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    pub fn get_decl(&self, name: &str, recurse: bool) -> Option<DeclRef> {
        if let Some(d) = self.decls.borrow().get(name) {
            return Some(d.clone());
        }
        if recurse {
            self.parent.as_ref().and_then(|p| p.get_decl(name, true))
        } else {
            None
        }
    }

    pub fn get_tag(&self, name: &str, recurse: bool) -> Option<TypeRef> {
        if let Some(t) = self.tags.borrow().get(name) {
            return Some(t.clone());
        }
        if recurse {
            self.parent.as_ref().and_then(|p| p.get_tag(name, true))
        } else {
            None
        }
    }

    pub fn put_decl(&self, name: impl Into<String>, decl: DeclRef) {
        self.decls.borrow_mut().insert(name.into(), decl);
    }

    pub fn put_tag(&self, name: impl Into<String>, ty: TypeRef) {
        self.tags.borrow_mut().insert(name.into(), ty);
    }
}
