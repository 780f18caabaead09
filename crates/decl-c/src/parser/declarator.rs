//! Declarator parsing (C11 6.7.6).
//!
//! A declarator is parsed into a flat list of partial types which is
//! then threaded onto the base type in one reverse walk. The list is
//! kept in the order the syntax distributes meaning: leading pointers
//! go to the front, suffixes slot in just before the pointers that
//! were already collected when the direct declarator began.

use std::cell::RefCell;

use crate::error::{ErrorKind, Result};
use crate::scope::ScopeRef;
use crate::token::TokenKind;
use crate::types::{make_qualified, unqualify, Param, Quals, TypeRef};

use super::specs::{Allow, StorageClass};
use super::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclaratorKind {
    /// Must name an identifier (object, function and member declarators).
    Concrete,
    /// Must not name one (type names).
    Abstract,
    /// Either (parameter declarators).
    Any,
}

/// One step of a declarator, collected before the base type is known.
enum Partial {
    Pointer,
    Quals(Quals),
    Array(u64),
    Func {
        params: Vec<Param>,
        prototype: bool,
        vararg: bool,
        paraminfo: bool,
    },
}

impl<'a> Parser<'a> {
    /// Parse one declarator and thread it onto `base`, yielding the
    /// declared identifier (if any) and the full type.
    pub(crate) fn declarator(
        &mut self,
        scope: &ScopeRef,
        base: &TypeRef,
        kind: DeclaratorKind,
    ) -> Result<(Option<String>, TypeRef)> {
        let mut partials = Vec::new();
        let mut name = None;
        self.declarator_partials(scope, &mut partials, &mut name, kind)?;
        let ty = self.thread(partials, base.clone())?;
        Ok((name, ty))
    }

    /// Walk the partial chain outermost-to-innermost, attaching each
    /// node to the type accumulated so far.
    fn thread(&self, partials: Vec<Partial>, mut base: TypeRef) -> Result<TypeRef> {
        for partial in partials.into_iter().rev() {
            base = match partial {
                Partial::Pointer => self.ctx.make_pointer(&base),
                Partial::Quals(quals) => make_qualified(&base, quals),
                Partial::Array(len) => {
                    if base.is_func() {
                        return Err(self.error(ErrorKind::ArrayOfFuncs));
                    }
                    self.ctx
                        .make_array(&base, len)
                        .map_err(|kind| self.error(kind))?
                }
                Partial::Func {
                    params,
                    prototype,
                    vararg,
                    paraminfo,
                } => {
                    if base.is_func() {
                        return Err(self.error(ErrorKind::FuncReturnsFunc));
                    }
                    if base.is_array() {
                        return Err(self.error(ErrorKind::FuncReturnsArray));
                    }
                    self.ctx.make_func(&base, params, prototype, vararg, paraminfo)
                }
            };
        }
        Ok(base)
    }

    fn declarator_partials(
        &mut self,
        scope: &ScopeRef,
        list: &mut Vec<Partial>,
        name: &mut Option<String>,
        kind: DeclaratorKind,
    ) -> Result<()> {
        while self.consume(TokenKind::Star) {
            list.insert(0, Partial::Pointer);
            let mut quals = Quals::empty();
            while self.typequal(&mut quals)? {}
            if !quals.is_empty() {
                list.insert(0, Partial::Quals(quals));
            }
        }
        // Suffixes attach between whatever a nested declarator collects
        // and the pointers above; remember how much of the tail is ours.
        let anchor = list.len();
        match self.tok.kind {
            TokenKind::LParen => {
                self.next();
                // A '(' here is a function declarator when an abstract
                // declarator is allowed and the next token can only
                // start a parameter declaration. This is the single
                // place declarator parsing consults the scope: a
                // typedef name starts a parameter, any other
                // identifier a parenthesized declarator.
                let starts_params = kind != DeclaratorKind::Concrete
                    && self.tok.kind != TokenKind::Star
                    && (self.tok.kind != TokenKind::Ident
                        || self.is_typedef_name(scope, &self.tok.lexeme));
                if starts_params {
                    let func = self.func_params(scope)?;
                    let pos = list.len() - anchor;
                    list.insert(pos, func);
                } else {
                    self.declarator_partials(scope, list, name, kind)?;
                    self.expect(TokenKind::RParen, "after parenthesized declarator")?;
                }
            }
            TokenKind::Ident => {
                if kind == DeclaratorKind::Abstract {
                    return Err(self.error(ErrorKind::UnexpectedIdent));
                }
                *name = Some(self.tok.lexeme.clone());
                self.next();
            }
            _ => {
                if kind == DeclaratorKind::Concrete {
                    return Err(self.error(ErrorKind::ExpectedDeclarator));
                }
            }
        }
        loop {
            match self.tok.kind {
                TokenKind::LParen => {
                    self.next();
                    let func = self.func_params(scope)?;
                    let pos = list.len() - anchor;
                    list.insert(pos, func);
                }
                TokenKind::LBrack => {
                    self.next();
                    let mut quals = Quals::empty();
                    loop {
                        if self.tok.kind == TokenKind::Static {
                            // accepted, has no effect here
                            self.next();
                        } else if !self.typequal(&mut quals)? {
                            break;
                        }
                    }
                    if self.tok.kind == TokenKind::Star {
                        return Err(self.error(ErrorKind::Unsupported("variable length arrays")));
                    }
                    let len = if self.tok.kind == TokenKind::RBrack {
                        self.next();
                        0
                    } else {
                        let len = self.int_const_expr(scope)?;
                        self.expect(TokenKind::RBrack, "after array length")?;
                        len
                    };
                    if !quals.is_empty() {
                        let pos = list.len() - anchor;
                        list.insert(pos, Partial::Quals(quals));
                    }
                    let pos = list.len() - anchor;
                    list.insert(pos, Partial::Array(len));
                }
                _ => return Ok(()),
            }
        }
    }

    /// Parameter list of a function declarator, starting after the
    /// opening parenthesis.
    fn func_params(&mut self, scope: &ScopeRef) -> Result<Partial> {
        let mut params: Vec<Param> = Vec::new();
        let mut prototype = false;
        let mut vararg = false;
        match self.tok.kind {
            TokenKind::Ident if !self.is_typedef_name(scope, &self.tok.lexeme) => {
                // identifier list (old-style declaration); the types
                // arrive with the declarations before the body
                loop {
                    params.push(Param {
                        name: Some(self.tok.lexeme.clone()),
                        ty: RefCell::new(None),
                    });
                    self.next();
                    if !self.consume(TokenKind::Comma) {
                        break;
                    }
                    if self.tok.kind != TokenKind::Ident {
                        break;
                    }
                }
            }
            TokenKind::RParen => {}
            // a typedef name lands here: it begins a parameter
            // declaration, not an identifier list
            _ => {
                prototype = true;
                loop {
                    params.push(self.parameter(scope)?);
                    if !self.consume(TokenKind::Comma) {
                        break;
                    }
                    if self.consume(TokenKind::Ellipsis) {
                        vararg = true;
                        break;
                    }
                }
                // A single unnamed, unqualified `void` means "takes no
                // parameters"; `void` anywhere else is an error.
                let lone_void = params.len() == 1
                    && params[0].name.is_none()
                    && params[0].ty.borrow().as_ref().map_or(false, |t| t.is_void());
                if lone_void {
                    params.clear();
                } else if params.iter().any(|p| {
                    p.ty.borrow()
                        .as_ref()
                        .map_or(false, |t| unqualify(t).0.is_void())
                }) {
                    return Err(self.error(ErrorKind::VoidParam));
                }
            }
        }
        self.expect(TokenKind::RParen, "to close function declarator")?;
        let paraminfo = prototype || !params.is_empty() || self.tok.kind == TokenKind::LBrace;
        Ok(Partial::Func {
            params,
            prototype,
            vararg,
            paraminfo,
        })
    }

    /// One parameter declaration inside a prototype (C11 6.7.6.3).
    fn parameter(&mut self, scope: &ScopeRef) -> Result<Param> {
        let specs = self.declspecs(scope, Allow::STORAGE)?;
        let base = match specs.ty {
            Some(t) => t,
            None => return Err(self.error(ErrorKind::NoParamType)),
        };
        if !specs.sc.is_empty() && specs.sc != StorageClass::REGISTER {
            return Err(self.error(ErrorKind::ParamStorageClass));
        }
        let (name, ty) = self.declarator(scope, &base, DeclaratorKind::Any)?;
        let ty = self.ctx.adjust(&ty);
        Ok(Param {
            name,
            ty: RefCell::new(Some(ty)),
        })
    }

    /// One parameter declaration between an old-style function
    /// declarator and its body, binding the declared types onto the
    /// named parameters (C11 6.9.1p6).
    pub(crate) fn paramdecl(
        &mut self,
        scope: &ScopeRef,
        func: &crate::types::FuncType,
    ) -> Result<bool> {
        let specs = self.declspecs(scope, Allow::empty())?;
        let base = match specs.ty {
            Some(t) => t,
            None => return Ok(false),
        };
        loop {
            let (name, ty) = self.declarator(scope, &base, DeclaratorKind::Concrete)?;
            let ty = self.ctx.adjust(&ty);
            let name = name.expect("concrete declarator always has a name");
            {
                let params = func.params.borrow();
                match params.iter().find(|p| p.name.as_deref() == Some(name.as_str())) {
                    Some(p) => *p.ty.borrow_mut() = Some(ty),
                    None => return Err(self.error(ErrorKind::NoSuchParam(name))),
                }
            }
            if self.tok.kind == TokenKind::Semicolon {
                break;
            }
            self.expect(TokenKind::Comma, "or ';' after parameter declarator")?;
        }
        self.next();
        Ok(true)
    }
}
