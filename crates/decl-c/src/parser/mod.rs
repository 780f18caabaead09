//! The declaration driver.
//!
//! [`Parser::decl`] consumes one external or block declaration:
//! specifiers, a comma-separated declarator list, and for functions
//! possibly a definition. It installs or merges the results into the
//! scope, keeps the tentative-definition bookkeeping, and hands
//! finished objects and functions to the back-end.

mod declarator;
mod specs;

use std::rc::Rc;

use crate::backend::{Backend, Func, Init, InitValue};
use crate::context::Context;
use crate::decl::{Decl, DeclKind, DeclRef, Linkage};
use crate::error::{Error, ErrorKind, Result};
use crate::hooks::{Hooks, StringLit};
use crate::scope::{Scope, ScopeRef};
use crate::span::Loc;
use crate::token::{Token, TokenKind, TokenSource};
use crate::types::{compatible, composite, same, TypeRef};

use declarator::DeclaratorKind;
use specs::{Allow, DeclSpecs, FuncSpec, StorageClass};

/// Declaration processor over a classified token stream.
pub struct Parser<'a> {
    pub(crate) ctx: &'a Context,
    src: &'a mut dyn TokenSource,
    pub(crate) tok: Token,
    hooks: Rc<dyn Hooks + 'a>,
    pub(crate) backend: &'a mut dyn Backend,
}

impl<'a> Parser<'a> {
    pub fn new(
        ctx: &'a Context,
        src: &'a mut dyn TokenSource,
        hooks: Rc<dyn Hooks + 'a>,
        backend: &'a mut dyn Backend,
    ) -> Parser<'a> {
        let tok = src.next().unwrap_or_else(|| Token::eof(Loc::builtin()));
        Parser {
            ctx,
            src,
            tok,
            hooks,
            backend,
        }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// The current token.
    pub fn tok(&self) -> &Token {
        &self.tok
    }

    pub fn backend(&mut self) -> &mut dyn Backend {
        &mut *self.backend
    }

    /// Advance past the current token and return it.
    pub fn next(&mut self) -> Token {
        let eof_loc = self.tok.loc.clone();
        let next = self.src.next().unwrap_or_else(|| Token::eof(eof_loc));
        std::mem::replace(&mut self.tok, next)
    }

    /// Advance past the current token if it has the given kind.
    pub fn consume(&mut self, kind: TokenKind) -> bool {
        if self.tok.kind == kind {
            self.next();
            true
        } else {
            false
        }
    }

    /// Require a token of the given kind; `context` finishes the
    /// "expected X ..." message.
    pub fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token> {
        if self.tok.kind != kind {
            return Err(self.error(ErrorKind::Expected {
                expected: format!("'{}' {}", kind.spelling(), context),
                found: self.tok.to_string(),
            }));
        }
        Ok(self.next())
    }

    pub(crate) fn error(&self, kind: ErrorKind) -> Error {
        Error::new(self.tok.loc.clone(), kind)
    }

    /// Whether `name` is visible as a typedef. The declarator grammar
    /// consults the scope through this predicate alone.
    pub(crate) fn is_typedef_name(&self, scope: &ScopeRef, name: &str) -> bool {
        matches!(scope.get_decl(name, true), Some(d) if d.kind == DeclKind::Typedef)
    }

    pub(crate) fn int_const_expr(&mut self, scope: &ScopeRef) -> Result<u64> {
        let hooks = self.hooks.clone();
        hooks.int_const_expr(self, scope)
    }

    fn parse_init(&mut self, scope: &ScopeRef, ty: &TypeRef) -> Result<(TypeRef, Init)> {
        let hooks = self.hooks.clone();
        hooks.parse_init(self, scope, ty)
    }

    fn stmt(&mut self, func: &mut Func, scope: &ScopeRef) -> Result<()> {
        let hooks = self.hooks.clone();
        hooks.stmt(self, func, scope)
    }

    /// Parse a type name (C11 6.7.7): specifiers plus an abstract
    /// declarator. Returns `None` when the lookahead does not begin a
    /// type.
    pub fn typename(&mut self, scope: &ScopeRef) -> Result<Option<TypeRef>> {
        let specs = self.declspecs(scope, Allow::empty())?;
        match specs.ty {
            Some(base) => {
                let (_, ty) = self.declarator(scope, &base, DeclaratorKind::Abstract)?;
                Ok(Some(ty))
            }
            None => Ok(None),
        }
    }

    /// 6.7.10 Static assertions; the introducing keyword has been
    /// consumed.
    fn static_assert(&mut self, scope: &ScopeRef) -> Result<()> {
        self.expect(TokenKind::LParen, "after '_Static_assert'")?;
        let value = self.int_const_expr(scope)?;
        self.expect(TokenKind::Comma, "after static assertion expression")?;
        self.expect(TokenKind::StringLit, "after static assertion expression")?;
        if value == 0 {
            return Err(self.error(ErrorKind::StaticAssertFailed));
        }
        self.expect(TokenKind::RParen, "after static assertion message")?;
        self.expect(TokenKind::Semicolon, "after static assertion")?;
        Ok(())
    }

    /// Parse one declaration (C11 6.7) or function definition (6.9.1).
    /// `func` is the enclosing function for block-scope declarations.
    /// Returns false, consuming nothing, if the lookahead cannot begin
    /// a declaration.
    pub fn decl(&mut self, scope: &ScopeRef, mut func: Option<&mut Func>) -> Result<bool> {
        if self.consume(TokenKind::StaticAssert) {
            self.static_assert(scope)?;
            return Ok(true);
        }
        let specs = self.declspecs(scope, Allow::STORAGE | Allow::FUNCSPEC | Allow::ALIGN)?;
        let base = match &specs.ty {
            Some(t) => t.clone(),
            None => return Ok(false),
        };
        if func.is_none() {
            // 6.9p2
            if specs.sc.contains(StorageClass::AUTO) {
                return Err(self.error(ErrorKind::FileScopeStorage("auto")));
            }
            if specs.sc.contains(StorageClass::REGISTER) {
                return Err(self.error(ErrorKind::FileScopeStorage("register")));
            }
        }
        if self.consume(TokenKind::Semicolon) {
            // the specifiers declared a tag or enumeration by themselves
            return Ok(true);
        }
        let mut allow_func_def = func.is_none();
        loop {
            let (name, ty) = self.declarator(scope, &base, DeclaratorKind::Concrete)?;
            let name = name.expect("concrete declarator always has a name");
            let kind = if specs.sc.contains(StorageClass::TYPEDEF) {
                DeclKind::Typedef
            } else if ty.is_func() {
                DeclKind::Func
            } else {
                DeclKind::Object
            };
            if let Some(prior) = scope.get_decl(&name, false) {
                if prior.kind != kind {
                    return Err(self.error(ErrorKind::KindMismatch(name)));
                }
            }
            match kind {
                DeclKind::Typedef => self.typedef_decl(scope, name, ty, &specs)?,
                DeclKind::Object => {
                    self.object_decl(scope, func.as_deref_mut(), name, ty, &specs)?
                }
                DeclKind::Func => {
                    let defined =
                        self.func_decl(scope, func.is_some(), allow_func_def, name, ty, &specs)?;
                    if defined {
                        return Ok(true);
                    }
                }
                DeclKind::EnumConst => {
                    unreachable!("enum constants are installed by the tag parser")
                }
            }
            match self.tok.kind {
                TokenKind::Comma => {
                    self.next();
                    allow_func_def = false;
                }
                TokenKind::Semicolon => {
                    self.next();
                    return Ok(true);
                }
                _ => {
                    return Err(self.error(ErrorKind::Expected {
                        expected: "',' or ';' after declarator".to_string(),
                        found: self.tok.to_string(),
                    }))
                }
            }
        }
    }

    fn typedef_decl(
        &mut self,
        scope: &ScopeRef,
        name: String,
        ty: TypeRef,
        specs: &DeclSpecs,
    ) -> Result<()> {
        if specs.align != 0 {
            return Err(self.error(ErrorKind::AlignedTypedef(name)));
        }
        match scope.get_decl(&name, false) {
            None => {
                log::debug!("typedef {} = {:?}", name, ty);
                scope.put_decl(name, Decl::new(DeclKind::Typedef, ty, Linkage::None));
            }
            Some(prior) => {
                if !same(&prior.ty(), &ty) {
                    return Err(self.error(ErrorKind::TypedefMismatch(name)));
                }
            }
        }
        Ok(())
    }

    /// The storage-class and linkage state machine for objects
    /// (C11 6.2.2, 6.9.2).
    fn object_decl(
        &mut self,
        scope: &ScopeRef,
        func: Option<&mut Func>,
        name: String,
        ty: TypeRef,
        specs: &DeclSpecs,
    ) -> Result<()> {
        let at_block = func.is_some();
        let mut ty = ty;
        let d = match scope.get_decl(&name, false) {
            Some(prior) => {
                if prior.linkage == Linkage::None {
                    // kept from the reference behavior even where the
                    // standard would permit it; see DESIGN.md
                    return Err(self.error(ErrorKind::NoLinkageRedeclared(name)));
                }
                if !specs.sc.contains(StorageClass::EXTERN) {
                    let linkage = if at_block {
                        Linkage::None
                    } else if specs.sc.contains(StorageClass::STATIC) {
                        Linkage::Internal
                    } else {
                        Linkage::External
                    };
                    if prior.linkage != linkage {
                        return Err(self.error(ErrorKind::LinkageMismatch(name)));
                    }
                }
                if !compatible(&prior.ty(), &ty) {
                    return Err(self.error(ErrorKind::Incompatible(name)));
                }
                let merged = composite(&ty, &prior.ty());
                *prior.ty.borrow_mut() = merged;
                prior
            }
            None => {
                let linkage;
                if specs.sc.contains(StorageClass::EXTERN) {
                    // block-scope extern inherits the linkage of a
                    // visible declaration, and redeclares the
                    // file-scope entry if there is one
                    let visible = scope.parent().and_then(|p| p.get_decl(&name, true));
                    linkage = match &visible {
                        Some(v) if v.linkage != Linkage::None => v.linkage,
                        _ => Linkage::External,
                    };
                    if let Some(filed) = self.ctx.file_scope().get_decl(&name, false) {
                        if filed.linkage != linkage {
                            return Err(self.error(ErrorKind::LinkageMismatch(name)));
                        }
                        if !compatible(&filed.ty(), &ty) {
                            return Err(self.error(ErrorKind::Incompatible(name)));
                        }
                        ty = composite(&ty, &filed.ty());
                    }
                } else {
                    linkage = if at_block {
                        Linkage::None
                    } else if specs.sc.contains(StorageClass::STATIC) {
                        Linkage::Internal
                    } else {
                        Linkage::External
                    };
                }
                let d = Decl::new(DeclKind::Object, ty.clone(), linkage);
                scope.put_decl(name.clone(), d.clone());
                if linkage != Linkage::None || specs.sc.contains(StorageClass::STATIC) {
                    d.value
                        .set(Some(self.backend.make_global(&name, linkage == Linkage::None)));
                }
                d
            }
        };
        if d.align.get() < specs.align {
            d.align.set(specs.align);
        }
        let init = if self.consume(TokenKind::Assign) {
            if at_block && d.linkage != Linkage::None {
                return Err(self.error(ErrorKind::BlockLinkageInit(name)));
            }
            if d.defined.get() {
                return Err(self.error(ErrorKind::Redefined(name)));
            }
            // the initializer may complete an incomplete array type
            let (completed, init) = self.parse_init(scope, &d.ty())?;
            *d.ty.borrow_mut() = completed;
            Some(init)
        } else {
            None
        };
        if specs.sc.contains(StorageClass::EXTERN) {
            return Ok(());
        }
        if init.is_some() || at_block {
            if d.linkage != Linkage::None || specs.sc.contains(StorageClass::STATIC) {
                self.backend.emit_data(&d, init.as_ref());
            } else {
                let f = func.expect("an object with no linkage occurs inside a function");
                self.backend.func_init(f, &d, init.as_ref());
            }
            d.defined.set(true);
            if d.tentative.get() {
                d.tentative.set(false);
                self.ctx.remove_tentative(&d);
            }
        } else if !d.defined.get() && !d.tentative.get() {
            log::debug!("tentative definition of '{}'", name);
            d.tentative.set(true);
            self.ctx.add_tentative(&d);
        }
        Ok(())
    }

    /// Function declarations and definitions. Returns true when a
    /// definition, body included, was consumed.
    fn func_decl(
        &mut self,
        scope: &ScopeRef,
        at_block: bool,
        allow_func_def: bool,
        name: String,
        ty: TypeRef,
        specs: &DeclSpecs,
    ) -> Result<bool> {
        if specs.align != 0 {
            return Err(self.error(ErrorKind::AlignedFunc(name)));
        }
        {
            let func_ty = ty
                .as_func()
                .expect("function declaration with a non-function type");
            if specs.fs.contains(FuncSpec::NORETURN) {
                func_ty.noreturn.set(true);
            }
            if at_block && !specs.sc.is_empty() && specs.sc != StorageClass::EXTERN {
                // 6.7.1p7
                return Err(self.error(ErrorKind::BlockFuncStorage(name)));
            }
            if !func_ty.prototype && !func_ty.params.borrow().is_empty() {
                // old-style identifier list: collect the parameter
                // types before any compatibility check
                if !allow_func_def {
                    return Err(self.error(ErrorKind::FuncDefNotAllowed));
                }
                while self.paramdecl(scope, func_ty)? {}
                if self.tok.kind != TokenKind::LBrace {
                    return Err(self.error(ErrorKind::IdentListNotDefinition));
                }
                for p in func_ty.params.borrow().iter() {
                    if p.ty.borrow().is_none() {
                        let param = p.name.clone().unwrap_or_default();
                        return Err(self.error(ErrorKind::UntypedParam(param)));
                    }
                }
            }
        }
        let mut ty = ty;
        let d = match scope.get_decl(&name, false) {
            Some(prior) => {
                if !compatible(&ty, &prior.ty()) {
                    return Err(self.error(ErrorKind::Incompatible(name)));
                }
                let merged = composite(&ty, &prior.ty());
                *prior.ty.borrow_mut() = merged;
                prior
            }
            None => {
                let visible = scope.parent().and_then(|p| p.get_decl(&name, true));
                let linkage = match &visible {
                    Some(v) if v.linkage != Linkage::None => {
                        if !compatible(&ty, &v.ty()) {
                            return Err(self.error(ErrorKind::Incompatible(name)));
                        }
                        ty = composite(&ty, &v.ty());
                        v.linkage
                    }
                    _ => {
                        if specs.sc.contains(StorageClass::STATIC) {
                            Linkage::Internal
                        } else {
                            Linkage::External
                        }
                    }
                };
                let d = Decl::new(DeclKind::Func, ty.clone(), linkage);
                d.value.set(Some(self.backend.make_global(&name, false)));
                scope.put_decl(name.clone(), d.clone());
                d
            }
        };
        if self.tok.kind == TokenKind::LBrace {
            if !allow_func_def {
                return Err(self.error(ErrorKind::FuncDefNotAllowed));
            }
            if d.defined.get() {
                return Err(self.error(ErrorKind::Redefined(name)));
            }
            log::debug!("defining function '{}'", name);
            let body_scope = Scope::push(&self.ctx.file_scope());
            let mut func = self.backend.make_func(&name, &ty, &body_scope);
            self.stmt(&mut func, &body_scope)?;
            self.backend.emit_func(&func, d.linkage == Linkage::External);
            d.defined.set(true);
            return Ok(true);
        }
        Ok(false)
    }

    /// Declaration backing a string literal. Identical literals share
    /// one anonymous private object for the whole translation unit.
    pub fn string_decl(&mut self, lit: &StringLit) -> DeclRef {
        if let Some(d) = self.ctx.string_lookup(&lit.data) {
            return d;
        }
        let d = Decl::new(DeclKind::Object, lit.ty.clone(), Linkage::None);
        d.value.set(Some(self.backend.make_global("string", true)));
        let init = Init {
            offset: 0,
            size: lit.ty.size.get(),
            value: InitValue::Bytes(lit.data.clone()),
        };
        self.backend.emit_data(&d, Some(&init));
        self.ctx.string_insert(lit.data.clone(), d.clone());
        d
    }

    /// Give every object still tentative at the end of the translation
    /// unit a zero-initialized definition (C11 6.9.2p2), in
    /// declaration order.
    pub fn emit_tentative_defns(&mut self) {
        let defns = self.ctx.tentative_defns();
        log::debug!("flushing {} tentative definitions", defns.len());
        for d in defns {
            self.backend.emit_data(&d, None);
        }
    }
}
