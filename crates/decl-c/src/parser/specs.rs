//! Declaration specifiers (C11 6.7) and tag bodies (6.7.2.1, 6.7.2.2).

use bitflags::bitflags;

use crate::decl::{Decl, DeclKind, Linkage};
use crate::error::{ErrorKind, Result};
use crate::scope::ScopeRef;
use crate::token::TokenKind;
use crate::types::{align_up, make_qualified, unqualify, BasicKind, Member, Quals, TypeRef};

use super::declarator::DeclaratorKind;
use super::Parser;

bitflags! {
    /// Storage-class specifiers (C11 6.7.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct StorageClass: u8 {
        const TYPEDEF = 1;
        const EXTERN = 1 << 1;
        const STATIC = 1 << 2;
        const AUTO = 1 << 3;
        const REGISTER = 1 << 4;
        const THREAD_LOCAL = 1 << 5;
    }
}

bitflags! {
    /// Function specifiers (C11 6.7.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct FuncSpec: u8 {
        const INLINE = 1;
        const NORETURN = 1 << 1;
    }
}

bitflags! {
    /// Which specifier families the surrounding declaration accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Allow: u8 {
        const STORAGE = 1;
        const FUNCSPEC = 1 << 1;
        const ALIGN = 1 << 2;
    }
}

bitflags! {
    /// Accumulator for the primitive type specifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TypeSpec: u16 {
        const CHAR = 1;
        const INT = 1 << 1;
        const FLOAT = 1 << 2;
        const DOUBLE = 1 << 3;
        const SHORT = 1 << 4;
        const LONG = 1 << 5;
        const LONG2 = 1 << 6;
        const SIGNED = 1 << 7;
        const UNSIGNED = 1 << 8;
    }
}

const CHAR: u16 = TypeSpec::CHAR.bits();
const INT: u16 = TypeSpec::INT.bits();
const FLOAT: u16 = TypeSpec::FLOAT.bits();
const DOUBLE: u16 = TypeSpec::DOUBLE.bits();
const SHORT: u16 = TypeSpec::SHORT.bits();
const LONG: u16 = TypeSpec::LONG.bits();
const LONG_LONG: u16 = TypeSpec::LONG.bits() | TypeSpec::LONG2.bits();
const SIGNED: u16 = TypeSpec::SIGNED.bits();
const UNSIGNED: u16 = TypeSpec::UNSIGNED.bits();

/// Every legal combination of primitive type specifiers (C11 6.7.2p2),
/// mapped to its canonical basic type. Anything not listed is an error.
#[rustfmt::skip]
const SPEC_TABLE: &[(u16, BasicKind)] = &[
    (CHAR,                         BasicKind::Char),
    (SIGNED | CHAR,                BasicKind::SChar),
    (UNSIGNED | CHAR,              BasicKind::UChar),
    (SHORT,                        BasicKind::Short),
    (SHORT | INT,                  BasicKind::Short),
    (SIGNED | SHORT,               BasicKind::Short),
    (SIGNED | SHORT | INT,         BasicKind::Short),
    (UNSIGNED | SHORT,             BasicKind::UShort),
    (UNSIGNED | SHORT | INT,       BasicKind::UShort),
    (INT,                          BasicKind::Int),
    (SIGNED,                       BasicKind::Int),
    (SIGNED | INT,                 BasicKind::Int),
    (UNSIGNED,                     BasicKind::UInt),
    (UNSIGNED | INT,               BasicKind::UInt),
    (LONG,                         BasicKind::Long),
    (LONG | INT,                   BasicKind::Long),
    (SIGNED | LONG,                BasicKind::Long),
    (SIGNED | LONG | INT,          BasicKind::Long),
    (UNSIGNED | LONG,              BasicKind::ULong),
    (UNSIGNED | LONG | INT,        BasicKind::ULong),
    (LONG_LONG,                    BasicKind::LLong),
    (LONG_LONG | INT,              BasicKind::LLong),
    (SIGNED | LONG_LONG,           BasicKind::LLong),
    (SIGNED | LONG_LONG | INT,     BasicKind::LLong),
    (UNSIGNED | LONG_LONG,         BasicKind::ULLong),
    (UNSIGNED | LONG_LONG | INT,   BasicKind::ULLong),
    (FLOAT,                        BasicKind::Float),
    (DOUBLE,                       BasicKind::Double),
    (LONG | DOUBLE,                BasicKind::LongDouble),
];

/// Everything a run of declaration specifiers produces.
pub(crate) struct DeclSpecs {
    pub ty: Option<TypeRef>,
    pub sc: StorageClass,
    pub fs: FuncSpec,
    pub align: u64,
}

impl<'a> Parser<'a> {
    /// 6.7.3 Type qualifiers
    pub(crate) fn typequal(&mut self, quals: &mut Quals) -> Result<bool> {
        match self.tok.kind {
            TokenKind::Const => *quals |= Quals::CONST,
            TokenKind::Volatile => *quals |= Quals::VOLATILE,
            TokenKind::Restrict => *quals |= Quals::RESTRICT,
            TokenKind::Atomic => {
                return Err(self.error(ErrorKind::Unsupported("the '_Atomic' qualifier")))
            }
            _ => return Ok(false),
        }
        self.next();
        Ok(true)
    }

    /// 6.7.1 Storage-class specifiers
    fn storage_class(&mut self, sc: &mut StorageClass, allowed: bool) -> Result<bool> {
        let new = match self.tok.kind {
            TokenKind::Typedef => StorageClass::TYPEDEF,
            TokenKind::Extern => StorageClass::EXTERN,
            TokenKind::Static => StorageClass::STATIC,
            TokenKind::ThreadLocal => StorageClass::THREAD_LOCAL,
            TokenKind::Auto => StorageClass::AUTO,
            TokenKind::Register => StorageClass::REGISTER,
            _ => return Ok(false),
        };
        if !allowed {
            return Err(self.error(ErrorKind::StorageClassNotAllowed));
        }
        // at most one of typedef/extern/static/auto/register;
        // _Thread_local combines only with static and extern
        let ok = if sc.is_empty() {
            StorageClass::all()
        } else if *sc == StorageClass::THREAD_LOCAL {
            StorageClass::STATIC | StorageClass::EXTERN
        } else if *sc == StorageClass::STATIC || *sc == StorageClass::EXTERN {
            StorageClass::THREAD_LOCAL
        } else {
            StorageClass::empty()
        };
        if !ok.contains(new) {
            return Err(self.error(ErrorKind::StorageClassConflict));
        }
        *sc |= new;
        self.next();
        Ok(true)
    }

    /// 6.7.4 Function specifiers
    fn funcspec(&mut self, fs: &mut FuncSpec, allowed: bool) -> Result<bool> {
        let new = match self.tok.kind {
            TokenKind::Inline => FuncSpec::INLINE,
            TokenKind::Noreturn => FuncSpec::NORETURN,
            _ => return Ok(false),
        };
        if !allowed {
            return Err(self.error(ErrorKind::FuncSpecNotAllowed));
        }
        *fs |= new;
        self.next();
        Ok(true)
    }

    /// 6.7 Declaration specifiers. Returns `ty: None` if the lookahead
    /// does not begin any specifier at all.
    pub(crate) fn declspecs(&mut self, scope: &ScopeRef, allow: Allow) -> Result<DeclSpecs> {
        let mut sc = StorageClass::empty();
        let mut fs = FuncSpec::empty();
        let mut quals = Quals::empty();
        let mut ts = TypeSpec::empty();
        let mut ty: Option<TypeRef> = None;
        let mut align: u64 = 0;
        let mut ntypes = 0;
        loop {
            if self.typequal(&mut quals)?
                || self.storage_class(&mut sc, allow.contains(Allow::STORAGE))?
                || self.funcspec(&mut fs, allow.contains(Allow::FUNCSPEC))?
            {
                continue;
            }
            match self.tok.kind {
                // 6.7.2 Type specifiers
                TokenKind::Void => {
                    ty = Some(self.ctx.void_type());
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Bool => {
                    ty = Some(self.ctx.basic(BasicKind::Bool));
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Char => {
                    ts |= TypeSpec::CHAR;
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Short => {
                    if ts.contains(TypeSpec::SHORT) {
                        return Err(self.error(ErrorKind::DuplicateSpecifier("short")));
                    }
                    ts |= TypeSpec::SHORT;
                    self.next();
                }
                TokenKind::Int => {
                    ts |= TypeSpec::INT;
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Long => {
                    if ts.contains(TypeSpec::LONG2) {
                        return Err(self.error(ErrorKind::TooManyLong));
                    }
                    if ts.contains(TypeSpec::LONG) {
                        ts |= TypeSpec::LONG2;
                    }
                    ts |= TypeSpec::LONG;
                    self.next();
                }
                TokenKind::Float => {
                    ts |= TypeSpec::FLOAT;
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Double => {
                    ts |= TypeSpec::DOUBLE;
                    ntypes += 1;
                    self.next();
                }
                TokenKind::Signed => {
                    if ts.contains(TypeSpec::SIGNED) {
                        return Err(self.error(ErrorKind::DuplicateSpecifier("signed")));
                    }
                    ts |= TypeSpec::SIGNED;
                    self.next();
                }
                TokenKind::Unsigned => {
                    if ts.contains(TypeSpec::UNSIGNED) {
                        return Err(self.error(ErrorKind::DuplicateSpecifier("unsigned")));
                    }
                    ts |= TypeSpec::UNSIGNED;
                    self.next();
                }
                TokenKind::Complex => {
                    return Err(self.error(ErrorKind::Unsupported("'_Complex'")))
                }
                TokenKind::Imaginary => {
                    return Err(self.error(ErrorKind::Unsupported("'_Imaginary'")))
                }
                TokenKind::Struct | TokenKind::Union | TokenKind::Enum => {
                    ty = Some(self.tagspec(scope)?);
                    ntypes += 1;
                }
                TokenKind::Ident => {
                    // an identifier is a type specifier only if no type
                    // specifier has been seen yet and it names a typedef
                    if ty.is_some() || !ts.is_empty() {
                        break;
                    }
                    match scope.get_decl(&self.tok.lexeme, true) {
                        Some(d) if d.kind == DeclKind::Typedef => {
                            ty = Some(d.ty());
                            ntypes += 1;
                            self.next();
                        }
                        _ => break,
                    }
                }
                // 6.7.5 Alignment specifier
                TokenKind::Alignas => {
                    if !allow.contains(Allow::ALIGN) {
                        return Err(self.error(ErrorKind::AlignasNotAllowed));
                    }
                    self.next();
                    self.expect(TokenKind::LParen, "after '_Alignas'")?;
                    match self.typename(scope)? {
                        Some(t) => align = t.align.get(),
                        None => {
                            let v = self.int_const_expr(scope)?;
                            if v == 0 || v & (v - 1) != 0 || v > 16 {
                                return Err(self.error(ErrorKind::InvalidAlignment(v)));
                            }
                            align = v;
                        }
                    }
                    self.expect(TokenKind::RParen, "to close '_Alignas' specifier")?;
                }
                _ => break,
            }
            if ntypes > 1 || (ty.is_some() && !ts.is_empty()) {
                return Err(self.error(ErrorKind::MultipleTypes));
            }
        }
        let ty = if ts.is_empty() {
            ty
        } else {
            let kind = SPEC_TABLE
                .iter()
                .find(|(bits, _)| *bits == ts.bits())
                .map(|(_, kind)| *kind)
                .ok_or_else(|| self.error(ErrorKind::InvalidTypeSpec))?;
            Some(self.ctx.basic(kind))
        };
        if ty.is_none() && (!quals.is_empty() || !sc.is_empty() || !fs.is_empty()) {
            return Err(self.error(ErrorKind::NoTypeSpec));
        }
        Ok(DeclSpecs {
            ty: ty.map(|t| make_qualified(&t, quals)),
            sc,
            fs,
            align,
        })
    }

    /// 6.7.2.1, 6.7.2.2 Struct, union and enum specifiers.
    pub(crate) fn tagspec(&mut self, scope: &ScopeRef) -> Result<TypeRef> {
        #[derive(Clone, Copy, PartialEq)]
        enum Tag {
            Struct,
            Union,
            Enum,
        }
        let tag_kind = match self.tok.kind {
            TokenKind::Struct => Tag::Struct,
            TokenKind::Union => Tag::Union,
            TokenKind::Enum => Tag::Enum,
            _ => unreachable!("tagspec called away from a tag keyword"),
        };
        self.next();
        let mut tag: Option<String> = None;
        let mut ty: Option<TypeRef> = None;
        if self.tok.kind == TokenKind::Ident {
            let name = self.tok.lexeme.clone();
            self.next();
            ty = scope.get_tag(&name, false);
            // a reference (no body, and for struct/union not a bare
            // forward declaration either) may resolve to an enclosing
            // scope's tag
            if ty.is_none()
                && self.tok.kind != TokenKind::LBrace
                && (tag_kind == Tag::Enum || self.tok.kind != TokenKind::Semicolon)
            {
                if let Some(parent) = scope.parent() {
                    ty = parent.get_tag(&name, true);
                }
            }
            tag = Some(name);
        } else if self.tok.kind != TokenKind::LBrace {
            return Err(self.error(ErrorKind::Expected {
                expected: "identifier or '{' after struct/union/enum".to_string(),
                found: self.tok.to_string(),
            }));
        }
        let ty = match ty {
            Some(t) => {
                let kind_matches = match (&t.kind, tag_kind) {
                    (crate::types::TypeKind::Struct(_), Tag::Struct) => true,
                    (crate::types::TypeKind::Union(_), Tag::Union) => true,
                    (crate::types::TypeKind::Basic(b), Tag::Enum) => b.kind == BasicKind::Enum,
                    _ => false,
                };
                if !kind_matches {
                    return Err(self.error(ErrorKind::TagKindMismatch(
                        tag.clone().unwrap_or_default(),
                    )));
                }
                t
            }
            None => {
                let t = match tag_kind {
                    Tag::Struct => self.ctx.make_struct(tag.clone()),
                    Tag::Union => self.ctx.make_union(tag.clone()),
                    Tag::Enum => self.ctx.make_enum(),
                };
                if let Some(name) = &tag {
                    scope.put_tag(name.clone(), t.clone());
                }
                t
            }
        };
        if self.tok.kind != TokenKind::LBrace {
            return Ok(ty);
        }
        if !ty.incomplete.get() {
            return Err(self.error(ErrorKind::TagRedefinition(tag.clone().unwrap_or_default())));
        }
        self.next();
        if ty.as_record().is_some() {
            loop {
                self.structdecl(scope, &ty)?;
                if self.tok.kind == TokenKind::RBrace {
                    break;
                }
            }
            self.next();
            ty.size.set(align_up(ty.size.get(), ty.align.get()));
            ty.incomplete.set(false);
            log::debug!(
                "completed {:?}: size={} align={}",
                ty,
                ty.size.get(),
                ty.align.get()
            );
        } else {
            // enumerator list; the constants land in the enclosing scope
            let mut value: u64 = 0;
            while self.tok.kind == TokenKind::Ident {
                let name = self.tok.lexeme.clone();
                let d = Decl::new(DeclKind::EnumConst, self.ctx.basic(BasicKind::Int), Linkage::None);
                scope.put_decl(name, d.clone());
                self.next();
                if self.consume(TokenKind::Assign) {
                    value = self.int_const_expr(scope)?;
                }
                d.value.set(Some(self.backend.make_int_const(ty.repr.get(), value)));
                value = value.wrapping_add(1);
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "to close enum specifier")?;
            ty.incomplete.set(false);
        }
        Ok(ty)
    }

    /// One member declaration inside a struct or union body.
    fn structdecl(&mut self, scope: &ScopeRef, ty: &TypeRef) -> Result<()> {
        let specs = self.declspecs(scope, Allow::ALIGN)?;
        let base = match specs.ty {
            Some(t) => t,
            None => return Err(self.error(ErrorKind::NoMemberType)),
        };
        if self.tok.kind == TokenKind::Semicolon {
            // only an untagged struct or union may stand alone as an
            // anonymous member
            let anonymous_ok = base.as_record().map_or(false, |(r, _)| r.tag.is_none());
            if !anonymous_ok {
                return Err(self.error(ErrorKind::NoMembers));
            }
            self.next();
            return self.add_member(ty, &base, None, specs.align);
        }
        loop {
            if self.tok.kind != TokenKind::Colon {
                let (name, member_ty) = self.declarator(scope, &base, DeclaratorKind::Concrete)?;
                self.add_member(ty, &member_ty, name, specs.align)?;
            }
            if self.tok.kind == TokenKind::Colon {
                return Err(self.error(ErrorKind::Unsupported("bit-fields")));
            }
            if self.tok.kind == TokenKind::Semicolon {
                break;
            }
            self.expect(TokenKind::Comma, "or ';' after declarator")?;
        }
        self.next();
        Ok(())
    }

    /// Append a member, maintaining the running layout: the member is
    /// placed at the next multiple of its alignment (or offset 0 in a
    /// union), and the record's size and alignment grow to cover it.
    fn add_member(
        &self,
        ty: &TypeRef,
        member_ty: &TypeRef,
        name: Option<String>,
        explicit_align: u64,
    ) -> Result<()> {
        let shown = name.clone().unwrap_or_else(|| "<anonymous>".to_string());
        let (stripped, _) = unqualify(member_ty);
        if stripped.is_func() {
            return Err(self.error(ErrorKind::FuncMember(shown)));
        }
        if member_ty.incomplete.get() && stripped.is_array() {
            return Err(self.error(ErrorKind::Unsupported("flexible array members")));
        }
        // zero alignment marks an array of an incomplete element type
        if member_ty.incomplete.get() || member_ty.align.get() == 0 {
            return Err(self.error(ErrorKind::IncompleteMember(shown)));
        }
        let align = explicit_align.max(member_ty.align.get());
        let (record, is_union) = ty.as_record().expect("member added to a non-record type");
        ty.size.set(align_up(ty.size.get(), align));
        let offset = if is_union { 0 } else { ty.size.get() };
        if is_union {
            ty.size.set(ty.size.get().max(member_ty.size.get()));
        } else {
            ty.size.set(ty.size.get() + member_ty.size.get());
        }
        if ty.align.get() < align {
            ty.align.set(align);
        }
        record.members.borrow_mut().push(Member {
            name,
            ty: member_ty.clone(),
            offset,
        });
        Ok(())
    }
}
