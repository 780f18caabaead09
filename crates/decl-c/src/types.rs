//! Canonical C types.
//!
//! Types are reference-counted and shared pervasively: one `int`
//! singleton per translation unit, one type object per tag. A type is
//! immutable once complete; the only sanctioned mutations are the
//! single incomplete-to-complete transition of a tag, the binding of
//! old-style parameter types, and the merge of `_Noreturn` into a
//! function type.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::backend::Repr;

pub type TypeRef = Rc<Type>;

bitflags! {
    /// Type qualifier set (C11 6.7.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Quals: u8 {
        const CONST = 1;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

/// Kinds of basic type (C11 6.2.5). Each enumeration gets its own
/// distinct type object with kind `Enum`; everything else is a
/// per-translation-unit singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LLong,
    ULLong,
    Enum,
    Float,
    Double,
    LongDouble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicType {
    pub kind: BasicKind,
    /// Signedness of the representation. For plain `char` this is a
    /// target property.
    pub signed: bool,
}

#[derive(Debug)]
pub struct ArrayType {
    pub elem: TypeRef,
    /// Element count; 0 denotes an incomplete array.
    pub len: u64,
}

#[derive(Debug)]
pub struct FuncType {
    pub ret: TypeRef,
    pub params: RefCell<Vec<Param>>,
    /// Declared with a parameter type list, as opposed to an
    /// identifier list or empty parentheses.
    pub prototype: bool,
    pub vararg: bool,
    pub noreturn: Cell<bool>,
    /// Whether anything is known about the parameters: a prototype, a
    /// named identifier list, or an old-style definition.
    pub paraminfo: bool,
}

/// A function parameter. Old-style parameters carry no type until the
/// declarations between declarator and body are processed.
#[derive(Debug)]
pub struct Param {
    pub name: Option<String>,
    pub ty: RefCell<Option<TypeRef>>,
}

impl Param {
    pub fn named(name: impl Into<String>, ty: TypeRef) -> Param {
        Param {
            name: Some(name.into()),
            ty: RefCell::new(Some(ty)),
        }
    }
}

#[derive(Debug)]
pub struct RecordType {
    pub tag: Option<String>,
    pub members: RefCell<Vec<Member>>,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: Option<String>,
    pub ty: TypeRef,
    pub offset: u64,
}

#[derive(Debug)]
pub enum TypeKind {
    Void,
    Basic(BasicType),
    Pointer(TypeRef),
    Array(ArrayType),
    Func(FuncType),
    Struct(RecordType),
    Union(RecordType),
    Qualified(TypeRef, Quals),
}

pub struct Type {
    pub kind: TypeKind,
    pub size: Cell<u64>,
    pub align: Cell<u64>,
    pub repr: Cell<Repr>,
    pub incomplete: Cell<bool>,
}

impl Type {
    pub(crate) fn new(kind: TypeKind, size: u64, align: u64, repr: Repr, incomplete: bool) -> TypeRef {
        Rc::new(Type {
            kind,
            size: Cell::new(size),
            align: Cell::new(align),
            repr: Cell::new(repr),
            incomplete: Cell::new(incomplete),
        })
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_func(&self) -> bool {
        matches!(self.kind, TypeKind::Func(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array(_))
    }

    pub fn as_func(&self) -> Option<&FuncType> {
        match &self.kind {
            TypeKind::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The record payload and whether it is a union.
    pub fn as_record(&self) -> Option<(&RecordType, bool)> {
        match &self.kind {
            TypeKind::Struct(r) => Some((r, false)),
            TypeKind::Union(r) => Some((r, true)),
            _ => None,
        }
    }

    pub fn basic_kind(&self) -> Option<BasicKind> {
        match &self.kind {
            TypeKind::Basic(b) => Some(b.kind),
            _ => None,
        }
    }
}

// Types are cyclic through pointers to incomplete records, so Debug
// prints records by tag only.
impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Void => f.write_str("void"),
            TypeKind::Basic(b) => write!(f, "{:?}", b.kind),
            TypeKind::Pointer(base) => write!(f, "*{:?}", base),
            TypeKind::Array(a) => write!(f, "[{}]{:?}", a.len, a.elem),
            TypeKind::Func(func) => {
                f.write_str("fn(")?;
                for (i, p) in func.params.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match &*p.ty.borrow() {
                        Some(t) => write!(f, "{:?}", t)?,
                        None => f.write_str("?")?,
                    }
                }
                if func.vararg {
                    f.write_str(", ...")?;
                }
                write!(f, ") -> {:?}", func.ret)
            }
            TypeKind::Struct(r) => write!(f, "struct {}", r.tag.as_deref().unwrap_or("<anonymous>")),
            TypeKind::Union(r) => write!(f, "union {}", r.tag.as_deref().unwrap_or("<anonymous>")),
            TypeKind::Qualified(base, q) => write!(f, "{:?} {:?}", q, base),
        }
    }
}

pub(crate) fn align_up(x: u64, align: u64) -> u64 {
    (x + align - 1) / align * align
}

/// Wrap `base` in a qualifier wrapper. A no-op for an empty set;
/// qualifying an already-qualified type merges the sets instead of
/// nesting wrappers.
pub fn make_qualified(base: &TypeRef, quals: Quals) -> TypeRef {
    if quals.is_empty() {
        return base.clone();
    }
    let (inner, merged) = match &base.kind {
        TypeKind::Qualified(inner, q) => (inner.clone(), *q | quals),
        _ => (base.clone(), quals),
    };
    Type::new(
        TypeKind::Qualified(inner, merged),
        base.size.get(),
        base.align.get(),
        base.repr.get(),
        base.incomplete.get(),
    )
}

/// Peel at most one qualifier wrapper.
pub fn unqualify(t: &TypeRef) -> (TypeRef, Quals) {
    match &t.kind {
        TypeKind::Qualified(base, q) => (base.clone(), *q),
        _ => (t.clone(), Quals::empty()),
    }
}

fn peel_quals(t: &TypeRef) -> (TypeRef, Quals) {
    let mut t = t.clone();
    let mut quals = Quals::empty();
    loop {
        let base = match &t.kind {
            TypeKind::Qualified(base, q) => {
                quals |= *q;
                base.clone()
            }
            _ => break,
        };
        t = base;
    }
    (t, quals)
}

/// Structural equality. Qualifiers are compared as merged sets, so the
/// nesting of wrappers does not matter; basic and tag types compare by
/// identity (each tag is its own type object).
pub fn same(a: &TypeRef, b: &TypeRef) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let (a, qa) = peel_quals(a);
    let (b, qb) = peel_quals(b);
    if qa != qb {
        return false;
    }
    match (&a.kind, &b.kind) {
        (TypeKind::Void, TypeKind::Void) => true,
        (TypeKind::Basic(_), TypeKind::Basic(_)) => Rc::ptr_eq(&a, &b),
        (TypeKind::Struct(_), TypeKind::Struct(_)) => Rc::ptr_eq(&a, &b),
        (TypeKind::Union(_), TypeKind::Union(_)) => Rc::ptr_eq(&a, &b),
        (TypeKind::Pointer(x), TypeKind::Pointer(y)) => same(x, y),
        (TypeKind::Array(x), TypeKind::Array(y)) => x.len == y.len && same(&x.elem, &y.elem),
        (TypeKind::Func(x), TypeKind::Func(y)) => {
            if x.prototype != y.prototype || x.vararg != y.vararg || !same(&x.ret, &y.ret) {
                return false;
            }
            let xp = x.params.borrow();
            let yp = y.params.borrow();
            xp.len() == yp.len()
                && xp.iter().zip(yp.iter()).all(|(p, q)| {
                    match (&*p.ty.borrow(), &*q.ty.borrow()) {
                        (Some(s), Some(t)) => same(s, t),
                        (None, None) => true,
                        _ => false,
                    }
                })
        }
        _ => false,
    }
}

/// Whether a type is unchanged by the default argument promotions
/// (C11 6.5.2.2p6).
fn promotes_unchanged(t: &TypeRef) -> bool {
    use BasicKind::*;
    let (t, _) = peel_quals(t);
    match &t.kind {
        TypeKind::Basic(b) => !matches!(b.kind, Bool | Char | SChar | UChar | Short | UShort | Float),
        _ => true,
    }
}

fn param_types_compatible(x: &FuncType, y: &FuncType) -> bool {
    let xp = x.params.borrow();
    let yp = y.params.borrow();
    if xp.len() != yp.len() {
        return false;
    }
    xp.iter().zip(yp.iter()).all(|(p, q)| {
        match (&*p.ty.borrow(), &*q.ty.borrow()) {
            // parameter compatibility ignores top-level qualifiers
            (Some(s), Some(t)) => compatible(&peel_quals(s).0, &peel_quals(t).0),
            (None, None) => true,
            _ => false,
        }
    })
}

/// A prototype is compatible with an unprototyped declaration of the
/// same function provided it is not variadic and every parameter type
/// survives the default argument promotions (C11 6.7.6.3p15).
fn proto_compatible_with_unprototyped(proto: &FuncType) -> bool {
    if proto.vararg {
        return false;
    }
    proto.params.borrow().iter().all(|p| {
        match &*p.ty.borrow() {
            Some(t) => promotes_unchanged(t),
            None => false,
        }
    })
}

/// C11 type compatibility (6.2.7). Struct, union and enum types are
/// compatible only with themselves.
pub fn compatible(a: &TypeRef, b: &TypeRef) -> bool {
    if same(a, b) {
        return true;
    }
    let (a, qa) = peel_quals(a);
    let (b, qb) = peel_quals(b);
    if qa != qb {
        return false;
    }
    match (&a.kind, &b.kind) {
        (TypeKind::Pointer(x), TypeKind::Pointer(y)) => compatible(x, y),
        (TypeKind::Array(x), TypeKind::Array(y)) => {
            compatible(&x.elem, &y.elem) && (x.len == y.len || x.len == 0 || y.len == 0)
        }
        (TypeKind::Func(x), TypeKind::Func(y)) => {
            if !compatible(&x.ret, &y.ret) {
                return false;
            }
            match (x.prototype, y.prototype) {
                (true, true) => x.vararg == y.vararg && param_types_compatible(x, y),
                (true, false) => proto_compatible_with_unprototyped(x),
                (false, true) => proto_compatible_with_unprototyped(y),
                (false, false) => true,
            }
        }
        _ => false,
    }
}

/// The composite of two compatible types (C11 6.2.7p3): a known array
/// length wins over an unknown one, a prototype wins over an
/// unprototyped declaration, and composition recurses elsewhere.
pub fn composite(a: &TypeRef, b: &TypeRef) -> TypeRef {
    if same(a, b) {
        return a.clone();
    }
    let (a0, quals) = peel_quals(a);
    let (b0, _) = peel_quals(b);
    let inner = match (&a0.kind, &b0.kind) {
        (TypeKind::Pointer(x), TypeKind::Pointer(y)) => {
            let base = composite(x, y);
            if Rc::ptr_eq(&base, x) {
                a0.clone()
            } else {
                Type::new(
                    TypeKind::Pointer(base),
                    a0.size.get(),
                    a0.align.get(),
                    a0.repr.get(),
                    false,
                )
            }
        }
        (TypeKind::Array(x), TypeKind::Array(y)) => {
            let elem = composite(&x.elem, &y.elem);
            let (len, sized) = if x.len != 0 { (x.len, &a0) } else { (y.len, &b0) };
            Type::new(
                TypeKind::Array(ArrayType { elem, len }),
                sized.size.get(),
                sized.align.get(),
                Repr::None,
                len == 0,
            )
        }
        (TypeKind::Func(x), TypeKind::Func(y)) => match (x.prototype, y.prototype) {
            (true, false) => a0.clone(),
            (false, true) => b0.clone(),
            (false, false) => a0.clone(),
            (true, true) => {
                let params = x
                    .params
                    .borrow()
                    .iter()
                    .zip(y.params.borrow().iter())
                    .map(|(p, q)| {
                        let ty = match (&*p.ty.borrow(), &*q.ty.borrow()) {
                            (Some(s), Some(t)) => Some(composite(s, t)),
                            _ => None,
                        };
                        Param {
                            name: p.name.clone().or_else(|| q.name.clone()),
                            ty: RefCell::new(ty),
                        }
                    })
                    .collect();
                Type::new(
                    TypeKind::Func(FuncType {
                        ret: composite(&x.ret, &y.ret),
                        params: RefCell::new(params),
                        prototype: true,
                        vararg: x.vararg,
                        noreturn: Cell::new(x.noreturn.get() || y.noreturn.get()),
                        paraminfo: true,
                    }),
                    0,
                    0,
                    Repr::None,
                    false,
                )
            }
        },
        _ => a0.clone(),
    };
    make_qualified(&inner, quals)
}
