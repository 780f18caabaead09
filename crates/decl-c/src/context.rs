//! Translation-unit context.
//!
//! Aggregates everything with translation-unit lifetime: the target
//! descriptor, the primitive type singletons, the file scope, the
//! tentative-definitions list and the string-literal table. Threading
//! it explicitly (instead of process globals) lets several
//! translation units run in one process.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::Repr;
use crate::decl::DeclRef;
use crate::error::{Error, ErrorKind, Result};
use crate::scope::{Scope, ScopeRef};
use crate::span::Loc;
use crate::target::{Target, VaListKind};
use crate::types::{
    make_qualified, unqualify, ArrayType, BasicKind, BasicType, FuncType, Param, RecordType, Type,
    TypeKind, TypeRef,
};

#[derive(Debug)]
pub struct Context {
    target: &'static Target,
    file_scope: ScopeRef,
    tentative: RefCell<Vec<DeclRef>>,
    strings: RefCell<HashMap<Vec<u8>, DeclRef>>,
    ty_void: TypeRef,
    /// Primitive singletons, indexed by `BasicKind`. The `Enum` slot is
    /// a placeholder; every enumeration gets a fresh type object.
    basics: Vec<TypeRef>,
    ty_wchar: TypeRef,
    ty_valist: TypeRef,
}

fn basic(kind: BasicKind, signed: bool, size: u64, align: u64, repr: Repr) -> TypeRef {
    Type::new(TypeKind::Basic(BasicType { kind, signed }), size, align, repr, false)
}

impl Context {
    /// Select a target and set up a fresh translation unit. `None`
    /// picks the default target.
    pub fn new(target_name: Option<&str>) -> Result<Context> {
        let target = match target_name {
            Some(name) => Target::find(name).ok_or_else(|| {
                Error::new(Loc::builtin(), ErrorKind::UnknownTarget(name.to_string()))
            })?,
            None => Target::default_target(),
        };
        let regsize = target.regsize;
        let long_repr = if regsize == 8 { Repr::I64 } else { Repr::I32 };

        use BasicKind::*;
        let basics = vec![
            basic(Bool, false, 1, 1, Repr::I8),
            basic(Char, target.signed_char, 1, 1, Repr::I8),
            basic(SChar, true, 1, 1, Repr::I8),
            basic(UChar, false, 1, 1, Repr::I8),
            basic(Short, true, 2, 2, Repr::I16),
            basic(UShort, false, 2, 2, Repr::I16),
            basic(Int, true, 4, 4, Repr::I32),
            basic(UInt, false, 4, 4, Repr::I32),
            basic(Long, true, regsize, regsize, long_repr),
            basic(ULong, false, regsize, regsize, long_repr),
            basic(LLong, true, 8, 8, Repr::I64),
            basic(ULLong, false, 8, 8, Repr::I64),
            basic(Enum, true, 4, 4, Repr::I32),
            basic(Float, true, 4, 4, Repr::F32),
            basic(Double, true, 8, 8, Repr::F64),
            basic(LongDouble, true, 16, 16, Repr::F64),
        ];
        debug_assert!(basics
            .iter()
            .enumerate()
            .all(|(i, t)| t.basic_kind().map(|k| k as usize) == Some(i)));

        let ty_void = Type::new(TypeKind::Void, 0, 0, Repr::None, true);
        let ty_wchar = if target.wchar_unsigned {
            basics[UInt as usize].clone()
        } else {
            basics[Int as usize].clone()
        };
        let ty_valist = match target.valist {
            VaListKind::SysvArray => {
                let rec = Type::new(
                    TypeKind::Struct(RecordType {
                        tag: None,
                        members: RefCell::new(Vec::new()),
                    }),
                    24,
                    8,
                    Repr::I64,
                    false,
                );
                Type::new(
                    TypeKind::Array(ArrayType { elem: rec, len: 1 }),
                    24,
                    8,
                    Repr::None,
                    false,
                )
            }
            VaListKind::Aarch64Struct => Type::new(
                TypeKind::Struct(RecordType {
                    tag: Some("va_list".to_string()),
                    members: RefCell::new(Vec::new()),
                }),
                32,
                8,
                Repr::I64,
                false,
            ),
            VaListKind::Pointer => Type::new(
                TypeKind::Pointer(ty_void.clone()),
                regsize,
                regsize,
                long_repr,
                false,
            ),
        };

        Ok(Context {
            target,
            file_scope: Scope::file(),
            tentative: RefCell::new(Vec::new()),
            strings: RefCell::new(HashMap::new()),
            ty_void,
            basics,
            ty_wchar,
            ty_valist,
        })
    }

    pub fn target(&self) -> &'static Target {
        self.target
    }

    pub fn file_scope(&self) -> ScopeRef {
        self.file_scope.clone()
    }

    pub fn void_type(&self) -> TypeRef {
        self.ty_void.clone()
    }

    /// The singleton for a basic kind. `Enum` has no singleton; use
    /// [`Context::make_enum`] for enumerations.
    pub fn basic(&self, kind: BasicKind) -> TypeRef {
        debug_assert!(kind != BasicKind::Enum);
        self.basics[kind as usize].clone()
    }

    pub fn wchar_type(&self) -> TypeRef {
        self.ty_wchar.clone()
    }

    /// The target's `va_list` type, as it appears in declarations.
    pub fn valist_type(&self) -> TypeRef {
        self.ty_valist.clone()
    }

    /// The target's `va_list` after parameter adjustment, the type
    /// `va_list` has when passed to a function.
    pub fn adjusted_valist_type(&self) -> TypeRef {
        self.adjust(&self.ty_valist)
    }

    pub fn make_pointer(&self, base: &TypeRef) -> TypeRef {
        let size = self.target.regsize;
        let repr = if size == 8 { Repr::I64 } else { Repr::I32 };
        Type::new(TypeKind::Pointer(base.clone()), size, size, repr, false)
    }

    /// Array of `len` elements; `len` 0 denotes an incomplete array.
    pub fn make_array(&self, elem: &TypeRef, len: u64) -> std::result::Result<TypeRef, ErrorKind> {
        let size = elem
            .size
            .get()
            .checked_mul(len)
            .ok_or(ErrorKind::ArrayTooLarge)?;
        Ok(Type::new(
            TypeKind::Array(ArrayType {
                elem: elem.clone(),
                len,
            }),
            size,
            elem.align.get(),
            Repr::None,
            len == 0,
        ))
    }

    /// Function type. Sized like `void`; a function is never an object.
    pub fn make_func(
        &self,
        ret: &TypeRef,
        params: Vec<Param>,
        prototype: bool,
        vararg: bool,
        paraminfo: bool,
    ) -> TypeRef {
        Type::new(
            TypeKind::Func(FuncType {
                ret: ret.clone(),
                params: RefCell::new(params),
                prototype,
                vararg,
                noreturn: std::cell::Cell::new(false),
                paraminfo,
            }),
            0,
            0,
            Repr::None,
            false,
        )
    }

    pub fn make_struct(&self, tag: Option<String>) -> TypeRef {
        Type::new(
            TypeKind::Struct(RecordType {
                tag,
                members: RefCell::new(Vec::new()),
            }),
            0,
            0,
            Repr::I64,
            true,
        )
    }

    pub fn make_union(&self, tag: Option<String>) -> TypeRef {
        Type::new(
            TypeKind::Union(RecordType {
                tag,
                members: RefCell::new(Vec::new()),
            }),
            0,
            0,
            Repr::I64,
            true,
        )
    }

    /// A fresh enumerated type: a distinct type with the
    /// representation of `int`, incomplete until its body is seen.
    pub fn make_enum(&self) -> TypeRef {
        Type::new(
            TypeKind::Basic(BasicType {
                kind: BasicKind::Enum,
                signed: true,
            }),
            4,
            4,
            Repr::I32,
            true,
        )
    }

    /// Parameter type adjustment (C11 6.7.6.3p7f): arrays decay to
    /// pointers to their element type and functions to pointers to
    /// themselves, preserving outer qualifiers.
    pub fn adjust(&self, t: &TypeRef) -> TypeRef {
        let (base, quals) = unqualify(t);
        match &base.kind {
            TypeKind::Array(a) => make_qualified(&self.make_pointer(&a.elem), quals),
            TypeKind::Func(_) => self.make_pointer(&base),
            _ => t.clone(),
        }
    }

    pub(crate) fn add_tentative(&self, d: &DeclRef) {
        self.tentative.borrow_mut().push(d.clone());
    }

    pub(crate) fn remove_tentative(&self, d: &DeclRef) {
        self.tentative.borrow_mut().retain(|x| !Rc::ptr_eq(x, d));
    }

    /// The declarations still tentative, in insertion order.
    pub fn tentative_defns(&self) -> Vec<DeclRef> {
        self.tentative.borrow().clone()
    }

    pub(crate) fn string_lookup(&self, data: &[u8]) -> Option<DeclRef> {
        self.strings.borrow().get(data).cloned()
    }

    pub(crate) fn string_insert(&self, data: Vec<u8>, d: DeclRef) {
        self.strings.borrow_mut().insert(data, d);
    }
}
