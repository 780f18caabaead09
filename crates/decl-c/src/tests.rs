use std::rc::Rc;
use std::vec::IntoIter;

use pretty_assertions::assert_eq;

use crate::backend::{Backend, Func, Init, InitValue, Repr, Value};
use crate::context::Context;
use crate::decl::{Decl, DeclKind, DeclRef, Linkage};
use crate::error::{ErrorKind, Result};
use crate::hooks::{Hooks, StringLit};
use crate::parser::Parser;
use crate::scope::{Scope, ScopeRef};
use crate::span::Loc;
use crate::token::{Token, TokenKind};
use crate::types::{unqualify, BasicKind, Quals, TypeKind, TypeRef};

// ---------------------------------------------------------------------
// test front-end: a tiny lexer, constant folder, initializer parser and
// statement skipper, plus a recording back-end

fn keyword(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "auto" => Auto,
        "char" => Char,
        "const" => Const,
        "double" => Double,
        "enum" => Enum,
        "extern" => Extern,
        "float" => Float,
        "inline" => Inline,
        "int" => Int,
        "long" => Long,
        "register" => Register,
        "restrict" => Restrict,
        "return" => Return,
        "short" => Short,
        "signed" => Signed,
        "static" => Static,
        "struct" => Struct,
        "typedef" => Typedef,
        "union" => Union,
        "unsigned" => Unsigned,
        "void" => Void,
        "volatile" => Volatile,
        "_Alignas" => Alignas,
        "_Atomic" => Atomic,
        "_Bool" => Bool,
        "_Complex" => Complex,
        "_Noreturn" => Noreturn,
        "_Static_assert" => StaticAssert,
        "_Thread_local" => ThreadLocal,
        _ => return None,
    })
}

fn lex(src: &str) -> Vec<Token> {
    let mut toks = Vec::new();
    let (mut line, mut col) = (1u32, 1u32);
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let loc = Loc::new("test.c", line, col);
        let c = chars[i];
        if c == '\n' {
            line += 1;
            col = 1;
            i += 1;
        } else if c.is_whitespace() {
            col += 1;
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            col += (i - start) as u32;
            match keyword(&word) {
                Some(kind) => toks.push(Token::punct(kind, loc)),
                None => toks.push(Token::ident(word, loc)),
            }
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let num: String = chars[start..i].iter().collect();
            col += (i - start) as u32;
            toks.push(Token::new(TokenKind::Number, num, loc));
        } else if c == '"' {
            i += 1;
            let start = i;
            while chars[i] != '"' {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            col += (i - start) as u32 + 2;
            i += 1;
            toks.push(Token::new(TokenKind::StringLit, text, loc));
        } else if c == '.' {
            assert!(chars[i..].starts_with(&['.', '.', '.']), "lone '.' in test source");
            toks.push(Token::punct(TokenKind::Ellipsis, loc));
            i += 3;
            col += 3;
        } else {
            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBrack,
                ']' => TokenKind::RBrack,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                ':' => TokenKind::Colon,
                '*' => TokenKind::Star,
                '=' => TokenKind::Assign,
                other => panic!("test lexer: unexpected '{}'", other),
            };
            toks.push(Token::punct(kind, loc));
            i += 1;
            col += 1;
        }
    }
    toks
}

struct TestHooks;

impl Hooks for TestHooks {
    fn int_const_expr(&self, p: &mut Parser<'_>, _scope: &ScopeRef) -> Result<u64> {
        let t = p.expect(TokenKind::Number, "in constant expression")?;
        Ok(t.lexeme.parse().expect("test constants are decimal"))
    }

    fn parse_init(
        &self,
        p: &mut Parser<'_>,
        scope: &ScopeRef,
        ty: &TypeRef,
    ) -> Result<(TypeRef, Init)> {
        if p.tok().kind == TokenKind::LBrace {
            p.next();
            let mut items = Vec::new();
            while p.tok().kind != TokenKind::RBrace {
                let (_, item) = self.parse_init(p, scope, ty)?;
                items.push(item);
                if !p.consume(TokenKind::Comma) {
                    break;
                }
            }
            p.expect(TokenKind::RBrace, "to close initializer list")?;
            let completed = match &ty.kind {
                TypeKind::Array(a) if a.len == 0 => p
                    .context()
                    .make_array(&a.elem, items.len() as u64)
                    .expect("inferred array length fits"),
                _ => ty.clone(),
            };
            let init = Init {
                offset: 0,
                size: completed.size.get(),
                value: InitValue::List(items),
            };
            Ok((completed, init))
        } else {
            let value = self.int_const_expr(p, scope)?;
            let init = Init {
                offset: 0,
                size: ty.size.get(),
                value: InitValue::Int(value),
            };
            Ok((ty.clone(), init))
        }
    }

    fn stmt(&self, p: &mut Parser<'_>, func: &mut Func, scope: &ScopeRef) -> Result<()> {
        p.expect(TokenKind::LBrace, "to begin function body")?;
        let mut depth = 1usize;
        loop {
            match p.tok().kind {
                TokenKind::LBrace => {
                    depth += 1;
                    p.next();
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    p.next();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::Eof => panic!("unbalanced braces in function body"),
                _ => {
                    if !p.decl(scope, Some(&mut *func))? {
                        p.next();
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sym {
    Global { name: String, private: bool },
    Const { repr: Repr, value: u64 },
}

#[derive(Default)]
struct TestBackend {
    syms: Vec<Sym>,
    data: Vec<(Value, Option<Init>)>,
    funcs: Vec<(String, bool)>,
    locals: Vec<(String, Option<Init>)>,
}

impl TestBackend {
    fn intern(&mut self, sym: Sym) -> Value {
        self.syms.push(sym);
        Value(self.syms.len() as u64 - 1)
    }

    fn name_of(&self, v: Value) -> &str {
        match &self.syms[v.0 as usize] {
            Sym::Global { name, .. } => name,
            Sym::Const { .. } => panic!("constant used where a global was expected"),
        }
    }

    fn data_names(&self) -> Vec<&str> {
        self.data.iter().map(|(v, _)| self.name_of(*v)).collect()
    }

    fn const_values(&self) -> Vec<u64> {
        self.syms
            .iter()
            .filter_map(|s| match s {
                Sym::Const { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }
}

impl Backend for TestBackend {
    fn make_global(&mut self, name: &str, private: bool) -> Value {
        self.intern(Sym::Global {
            name: name.to_string(),
            private,
        })
    }

    fn make_int_const(&mut self, repr: Repr, value: u64) -> Value {
        self.intern(Sym::Const { repr, value })
    }

    fn make_func(&mut self, name: &str, ty: &TypeRef, scope: &ScopeRef) -> Func {
        // install the parameters so the body can refer to them
        if let Some(func_ty) = ty.as_func() {
            for param in func_ty.params.borrow().iter() {
                if let (Some(pname), Some(pty)) = (&param.name, &*param.ty.borrow()) {
                    let d = Decl::new(DeclKind::Object, pty.clone(), Linkage::None);
                    scope.put_decl(pname.clone(), d);
                }
            }
        }
        let value = self.make_global(name, false);
        Func {
            name: name.to_string(),
            ty: ty.clone(),
            value,
        }
    }

    fn emit_data(&mut self, decl: &DeclRef, init: Option<&Init>) {
        let value = decl.value.get().expect("emitted data has a symbol");
        self.data.push((value, init.cloned()));
    }

    fn emit_func(&mut self, func: &Func, external: bool) {
        self.funcs.push((func.name.clone(), external));
    }

    fn func_init(&mut self, func: &mut Func, _decl: &DeclRef, init: Option<&Init>) {
        self.locals.push((func.name.clone(), init.cloned()));
    }
}

/// Parse a whole translation unit at file scope and flush the
/// tentative definitions.
fn translate(src: &str) -> (Context, TestBackend) {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new(None).expect("default target");
    let mut backend = TestBackend::default();
    let mut toks: IntoIter<Token> = lex(src).into_iter();
    {
        let scope = ctx.file_scope();
        let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);
        while p.decl(&scope, None).expect("translation unit should parse") {}
        assert_eq!(p.tok().kind, TokenKind::Eof, "trailing tokens");
        p.emit_tentative_defns();
    }
    (ctx, backend)
}

/// Parse until the first error, which must occur.
fn translate_err(src: &str) -> ErrorKind {
    let ctx = Context::new(None).expect("default target");
    let mut backend = TestBackend::default();
    let mut toks: IntoIter<Token> = lex(src).into_iter();
    let scope = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);
    loop {
        match p.decl(&scope, None) {
            Ok(true) => continue,
            Ok(false) => panic!("expected an error, but parsing stopped at {:?}", p.tok()),
            Err(e) => return e.kind,
        }
    }
}

fn file_decl(ctx: &Context, name: &str) -> DeclRef {
    ctx.file_scope()
        .get_decl(name, false)
        .unwrap_or_else(|| panic!("no file-scope declaration of '{}'", name))
}

// ---------------------------------------------------------------------
// objects, linkage and tentative definitions

#[test]
fn repeated_declaration_yields_one_tentative_definition() {
    let (ctx, be) = translate("int x; int x;");
    let x = file_decl(&ctx, "x");
    assert_eq!(x.linkage, Linkage::External);
    assert!(x.tentative.get());
    assert!(!x.defined.get());
    // emitted exactly once, by the flush, zero-initialized
    assert_eq!(be.data_names(), ["x"]);
    assert_eq!(be.data[0].1, None);
}

#[test]
fn static_then_external_declaration_is_rejected() {
    assert_eq!(
        translate_err("static int x; int x;"),
        ErrorKind::LinkageMismatch("x".to_string())
    );
}

#[test]
fn extern_then_initialized_definition_is_not_tentative() {
    let (ctx, be) = translate("extern int x; int x = 5;");
    let x = file_decl(&ctx, "x");
    assert!(x.defined.get());
    assert!(!x.tentative.get());
    assert!(ctx.tentative_defns().is_empty());
    assert_eq!(be.data_names(), ["x"]);
    assert_eq!(
        be.data[0].1.as_ref().map(|i| i.value.clone()),
        Some(InitValue::Int(5))
    );
}

#[test]
fn definition_supersedes_earlier_tentative_entry() {
    let (ctx, be) = translate("int x; int x = 7;");
    let x = file_decl(&ctx, "x");
    assert!(x.defined.get());
    assert!(!x.tentative.get());
    assert!(ctx.tentative_defns().is_empty());
    // only the explicit definition is emitted
    assert_eq!(be.data_names(), ["x"]);
}

#[test]
fn extern_after_static_keeps_internal_linkage() {
    let (ctx, _) = translate("static int x; extern int x;");
    assert_eq!(file_decl(&ctx, "x").linkage, Linkage::Internal);
}

#[test]
fn tentative_flush_preserves_declaration_order() {
    let (_, be) = translate("int a; int b; int a; int c;");
    assert_eq!(be.data_names(), ["a", "b", "c"]);
}

#[test]
fn file_scope_auto_is_rejected() {
    assert_eq!(translate_err("auto int x;"), ErrorKind::FileScopeStorage("auto"));
    assert_eq!(
        translate_err("register int y;"),
        ErrorKind::FileScopeStorage("register")
    );
}

#[test]
fn alignment_rises_monotonically() {
    let (ctx, _) = translate("_Alignas(8) int x; _Alignas(4) int x;");
    assert_eq!(file_decl(&ctx, "x").align.get(), 8);
}

#[test]
fn alignment_must_be_a_small_power_of_two() {
    assert_eq!(
        translate_err("_Alignas(3) int x;"),
        ErrorKind::InvalidAlignment(3)
    );
    assert_eq!(
        translate_err("_Alignas(32) int x;"),
        ErrorKind::InvalidAlignment(32)
    );
}

#[test]
fn alignas_accepts_a_type_name() {
    let (ctx, _) = translate("_Alignas(long) int x;");
    assert_eq!(file_decl(&ctx, "x").align.get(), 8);
}

// ---------------------------------------------------------------------
// declaration specifiers

#[test]
fn specifier_order_does_not_matter() {
    let (ctx, _) = translate("unsigned long long int a; long int long unsigned b;");
    let a = file_decl(&ctx, "a");
    let b = file_decl(&ctx, "b");
    assert!(Rc::ptr_eq(&a.ty(), &b.ty()));
    assert_eq!(a.ty().basic_kind(), Some(BasicKind::ULLong));
}

#[test]
fn three_longs_are_rejected() {
    assert_eq!(translate_err("long long long x;"), ErrorKind::TooManyLong);
}

#[test]
fn duplicate_sign_specifiers_are_rejected() {
    assert_eq!(
        translate_err("signed signed int x;"),
        ErrorKind::DuplicateSpecifier("signed")
    );
    assert_eq!(
        translate_err("unsigned unsigned x;"),
        ErrorKind::DuplicateSpecifier("unsigned")
    );
    assert_eq!(
        translate_err("short short x;"),
        ErrorKind::DuplicateSpecifier("short")
    );
}

#[test]
fn conflicting_type_specifiers_are_rejected() {
    assert_eq!(translate_err("int float x;"), ErrorKind::MultipleTypes);
    assert_eq!(translate_err("short char x;"), ErrorKind::InvalidTypeSpec);
}

#[test]
fn qualifiers_alone_are_not_a_declaration() {
    assert_eq!(translate_err("const x;"), ErrorKind::NoTypeSpec);
}

#[test]
fn storage_classes_are_mutually_exclusive() {
    assert_eq!(
        translate_err("typedef static int x;"),
        ErrorKind::StorageClassConflict
    );
    assert_eq!(
        translate_err("_Thread_local auto int x;"),
        ErrorKind::StorageClassConflict
    );
    // _Thread_local does combine with static
    let (ctx, _) = translate("_Thread_local static int x;");
    assert_eq!(file_decl(&ctx, "x").linkage, Linkage::Internal);
}

#[test]
fn atomic_and_complex_are_reported_as_unsupported() {
    assert_eq!(
        translate_err("_Atomic int x;"),
        ErrorKind::Unsupported("the '_Atomic' qualifier")
    );
    assert_eq!(
        translate_err("_Complex double z;"),
        ErrorKind::Unsupported("'_Complex'")
    );
}

// ---------------------------------------------------------------------
// declarators

#[test]
fn pointer_and_array_declarators_bind_as_in_c() {
    let (ctx, _) = translate("int *a[3]; int (*b)[3];");
    let int = ctx.basic(BasicKind::Int);

    // a: array of 3 pointers to int
    let a = file_decl(&ctx, "a").ty();
    match &a.kind {
        TypeKind::Array(arr) => {
            assert_eq!(arr.len, 3);
            match &arr.elem.kind {
                TypeKind::Pointer(base) => assert!(Rc::ptr_eq(base, &int)),
                other => panic!("expected pointer element, got {:?}", other),
            }
        }
        other => panic!("expected array, got {:?}", other),
    }
    assert_eq!(a.size.get(), 24);

    // b: pointer to array of 3 int
    let b = file_decl(&ctx, "b").ty();
    match &b.kind {
        TypeKind::Pointer(base) => match &base.kind {
            TypeKind::Array(arr) => {
                assert_eq!(arr.len, 3);
                assert!(Rc::ptr_eq(&arr.elem, &int));
            }
            other => panic!("expected array pointee, got {:?}", other),
        },
        other => panic!("expected pointer, got {:?}", other),
    }
    assert_eq!(b.size.get(), 8);
}

#[test]
fn function_pointer_declarator_is_an_object() {
    let (ctx, _) = translate("int (*handler)(int, char);");
    let h = file_decl(&ctx, "handler");
    assert_eq!(h.kind, DeclKind::Object);
    let ty = h.ty();
    match &ty.kind {
        TypeKind::Pointer(base) => {
            let func = base.as_func().expect("pointee is a function");
            assert!(func.prototype);
            assert!(!func.vararg);
            assert_eq!(func.params.borrow().len(), 2);
        }
        other => panic!("expected function pointer, got {:?}", other),
    }
}

#[test]
fn qualified_pointer_declarator() {
    // `int *const p`: the pointer itself is const
    let (ctx, _) = translate("int *const p;");
    let ty = file_decl(&ctx, "p").ty();
    let (base, quals) = unqualify(&ty);
    assert_eq!(quals, Quals::CONST);
    assert!(matches!(base.kind, TypeKind::Pointer(_)));
}

#[test]
fn function_may_not_return_a_function_or_array() {
    assert_eq!(
        translate_err("typedef int F(void); F f(void);"),
        ErrorKind::FuncReturnsFunc
    );
    assert_eq!(
        translate_err("typedef int A[4]; A f(void);"),
        ErrorKind::FuncReturnsArray
    );
    assert_eq!(
        translate_err("typedef int F(void); F a[3];"),
        ErrorKind::ArrayOfFuncs
    );
}

#[test]
fn vla_declarators_are_unsupported() {
    assert_eq!(
        translate_err("int a[*];"),
        ErrorKind::Unsupported("variable length arrays")
    );
}

#[test]
fn array_size_may_not_overflow() {
    assert_eq!(
        translate_err("int a[9999999999999999999];"),
        ErrorKind::ArrayTooLarge
    );
}

#[test]
fn void_must_be_the_whole_parameter_list() {
    let (ctx, _) = translate("int g(void);");
    let ty = file_decl(&ctx, "g").ty();
    let func = ty.as_func().unwrap();
    assert!(func.prototype);
    assert!(func.params.borrow().is_empty());

    assert_eq!(translate_err("int f(void, int);"), ErrorKind::VoidParam);
    assert_eq!(translate_err("int f(int, void);"), ErrorKind::VoidParam);
    assert_eq!(translate_err("int f(void x);"), ErrorKind::VoidParam);
}

#[test]
fn parameters_decay_to_pointers() {
    let (ctx, _) = translate("int first(int v[8], int cb(void));");
    let ty = file_decl(&ctx, "first").ty();
    let func = ty.as_func().unwrap();
    let params = func.params.borrow();
    for p in params.iter() {
        let pty = p.ty.borrow().clone().unwrap();
        assert!(
            matches!(pty.kind, TypeKind::Pointer(_)),
            "parameter {:?} did not decay",
            p.name
        );
    }
}

#[test]
fn variadic_prototypes_record_the_ellipsis() {
    let (ctx, _) = translate("int emit(int *fmt, ...);");
    let ty = file_decl(&ctx, "emit").ty();
    let func = ty.as_func().unwrap();
    assert!(func.prototype);
    assert!(func.vararg);
    assert_eq!(func.params.borrow().len(), 1);
}

#[test]
fn parameter_storage_class_may_only_be_register() {
    assert_eq!(
        translate_err("int f(static int x);"),
        ErrorKind::ParamStorageClass
    );
    let (ctx, _) = translate("int f(register int x);");
    assert!(file_decl(&ctx, "f").ty().as_func().unwrap().prototype);
}

// ---------------------------------------------------------------------
// typedefs

#[test]
fn typedef_declares_and_redeclares_consistently() {
    let (ctx, _) = translate("typedef int T; typedef int T; T y;");
    let y = file_decl(&ctx, "y");
    assert_eq!(y.kind, DeclKind::Object);
    assert!(Rc::ptr_eq(&y.ty(), &ctx.basic(BasicKind::Int)));
}

#[test]
fn typedef_redefinition_with_different_type_is_rejected() {
    assert_eq!(
        translate_err("typedef int T; typedef long T;"),
        ErrorKind::TypedefMismatch("T".to_string())
    );
}

#[test]
fn typedef_may_not_carry_an_alignment() {
    assert_eq!(
        translate_err("_Alignas(8) typedef int T;"),
        ErrorKind::AlignedTypedef("T".to_string())
    );
}

#[test]
fn object_shadowing_a_typedef_ends_its_type_life() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("typedef int T; int T; T x;").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    assert!(p.decl(&file, None).unwrap());

    let block = Scope::push(&file);
    let fty = ctx.make_func(&ctx.basic(BasicKind::Int), Vec::new(), true, false, true);
    let mut func = p.backend().make_func("g", &fty, &block);

    // `int T;` shadows the typedef with an object of type int
    assert!(p.decl(&block, Some(&mut func)).unwrap());
    let inner = block.get_decl("T", false).unwrap();
    assert_eq!(inner.kind, DeclKind::Object);
    assert!(Rc::ptr_eq(&inner.ty(), &ctx.basic(BasicKind::Int)));

    // ... after which `T x;` no longer begins a declaration
    assert!(!p.decl(&block, Some(&mut func)).unwrap());
    assert_eq!(p.tok().kind, TokenKind::Ident);
    assert_eq!(p.tok().lexeme, "T");
}

// ---------------------------------------------------------------------
// struct, union and enum

#[test]
fn struct_layout_padds_members_to_their_alignment() {
    let (ctx, _) = translate("struct S { int a; char b; int c; };");
    let s = ctx.file_scope().get_tag("S", false).unwrap();
    assert_eq!(s.size.get(), 12);
    assert_eq!(s.align.get(), 4);
    assert!(!s.incomplete.get());

    let (record, is_union) = s.as_record().unwrap();
    assert!(!is_union);
    let members = record.members.borrow();
    let offsets: Vec<u64> = members.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, [0, 4, 8]);

    // layout invariants
    assert_eq!(s.size.get() % s.align.get(), 0);
    for m in members.iter() {
        assert_eq!(m.offset % m.ty.align.get(), 0);
        assert!(m.offset + m.ty.size.get() <= s.size.get());
        assert!(s.align.get() >= m.ty.align.get());
    }
}

#[test]
fn union_members_all_sit_at_offset_zero() {
    let (ctx, _) = translate("union U { int a; char b[6]; };");
    let u = ctx.file_scope().get_tag("U", false).unwrap();
    assert_eq!(u.size.get(), 8);
    assert_eq!(u.align.get(), 4);
    let (record, is_union) = u.as_record().unwrap();
    assert!(is_union);
    for m in record.members.borrow().iter() {
        assert_eq!(m.offset, 0);
    }
}

#[test]
fn member_alignas_shifts_layout() {
    let (ctx, _) = translate("struct P { char c; _Alignas(8) char d; };");
    let s = ctx.file_scope().get_tag("P", false).unwrap();
    let (record, _) = s.as_record().unwrap();
    let offsets: Vec<u64> = record.members.borrow().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, [0, 8]);
    assert_eq!(s.size.get(), 16);
    assert_eq!(s.align.get(), 8);
}

#[test]
fn anonymous_struct_members_are_allowed_untagged_only() {
    let (ctx, _) = translate("struct O { struct { int x; }; int y; };");
    let o = ctx.file_scope().get_tag("O", false).unwrap();
    let (record, _) = o.as_record().unwrap();
    let members = record.members.borrow();
    assert_eq!(members.len(), 2);
    assert!(members[0].name.is_none());
    assert_eq!(members[1].name.as_deref(), Some("y"));
    assert_eq!(members[1].offset, 4);

    assert_eq!(
        translate_err("struct O { struct Q { int x; }; };"),
        ErrorKind::NoMembers
    );
}

#[test]
fn tag_redefinition_and_kind_mismatch_are_rejected() {
    assert_eq!(
        translate_err("struct S { int a; }; struct S { int a; };"),
        ErrorKind::TagRedefinition("S".to_string())
    );
    assert_eq!(
        translate_err("struct S; union S { int a; };"),
        ErrorKind::TagKindMismatch("S".to_string())
    );
}

#[test]
fn incomplete_and_function_members_are_rejected() {
    assert_eq!(
        translate_err("struct S; struct T { struct S s; };"),
        ErrorKind::IncompleteMember("s".to_string())
    );
    assert_eq!(
        translate_err("struct T { int f(void); };"),
        ErrorKind::FuncMember("f".to_string())
    );
    assert_eq!(
        translate_err("struct T { int n; int a[]; };"),
        ErrorKind::Unsupported("flexible array members")
    );
    assert_eq!(
        translate_err("struct T { int a : 3; };"),
        ErrorKind::Unsupported("bit-fields")
    );
}

#[test]
fn self_referential_struct_through_pointer() {
    let (ctx, _) = translate("struct N { struct N *next; int v; };");
    let n = ctx.file_scope().get_tag("N", false).unwrap();
    assert_eq!(n.size.get(), 16);
    let (record, _) = n.as_record().unwrap();
    let members = record.members.borrow();
    match &members[0].ty.kind {
        TypeKind::Pointer(base) => assert!(Rc::ptr_eq(base, &n)),
        other => panic!("expected pointer to N, got {:?}", other),
    }
}

#[test]
fn enum_constants_count_from_explicit_values() {
    let (ctx, be) = translate("enum E { A, B = 5, C } e;");
    assert_eq!(be.const_values(), [0, 5, 6]);
    // enum constants carry the representation of int
    for s in &be.syms {
        if let Sym::Const { repr, .. } = s {
            assert_eq!(*repr, Repr::I32);
        }
    }

    for name in ["A", "B", "C"].iter() {
        let c = file_decl(&ctx, name);
        assert_eq!(c.kind, DeclKind::EnumConst);
        assert!(Rc::ptr_eq(&c.ty(), &ctx.basic(BasicKind::Int)));
        assert_eq!(c.linkage, Linkage::None);
    }

    let tag = ctx.file_scope().get_tag("E", false).unwrap();
    assert_eq!(tag.basic_kind(), Some(BasicKind::Enum));
    assert!(!tag.incomplete.get());
    assert!(Rc::ptr_eq(&file_decl(&ctx, "e").ty(), &tag));
}

#[test]
fn tag_references_reach_the_enclosing_scope() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("enum E { A }; enum E e;").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    assert!(p.decl(&file, None).unwrap());

    let block = Scope::push(&file);
    let fty = ctx.make_func(&ctx.basic(BasicKind::Int), Vec::new(), true, false, true);
    let mut func = p.backend().make_func("g", &fty, &block);
    assert!(p.decl(&block, Some(&mut func)).unwrap());

    let e = block.get_decl("e", false).unwrap();
    assert!(Rc::ptr_eq(&e.ty(), &file.get_tag("E", false).unwrap()));
}

// ---------------------------------------------------------------------
// functions

#[test]
fn prototype_composes_with_definition() {
    let (ctx, be) = translate("typedef int T; T f(T); int f(int x) { return x; }");
    assert_eq!(be.funcs, [("f".to_string(), true)]);

    let f = file_decl(&ctx, "f");
    assert_eq!(f.kind, DeclKind::Func);
    assert!(f.defined.get());
    assert_eq!(f.linkage, Linkage::External);

    let ty = f.ty();
    let func = ty.as_func().unwrap();
    assert!(func.prototype);
    let params = func.params.borrow();
    assert_eq!(params.len(), 1);
    let pty = params[0].ty.borrow().clone().unwrap();
    assert!(Rc::ptr_eq(&pty, &ctx.basic(BasicKind::Int)));
}

#[test]
fn static_function_is_emitted_as_internal() {
    let (ctx, be) = translate("static int helper(void) { }");
    assert_eq!(be.funcs, [("helper".to_string(), false)]);
    assert_eq!(file_decl(&ctx, "helper").linkage, Linkage::Internal);
}

#[test]
fn function_redefinition_is_rejected() {
    assert_eq!(
        translate_err("int f(void) { } int f(void) { }"),
        ErrorKind::Redefined("f".to_string())
    );
}

#[test]
fn incompatible_function_redeclaration_is_rejected() {
    assert_eq!(
        translate_err("int f(int); long f(int);"),
        ErrorKind::Incompatible("f".to_string())
    );
    // char does not survive argument promotion, so the prototype is
    // incompatible with the earlier unprototyped declaration
    assert_eq!(
        translate_err("int f(); int f(char);"),
        ErrorKind::Incompatible("f".to_string())
    );
}

#[test]
fn noreturn_merges_into_the_function_type() {
    let (ctx, _) = translate("_Noreturn void panic_now(void);");
    let ty = file_decl(&ctx, "panic_now").ty();
    assert!(ty.as_func().unwrap().noreturn.get());
}

#[test]
fn old_style_definition_binds_parameter_types() {
    let (ctx, be) = translate("int f(a, b) int a; char b; { }");
    assert_eq!(be.funcs, [("f".to_string(), true)]);

    let ty = file_decl(&ctx, "f").ty();
    let func = ty.as_func().unwrap();
    assert!(!func.prototype);
    assert!(func.paraminfo);
    let params = func.params.borrow();
    assert_eq!(params.len(), 2);
    assert_eq!(
        params[0].ty.borrow().clone().unwrap().basic_kind(),
        Some(BasicKind::Int)
    );
    assert_eq!(
        params[1].ty.borrow().clone().unwrap().basic_kind(),
        Some(BasicKind::Char)
    );
}

#[test]
fn old_style_parameter_lists_are_checked() {
    assert_eq!(
        translate_err("int f(a) int b; { }"),
        ErrorKind::NoSuchParam("b".to_string())
    );
    assert_eq!(
        translate_err("int f(a, b) int a; { }"),
        ErrorKind::UntypedParam("b".to_string())
    );
    assert_eq!(
        translate_err("int f(a, b);"),
        ErrorKind::IdentListNotDefinition
    );
}

#[test]
fn function_definition_only_for_the_first_declarator() {
    assert_eq!(
        translate_err("int x, f(void) { }"),
        ErrorKind::FuncDefNotAllowed
    );
}

// ---------------------------------------------------------------------
// block scope

#[test]
fn block_scope_extern_inherits_visible_linkage() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("static int x; extern int x; int w = 2; static int s = 3; extern int y = 1;").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    assert!(p.decl(&file, None).unwrap());

    let block = Scope::push(&file);
    let fty = ctx.make_func(&ctx.basic(BasicKind::Int), Vec::new(), true, false, true);
    let mut func = p.backend().make_func("g", &fty, &block);

    // `extern int x;` picks up the internal linkage of the file-scope x
    assert!(p.decl(&block, Some(&mut func)).unwrap());
    let x = block.get_decl("x", false).unwrap();
    assert_eq!(x.linkage, Linkage::Internal);

    // `int w = 2;` is a plain local, defined through the function
    assert!(p.decl(&block, Some(&mut func)).unwrap());
    let w = block.get_decl("w", false).unwrap();
    assert_eq!(w.linkage, Linkage::None);
    assert!(w.defined.get());

    // `static int s = 3;` has static storage: emitted as private data
    assert!(p.decl(&block, Some(&mut func)).unwrap());
    let s = block.get_decl("s", false).unwrap();
    assert_eq!(s.linkage, Linkage::None);
    assert!(s.value.get().is_some());

    // `extern int y = 1;` at block scope cannot be initialized
    let err = p.decl(&block, Some(&mut func)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BlockLinkageInit("y".to_string()));

    drop(p);
    // one local definition (w); s went through the data emitter with a
    // private symbol
    assert_eq!(backend.locals.len(), 1);
    assert!(backend.syms.iter().any(|s| matches!(
        s,
        Sym::Global { name, private: true } if name == "s"
    )));
}

#[test]
fn block_scope_object_redeclaration_is_rejected() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("int z; int z;").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    let block = Scope::push(&file);
    let fty = ctx.make_func(&ctx.basic(BasicKind::Int), Vec::new(), true, false, true);
    let mut func = p.backend().make_func("g", &fty, &block);

    assert!(p.decl(&block, Some(&mut func)).unwrap());
    let err = p.decl(&block, Some(&mut func)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoLinkageRedeclared("z".to_string()));
}

#[test]
fn block_scope_function_storage_is_restricted() {
    assert_eq!(
        translate_err("void g(void) { static int h(void); }"),
        ErrorKind::BlockFuncStorage("h".to_string())
    );
}

// ---------------------------------------------------------------------
// initializers and incomplete arrays

#[test]
fn initializer_completes_an_incomplete_array() {
    let (ctx, be) = translate("int a[] = { 1, 2, 3 };");
    let a = file_decl(&ctx, "a");
    assert!(a.defined.get());
    assert!(!a.tentative.get());
    let ty = a.ty();
    match &ty.kind {
        TypeKind::Array(arr) => assert_eq!(arr.len, 3),
        other => panic!("expected array, got {:?}", other),
    }
    assert!(!ty.incomplete.get());
    assert_eq!(ty.size.get(), 12);
    // defined through the initializer, so the flush adds nothing
    assert_eq!(be.data_names(), ["a"]);
}

#[test]
fn object_redefinition_is_rejected() {
    assert_eq!(
        translate_err("int x = 1; int x = 2;"),
        ErrorKind::Redefined("x".to_string())
    );
}

// ---------------------------------------------------------------------
// static assertions

#[test]
fn static_assertions_check_their_condition() {
    let (_, be) = translate("_Static_assert(1, \"everything is fine\");");
    assert!(be.data.is_empty());

    assert_eq!(
        translate_err("_Static_assert(0, \"broken\");"),
        ErrorKind::StaticAssertFailed
    );
}

// ---------------------------------------------------------------------
// type names

#[test]
fn typename_parses_abstract_declarators() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("const int * int [3]").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    let ptr = p.typename(&file).unwrap().expect("a type name");
    match &ptr.kind {
        TypeKind::Pointer(base) => {
            let (stripped, quals) = unqualify(base);
            assert_eq!(quals, Quals::CONST);
            assert!(Rc::ptr_eq(&stripped, &ctx.basic(BasicKind::Int)));
        }
        other => panic!("expected pointer, got {:?}", other),
    }

    let arr = p.typename(&file).unwrap().expect("a type name");
    assert!(arr.is_array());
    assert_eq!(arr.size.get(), 12);
}

#[test]
fn typename_rejects_a_declared_identifier() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("int x").into_iter();
    let file = ctx.file_scope();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);
    let err = p.typename(&file).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedIdent);
}

// ---------------------------------------------------------------------
// string literals

#[test]
fn string_literals_are_deduplicated_by_raw_bytes() {
    let ctx = Context::new(None).unwrap();
    let mut backend = TestBackend::default();
    let mut toks = lex("").into_iter();
    let mut p = Parser::new(&ctx, &mut toks, Rc::new(TestHooks), &mut backend);

    let ty = ctx.make_array(&ctx.basic(BasicKind::Char), 3).unwrap();
    let hello = StringLit {
        data: b"hi\0".to_vec(),
        ty: ty.clone(),
    };
    let d1 = p.string_decl(&hello);
    let d2 = p.string_decl(&StringLit {
        data: b"hi\0".to_vec(),
        ty: ty.clone(),
    });
    assert!(Rc::ptr_eq(&d1, &d2));

    // embedded NULs participate in the key
    let d3 = p.string_decl(&StringLit {
        data: b"h\0i".to_vec(),
        ty,
    });
    assert!(!Rc::ptr_eq(&d1, &d3));

    drop(p);
    assert_eq!(backend.data.len(), 2);
    for (value, init) in &backend.data {
        assert!(matches!(
            backend.syms[value.0 as usize],
            Sym::Global { ref name, private: true } if name == "string"
        ));
        assert!(matches!(
            init.as_ref().unwrap().value,
            InitValue::Bytes(_)
        ));
    }
}

// ---------------------------------------------------------------------
// mixed declarator lists

#[test]
fn one_specifier_many_declarators() {
    let (ctx, _) = translate("int x, *p, arr[2], f(void);");
    assert_eq!(file_decl(&ctx, "x").kind, DeclKind::Object);
    assert!(matches!(file_decl(&ctx, "p").ty().kind, TypeKind::Pointer(_)));
    assert!(file_decl(&ctx, "arr").ty().is_array());
    assert_eq!(file_decl(&ctx, "f").kind, DeclKind::Func);
}

#[test]
fn kind_changing_redeclaration_is_rejected() {
    assert_eq!(
        translate_err("int x; int x(void);"),
        ErrorKind::KindMismatch("x".to_string())
    );
    assert_eq!(
        translate_err("typedef int T; int T;"),
        ErrorKind::KindMismatch("T".to_string())
    );
}
