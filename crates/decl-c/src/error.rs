//! Parse and constraint errors.

use thiserror::Error;

use crate::span::Loc;

pub type Result<T> = std::result::Result<T, Error>;

/// An error with the location of the offending token.
///
/// Translation stops at the first error; there is no recovery.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{loc}: {kind}")]
pub struct Error {
    pub loc: Loc,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(loc: Loc, kind: ErrorKind) -> Error {
        Error { loc, kind }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("expected {expected}, got '{found}'")]
    Expected { expected: String, found: String },

    // legal C11 the implementation does not handle
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    // declaration specifiers
    #[error("storage class not allowed in this declaration")]
    StorageClassNotAllowed,
    #[error("invalid combination of storage class specifiers")]
    StorageClassConflict,
    #[error("function specifier not allowed in this declaration")]
    FuncSpecNotAllowed,
    #[error("duplicate '{0}'")]
    DuplicateSpecifier(&'static str),
    #[error("too many 'long'")]
    TooManyLong,
    #[error("multiple types in declaration specifiers")]
    MultipleTypes,
    #[error("invalid combination of type specifiers")]
    InvalidTypeSpec,
    #[error("declaration has no type specifier")]
    NoTypeSpec,
    #[error("alignment specifier not allowed in this declaration")]
    AlignasNotAllowed,
    #[error("invalid alignment: {0}")]
    InvalidAlignment(u64),

    // tags and members
    #[error("redeclaration of tag '{0}' with different kind")]
    TagKindMismatch(String),
    #[error("redefinition of tag '{0}'")]
    TagRedefinition(String),
    #[error("no type in struct member declaration")]
    NoMemberType,
    #[error("struct declaration must declare at least one member")]
    NoMembers,
    #[error("member '{0}' has incomplete type")]
    IncompleteMember(String),
    #[error("member '{0}' has function type")]
    FuncMember(String),

    // declarators
    #[error("identifier not allowed in abstract declarator")]
    UnexpectedIdent,
    #[error("expected '(' or identifier")]
    ExpectedDeclarator,
    #[error("function declarator specifies function return type")]
    FuncReturnsFunc,
    #[error("function declarator specifies array return type")]
    FuncReturnsArray,
    #[error("array declarator specifies function element type")]
    ArrayOfFuncs,
    #[error("array is too large")]
    ArrayTooLarge,
    #[error("no type in parameter declaration")]
    NoParamType,
    #[error("parameter declaration has invalid storage-class specifier")]
    ParamStorageClass,
    #[error("'void' must be the only parameter")]
    VoidParam,
    #[error("old-style function declarator has no parameter named '{0}'")]
    NoSuchParam(String),
    #[error("old-style function definition does not declare '{0}'")]
    UntypedParam(String),
    #[error("function declaration with identifier list is not part of definition")]
    IdentListNotDefinition,

    // declarations
    #[error("'{0}' redeclared with different kind")]
    KindMismatch(String),
    #[error("typedef '{0}' declared with alignment specifier")]
    AlignedTypedef(String),
    #[error("function '{0}' declared with alignment specifier")]
    AlignedFunc(String),
    #[error("typedef '{0}' redefined with different type")]
    TypedefMismatch(String),
    #[error("object '{0}' with no linkage redeclared")]
    NoLinkageRedeclared(String),
    #[error("'{0}' redeclared with different linkage")]
    LinkageMismatch(String),
    #[error("'{0}' redeclared with incompatible type")]
    Incompatible(String),
    #[error("'{0}' redefined")]
    Redefined(String),
    #[error("object '{0}' with block scope and linkage cannot have an initializer")]
    BlockLinkageInit(String),
    #[error("function '{0}' with block scope may only have storage class 'extern'")]
    BlockFuncStorage(String),
    #[error("function definition not allowed here")]
    FuncDefNotAllowed,
    #[error("external declaration must not contain '{0}'")]
    FileScopeStorage(&'static str),
    #[error("static assertion failed")]
    StaticAssertFailed,

    // configuration
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}
