//! Target descriptors.
//!
//! A target fixes the width of `long` and pointers, the signedness of
//! plain `char`, the type of `wchar_t` and the shape of `va_list`. The
//! descriptor is read-only configuration; it is selected once when the
//! translation-unit context is created.

/// Shape of the target's `va_list` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaListKind {
    /// One-element array of a 24-byte bookkeeping struct (x86-64 SysV).
    SysvArray,
    /// A 32-byte struct passed by value (AArch64 AAPCS).
    Aarch64Struct,
    /// A plain pointer into the save area.
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub name: &'static str,
    /// Plain `char` behaves as `signed char`.
    pub signed_char: bool,
    /// Register and pointer width in bytes; also the width of `long`.
    pub regsize: u64,
    /// `wchar_t` is `unsigned int` rather than `int`.
    pub wchar_unsigned: bool,
    pub valist: VaListKind,
}

pub const TARGETS: &[Target] = &[
    Target {
        name: "x86_64-sysv",
        signed_char: true,
        regsize: 8,
        wchar_unsigned: false,
        valist: VaListKind::SysvArray,
    },
    Target {
        name: "aarch64",
        signed_char: false,
        regsize: 8,
        wchar_unsigned: true,
        valist: VaListKind::Aarch64Struct,
    },
    Target {
        name: "riscv64",
        signed_char: false,
        regsize: 8,
        wchar_unsigned: false,
        valist: VaListKind::Pointer,
    },
    Target {
        name: "riscv32",
        signed_char: false,
        regsize: 4,
        wchar_unsigned: false,
        valist: VaListKind::Pointer,
    },
];

impl Target {
    pub fn find(name: &str) -> Option<&'static Target> {
        TARGETS.iter().find(|t| t.name == name)
    }

    pub fn default_target() -> &'static Target {
        &TARGETS[0]
    }
}
