//! Source locations.

use std::fmt;
use std::rc::Rc;

/// Position of a token in the preprocessed input.
///
/// Every token carries one, and every error reports one.
#[derive(Clone, PartialEq, Eq)]
pub struct Loc {
    pub file: Rc<str>,
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(file: impl Into<Rc<str>>, line: u32, col: u32) -> Loc {
        Loc {
            file: file.into(),
            line,
            col,
        }
    }

    /// Location for entities that do not come from the input, such as
    /// target configuration errors.
    pub fn builtin() -> Loc {
        Loc::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

impl fmt::Debug for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
