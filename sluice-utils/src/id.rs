//! Interned identifiers for signals, modules, and pipelines.
use symbol_table::GlobalSymbol;

/// A globally interned, copyable identifier. Two `Id`s created from the
/// same string are equal and share storage for the lifetime of the
/// process.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    sym: GlobalSymbol,
}

impl Id {
    pub fn new(s: impl AsRef<str>) -> Self {
        Id {
            sym: GlobalSymbol::from(s.as_ref()),
        }
    }

    /// The interned string in the static, global symbol table.
    pub fn as_str(&self) -> &'static str {
        self.sym.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Ordered by the interned string, not the interner index, so that
/// iteration orders sorted on `Id` are stable across processes.
impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_str(), f)
    }
}

/// Things with a name.
pub trait GetName {
    /// Return the name of the object.
    fn name(&self) -> Id;
}
