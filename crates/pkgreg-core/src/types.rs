//! Resolved type information handed over by the front end.
//!
//! The registry never infers types. It only compares them (method receivers
//! are matched to their named type by identity) and renders them. Identity
//! ([`Type::identical`]) is structural with aliases replaced by their
//! targets: two `Type::Named` values are the same type iff their package path
//! and name match. Derived `PartialEq` compares the representation, aliases
//! included.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Modules
// ============================================================================

/// A versioned source tree grouping one or more packages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module path, e.g. `example.com/project`.
    pub path: String,
    /// Source directory on disk, when the module is available locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModuleInfo {
    pub fn new(path: impl Into<String>) -> Self {
        ModuleInfo {
            path: path.into(),
            dir: None,
            version: None,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

// ============================================================================
// Types
// ============================================================================

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Predeclared type (`int`, `string`, ...).
    Basic { name: String },
    /// A declared named type.
    Named { package: String, name: String },
    /// An alias; identity is that of `target`.
    Alias {
        package: String,
        name: String,
        target: Box<Type>,
    },
    Pointer { elem: Box<Type> },
    Slice { elem: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    Func { signature: Box<Signature> },
    /// Anything the registry does not need to look inside.
    Other { repr: String },
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Self {
        Type::Basic { name: name.into() }
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Type::Named {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn pointer(elem: Type) -> Self {
        Type::Pointer {
            elem: Box::new(elem),
        }
    }

    /// Strip any chain of aliases.
    pub fn unalias(&self) -> &Type {
        let mut t = self;
        while let Type::Alias { target, .. } = t {
            t = target;
        }
        t
    }

    /// Strip aliases and pointer indirections.
    pub fn deref(&self) -> &Type {
        let mut t = self.unalias();
        while let Type::Pointer { elem } = t {
            t = elem.unalias();
        }
        t
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.unalias(), Type::Pointer { .. })
    }

    /// Type identity: aliases are replaced by their targets at every level,
    /// then the structures are compared. Named types are identical iff their
    /// package path and name match.
    pub fn identical(&self, other: &Type) -> bool {
        match (self.unalias(), other.unalias()) {
            (Type::Basic { name: a }, Type::Basic { name: b }) => a == b,
            (
                Type::Named {
                    package: pa,
                    name: na,
                },
                Type::Named {
                    package: pb,
                    name: nb,
                },
            ) => pa == pb && na == nb,
            (Type::Pointer { elem: a }, Type::Pointer { elem: b })
            | (Type::Slice { elem: a }, Type::Slice { elem: b }) => a.identical(b),
            (
                Type::Map {
                    key: ka,
                    value: va,
                },
                Type::Map {
                    key: kb,
                    value: vb,
                },
            ) => ka.identical(kb) && va.identical(vb),
            (Type::Func { signature: a }, Type::Func { signature: b }) => a.identical(b),
            (Type::Other { repr: a }, Type::Other { repr: b }) => a == b,
            _ => false,
        }
    }

    /// Name of the named type, if this is one (after unaliasing).
    pub fn named_name(&self) -> Option<&str> {
        match self.unalias() {
            Type::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic { name } => write!(f, "{}", name),
            Type::Named { package, name } | Type::Alias { package, name, .. } => {
                if package.is_empty() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}.{}", package, name)
                }
            }
            Type::Pointer { elem } => write!(f, "*{}", elem),
            Type::Slice { elem } => write!(f, "[]{}", elem),
            Type::Map { key, value } => write!(f, "map[{}]{}", key, value),
            Type::Func { signature } => write!(f, "func{}", signature),
            Type::Other { repr } => write!(f, "{}", repr),
        }
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Receiver type for methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv: Option<Type>,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default)]
    pub results: Vec<Type>,
    #[serde(default)]
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Signature {
            recv: None,
            params,
            results,
            variadic: false,
        }
    }

    pub fn with_recv(mut self, recv: Type) -> Self {
        self.recv = Some(recv);
        self
    }

    pub fn with_variadic(mut self, variadic: bool) -> Self {
        self.variadic = variadic;
        self
    }

    /// Type identity of two signatures. Receivers are ignored.
    pub fn identical(&self, other: &Signature) -> bool {
        fn all_identical(a: &[Type], b: &[Type]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
        }
        self.variadic == other.variadic
            && all_identical(&self.params, &other.params)
            && all_identical(&self.results, &other.results)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if self.variadic && i + 1 == self.params.len() {
                write!(f, "...")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => {
                write!(f, " (")?;
                for (i, r) in self.results.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", r)?;
                }
                write!(f, ")")
            }
        }
    }
}

// ============================================================================
// Constant Values
// ============================================================================

/// The value of a constant as evaluated by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Unknown,
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::String(v) => write!(f, "{:?}", v),
            ConstValue::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// A declared constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstSymbol {
    pub name: String,
    pub ty: Type,
    pub value: ConstValue,
}

/// A declared type name. `ty` is the type it denotes; for a defined type this
/// is the `Type::Named` that method receivers are compared against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeNameSymbol {
    pub name: String,
    pub ty: Type,
}

/// A declared function or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncSymbol {
    pub name: String,
    pub signature: Signature,
}

/// Resolution of a defining identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "symbol", rename_all = "snake_case")]
pub enum Symbol {
    Const(ConstSymbol),
    TypeName(TypeNameSymbol),
    Func(FuncSymbol),
    Var { name: String, ty: Type },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Const(c) => &c.name,
            Symbol::TypeName(t) => &t.name,
            Symbol::Func(f) => &f.name,
            Symbol::Var { name, .. } => name,
        }
    }

    /// Kind label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Const(_) => "const",
            Symbol::TypeName(_) => "type",
            Symbol::Func(_) => "func",
            Symbol::Var { .. } => "var",
        }
    }
}
