//! Front-end contract.
//!
//! Parsing and type checking are not done here. A [`Frontend`] is handed the
//! entry patterns and a [`LoadConfig`] and returns every package of the
//! import closure, each with:
//! - canonical path, id and declared name
//! - module reference (path plus source directory, when known)
//! - syntax trees of its files, positioned in the shared [`FileSet`]
//! - a symbol table resolving defining identifiers ([`TypesInfo`])
//! - the errors hit while loading it (any error is fatal to graph
//!   construction)
//!
//! A front end may also evaluate expressions in a package's scope
//! ([`Frontend::eval`]); the default implementation reports it unsupported.
//!
//! [`fixture::MemoryFrontend`] is an in-memory implementation used by tests.

pub mod fixture;
pub mod syntax;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pkgreg_core::node::Ident;
use pkgreg_core::position::{FileSet, Pos};
use pkgreg_core::types::{ConstValue, ModuleInfo, Symbol, Type};

use crate::config::LoadConfig;
use syntax::SourceFile;

// ============================================================================
// Error Types
// ============================================================================

/// Errors a front end reports for a whole load.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("no packages matched {patterns:?}")]
    NoPackages { patterns: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{operation} is not supported by this front end")]
    Unsupported { operation: &'static str },

    #[error("eval {expr:?}: {message}")]
    Eval { expr: String, message: String },

    #[error("{message}")]
    Other { message: String },
}

impl FrontendError {
    pub fn other(message: impl Into<String>) -> Self {
        FrontendError::Other {
            message: message.into(),
        }
    }

    pub fn eval(expr: impl Into<String>, message: impl Into<String>) -> Self {
        FrontendError::Eval {
            expr: expr.into(),
            message: message.into(),
        }
    }
}

/// An error attached to one package (parse, type or list error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageError {
    /// `file:line:col`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
    pub msg: String,
}

impl PackageError {
    pub fn new(msg: impl Into<String>) -> Self {
        PackageError {
            pos: None,
            msg: msg.into(),
        }
    }

    pub fn at(mut self, pos: impl Into<String>) -> Self {
        self.pos = Some(pos.into());
        self
    }
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{}: {}", pos, self.msg),
            None => write!(f, "{}", self.msg),
        }
    }
}

// ============================================================================
// Loaded Data
// ============================================================================

/// Symbol table of one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypesInfo {
    /// Defining identifier position to the symbol it declares.
    #[serde(default)]
    pub defs: BTreeMap<Pos, Symbol>,
}

impl TypesInfo {
    pub fn define(&mut self, ident: &Ident, symbol: Symbol) {
        self.defs.insert(ident.pos(), symbol);
    }

    /// Symbol declared by `ident`.
    pub fn object_of(&self, ident: &Ident) -> Option<&Symbol> {
        self.defs.get(&ident.pos())
    }
}

/// Type of an evaluated expression, plus its value when it is constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAndValue {
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConstValue>,
}

impl TypeAndValue {
    /// Type and value of the symbol a name resolves to.
    pub fn of_symbol(symbol: &Symbol) -> Self {
        match symbol {
            Symbol::Const(c) => TypeAndValue {
                ty: c.ty.clone(),
                value: Some(c.value.clone()),
            },
            Symbol::TypeName(t) => TypeAndValue {
                ty: t.ty.clone(),
                value: None,
            },
            Symbol::Func(f) => TypeAndValue {
                ty: Type::Func {
                    signature: Box::new(f.signature.clone()),
                },
                value: None,
            },
            Symbol::Var { ty, .. } => TypeAndValue {
                ty: ty.clone(),
                value: None,
            },
        }
    }
}

/// One package as loaded by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePackage {
    /// Unique id; differs from `path` for test variants.
    pub id: String,
    /// Canonical import path.
    pub path: String,
    /// Declared package name.
    pub name: String,
    /// Directory holding the package's files.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub module: Option<ModuleInfo>,
    /// Import paths of the packages this one imports.
    #[serde(default)]
    pub imports: BTreeSet<String>,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub info: TypesInfo,
    #[serde(default)]
    pub errors: Vec<PackageError>,
}

impl SourcePackage {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        let path = path.into();
        SourcePackage {
            id: path.clone(),
            path,
            name: name.into(),
            dir: None,
            module: None,
            imports: BTreeSet::new(),
            files: Vec::new(),
            info: TypesInfo::default(),
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Frontend
// ============================================================================

/// What to load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub patterns: &'a [String],
    pub config: &'a LoadConfig,
    /// File set every returned position must belong to.
    pub fileset: &'a Arc<FileSet>,
}

/// Result of a load.
#[derive(Debug, Clone, Default)]
pub struct LoadedPackages {
    /// Paths of the packages matched by the patterns.
    pub roots: Vec<String>,
    /// Every package of the import closure, roots included.
    pub packages: Vec<SourcePackage>,
}

/// A parser and type checker for the source language.
pub trait Frontend: Send + Sync {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedPackages, FrontendError>;

    /// Evaluate the expression `expr` in the scope of `package` at `pos`.
    ///
    /// `expr` only holds bare identifiers; qualified references arrive
    /// wrapped (see [`crate::wrap`]).
    fn eval(
        &self,
        package: &SourcePackage,
        pos: Pos,
        expr: &str,
    ) -> Result<TypeAndValue, FrontendError> {
        let _ = (package, pos, expr);
        Err(FrontendError::Unsupported { operation: "eval" })
    }
}

impl<T: Frontend + ?Sized> Frontend for &T {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedPackages, FrontendError> {
        (**self).load(request)
    }

    fn eval(
        &self,
        package: &SourcePackage,
        pos: Pos,
        expr: &str,
    ) -> Result<TypeAndValue, FrontendError> {
        (**self).eval(package, pos, expr)
    }
}

impl<T: Frontend + ?Sized> Frontend for Arc<T> {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedPackages, FrontendError> {
        (**self).load(request)
    }

    fn eval(
        &self,
        package: &SourcePackage,
        pos: Pos,
        expr: &str,
    ) -> Result<TypeAndValue, FrontendError> {
        (**self).eval(package, pos, expr)
    }
}
