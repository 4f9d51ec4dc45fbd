//! Function signatures used by a package.
//!
//! A package's signature registry holds:
//! - one entry per function or method declaration
//! - one entry per function literal
//! - one entry per call expression whose callee signature is not identical
//!   to one already collected
//!
//! Declarations and literals are collected by the parallel file scan. Calls
//! are collected afterwards in a single pass over the files in name order,
//! so which call wins a signature is reproducible.

use std::fmt;
use std::sync::Arc;

use pkgreg_core::node::Ident;
use pkgreg_core::object::Element;
use pkgreg_core::position::Span;
use pkgreg_core::registry::Registry;
use pkgreg_core::types::{Signature, Symbol};

use crate::frontend::syntax::{Decl, Expr, FuncDecl, SourceFile};
use crate::frontend::TypesInfo;

/// Where a signature was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSite {
    Func,
    Method,
    FuncLit,
    Call,
}

impl SignatureSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureSite::Func => "func",
            SignatureSite::Method => "method",
            SignatureSite::FuncLit => "func_lit",
            SignatureSite::Call => "call",
        }
    }
}

impl fmt::Display for SignatureSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collected signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureEntry {
    node: Span,
    /// Declared name, or the callee's name for a call. Literals have none.
    ident: Option<Ident>,
    site: SignatureSite,
    signature: Signature,
}

impl SignatureEntry {
    pub fn new(node: Span, ident: Option<Ident>, site: SignatureSite, signature: Signature) -> Self {
        SignatureEntry {
            node,
            ident,
            site,
            signature,
        }
    }

    pub fn span(&self) -> Span {
        self.node
    }

    pub fn ident(&self) -> Option<&Ident> {
        self.ident.as_ref()
    }

    pub fn site(&self) -> SignatureSite {
        self.site
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Element for SignatureEntry {
    fn node(&self) -> Option<Span> {
        Some(self.node)
    }

    fn name(&self) -> &str {
        self.ident.as_ref().map(|i| i.name.as_str()).unwrap_or("")
    }
}

/// Signatures of the function declarations and literals in `file`.
pub(crate) fn declared(file: &SourceFile, info: &TypesInfo) -> Vec<Arc<SignatureEntry>> {
    let mut out = Vec::new();
    for decl in &file.decls {
        if let Decl::Func(func) = decl {
            if let Some(entry) = declaration(func, info) {
                out.push(Arc::new(entry));
            }
        }
    }
    file.walk(&mut |expr| {
        if let Expr::FuncLit(lit) = expr {
            if let Some(signature) = &lit.signature {
                out.push(Arc::new(SignatureEntry::new(
                    lit.span,
                    None,
                    SignatureSite::FuncLit,
                    signature.clone(),
                )));
            }
        }
    });
    out
}

fn declaration(func: &FuncDecl, info: &TypesInfo) -> Option<SignatureEntry> {
    let Some(Symbol::Func(symbol)) = info.object_of(&func.name) else {
        return None;
    };
    let site = if func.recv.is_some() {
        SignatureSite::Method
    } else {
        SignatureSite::Func
    };
    Some(SignatureEntry::new(
        func.span,
        Some(func.name.clone()),
        site,
        symbol.signature.clone(),
    ))
}

/// Add call signatures not identical to any already in `registry`.
///
/// Must run after every declaration and literal has been added.
pub(crate) fn collect_calls(files: &[&SourceFile], registry: &Registry<SignatureEntry>) -> usize {
    let mut known: Vec<Signature> = Vec::with_capacity(registry.len());
    registry.for_each_unordered(|entry| known.push(entry.signature.clone()));

    let mut files = files.to_vec();
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let mut fresh = Vec::new();
    for file in files {
        file.walk(&mut |expr| {
            let Expr::Call(call) = expr else {
                return;
            };
            let Some(signature) = &call.signature else {
                return;
            };
            if known.iter().any(|k| k.identical(signature)) {
                return;
            }
            known.push(signature.clone());
            fresh.push(Arc::new(SignatureEntry::new(
                call.span,
                callee(&call.fun).cloned(),
                SignatureSite::Call,
                signature.clone(),
            )));
        });
    }
    registry.add(fresh)
}

/// Identifier naming a callee (`f`, `pkg.F`, `x.M`, `F[T]`).
fn callee(fun: &Expr) -> Option<&Ident> {
    match fun {
        Expr::Ident(ident) => Some(ident),
        Expr::Selector { sel, .. } => Some(sel),
        Expr::Index { x, .. } => callee(x),
        _ => None,
    }
}
