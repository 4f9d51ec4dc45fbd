//! Syntax trees produced by a front end.
//!
//! This is the subset of a package-level syntax tree the registry scans:
//! declarations, their comments, struct fields, and the function literals and
//! call expressions inside function bodies. Everything else a front end may
//! parse is collapsed into [`Expr::Other`].
//!
//! Function literals and calls carry the signature the front end resolved
//! for them, so the registry never has to type-check an expression.

use serde::{Deserialize, Serialize};

use pkgreg_core::node::{CommentGroup, Ident};
use pkgreg_core::position::Span;
use pkgreg_core::types::Signature;

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name as registered in the file set.
    pub name: String,
    pub span: Span,
    /// Package documentation above the package clause.
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    /// Package name in the package clause.
    pub package: Ident,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl SourceFile {
    pub fn is_test(&self) -> bool {
        self.name.ends_with("_test.go")
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Gen(d) => d.span,
            Decl::Func(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclToken {
    Import,
    Const,
    Type,
    Var,
}

impl DeclToken {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclToken::Import => "import",
            DeclToken::Const => "const",
            DeclToken::Type => "type",
            DeclToken::Var => "var",
        }
    }
}

/// `const`, `type`, `var` or `import` declaration, possibly grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenDecl {
    pub span: Span,
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    pub tok: DeclToken,
    pub specs: Vec<Spec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "spec", rename_all = "snake_case")]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

impl Spec {
    pub fn span(&self) -> Span {
        match self {
            Spec::Import(s) => s.span,
            Spec::Value(s) => s.span,
            Spec::Type(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub span: Span,
    #[serde(default)]
    pub name: Option<Ident>,
    pub path: String,
}

/// `A, B T = 1, 2`; the names share one spec node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub span: Span,
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    /// Trailing line comment.
    #[serde(default)]
    pub comment: Option<CommentGroup>,
    pub names: Vec<Ident>,
    #[serde(default)]
    pub ty: Option<Expr>,
    #[serde(default)]
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub span: Span,
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    #[serde(default)]
    pub comment: Option<CommentGroup>,
    pub name: Ident,
    /// `type A = B`
    #[serde(default)]
    pub alias: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub span: Span,
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    #[serde(default)]
    pub recv: Option<Field>,
    pub name: Ident,
    pub ty: FuncType,
    /// Expressions of the body; `None` for external functions.
    #[serde(default)]
    pub body: Option<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncType {
    pub span: Span,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub results: Vec<Field>,
}

/// Struct field, parameter, result or receiver. No names means embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub span: Span,
    #[serde(default)]
    pub doc: Option<CommentGroup>,
    #[serde(default)]
    pub comment: Option<CommentGroup>,
    #[serde(default)]
    pub names: Vec<Ident>,
    pub ty: Expr,
}

impl Field {
    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    pub span: Span,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    pub span: Span,
    pub ty: FuncType,
    #[serde(default)]
    pub body: Vec<Expr>,
    #[serde(default)]
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub span: Span,
    pub fun: Box<Expr>,
    #[serde(default)]
    pub args: Vec<Expr>,
    /// Signature of the callee; `None` for conversions and builtins.
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Expressions, including type expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Ident(Ident),
    /// `x.sel`
    Selector {
        span: Span,
        x: Box<Expr>,
        sel: Ident,
    },
    /// `*x`
    Star { span: Span, x: Box<Expr> },
    /// `x[i]` or `x[A, B]`
    Index {
        span: Span,
        x: Box<Expr>,
        indices: Vec<Expr>,
    },
    Struct(StructType),
    FuncLit(FuncLit),
    Call(CallExpr),
    /// Basic literal.
    Lit { span: Span, value: String },
    Other { span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(i) => i.span,
            Expr::Selector { span, .. }
            | Expr::Star { span, .. }
            | Expr::Index { span, .. }
            | Expr::Lit { span, .. }
            | Expr::Other { span } => *span,
            Expr::Struct(s) => s.span,
            Expr::FuncLit(f) => f.span,
            Expr::Call(c) => c.span,
        }
    }

    /// Visit this expression and everything below it, parents first.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        f(self);
        match self {
            Expr::Selector { x, .. } | Expr::Star { x, .. } => x.walk(f),
            Expr::Index { x, indices, .. } => {
                x.walk(f);
                for index in indices {
                    index.walk(f);
                }
            }
            Expr::Struct(s) => {
                for field in &s.fields {
                    field.ty.walk(f);
                }
            }
            Expr::FuncLit(lit) => {
                lit.ty.walk(f);
                for expr in &lit.body {
                    expr.walk(f);
                }
            }
            Expr::Call(call) => {
                call.fun.walk(f);
                for arg in &call.args {
                    arg.walk(f);
                }
            }
            Expr::Ident(_) | Expr::Lit { .. } | Expr::Other { .. } => {}
        }
    }
}

impl FuncType {
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        for field in self.params.iter().chain(&self.results) {
            field.ty.walk(f);
        }
    }
}

impl FuncDecl {
    /// Walk receiver, signature and body expressions.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        if let Some(recv) = &self.recv {
            recv.ty.walk(f);
        }
        self.ty.walk(f);
        for expr in self.body.iter().flatten() {
            expr.walk(f);
        }
    }
}

impl SourceFile {
    /// Walk every expression in the file, declaration by declaration.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        for decl in &self.decls {
            match decl {
                Decl::Func(func) => func.walk(f),
                Decl::Gen(group) => {
                    for spec in &group.specs {
                        match spec {
                            Spec::Value(v) => {
                                for expr in v.ty.iter().chain(&v.values) {
                                    expr.walk(f);
                                }
                            }
                            Spec::Type(t) => t.ty.walk(f),
                            Spec::Import(_) => {}
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgreg_core::position::Pos;

    fn span(a: u32, b: u32) -> Span {
        Span::new(Pos(a), Pos(b))
    }

    fn ident(name: &str, at: u32) -> Expr {
        Expr::Ident(Ident::new(name, span(at, at + name.len() as u32)))
    }

    #[test]
    fn walk_is_preorder_and_reaches_nested_calls() {
        let inner = Expr::Call(CallExpr {
            span: span(20, 25),
            fun: Box::new(ident("g", 20)),
            args: vec![],
            signature: None,
        });
        let lit = Expr::FuncLit(FuncLit {
            span: span(10, 30),
            ty: FuncType {
                span: span(10, 16),
                params: vec![],
                results: vec![],
            },
            body: vec![inner],
            signature: Some(Signature::default()),
        });
        let outer = Expr::Call(CallExpr {
            span: span(1, 31),
            fun: Box::new(ident("f", 1)),
            args: vec![lit],
            signature: None,
        });

        let mut starts = Vec::new();
        outer.walk(&mut |e: &Expr| starts.push(e.span().start.0));
        assert_eq!(starts, [1, 1, 10, 20, 20]);
    }

    #[test]
    fn expr_json_is_tagged() {
        let e = Expr::Star {
            span: span(1, 3),
            x: Box::new(ident("T", 2)),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["expr"], "star");
        assert_eq!(json["x"]["expr"], "ident");
        let back: Expr = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }
}
