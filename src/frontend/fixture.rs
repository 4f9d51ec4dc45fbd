//! In-memory front end built from declarative package descriptions.
//!
//! A [`PackageFixture`] describes a package's constants, types and functions.
//! [`MemoryFrontend`] renders each file to source text, registers it in the
//! request's [`FileSet`], and produces syntax nodes and a symbol table whose
//! positions point into that text, exactly as a real parser would:
//!
//! ```text
//! // Package a doc
//! package a
//!
//! // Level doc
//! type (
//!     Level int // trailing
//! )
//! ```
//!
//! Type strings use a small grammar: `int`, `T`, `*T`, `[]T`, `Box[int]`,
//! `pkg.T` (short import name) or `example.com/m/pkg.T` (full path).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use pkgreg_core::node::{Comment, CommentGroup, Ident};
use pkgreg_core::position::{Pos, Span};
use pkgreg_core::wrap;
use pkgreg_core::types::{
    ConstSymbol, ConstValue, FuncSymbol, ModuleInfo, Signature, Symbol, Type, TypeNameSymbol,
};

use super::syntax::{
    CallExpr, Decl, DeclToken, Expr, Field, FuncDecl, FuncLit, FuncType, GenDecl, ImportSpec,
    SourceFile, Spec, StructType, TypeSpec, ValueSpec,
};
use super::{
    Frontend, FrontendError, LoadRequest, LoadedPackages, PackageError, SourcePackage,
    TypeAndValue, TypesInfo,
};

/// Predeclared type names.
const BASIC_TYPES: &[&str] = &[
    "any",
    "bool",
    "byte",
    "complex64",
    "complex128",
    "error",
    "float32",
    "float64",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "rune",
    "string",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
];

// ============================================================================
// Fixture Types
// ============================================================================

/// A package to be served by [`MemoryFrontend`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageFixture {
    pub path: String,
    /// Declared name; defaults to the last path segment.
    #[serde(default)]
    pub name: Option<String>,
    /// Package id; defaults to the path.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub module: Option<ModuleInfo>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileFixture>,
    /// Load errors reported for the package.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PackageFixture {
    pub fn new(path: impl Into<String>) -> Self {
        PackageFixture {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn module(mut self, module: ModuleInfo) -> Self {
        self.module = Some(module);
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn import(mut self, path: impl Into<String>) -> Self {
        self.imports.push(path.into());
        self
    }

    pub fn file(mut self, file: FileFixture) -> Self {
        self.files.push(file);
        self
    }

    pub fn error(mut self, msg: impl Into<String>) -> Self {
        self.errors.push(msg.into());
        self
    }

    pub fn package_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileFixture {
    pub name: String,
    /// Package doc lines above the package clause.
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub decls: Vec<DeclFixture>,
}

impl FileFixture {
    pub fn new(name: impl Into<String>) -> Self {
        FileFixture {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn decl(mut self, decl: DeclFixture) -> Self {
        self.decls.push(decl);
        self
    }

    /// A single-spec `const` group.
    pub fn constant(self, spec: ConstFixture) -> Self {
        self.decl(DeclFixture::Const {
            doc: Vec::new(),
            specs: vec![spec],
        })
    }

    /// A single-spec `type` group.
    pub fn type_spec(self, spec: TypeFixture) -> Self {
        self.decl(DeclFixture::Type {
            doc: Vec::new(),
            specs: vec![spec],
        })
    }

    pub fn func(self, func: FuncFixture) -> Self {
        self.decl(DeclFixture::Func(func))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclFixture {
    Const {
        #[serde(default)]
        doc: Vec<String>,
        specs: Vec<ConstFixture>,
    },
    Type {
        #[serde(default)]
        doc: Vec<String>,
        specs: Vec<TypeFixture>,
    },
    Func(FuncFixture),
}

/// `A, B T = v1, v2 // comment`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstFixture {
    pub names: Vec<String>,
    #[serde(default)]
    pub ty: Option<String>,
    #[serde(default)]
    pub values: Vec<ConstValue>,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ConstFixture {
    pub fn new(name: impl Into<String>, value: ConstValue) -> Self {
        ConstFixture {
            names: vec![name.into()],
            values: vec![value],
            ..Default::default()
        }
    }

    /// Several names in one spec.
    pub fn multi<I, S>(names: I, values: Vec<ConstValue>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConstFixture {
            names: names.into_iter().map(Into::into).collect(),
            values,
            ..Default::default()
        }
    }

    pub fn typed(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }
}

/// Right-hand side of a type spec or a struct field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExprFixture {
    /// A type string.
    Named(String),
    Struct(Vec<FieldFixture>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeFixture {
    pub name: String,
    #[serde(default)]
    pub alias: bool,
    pub ty: TypeExprFixture,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl TypeFixture {
    /// `type Name <ty>`
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        TypeFixture {
            name: name.into(),
            alias: false,
            ty: TypeExprFixture::Named(ty.into()),
            doc: Vec::new(),
            comment: None,
        }
    }

    /// `type Name struct { ... }`
    pub fn structure(name: impl Into<String>, fields: Vec<FieldFixture>) -> Self {
        TypeFixture {
            name: name.into(),
            alias: false,
            ty: TypeExprFixture::Struct(fields),
            doc: Vec::new(),
            comment: None,
        }
    }

    /// `type Name = <ty>`
    pub fn alias(name: impl Into<String>, ty: impl Into<String>) -> Self {
        TypeFixture {
            alias: true,
            ..Self::new(name, ty)
        }
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFixture {
    /// Empty for an embedded field.
    #[serde(default)]
    pub names: Vec<String>,
    pub ty: TypeExprFixture,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl FieldFixture {
    pub fn named(name: impl Into<String>, ty: impl Into<String>) -> Self {
        FieldFixture {
            names: vec![name.into()],
            ty: TypeExprFixture::Named(ty.into()),
            doc: Vec::new(),
            comment: None,
        }
    }

    pub fn embedded(ty: impl Into<String>) -> Self {
        FieldFixture {
            names: Vec::new(),
            ty: TypeExprFixture::Named(ty.into()),
            doc: Vec::new(),
            comment: None,
        }
    }

    /// A field of anonymous struct type.
    pub fn nested(name: impl Into<String>, fields: Vec<FieldFixture>) -> Self {
        FieldFixture {
            names: vec![name.into()],
            ty: TypeExprFixture::Struct(fields),
            doc: Vec::new(),
            comment: None,
        }
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecvFixture {
    pub name: String,
    /// `T` or `*T`.
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncFixture {
    pub name: String,
    #[serde(default)]
    pub recv: Option<RecvFixture>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub results: Vec<String>,
    /// Last parameter is `...T`.
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub body: Vec<BodyFixture>,
}

impl FuncFixture {
    pub fn new(name: impl Into<String>) -> Self {
        FuncFixture {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn recv(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.recv = Some(RecvFixture {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn param(mut self, ty: impl Into<String>) -> Self {
        self.params.push(ty.into());
        self
    }

    pub fn result(mut self, ty: impl Into<String>) -> Self {
        self.results.push(ty.into());
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc.push(line.into());
        self
    }

    pub fn stmt(mut self, stmt: BodyFixture) -> Self {
        self.body.push(stmt);
        self
    }
}

/// A statement inside a function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyFixture {
    /// `callee()`
    Call {
        callee: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        results: Vec<String>,
        /// Builtins and conversions have no callee signature.
        #[serde(default)]
        builtin: bool,
    },
    /// `_ = func(params) results { body }`
    FuncLit {
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        results: Vec<String>,
        #[serde(default)]
        body: Vec<BodyFixture>,
    },
}

impl BodyFixture {
    pub fn call(callee: impl Into<String>, params: &[&str], results: &[&str]) -> Self {
        BodyFixture::Call {
            callee: callee.into(),
            params: params.iter().map(|s| s.to_string()).collect(),
            results: results.iter().map(|s| s.to_string()).collect(),
            builtin: false,
        }
    }

    pub fn builtin(callee: impl Into<String>) -> Self {
        BodyFixture::Call {
            callee: callee.into(),
            params: Vec::new(),
            results: Vec::new(),
            builtin: true,
        }
    }

    pub fn func_lit(params: &[&str], results: &[&str], body: Vec<BodyFixture>) -> Self {
        BodyFixture::FuncLit {
            params: params.iter().map(|s| s.to_string()).collect(),
            results: results.iter().map(|s| s.to_string()).collect(),
            body,
        }
    }
}

// ============================================================================
// MemoryFrontend
// ============================================================================

/// A front end serving fixture packages.
///
/// Patterns are package paths, or `prefix/...` for every package at or
/// below `prefix`. Test files (`*_test.go`) are served only when
/// [`LoadConfig::tests`](crate::config::LoadConfig) is set, and syntax is
/// withheld as the load mode dictates.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrontend {
    packages: BTreeMap<String, PackageFixture>,
}

impl MemoryFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: PackageFixture) -> Self {
        self.insert(package);
        self
    }

    pub fn insert(&mut self, package: PackageFixture) {
        self.packages.insert(package.path.clone(), package);
    }

    /// Build from a JSON array of package fixtures.
    pub fn from_json(json: &str) -> Result<Self, FrontendError> {
        let packages: Vec<PackageFixture> = serde_json::from_str(json)?;
        let mut frontend = Self::new();
        for package in packages {
            frontend.insert(package);
        }
        Ok(frontend)
    }

    pub fn package(&self, path: &str) -> Option<&PackageFixture> {
        self.packages.get(path)
    }

    /// Source text a file renders to.
    pub fn render_source(&self, path: &str, file: &str) -> Option<String> {
        let package = self.packages.get(path)?;
        let (index, file) = package
            .files
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == file)?;
        let (text, _, _) = render_file(package, file, index == 0, 0);
        Some(text)
    }

    fn matches(&self, pattern: &str) -> Vec<String> {
        match pattern.strip_suffix("/...") {
            Some(prefix) => self
                .packages
                .keys()
                .filter(|p| {
                    p.as_str() == prefix
                        || p.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
                })
                .cloned()
                .collect(),
            None => self
                .packages
                .contains_key(pattern)
                .then(|| vec![pattern.to_string()])
                .unwrap_or_default(),
        }
    }

    fn source_package(
        &self,
        fixture: &PackageFixture,
        request: &LoadRequest<'_>,
        with_syntax: bool,
    ) -> SourcePackage {
        let mut package = SourcePackage::new(fixture.path.clone(), fixture.package_name());
        package.id = fixture.id.clone().unwrap_or_else(|| fixture.path.clone());
        package.dir = fixture.dir.clone();
        package.module = fixture.module.clone();
        package.imports = fixture.imports.iter().cloned().collect();
        package.errors = fixture.errors.iter().map(PackageError::new).collect();

        if !with_syntax {
            return package;
        }

        for (index, file) in fixture.files.iter().enumerate() {
            if !request.config.tests && file.name.ends_with("_test.go") {
                continue;
            }
            let (text, _, _) = render_file(fixture, file, index == 0, 0);
            let base = request.fileset.add_file(file_name(fixture, file), &text);
            let (placed, syntax, info) = render_file(fixture, file, index == 0, base.0);
            debug_assert_eq!(text, placed);
            package.files.push(syntax);
            package.info.defs.extend(info.defs);
        }
        package
    }
}

impl Frontend for MemoryFrontend {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedPackages, FrontendError> {
        let mut roots = Vec::new();
        for pattern in request.patterns {
            for path in self.matches(pattern) {
                if !roots.contains(&path) {
                    roots.push(path);
                }
            }
        }
        if roots.is_empty() {
            return Err(FrontendError::NoPackages {
                patterns: request.patterns.to_vec(),
            });
        }

        // import closure; imports without a fixture are left for the caller
        let mut closure = BTreeSet::new();
        let mut stack: Vec<String> = roots.clone();
        while let Some(path) = stack.pop() {
            let Some(fixture) = self.packages.get(&path) else {
                continue;
            };
            if !closure.insert(path) {
                continue;
            }
            stack.extend(fixture.imports.iter().cloned());
        }

        let mode = request.config.mode;
        let packages = closure
            .iter()
            .filter_map(|path| self.packages.get(path))
            .map(|fixture| {
                let is_root = roots.contains(&fixture.path);
                let with_syntax = mode.includes_dependency_syntax()
                    || (mode.includes_syntax() && is_root);
                self.source_package(fixture, request, with_syntax)
            })
            .collect();

        Ok(LoadedPackages { roots, packages })
    }

    /// Resolve a single package-scope identifier, plain or wrapped, against
    /// the package's symbol table. Wrapped names must refer to `package`
    /// itself. Scope is the whole package; `pos` is not consulted.
    fn eval(
        &self,
        package: &SourcePackage,
        _pos: Pos,
        expr: &str,
    ) -> Result<TypeAndValue, FrontendError> {
        let expr = expr.trim();
        if !is_identifier(expr) {
            return Err(FrontendError::eval(expr, "only identifiers can be evaluated"));
        }

        let name = match expr.strip_prefix(wrap::PREFIX).and_then(wrap::decode) {
            Some(qualified) => match qualified.rsplit_once('.') {
                Some((path, _)) if path != package.path => {
                    return Err(FrontendError::eval(expr, format!("{} is not in scope", path)));
                }
                Some((_, name)) => name.to_string(),
                None => qualified,
            },
            None => expr.to_string(),
        };

        package
            .info
            .defs
            .values()
            .find(|symbol| symbol.name() == name && is_package_level(symbol))
            .map(TypeAndValue::of_symbol)
            .ok_or_else(|| FrontendError::eval(expr, format!("undefined: {}", name)))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Methods live in their receiver's scope, not the package's.
fn is_package_level(symbol: &Symbol) -> bool {
    match symbol {
        Symbol::Func(f) => f.signature.recv.is_none(),
        Symbol::Const(_) | Symbol::TypeName(_) => true,
        Symbol::Var { .. } => false,
    }
}

fn file_name(package: &PackageFixture, file: &FileFixture) -> String {
    format!("{}/{}", package.path, file.name)
}

// ============================================================================
// Rendering
// ============================================================================

/// Render one file with its first byte at `base`.
///
/// Returns the text, its syntax tree and the definitions it introduces.
fn render_file(
    package: &PackageFixture,
    file: &FileFixture,
    with_imports: bool,
    base: u32,
) -> (String, SourceFile, TypesInfo) {
    let mut r = Renderer {
        package,
        base,
        text: String::new(),
        info: TypesInfo::default(),
    };

    let start = r.pos();
    let doc = r.comments(&file.doc, 0);
    r.push("package ");
    let name = r.ident(package.package_name());
    r.push("\n");

    let mut decls = Vec::new();
    if with_imports && !package.imports.is_empty() {
        r.push("\n");
        decls.push(Decl::Gen(r.imports()));
    }
    for decl in &file.decls {
        r.push("\n");
        decls.push(r.decl(decl));
    }

    let syntax = SourceFile {
        name: file_name(package, file),
        span: Span::new(start, r.pos()),
        doc,
        package: name,
        decls,
    };
    (r.text, syntax, r.info)
}

struct Renderer<'a> {
    package: &'a PackageFixture,
    base: u32,
    text: String,
    info: TypesInfo,
}

impl Renderer<'_> {
    fn pos(&self) -> Pos {
        Pos(self.base + self.text.len() as u32)
    }

    fn push(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.text.push('\t');
        }
    }

    fn ident(&mut self, name: &str) -> Ident {
        let start = self.pos();
        self.push(name);
        Ident::new(name, Span::new(start, self.pos()))
    }

    /// `// line` comments, one per line, each followed by a newline.
    fn comments(&mut self, lines: &[String], depth: usize) -> Option<CommentGroup> {
        if lines.is_empty() {
            return None;
        }
        let mut list = Vec::with_capacity(lines.len());
        for line in lines {
            self.indent(depth);
            list.push(self.comment(line));
            self.push("\n");
        }
        Some(CommentGroup::new(list))
    }

    /// A trailing ` // text` on the current line.
    fn trailing(&mut self, text: &Option<String>) -> Option<CommentGroup> {
        let text = text.as_ref()?;
        self.push(" ");
        Some(CommentGroup::new(vec![self.comment(text)]))
    }

    fn comment(&mut self, line: &str) -> Comment {
        let start = self.pos();
        let text = format!("// {}", line);
        self.push(&text);
        Comment::new(text, Span::new(start, self.pos()))
    }

    fn imports(&mut self) -> GenDecl {
        let start = self.pos();
        self.push("import (\n");
        let package = self.package;
        let mut specs = Vec::new();
        for path in &package.imports {
            self.indent(1);
            let spec_start = self.pos();
            self.push(&format!("{:?}", path));
            specs.push(Spec::Import(ImportSpec {
                span: Span::new(spec_start, self.pos()),
                name: None,
                path: path.clone(),
            }));
            self.push("\n");
        }
        self.push(")");
        let span = Span::new(start, self.pos());
        self.push("\n");
        GenDecl {
            span,
            doc: None,
            tok: DeclToken::Import,
            specs,
        }
    }

    fn decl(&mut self, decl: &DeclFixture) -> Decl {
        match decl {
            DeclFixture::Const { doc, specs } => {
                let doc = self.comments(doc, 0);
                let start = self.pos();
                self.push("const (\n");
                let specs = specs.iter().map(|s| Spec::Value(self.const_spec(s))).collect();
                self.push(")");
                let span = Span::new(start, self.pos());
                self.push("\n");
                Decl::Gen(GenDecl {
                    span,
                    doc,
                    tok: DeclToken::Const,
                    specs,
                })
            }
            DeclFixture::Type { doc, specs } => {
                let doc = self.comments(doc, 0);
                let start = self.pos();
                self.push("type (\n");
                let specs = specs.iter().map(|s| Spec::Type(self.type_spec(s))).collect();
                self.push(")");
                let span = Span::new(start, self.pos());
                self.push("\n");
                Decl::Gen(GenDecl {
                    span,
                    doc,
                    tok: DeclToken::Type,
                    specs,
                })
            }
            DeclFixture::Func(func) => Decl::Func(self.func(func)),
        }
    }

    fn const_spec(&mut self, spec: &ConstFixture) -> ValueSpec {
        let doc = self.comments(&spec.doc, 1);
        self.indent(1);
        let start = self.pos();

        let mut names = Vec::with_capacity(spec.names.len());
        for (i, name) in spec.names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            names.push(self.ident(name));
        }

        let ty = spec.ty.as_ref().map(|t| {
            self.push(" ");
            self.type_expr(t)
        });

        let mut values = Vec::with_capacity(spec.values.len());
        if !spec.values.is_empty() {
            self.push(" = ");
            for (i, value) in spec.values.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                values.push(self.literal(value));
            }
        }
        let span = Span::new(start, self.pos());
        let comment = self.trailing(&spec.comment);
        self.push("\n");

        for (i, ident) in names.iter().enumerate() {
            if ident.name == "_" {
                continue;
            }
            let value = spec.values.get(i).cloned().unwrap_or(ConstValue::Unknown);
            let ty = match &spec.ty {
                Some(t) => self.resolve(t),
                None => untyped(&value),
            };
            self.info.define(
                ident,
                Symbol::Const(ConstSymbol {
                    name: ident.name.clone(),
                    ty,
                    value,
                }),
            );
        }

        ValueSpec {
            span,
            doc,
            comment,
            names,
            ty,
            values,
        }
    }

    fn literal(&mut self, value: &ConstValue) -> Expr {
        let start = self.pos();
        let text = match value {
            ConstValue::Unknown => "iota".to_string(),
            other => other.to_string(),
        };
        self.push(&text);
        let span = Span::new(start, self.pos());
        match value {
            ConstValue::Unknown => Expr::Other { span },
            _ => Expr::Lit { span, value: text },
        }
    }

    fn type_spec(&mut self, spec: &TypeFixture) -> TypeSpec {
        let doc = self.comments(&spec.doc, 1);
        self.indent(1);
        let start = self.pos();
        let name = self.ident(&spec.name);
        self.push(if spec.alias { " = " } else { " " });
        let ty = self.type_fixture(&spec.ty, 1);
        let span = Span::new(start, self.pos());
        let comment = self.trailing(&spec.comment);
        self.push("\n");

        let denoted = if spec.alias {
            Type::Alias {
                package: self.package.path.clone(),
                name: spec.name.clone(),
                target: Box::new(self.resolve_fixture(&spec.ty)),
            }
        } else {
            Type::named(self.package.path.clone(), spec.name.clone())
        };
        self.info.define(
            &name,
            Symbol::TypeName(TypeNameSymbol {
                name: spec.name.clone(),
                ty: denoted,
            }),
        );

        TypeSpec {
            span,
            doc,
            comment,
            name,
            alias: spec.alias,
            ty,
        }
    }

    fn type_fixture(&mut self, ty: &TypeExprFixture, depth: usize) -> Expr {
        match ty {
            TypeExprFixture::Named(t) => self.type_expr(t),
            TypeExprFixture::Struct(fields) => Expr::Struct(self.structure(fields, depth)),
        }
    }

    fn structure(&mut self, fields: &[FieldFixture], depth: usize) -> StructType {
        let start = self.pos();
        self.push("struct {\n");
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let doc = self.comments(&field.doc, depth + 1);
            self.indent(depth + 1);
            let field_start = self.pos();
            let mut names = Vec::with_capacity(field.names.len());
            for (i, name) in field.names.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                names.push(self.ident(name));
            }
            if !names.is_empty() {
                self.push(" ");
            }
            let ty = self.type_fixture(&field.ty, depth + 1);
            let span = Span::new(field_start, self.pos());
            let comment = self.trailing(&field.comment);
            self.push("\n");
            out.push(Field {
                span,
                doc,
                comment,
                names,
                ty,
            });
        }
        self.indent(depth);
        self.push("}");
        StructType {
            span: Span::new(start, self.pos()),
            fields: out,
        }
    }

    /// Render a type string and build its expression.
    fn type_expr(&mut self, ty: &str) -> Expr {
        let start = self.pos();
        if let Some(rest) = ty.strip_prefix('*') {
            self.push("*");
            let x = self.type_expr(rest);
            return Expr::Star {
                span: Span::new(start, self.pos()),
                x: Box::new(x),
            };
        }
        if let Some(rest) = ty.strip_prefix("[]") {
            self.push("[]");
            self.type_expr(rest);
            return Expr::Other {
                span: Span::new(start, self.pos()),
            };
        }
        if let Some((head, args)) = split_generic(ty) {
            let x = self.type_expr(head);
            self.push("[");
            let mut indices = Vec::new();
            for (i, arg) in args.split(',').map(str::trim).enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                indices.push(self.type_expr(arg));
            }
            self.push("]");
            return Expr::Index {
                span: Span::new(start, self.pos()),
                x: Box::new(x),
                indices,
            };
        }
        if let Some((qualifier, name)) = ty.rsplit_once('.') {
            let short = qualifier.rsplit('/').next().unwrap_or(qualifier);
            let x = self.ident(short);
            self.push(".");
            let sel = self.ident(name);
            return Expr::Selector {
                span: Span::new(start, self.pos()),
                x: Box::new(Expr::Ident(x)),
                sel,
            };
        }
        Expr::Ident(self.ident(ty))
    }

    /// Resolve a type string to a type.
    fn resolve(&self, ty: &str) -> Type {
        if let Some(rest) = ty.strip_prefix('*') {
            return Type::pointer(self.resolve(rest));
        }
        if let Some(rest) = ty.strip_prefix("[]") {
            return Type::Slice {
                elem: Box::new(self.resolve(rest)),
            };
        }
        if split_generic(ty).is_some() {
            return Type::Other {
                repr: ty.to_string(),
            };
        }
        if let Some((qualifier, name)) = ty.rsplit_once('.') {
            return Type::named(self.qualify(qualifier), name);
        }
        if BASIC_TYPES.contains(&ty) {
            return Type::basic(ty);
        }
        Type::named(self.package.path.clone(), ty)
    }

    fn resolve_fixture(&self, ty: &TypeExprFixture) -> Type {
        match ty {
            TypeExprFixture::Named(t) => self.resolve(t),
            TypeExprFixture::Struct(_) => Type::Other {
                repr: "struct{...}".to_string(),
            },
        }
    }

    /// Full import path for a qualifier.
    fn qualify(&self, qualifier: &str) -> String {
        if qualifier.contains('/') || qualifier.contains('.') {
            return qualifier.to_string();
        }
        self.package
            .imports
            .iter()
            .find(|path| path.rsplit('/').next() == Some(qualifier))
            .cloned()
            .unwrap_or_else(|| qualifier.to_string())
    }

    fn func(&mut self, func: &FuncFixture) -> FuncDecl {
        let doc = self.comments(&func.doc, 0);
        let start = self.pos();
        self.push("func ");

        let recv = func.recv.as_ref().map(|recv| {
            self.push("(");
            let field_start = self.pos();
            let name = self.ident(&recv.name);
            self.push(" ");
            let ty = self.type_expr(&recv.ty);
            let field = Field {
                span: Span::new(field_start, self.pos()),
                doc: None,
                comment: None,
                names: vec![name],
                ty,
            };
            self.push(") ");
            field
        });

        let name = self.ident(&func.name);
        let ty = self.func_type(start, &func.params, &func.results, func.variadic);
        let body = self.body(&func.body, 0);
        let span = Span::new(start, self.pos());
        self.push("\n");

        let mut signature = self.signature(&func.params, &func.results, func.variadic);
        if let Some(recv) = &func.recv {
            signature = signature.with_recv(self.resolve(&recv.ty));
        }
        self.info.define(
            &name,
            Symbol::Func(FuncSymbol {
                name: func.name.clone(),
                signature,
            }),
        );

        FuncDecl {
            span,
            doc,
            recv,
            name,
            ty,
            body: Some(body),
        }
    }

    /// `(p0 T0, p1 T1) R` starting at the current position.
    fn func_type(&mut self, start: Pos, params: &[String], results: &[String], variadic: bool) -> FuncType {
        self.push("(");
        let mut param_fields = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let field_start = self.pos();
            let name = self.ident(&format!("p{}", i));
            self.push(" ");
            if variadic && i + 1 == params.len() {
                self.push("...");
            }
            let ty = self.type_expr(param);
            param_fields.push(Field {
                span: Span::new(field_start, self.pos()),
                doc: None,
                comment: None,
                names: vec![name],
                ty,
            });
        }
        self.push(")");

        let mut result_fields = Vec::with_capacity(results.len());
        if !results.is_empty() {
            self.push(" ");
            let grouped = results.len() > 1;
            if grouped {
                self.push("(");
            }
            for (i, result) in results.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                let ty = self.type_expr(result);
                result_fields.push(Field {
                    span: ty.span(),
                    doc: None,
                    comment: None,
                    names: Vec::new(),
                    ty,
                });
            }
            if grouped {
                self.push(")");
            }
        }

        FuncType {
            span: Span::new(start, self.pos()),
            params: param_fields,
            results: result_fields,
        }
    }

    fn signature(&self, params: &[String], results: &[String], variadic: bool) -> Signature {
        let mut resolved: Vec<Type> = params.iter().map(|p| self.resolve(p)).collect();
        if variadic {
            if let Some(last) = resolved.pop() {
                resolved.push(Type::Slice {
                    elem: Box::new(last),
                });
            }
        }
        Signature::new(resolved, results.iter().map(|r| self.resolve(r)).collect())
            .with_variadic(variadic)
    }

    /// ` {\n<stmts>}` at the given depth.
    fn body(&mut self, stmts: &[BodyFixture], depth: usize) -> Vec<Expr> {
        self.push(" {\n");
        let exprs = stmts
            .iter()
            .map(|stmt| {
                self.indent(depth + 1);
                let expr = self.stmt(stmt, depth + 1);
                self.push("\n");
                expr
            })
            .collect();
        self.indent(depth);
        self.push("}");
        exprs
    }

    fn stmt(&mut self, stmt: &BodyFixture, depth: usize) -> Expr {
        match stmt {
            BodyFixture::Call {
                callee,
                params,
                results,
                builtin,
            } => {
                let start = self.pos();
                let fun = self.type_expr(callee);
                self.push("()");
                let signature = (!builtin).then(|| self.signature(params, results, false));
                Expr::Call(CallExpr {
                    span: Span::new(start, self.pos()),
                    fun: Box::new(fun),
                    args: Vec::new(),
                    signature,
                })
            }
            BodyFixture::FuncLit {
                params,
                results,
                body,
            } => {
                self.push("_ = ");
                let start = self.pos();
                self.push("func");
                let ty = self.func_type(start, params, results, false);
                let body = self.body(body, depth);
                Expr::FuncLit(FuncLit {
                    span: Span::new(start, self.pos()),
                    ty,
                    body,
                    signature: Some(self.signature(params, results, false)),
                })
            }
        }
    }
}

/// `Box[int, string]` into `("Box", "int, string")`.
fn split_generic(ty: &str) -> Option<(&str, &str)> {
    let inner = ty.strip_suffix(']')?;
    let open = inner.find('[')?;
    if open == 0 {
        return None;
    }
    Some((&inner[..open], &inner[open + 1..]))
}

/// Default type of an untyped constant.
fn untyped(value: &ConstValue) -> Type {
    Type::basic(match value {
        ConstValue::Bool(_) => "bool",
        ConstValue::Int(_) | ConstValue::Unknown => "int",
        ConstValue::Float(_) => "float64",
        ConstValue::String(_) => "string",
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadConfig;
    use pkgreg_core::position::FileSet;
    use std::sync::Arc;

    fn sample() -> PackageFixture {
        PackageFixture::new("example.com/m/a")
            .import("example.com/m/b")
            .file(
                FileFixture::new("a.go")
                    .doc("Package a doc")
                    .decl(DeclFixture::Const {
                        doc: vec!["group doc".into()],
                        specs: vec![ConstFixture::new("X", ConstValue::Int(1))
                            .typed("Level")
                            .comment("trailing")],
                    })
                    .type_spec(TypeFixture::new("Level", "int").doc("Level doc"))
                    .func(
                        FuncFixture::new("Set")
                            .recv("l", "*Level")
                            .param("int")
                            .result("error")
                            .stmt(BodyFixture::call("b.Do", &["string"], &[])),
                    ),
            )
    }

    fn load(frontend: &MemoryFrontend, patterns: &[&str], config: &LoadConfig) -> (Arc<FileSet>, LoadedPackages) {
        let fileset = Arc::new(FileSet::new());
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        let loaded = frontend
            .load(&LoadRequest {
                patterns: &patterns,
                config,
                fileset: &fileset,
            })
            .unwrap();
        (fileset, loaded)
    }

    mod render_tests {
        use super::*;

        #[test]
        fn renders_go_like_source() {
            let frontend = MemoryFrontend::new().with_package(sample());
            let text = frontend.render_source("example.com/m/a", "a.go").unwrap();
            let expected = "\
// Package a doc
package a

import (
\t\"example.com/m/b\"
)

// group doc
const (
\tX Level = 1 // trailing
)

type (
\t// Level doc
\tLevel int
)

func (l *Level) Set(p0 int) error {
\tb.Do()
}
";
            assert_eq!(text, expected);
        }

        #[test]
        fn spans_point_into_registered_text() {
            let frontend = MemoryFrontend::new().with_package(sample());
            let (fileset, loaded) = load(&frontend, &["example.com/m/a"], &LoadConfig::new());
            let package = &loaded.packages[0];
            let file = &package.files[0];
            let text = frontend.render_source("example.com/m/a", "a.go").unwrap();
            let base = file.span.start.0;

            let Decl::Func(func) = &file.decls[3] else {
                panic!("expected func decl");
            };
            let at = (func.name.span.start.0 - base) as usize;
            assert_eq!(&text[at..at + 3], "Set");

            let position = fileset.position(func.name.pos()).unwrap();
            assert_eq!(position.filename, "example.com/m/a/a.go");
            assert_eq!(position.line, 18);
        }

        #[test]
        fn defines_symbols() {
            let frontend = MemoryFrontend::new().with_package(sample());
            let (_, loaded) = load(&frontend, &["example.com/m/a"], &LoadConfig::new());
            let package = &loaded.packages[0];
            let kinds: Vec<_> = package.info.defs.values().map(Symbol::kind).collect();
            assert_eq!(kinds, ["const", "type", "func"]);

            let Some(Symbol::Func(set)) = package.info.defs.values().last() else {
                panic!("expected func symbol");
            };
            assert_eq!(
                set.signature.recv,
                Some(Type::pointer(Type::named("example.com/m/a", "Level")))
            );
            assert_eq!(set.signature.to_string(), "(int) error");
        }

        #[test]
        fn qualifiers_resolve_through_imports() {
            let frontend = MemoryFrontend::new().with_package(sample());
            let (_, loaded) = load(&frontend, &["example.com/m/a"], &LoadConfig::new());
            let file = &loaded.packages[0].files[0];
            let Decl::Func(func) = &file.decls[3] else {
                panic!("expected func decl");
            };
            let Some(Expr::Call(call)) = func.body.as_ref().and_then(|b| b.first()) else {
                panic!("expected call");
            };
            let sig = call.signature.as_ref().unwrap();
            assert_eq!(sig.params, [Type::basic("string")]);
        }
    }

    mod eval_tests {
        use super::*;

        fn loaded_sample() -> (MemoryFrontend, SourcePackage) {
            let frontend = MemoryFrontend::new().with_package(sample());
            let (_, mut loaded) = load(&frontend, &["example.com/m/a"], &LoadConfig::new());
            let package = loaded.packages.remove(0);
            (frontend, package)
        }

        #[test]
        fn plain_and_wrapped_names_resolve() {
            let (frontend, pkg) = loaded_sample();
            let x = frontend.eval(&pkg, Pos::NONE, "X").unwrap();
            assert_eq!(x.ty.to_string(), "example.com/m/a.Level");
            assert_eq!(x.value, Some(ConstValue::Int(1)));

            let wrapped = wrap::encode("example.com/m/a.Level");
            let level = frontend.eval(&pkg, Pos::NONE, &wrapped).unwrap();
            assert_eq!(level.ty, Type::named("example.com/m/a", "Level"));
            assert!(level.value.is_none());
        }

        #[test]
        fn unresolvable_expressions_are_errors() {
            let (frontend, pkg) = loaded_sample();
            for expr in ["X + 1", "Set", "Missing", wrap::encode("example.com/m/b.Y").as_str()] {
                let err = frontend.eval(&pkg, Pos::NONE, expr).unwrap_err();
                assert!(matches!(err, FrontendError::Eval { .. }), "{expr}: {err}");
            }
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn unknown_pattern_is_an_error() {
            let frontend = MemoryFrontend::new().with_package(sample());
            let fileset = Arc::new(FileSet::new());
            let patterns = vec!["example.com/none".to_string()];
            let err = frontend
                .load(&LoadRequest {
                    patterns: &patterns,
                    config: &LoadConfig::new(),
                    fileset: &fileset,
                })
                .unwrap_err();
            assert!(matches!(err, FrontendError::NoPackages { .. }));
        }

        #[test]
        fn ellipsis_matches_subtree() {
            let frontend = MemoryFrontend::new()
                .with_package(PackageFixture::new("example.com/m"))
                .with_package(PackageFixture::new("example.com/m/sub"))
                .with_package(PackageFixture::new("example.com/mx"));
            let (_, loaded) = load(&frontend, &["example.com/m/..."], &LoadConfig::new());
            assert_eq!(loaded.roots, ["example.com/m", "example.com/m/sub"]);
        }

        #[test]
        fn closure_follows_imports() {
            let frontend = MemoryFrontend::new()
                .with_package(PackageFixture::new("m/a").import("m/b"))
                .with_package(PackageFixture::new("m/b").import("m/c"))
                .with_package(PackageFixture::new("m/c"))
                .with_package(PackageFixture::new("m/unrelated"));
            let (_, loaded) = load(&frontend, &["m/a"], &LoadConfig::new());
            let paths: Vec<_> = loaded.packages.iter().map(|p| p.path.as_str()).collect();
            assert_eq!(paths, ["m/a", "m/b", "m/c"]);
            assert_eq!(loaded.roots, ["m/a"]);
        }

        #[test]
        fn test_files_follow_config() {
            let frontend = MemoryFrontend::new().with_package(
                PackageFixture::new("m/a")
                    .file(FileFixture::new("a.go"))
                    .file(FileFixture::new("a_test.go")),
            );
            let (_, without) = load(&frontend, &["m/a"], &LoadConfig::new());
            assert_eq!(without.packages[0].files.len(), 1);

            let (_, with) = load(&frontend, &["m/a"], &LoadConfig::new().with_tests(true));
            assert_eq!(with.packages[0].files.len(), 2);
            assert!(with.packages[0].files[1].is_test());
        }

        #[test]
        fn syntax_mode_withholds_dependency_syntax() {
            use crate::config::LoadMode;

            let frontend = MemoryFrontend::new()
                .with_package(
                    PackageFixture::new("m/a")
                        .import("m/b")
                        .file(FileFixture::new("a.go")),
                )
                .with_package(PackageFixture::new("m/b").file(FileFixture::new("b.go")));
            let config = LoadConfig::new().with_mode(LoadMode::Syntax);
            let (_, loaded) = load(&frontend, &["m/a"], &config);
            assert_eq!(loaded.packages[0].files.len(), 1);
            assert!(loaded.packages[1].files.is_empty());
        }

        #[test]
        fn from_json_reads_fixtures() {
            let json = r#"[
                {
                    "path": "m/a",
                    "files": [{
                        "name": "a.go",
                        "decls": [
                            {"kind": "const", "specs": [
                                {"names": ["A"], "values": [{"kind": "int", "value": 1}]}
                            ]},
                            {"kind": "type", "specs": [
                                {"name": "T", "ty": {"struct": [
                                    {"names": ["F"], "ty": {"named": "string"}, "doc": ["+tag=v"]}
                                ]}}
                            ]}
                        ]
                    }]
                }
            ]"#;
            let frontend = MemoryFrontend::from_json(json).unwrap();
            let fixture = frontend.package("m/a").unwrap();
            assert_eq!(fixture.package_name(), "a");
            let (_, loaded) = load(&frontend, &["m/a"], &LoadConfig::new());
            assert_eq!(loaded.packages[0].info.defs.len(), 2);
        }

        #[test]
        fn from_json_rejects_garbage() {
            assert!(matches!(
                MemoryFrontend::from_json("{not json"),
                Err(FrontendError::Json(_))
            ));
        }
    }
}
