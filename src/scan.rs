//! Per-package declaration scan.
//!
//! Every file of a package is scanned in parallel. A worker adds the file's
//! constants, type names, plain functions and declared signatures to the
//! package registries directly (registries take concurrent `add`) and hands
//! back what must be joined after the whole package is seen: methods, and
//! the docs keyed by position.
//!
//! Doc index entries:
//! - constant spec: the spec position and each name's position
//! - type spec: the spec position
//! - function: the declaration position
//! - struct field: the field position, or for an embedded field the position
//!   of the embedded type's name (through `*`, qualifiers and type arguments).
//!   Every struct type of the file counts, not only declared ones.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{dispatcher, trace};

use pkgreg_core::doc::Doc;
use pkgreg_core::node::{CommentGroup, Ident};
use pkgreg_core::object::{Constant, Function, Object, TypeName};
use pkgreg_core::position::Pos;
use pkgreg_core::registry::Registry;
use pkgreg_core::types::Symbol;

use crate::error::{GraphError, GraphResult};
use crate::frontend::syntax::{
    Decl, DeclToken, Expr, Field, FuncDecl, GenDecl, SourceFile, Spec, StructType, TypeSpec,
    ValueSpec,
};
use crate::frontend::TypesInfo;
use crate::signatures::{self, SignatureEntry};

/// Registries a scan fills.
pub(crate) struct Sink<'a> {
    pub constants: &'a Registry<Constant>,
    pub typenames: &'a Registry<TypeName>,
    pub functions: &'a Registry<Function>,
    pub signatures: &'a Registry<SignatureEntry>,
}

/// What a file scan leaves for the package-level passes.
#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub methods: Vec<Arc<Function>>,
    pub docs: Vec<(Pos, Arc<Doc>)>,
}

impl FileScan {
    fn merge(mut self, other: FileScan) -> FileScan {
        self.methods.extend(other.methods);
        self.docs.extend(other.docs);
        self
    }
}

/// Scan `files` in parallel.
///
/// Workers log to the caller's current subscriber.
pub(crate) fn scan_files(
    package: &str,
    files: &[SourceFile],
    info: &TypesInfo,
    sink: &Sink<'_>,
) -> GraphResult<FileScan> {
    let dispatch = dispatcher::get_default(|d| d.clone());
    files
        .par_iter()
        .map(|file| {
            dispatcher::with_default(&dispatch, || {
                FileScanner {
                    package,
                    info,
                    sink,
                    out: FileScan::default(),
                }
                .scan(file)
            })
        })
        .try_reduce(FileScan::default, |a, b| Ok(a.merge(b)))
}

struct FileScanner<'a> {
    package: &'a str,
    info: &'a TypesInfo,
    sink: &'a Sink<'a>,
    out: FileScan,
}

impl FileScanner<'_> {
    fn scan(mut self, file: &SourceFile) -> GraphResult<FileScan> {
        trace!(package = self.package, file = %file.name, decls = file.decls.len(), "scanning file");
        for decl in &file.decls {
            match decl {
                Decl::Gen(group) => match group.tok {
                    DeclToken::Const => self.constants(group)?,
                    DeclToken::Type => self.types(group)?,
                    DeclToken::Import | DeclToken::Var => {}
                },
                Decl::Func(func) => self.func(func)?,
            }
        }
        self.struct_fields(file);
        self.sink
            .signatures
            .add(signatures::declared(file, self.info));
        Ok(self.out)
    }

    fn record(&mut self, pos: Pos, doc: &Option<Arc<Doc>>) {
        if let Some(doc) = doc {
            self.out.docs.push((pos, Arc::clone(doc)));
        }
    }

    fn unresolved(&self, ident: &Ident, expected: &'static str) -> GraphError {
        GraphError::UnresolvedSymbol {
            package: self.package.to_string(),
            name: ident.name.clone(),
            expected,
        }
    }

    // ------------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------------

    fn constants(&mut self, group: &GenDecl) -> GraphResult<()> {
        for spec in &group.specs {
            if let Spec::Value(spec) = spec {
                self.const_spec(group, spec)?;
            }
        }
        Ok(())
    }

    fn const_spec(&mut self, group: &GenDecl, spec: &ValueSpec) -> GraphResult<()> {
        let doc = parse_doc([&group.doc, &spec.doc, &spec.comment]);
        self.record(spec.span.start, &doc);

        let mut objects = Vec::with_capacity(spec.names.len());
        for ident in &spec.names {
            self.record(ident.pos(), &doc);
            if ident.name == "_" {
                objects.push(Arc::new(Constant::zero()));
                continue;
            }
            // every name shares the spec node: only the first is kept
            match self.info.object_of(ident) {
                Some(Symbol::Const(symbol)) => objects.push(Arc::new(Constant::new(
                    spec.span,
                    ident.clone(),
                    symbol.clone(),
                    doc.clone(),
                ))),
                _ => return Err(self.unresolved(ident, "const")),
            }
        }
        self.sink.constants.add(objects);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn types(&mut self, group: &GenDecl) -> GraphResult<()> {
        for spec in &group.specs {
            if let Spec::Type(spec) = spec {
                self.type_spec(group, spec)?;
            }
        }
        Ok(())
    }

    fn type_spec(&mut self, group: &GenDecl, spec: &TypeSpec) -> GraphResult<()> {
        let doc = parse_doc([&group.doc, &spec.doc, &spec.comment]);
        self.record(spec.span.start, &doc);

        if spec.name.name == "_" {
            return Ok(());
        }
        let Some(Symbol::TypeName(symbol)) = self.info.object_of(&spec.name) else {
            return Err(self.unresolved(&spec.name, "type"));
        };
        let object = Object::new(spec.span, spec.name.clone(), symbol.clone(), doc);
        self.sink.typenames.add([Arc::new(TypeName::new(object))]);
        Ok(())
    }

    /// Record the field docs of every struct type in the file, wherever it
    /// appears: type specs, variables, signatures, bodies, and nested inside
    /// pointers or type arguments.
    fn struct_fields(&mut self, file: &SourceFile) {
        let mut structs: Vec<&StructType> = Vec::new();
        file.walk(&mut |expr| {
            if let Expr::Struct(st) = expr {
                structs.push(st);
            }
        });
        for st in structs {
            for field in &st.fields {
                let doc = parse_doc([&field.doc, &field.comment]);
                self.record(field_pos(field), &doc);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn func(&mut self, func: &FuncDecl) -> GraphResult<()> {
        let doc = parse_doc([&func.doc]);
        self.record(func.span.start, &doc);

        if func.name.name == "_" {
            return Ok(());
        }
        let Some(Symbol::Func(symbol)) = self.info.object_of(&func.name) else {
            return Err(self.unresolved(&func.name, "func"));
        };
        let function = Arc::new(Function::new(
            func.span,
            func.name.clone(),
            symbol.clone(),
            doc,
        ));
        if func.recv.is_some() {
            self.out.methods.push(function);
        } else {
            self.sink.functions.add([function]);
        }
        Ok(())
    }
}

fn parse_doc<const N: usize>(groups: [&Option<CommentGroup>; N]) -> Option<Arc<Doc>> {
    Doc::parse(groups.into_iter().flatten()).map(Arc::new)
}

/// Doc index position of a struct field.
fn field_pos(field: &Field) -> Pos {
    if !field.is_embedded() {
        return field.span.start;
    }
    embedded_name(&field.ty)
        .map(Ident::pos)
        .unwrap_or(field.span.start)
}

/// Name of an embedded type: `T`, `*T`, `pkg.T`, `T[A]`.
fn embedded_name(ty: &Expr) -> Option<&Ident> {
    match ty {
        Expr::Ident(ident) => Some(ident),
        Expr::Star { x, .. } | Expr::Index { x, .. } => embedded_name(x),
        Expr::Selector { sel, .. } => Some(sel),
        _ => None,
    }
}
