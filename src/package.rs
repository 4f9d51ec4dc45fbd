//! One registered package.
//!
//! A [`Package`] owns the front end's view of the package and four
//! registries (constants, type names, functions, signatures), a package doc
//! and a per-declaration doc index. It is built by the graph builder and is
//! read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use tracing::debug;

use pkgreg_core::doc::Doc;
use pkgreg_core::node::Ident;
use pkgreg_core::object::{Constant, Function, TypeName};
use pkgreg_core::position::{FileSet, Pos, Position};
use pkgreg_core::registry::Registry;
use pkgreg_core::types::{ModuleInfo, Symbol};
use pkgreg_core::wrap::Wrapper;

use crate::binder;
use crate::config::LoadConfig;
use crate::error::{GraphError, GraphResult};
use crate::frontend::syntax::SourceFile;
use crate::frontend::{Frontend, FrontendError, SourcePackage, TypeAndValue};
use crate::graph::Universe;
use crate::scan::{self, Sink};
use crate::signatures::{self, SignatureEntry};

/// A package with its declarations indexed.
pub struct Package {
    source: SourcePackage,
    fileset: Arc<FileSet>,
    doc: Option<Arc<Doc>>,
    docs: HashMap<Pos, Arc<Doc>>,
    constants: Registry<Constant>,
    typenames: Registry<TypeName>,
    functions: Registry<Function>,
    signatures: Registry<SignatureEntry>,
    universe: OnceLock<Weak<Universe>>,
    /// Memoized `package_by_path` results.
    imports: RwLock<HashMap<String, Weak<Package>>>,
    source_dir: OnceLock<Option<PathBuf>>,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.source.id)
            .field("path", &self.source.path)
            .field("constants", &self.constants.len())
            .field("typenames", &self.typenames.len())
            .field("functions", &self.functions.len())
            .field("signatures", &self.signatures.len())
            .finish()
    }
}

impl Package {
    /// Scan a loaded package. Registries are left unfinalized.
    pub(crate) fn scan(source: SourcePackage, fileset: Arc<FileSet>) -> GraphResult<Package> {
        let mut package = Package {
            constants: Registry::new("const", Arc::clone(&fileset)),
            typenames: Registry::new("type", Arc::clone(&fileset)),
            functions: Registry::new("func", Arc::clone(&fileset)),
            signatures: Registry::new("signature", Arc::clone(&fileset)),
            fileset,
            doc: None,
            docs: HashMap::new(),
            universe: OnceLock::new(),
            imports: RwLock::new(HashMap::new()),
            source_dir: OnceLock::new(),
            source,
        };

        let sink = Sink {
            constants: &package.constants,
            typenames: &package.typenames,
            functions: &package.functions,
            signatures: &package.signatures,
        };
        let scanned = scan::scan_files(
            &package.source.path,
            &package.source.files,
            &package.source.info,
            &sink,
        )?;

        let bound = binder::bind_methods(
            &package.source.path,
            &package.fileset,
            &package.typenames,
            scanned.methods,
        );

        let files: Vec<&SourceFile> = package.source.files.iter().collect();
        let calls = signatures::collect_calls(&files, &package.signatures);

        let mut docs = HashMap::with_capacity(scanned.docs.len());
        for (pos, doc) in scanned.docs {
            docs.entry(pos).or_insert(doc);
        }
        package.docs = docs;
        package.doc = package_doc(&package.source.files);

        debug!(
            package = %package.source.path,
            constants = package.constants.len(),
            typenames = package.typenames.len(),
            functions = package.functions.len(),
            methods = bound,
            calls,
            "scanned package"
        );
        Ok(package)
    }

    /// Finalize every registry.
    pub(crate) fn init(&self) {
        self.constants.init();
        self.typenames.init();
        self.functions.init();
        self.signatures.init();
    }

    pub(crate) fn attach(&self, universe: Weak<Universe>) {
        let _ = self.universe.set(universe);
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.source.id
    }

    /// Declared package name.
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn path(&self) -> &str {
        &self.source.path
    }

    /// Name for display, as resolved by the configured namer.
    pub fn display_name(&self, config: &LoadConfig) -> String {
        config.package_name(&self.source.id, &self.source.name)
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.source.module.as_ref()
    }

    /// The package as the front end delivered it.
    pub fn source(&self) -> &SourcePackage {
        &self.source
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.source.files
    }

    pub fn fileset(&self) -> &Arc<FileSet> {
        &self.fileset
    }

    pub fn position(&self, pos: Pos) -> Option<Position> {
        self.fileset.position(pos)
    }

    /// Symbol declared by a defining identifier.
    pub fn object_of(&self, ident: &Ident) -> Option<&Symbol> {
        self.source.info.object_of(ident)
    }

    /// Directory holding the package's files.
    ///
    /// The module directory joined with the package path relative to the
    /// module path; the front end's directory when there is no module.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir
            .get_or_init(|| source_dir(&self.source))
            .as_deref()
    }

    // ========================================================================
    // Imports
    // ========================================================================

    /// Paths this package imports, sorted.
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.source.imports.iter().map(String::as_str)
    }

    /// The imported package at `path`.
    ///
    /// Only declared imports resolve; any other path gives `None` even when
    /// the graph holds it.
    pub fn package_by_path(&self, path: &str) -> Option<Arc<Package>> {
        if !self.source.imports.contains(path) {
            return None;
        }
        let memo = self
            .imports
            .read()
            .expect("Package imports RwLock poisoned")
            .get(path)
            .and_then(Weak::upgrade);
        if memo.is_some() {
            return memo;
        }

        let universe = self.universe.get()?.upgrade()?;
        let package = Arc::clone(universe.packages.get(path)?);
        self.imports
            .write()
            .expect("Package imports RwLock poisoned")
            .insert(path.to_string(), Arc::downgrade(&package));
        Some(package)
    }

    /// `path.name` as a bare identifier, through the graph's wrapper.
    pub fn qualified_ident(&self, name: &str) -> Option<String> {
        let universe = self.universe.get()?.upgrade()?;
        Some(universe.wrapper.wrap(&format!("{}.{}", self.source.path, name)))
    }

    /// Evaluate `expr` in this package's scope at `pos` with `frontend`.
    ///
    /// Qualified references (`example.com/pkg.Name`) are wrapped into bare
    /// identifiers through the graph's wrapper before the front end sees the
    /// expression.
    pub fn eval<F>(&self, frontend: &F, pos: Pos, expr: &str) -> GraphResult<TypeAndValue>
    where
        F: Frontend + ?Sized,
    {
        let expr = expr.trim();
        let eval_error = |source: FrontendError| GraphError::Eval {
            package: self.path().to_string(),
            expr: expr.to_string(),
            source,
        };
        if expr.is_empty() {
            return Err(eval_error(FrontendError::eval(expr, "empty expression")));
        }

        let wrapped = match self.universe.get().and_then(Weak::upgrade) {
            Some(universe) => universe.wrapper.wrap_expr(expr),
            None => Wrapper::new().wrap_expr(expr),
        };
        frontend
            .eval(&self.source, pos, &wrapped)
            .map_err(eval_error)
    }

    // ========================================================================
    // Docs
    // ========================================================================

    /// Package documentation from the file headers.
    pub fn doc(&self) -> Option<&Arc<Doc>> {
        self.doc.as_ref()
    }

    /// Doc of the declaration or struct field at `pos`.
    pub fn doc_of(&self, pos: Pos) -> Option<&Arc<Doc>> {
        self.docs.get(&pos)
    }

    // ========================================================================
    // Registries
    // ========================================================================

    pub fn constants(&self) -> &Registry<Constant> {
        &self.constants
    }

    pub fn typenames(&self) -> &Registry<TypeName> {
        &self.typenames
    }

    /// Functions without a receiver. Methods hang off their type name.
    pub fn functions(&self) -> &Registry<Function> {
        &self.functions
    }

    pub fn signatures(&self) -> &Registry<SignatureEntry> {
        &self.signatures
    }

    pub fn require_constant(&self, name: &str) -> GraphResult<&Arc<Constant>> {
        self.constants
            .element_by_name(name)
            .ok_or_else(|| GraphError::not_found(self.path(), "constant", name))
    }

    pub fn require_typename(&self, name: &str) -> GraphResult<&Arc<TypeName>> {
        self.typenames
            .element_by_name(name)
            .ok_or_else(|| GraphError::not_found(self.path(), "type", name))
    }

    pub fn require_function(&self, name: &str) -> GraphResult<&Arc<Function>> {
        self.functions
            .element_by_name(name)
            .ok_or_else(|| GraphError::not_found(self.path(), "function", name))
    }
}

/// File headers merged in file name order.
fn package_doc(files: &[SourceFile]) -> Option<Arc<Doc>> {
    let mut files: Vec<&SourceFile> = files.iter().collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Doc::parse_in_order(files.into_iter().filter_map(|f| f.doc.as_ref())).map(Arc::new)
}

fn source_dir(source: &SourcePackage) -> Option<PathBuf> {
    let module = source.module.as_ref();
    let Some((module, dir)) = module.and_then(|m| m.dir.as_ref().map(|d| (m, d))) else {
        return source.dir.clone();
    };
    if source.path == module.path {
        return Some(dir.clone());
    }
    match source
        .path
        .strip_prefix(module.path.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(suffix) => Some(dir.join(suffix)),
        None => source.dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, module: Option<ModuleInfo>, dir: Option<&str>) -> SourcePackage {
        let mut pkg = SourcePackage::new(path, path.rsplit('/').next().unwrap_or(path));
        pkg.module = module;
        pkg.dir = dir.map(PathBuf::from);
        pkg
    }

    mod source_dir_tests {
        use super::*;

        #[test]
        fn module_root_package() {
            let m = ModuleInfo::new("example.com/m").with_dir("/src/m");
            let pkg = source("example.com/m", Some(m), None);
            assert_eq!(source_dir(&pkg), Some(PathBuf::from("/src/m")));
        }

        #[test]
        fn nested_package_joins_suffix() {
            let m = ModuleInfo::new("example.com/m").with_dir("/src/m");
            let pkg = source("example.com/m/a/b", Some(m), None);
            assert_eq!(source_dir(&pkg), Some(PathBuf::from("/src/m/a/b")));
        }

        #[test]
        fn prefix_must_end_at_segment() {
            let m = ModuleInfo::new("example.com/m").with_dir("/src/m");
            let pkg = source("example.com/mx/a", Some(m), Some("/elsewhere"));
            assert_eq!(source_dir(&pkg), Some(PathBuf::from("/elsewhere")));
        }

        #[test]
        fn no_module_falls_back_to_front_end_dir() {
            let pkg = source("fmt", None, Some("/goroot/src/fmt"));
            assert_eq!(source_dir(&pkg), Some(PathBuf::from("/goroot/src/fmt")));
            assert_eq!(source_dir(&source("fmt", None, None)), None);
        }
    }

    mod scan_tests {
        use super::*;
        use pkgreg_core::node::{Comment, CommentGroup};
        use pkgreg_core::position::Span;

        fn headed_file(name: &str, base: u32, header: &str) -> SourceFile {
            let span = |a: u32, b: u32| Span::new(Pos(base + a), Pos(base + b));
            SourceFile {
                name: name.into(),
                span: span(0, 60),
                doc: Some(CommentGroup::new(vec![Comment::new(
                    header,
                    span(0, header.len() as u32),
                )])),
                package: Ident::new("a", span(40, 41)),
                decls: vec![],
            }
        }

        #[test]
        fn package_doc_follows_file_names() {
            // b.go sits earlier in the file set than a.go
            let files = [
                headed_file("b.go", 1, "// Second part."),
                headed_file("a.go", 100, "// First part."),
            ];
            let doc = package_doc(&files).unwrap();
            assert_eq!(doc.desc(), ["First part.", "Second part."]);
        }

        #[test]
        fn empty_package_has_no_docs() {
            let fset = Arc::new(FileSet::new());
            let pkg = Package::scan(source("m/a", None, None), fset).unwrap();
            pkg.init();
            assert!(pkg.doc().is_none());
            assert!(pkg.constants().is_empty());
            assert!(pkg.require_constant("X").unwrap_err().is_not_found());
        }

        #[test]
        fn imports_outside_a_graph_do_not_resolve() {
            let fset = Arc::new(FileSet::new());
            let mut src = source("m/a", None, None);
            src.imports.insert("m/b".into());
            let pkg = Package::scan(src, fset).unwrap();
            assert!(pkg.package_by_path("m/b").is_none());
            assert!(pkg.qualified_ident("X").is_none());
        }
    }
}
