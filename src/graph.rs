//! Package graph construction.
//!
//! [`Packages::build`] turns entry patterns into a finalized graph:
//!
//! 1. **Load**: the front end returns every package of the import closure.
//!    Any package error is fatal.
//! 2. **Register**: starting from each entry, visit every package exactly
//!    once, imports first in sorted order, scanning its declarations. A
//!    package whose module holds an entry package is *direct*; its directory
//!    is hashed into that module's [`Sum`].
//! 3. **Finalize**: every registry of every package is initialized.
//!
//! The result is immutable. Packages reach their imports through the graph
//! with [`Package::package_by_path`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::sync::Arc;

use tracing::{debug, info, warn};

use pkgreg_core::doc::Doc;
use pkgreg_core::position::{FileSet, Pos};
use pkgreg_core::sum::Sum;
use pkgreg_core::types::ModuleInfo;
use pkgreg_core::wrap::Wrapper;

use crate::config::LoadConfig;
use crate::error::{GraphError, GraphResult};
use crate::frontend::{Frontend, LoadRequest, SourcePackage};
use crate::package::Package;

/// Shared state of one graph; packages hold a weak reference to it.
#[derive(Debug)]
pub(crate) struct Universe {
    pub(crate) entries: Vec<String>,
    pub(crate) fileset: Arc<FileSet>,
    pub(crate) packages: BTreeMap<String, Arc<Package>>,
    pub(crate) modules: BTreeSet<String>,
    pub(crate) directs: BTreeSet<String>,
    pub(crate) sums: BTreeMap<String, Sum>,
    pub(crate) wrapper: Wrapper,
}

/// A finalized package graph.
#[derive(Debug, Clone)]
pub struct Packages {
    universe: Arc<Universe>,
}

impl Packages {
    /// Load `patterns` through `frontend` and build the graph.
    ///
    /// Runs under `config.dispatch` when one is set.
    pub fn build<I, S, F>(patterns: I, config: &LoadConfig, frontend: &F) -> GraphResult<Packages>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Frontend + ?Sized,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        match &config.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || {
                Self::build_inner(patterns, config, frontend)
            }),
            None => Self::build_inner(patterns, config, frontend),
        }
    }

    fn build_inner<F>(patterns: Vec<String>, config: &LoadConfig, frontend: &F) -> GraphResult<Packages>
    where
        F: Frontend + ?Sized,
    {
        info!(patterns = ?patterns, mode = %config.mode, tests = config.tests, "building package graph");
        if !config.mode.includes_syntax() {
            warn!(mode = %config.mode, "load mode carries no syntax; registries will be empty");
        }

        let fileset = Arc::new(FileSet::new());
        let loaded = frontend
            .load(&LoadRequest {
                patterns: &patterns,
                config,
                fileset: &fileset,
            })
            .map_err(|source| GraphError::Load {
                patterns: patterns.clone(),
                source,
            })?;

        let mut sources: BTreeMap<String, SourcePackage> = BTreeMap::new();
        for package in loaded.packages {
            sources.entry(package.path.clone()).or_insert(package);
        }
        for package in sources.values() {
            if !package.errors.is_empty() {
                return Err(GraphError::PackageErrors {
                    id: package.id.clone(),
                    errors: package.errors.iter().map(ToString::to_string).collect(),
                });
            }
        }

        let mut ctx = BuildContext {
            fileset: Arc::clone(&fileset),
            sources,
            claimed: HashSet::new(),
            packages: BTreeMap::new(),
            modules: BTreeSet::new(),
            directs: BTreeSet::new(),
            sums: BTreeMap::new(),
        };

        // entry modules first, so direct classification sees all of them
        for root in &loaded.roots {
            let source = ctx.sources.get(root).ok_or_else(|| {
                GraphError::not_found(root.clone(), "package", root.clone())
            })?;
            if let Some(module) = &source.module {
                ctx.modules.insert(module.path.clone());
            }
            ctx.directs.insert(root.clone());
        }
        for root in &loaded.roots {
            ctx.register(root)?;
        }

        for package in ctx.packages.values() {
            package.init();
        }

        let universe = Arc::new(Universe {
            entries: loaded.roots,
            fileset,
            packages: ctx.packages,
            modules: ctx.modules,
            directs: ctx.directs,
            sums: ctx.sums,
            wrapper: Wrapper::new(),
        });
        for package in universe.packages.values() {
            package.attach(Arc::downgrade(&universe));
        }

        info!(
            packages = universe.packages.len(),
            directs = universe.directs.len(),
            modules = universe.modules.len(),
            "package graph built"
        );
        Ok(Packages { universe })
    }

    // ========================================================================
    // Packages
    // ========================================================================

    /// Paths of the packages the patterns matched.
    pub fn entries(&self) -> &[String] {
        &self.universe.entries
    }

    pub fn len(&self) -> usize {
        self.universe.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universe.packages.is_empty()
    }

    pub fn package(&self, path: &str) -> Option<&Arc<Package>> {
        self.universe.packages.get(path)
    }

    pub fn require_package(&self, path: &str) -> GraphResult<&Arc<Package>> {
        self.package(path)
            .ok_or_else(|| GraphError::not_found(path, "package", path))
    }

    /// Every package, sorted by path.
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.universe.packages.values()
    }

    /// Packages of the entry modules, sorted by path.
    pub fn directs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.universe
            .directs
            .iter()
            .filter_map(|path| self.universe.packages.get(path))
    }

    pub fn is_direct(&self, path: &str) -> bool {
        self.universe.directs.contains(path)
    }

    /// Paths of the entry modules, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.universe.modules.iter().map(String::as_str)
    }

    // ========================================================================
    // Sums
    // ========================================================================

    /// Hashes computed during this build for `module`.
    pub fn module_sum(&self, module: &str) -> Option<&Sum> {
        self.universe.sums.get(module)
    }

    /// The sum file persisted by an earlier run for `module`.
    pub fn previous_sum(&self, module: &str) -> Option<Sum> {
        Sum::load(self.module_info(module))
    }

    /// Write every module sum to its module directory.
    pub fn save_sums(&self) -> io::Result<()> {
        for (module, sum) in &self.universe.sums {
            sum.save()?;
            debug!(module = %module, packages = sum.len(), file = %sum.file_path().display(), "saved sum");
        }
        Ok(())
    }

    fn module_info(&self, module: &str) -> Option<&ModuleInfo> {
        self.universe
            .packages
            .values()
            .filter_map(|p| p.module())
            .find(|m| m.path == module)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Doc of the declaration or struct field at `pos`, in any package.
    pub fn doc_of(&self, pos: Pos) -> Option<&Arc<Doc>> {
        self.universe.packages.values().find_map(|p| p.doc_of(pos))
    }

    /// Identifier wrapper scoped to this graph.
    pub fn wrapper(&self) -> &Wrapper {
        &self.universe.wrapper
    }

    pub fn fileset(&self) -> &Arc<FileSet> {
        &self.universe.fileset
    }
}

// ============================================================================
// Registration
// ============================================================================

struct BuildContext {
    fileset: Arc<FileSet>,
    /// Loaded packages not yet registered.
    sources: BTreeMap<String, SourcePackage>,
    claimed: HashSet<String>,
    packages: BTreeMap<String, Arc<Package>>,
    modules: BTreeSet<String>,
    directs: BTreeSet<String>,
    sums: BTreeMap<String, Sum>,
}

impl BuildContext {
    fn register(&mut self, path: &str) -> GraphResult<()> {
        if !self.claimed.insert(path.to_string()) {
            return Ok(());
        }
        let source = self
            .sources
            .remove(path)
            .ok_or_else(|| GraphError::not_found(path, "package", path))?;

        for import in &source.imports {
            if !self.claimed.contains(import) && !self.sources.contains_key(import) {
                return Err(GraphError::MissingImport {
                    package: source.path.clone(),
                    import: import.clone(),
                });
            }
            self.register(import)?;
        }

        let package = Package::scan(source, Arc::clone(&self.fileset))?;
        self.classify(&package);
        self.packages.insert(path.to_string(), Arc::new(package));
        Ok(())
    }

    /// Mark a package of an entry module as direct and hash it.
    fn classify(&mut self, package: &Package) {
        let Some(module) = package.module() else {
            return;
        };
        if !self.modules.contains(&module.path) {
            return;
        }
        self.directs.insert(package.path().to_string());

        let Some(module_dir) = &module.dir else {
            debug!(module = %module.path, "module has no directory, not hashed");
            return;
        };
        let sum = self
            .sums
            .entry(module.path.clone())
            .or_insert_with(|| Sum::new(module_dir.clone()));
        match package.source_dir() {
            Some(dir) => sum.add(package.path(), dir),
            None => debug!(package = %package.path(), "no source directory, not hashed"),
        }
    }
}
