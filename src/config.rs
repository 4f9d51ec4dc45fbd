//! Load configuration for graph construction.
//!
//! Configuration is layered:
//! 1. Defaults (`LoadConfig::default()`)
//! 2. Environment overrides (`LoadConfig::from_env()`)
//! 3. Builder calls (`with_*`)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{warn, Dispatch};

/// Working directory override.
pub const ENV_WORKDIR: &str = "PKGREG_WORKDIR";
/// Include test files (`1`/`true`).
pub const ENV_LOAD_TESTS: &str = "PKGREG_LOAD_TESTS";
/// Load mode (`files|imports|types|syntax|all`).
pub const ENV_LOAD_MODE: &str = "PKGREG_LOAD_MODE";

// ============================================================================
// Load Mode
// ============================================================================

/// How much the front end is asked to load for each package.
///
/// Modes are cumulative: each includes everything the previous one loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadMode {
    /// Package names and file lists.
    Files,
    /// Plus the import graph.
    Imports,
    /// Plus resolved type information.
    Types,
    /// Plus syntax trees of the requested packages.
    Syntax,
    /// Plus syntax trees of every dependency.
    #[default]
    AllSyntax,
}

impl LoadMode {
    /// Whether declarations can be scanned under this mode.
    pub fn includes_syntax(self) -> bool {
        self >= LoadMode::Syntax
    }

    /// Whether dependencies are loaded with syntax too.
    pub fn includes_dependency_syntax(self) -> bool {
        self == LoadMode::AllSyntax
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Files => "files",
            LoadMode::Imports => "imports",
            LoadMode::Types => "types",
            LoadMode::Syntax => "syntax",
            LoadMode::AllSyntax => "all",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognized load mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown load mode: {0} (expected files, imports, types, syntax or all)")]
pub struct ParseLoadModeError(pub String);

impl FromStr for LoadMode {
    type Err = ParseLoadModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" => Ok(LoadMode::Files),
            "imports" => Ok(LoadMode::Imports),
            "types" => Ok(LoadMode::Types),
            "syntax" => Ok(LoadMode::Syntax),
            "all" | "all_syntax" | "allsyntax" => Ok(LoadMode::AllSyntax),
            _ => Err(ParseLoadModeError(s.to_string())),
        }
    }
}

// ============================================================================
// Package Namer
// ============================================================================

/// Custom resolver for package display names.
pub trait PackageNamer: Send + Sync {
    /// Display name for the package with the given id, or `None` to keep the
    /// declared package name.
    fn package_name(&self, id: &str) -> Option<String>;
}

impl<F> PackageNamer for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn package_name(&self, id: &str) -> Option<String> {
        self(id)
    }
}

// ============================================================================
// Load Config
// ============================================================================

/// Options for [`Packages::build`](crate::graph::Packages::build).
#[derive(Clone, Default)]
pub struct LoadConfig {
    /// Directory patterns are resolved against; front end default if unset.
    pub workdir: Option<PathBuf>,
    pub mode: LoadMode,
    /// Whether test files are loaded.
    pub tests: bool,
    pub namer: Option<Arc<dyn PackageNamer>>,
    /// Subscriber receiving the events of a construction.
    pub dispatch: Option<Dispatch>,
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("workdir", &self.workdir)
            .field("mode", &self.mode)
            .field("tests", &self.tests)
            .field("namer", &self.namer.as_ref().map(|_| "<namer>"))
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}

impl LoadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(ENV_WORKDIR) {
            if !dir.is_empty() {
                self.workdir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(tests) = std::env::var(ENV_LOAD_TESTS) {
            self.tests = matches!(
                tests.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }

        if let Ok(mode) = std::env::var(ENV_LOAD_MODE) {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(err) => warn!(error = %err, "ignoring {}", ENV_LOAD_MODE),
            }
        }
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tests(mut self, tests: bool) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_namer(mut self, namer: impl PackageNamer + 'static) -> Self {
        self.namer = Some(Arc::new(namer));
        self
    }

    /// Send this construction's events to `dispatch` instead of the default
    /// subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Display name for a package, consulting the namer first.
    pub fn package_name(&self, id: &str, declared: &str) -> String {
        self.namer
            .as_ref()
            .and_then(|n| n.package_name(id))
            .unwrap_or_else(|| declared.to_string())
    }
}
