//! pkgreg: cross-package symbol registry
//!
//! Given entry package patterns, loads the package graph through a
//! [`Frontend`](frontend::Frontend), indexes every top-level constant, named
//! type and function by source position with its parsed doc and bound
//! methods, and keeps per-module content hashes for incremental consumers.
//!
//! ```ignore
//! let packages = Packages::build(["example.com/m/..."], &LoadConfig::from_env(), &frontend)?;
//! for pkg in packages.directs() {
//!     for t in pkg.typenames().elements() {
//!         println!("{} has {} methods", t.name(), t.method_count());
//!     }
//! }
//! packages.save_sums()?;
//! ```

// Core data model - re-exported from pkgreg-core
pub use pkgreg_core::doc;
pub use pkgreg_core::node;
pub use pkgreg_core::object;
pub use pkgreg_core::position;
pub use pkgreg_core::registry;
pub use pkgreg_core::sum;
pub use pkgreg_core::types;
pub use pkgreg_core::wrap;

// Loading
pub mod config;
pub mod error;
pub mod frontend;

// Graph
pub mod graph;
pub mod package;
pub mod signatures;

mod binder;
mod scan;

pub use config::{LoadConfig, LoadMode, PackageNamer};
pub use error::{GraphError, GraphResult};
pub use graph::Packages;
pub use package::Package;
