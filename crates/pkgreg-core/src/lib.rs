//! Core data model for pkgreg.
//!
//! This crate holds the language-agnostic pieces of the package registry:
//! - Positions, spans and the shared file set
//! - Syntax leaves (identifiers, comments) and the resolved type model
//! - Documentation and annotation parsing
//! - Reversible identifier wrapping for qualified symbol paths
//! - Declaration objects and ordered, position-keyed registries
//! - The per-module content hash cache

pub mod doc;
pub mod node;
pub mod object;
pub mod position;
pub mod registry;
pub mod sum;
pub mod types;
pub mod wrap;
