//! Incremental compilation for Kiln.
//!
//! This crate answers the question at the heart of warm builds: which
//! compiled classes are impacted, transitively, by the classes whose source
//! just changed? It keeps a per-task reverse dependency graph, persists it
//! across builds through `kiln-cache`, and turns each build's change set
//! into the minimal safe recompilation set.
//!
//! Per build, [`get_class_dependency_graph`] seeds the pass with the
//! previous build's graph; [`analyze`] expands the change set layer by
//! layer against that snapshot, invoking the [`Compiler`] seam for each
//! frontier member and merging the returned edges; once the frontier
//! reaches fixpoint, the updated graph replaces the persisted record via
//! [`put_class_dependency_graph`]. [`IncrementalCompiler`] wires the cycle
//! together with the degradation policy: trouble reading the record costs a
//! full recompilation and a warning, never the build.
//!
//! Out of scope here: scheduling, the compiler itself and its bytecode
//! analysis, and any caching of compiled artifacts; this crate persists
//! only the dependency graph.

mod analyzer;
mod changes;
mod compiler;
mod deps;
mod driver;
mod info_store;

pub use analyzer::{analyze, RecompilationResult};
pub use changes::ChangeSet;
pub use compiler::{CompileFailure, CompiledClass, Compiler};
pub use deps::{ClassDependencyGraph, ClassName};
pub use driver::{IncrementalCompiler, RecompilationOutcome};
pub use info_store::{
    class_dependency_record_path, get_class_dependency_graph,
    invalidate_class_dependency_graph, put_class_dependency_graph,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// The front-end failed on a frontier member. The incremental pass is
    /// aborted and nothing is persisted.
    #[error("compilation of `{class}` failed")]
    CompilationFailed {
        class: ClassName,
        #[source]
        cause: CompileFailure,
    },

    /// A [`Compiler::compile_batch`] implementation broke its one-result-
    /// per-class contract.
    #[error("compiler returned {got} results for a layer of {expected} classes")]
    LayerResultMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Cache(#[from] kiln_cache::CacheError),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
