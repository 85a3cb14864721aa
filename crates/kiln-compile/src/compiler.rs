use crate::deps::ClassName;
use std::collections::BTreeSet;
use std::fmt;

/// Successful compilation of one class: the raw outgoing edges extracted
/// from its compiled output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledClass {
    /// Classes whose binary surface the compiled output references.
    pub dependencies: BTreeSet<ClassName>,
}

/// Failure reported by the compiler front-end for one class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{diagnostic}")]
pub struct CompileFailure {
    pub diagnostic: String,
}

/// Compiler front-end seam.
///
/// Kiln relies only on the edge-reporting contract: a successful compile
/// returns the class's full post-compile dependency set, a failed one a
/// diagnostic. Implementations may batch or parallelize members of one
/// frontier layer internally; edges are merged into the graph only after
/// `compile` returns, so the graph never reflects a mid-recompile shape.
pub trait Compiler: Send + Sync + fmt::Debug {
    fn compile(&self, class: &ClassName) -> Result<CompiledClass, CompileFailure>;

    /// Compiles every member of one frontier layer.
    ///
    /// Layer members are mutually independent, so implementations may
    /// compile them concurrently. Must return one result per input class,
    /// in the same order; the default compiles sequentially.
    fn compile_batch(&self, classes: &[ClassName]) -> Vec<Result<CompiledClass, CompileFailure>> {
        classes.iter().map(|class| self.compile(class)).collect()
    }
}
