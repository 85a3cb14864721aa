use crate::changes::ChangeSet;
use crate::compiler::Compiler;
use crate::deps::{ClassDependencyGraph, ClassName};
use crate::{CompileError, Result};
use std::collections::BTreeSet;

/// Outcome of one incremental analysis pass: the classes that were
/// recompiled and the dependency graph to persist for the next build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompilationResult {
    pub recompiled: BTreeSet<ClassName>,
    pub graph: ClassDependencyGraph,
}

/// Computes the minimal safe recompilation set for `changes` and drives
/// `compiler` over it, layer by layer, until no newly impacted class
/// remains.
///
/// `previous` is borrowed untouched. Impact is always evaluated against it
/// (the shape every surviving class was last compiled against) while merged
/// edges accumulate in a working copy, so a class that depended on a dirty
/// class's old shape is recompiled even though its own source is unchanged.
/// Removed classes seed impact but are never compiled and do not survive in
/// the returned graph.
///
/// Any compile failure aborts the whole pass; no partial result escapes, so
/// only a completed fixpoint is ever persisted. Termination is bounded by
/// the class universe: a class never re-enters the frontier once recompiled
/// this pass, and each layer is visited in lexicographic order for
/// reproducible logs and batching.
pub fn analyze<C>(
    previous: &ClassDependencyGraph,
    changes: &ChangeSet,
    compiler: &C,
) -> Result<RecompilationResult>
where
    C: Compiler + ?Sized,
{
    let mut graph = previous.clone();
    for class in changes.removed() {
        graph.remove_class(class);
    }

    let mut recompiled: BTreeSet<ClassName> = BTreeSet::new();
    let mut impact_seed = changes.dirty_classes();
    let mut pending: BTreeSet<ClassName> = changes
        .added()
        .union(changes.modified())
        .cloned()
        .collect();

    loop {
        for class in &impact_seed {
            for dependent in previous.dependents_of(class) {
                if !recompiled.contains(dependent) && !changes.removed().contains(dependent) {
                    pending.insert(dependent.clone());
                }
            }
        }

        if pending.is_empty() {
            break;
        }

        let layer = std::mem::take(&mut pending);
        tracing::debug!(
            target = "kiln.compile",
            layer_size = layer.len(),
            "recompiling frontier layer"
        );

        let members: Vec<ClassName> = layer.iter().cloned().collect();
        let results = compiler.compile_batch(&members);
        if results.len() != members.len() {
            return Err(CompileError::LayerResultMismatch {
                expected: members.len(),
                got: results.len(),
            });
        }
        for (class, result) in members.iter().zip(results) {
            let compiled = result.map_err(|cause| CompileError::CompilationFailed {
                class: class.clone(),
                cause,
            })?;
            graph.replace_outgoing(class, compiled.dependencies);
        }

        recompiled.extend(layer.iter().cloned());
        impact_seed = layer;
    }

    Ok(RecompilationResult { recompiled, graph })
}
