use crate::analyzer::analyze;
use crate::changes::ChangeSet;
use crate::compiler::Compiler;
use crate::deps::{ClassDependencyGraph, ClassName};
use crate::info_store;
use crate::Result;
use kiln_cache::{CacheDir, LockOptions, TaskIdentity};
use std::collections::BTreeSet;

/// Outcome of one build's incremental-compilation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompilationOutcome {
    /// Classes recompiled this build, in lexicographic order.
    pub recompiled: BTreeSet<ClassName>,
    /// Whether the pass degraded to compiling every known class.
    pub full_rebuild: bool,
}

/// Per-task driver around the persisted dependency graph.
///
/// Wraps one build's get → analyze → put cycle and the degradation policy:
/// a missing, unreadable, or inconsistent record costs a full recompilation
/// and a warning, never the build. Compile failures propagate and leave the
/// persisted graph untouched.
#[derive(Debug)]
pub struct IncrementalCompiler {
    cache: CacheDir,
    task: TaskIdentity,
    lock_options: LockOptions,
}

impl IncrementalCompiler {
    pub fn new(cache: CacheDir, task: TaskIdentity) -> Self {
        Self {
            cache,
            task,
            lock_options: LockOptions::default(),
        }
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn task(&self) -> &TaskIdentity {
        &self.task
    }

    /// Runs one incremental pass.
    ///
    /// `all_classes` is the task's current source universe; it seeds the
    /// forced full rebuild when no usable previous graph exists. On a
    /// successful fixpoint the updated graph replaces the persisted record
    /// wholesale; a recoverable persist failure is logged and swallowed,
    /// since the compiled artifacts already exist and the next build merely
    /// degrades to a full rebuild.
    pub fn execute<C>(
        &self,
        all_classes: &BTreeSet<ClassName>,
        changes: &ChangeSet,
        compiler: &C,
    ) -> Result<RecompilationOutcome>
    where
        C: Compiler + ?Sized,
    {
        let (previous, effective_changes, full_rebuild) = match self.load_previous_graph() {
            Some(graph) => (graph, changes.clone(), false),
            None => (
                ClassDependencyGraph::new(),
                ChangeSet::full_rebuild(all_classes.clone()),
                true,
            ),
        };

        let result = analyze(&previous, &effective_changes, compiler)?;

        if let Err(err) = info_store::put_class_dependency_graph(
            &self.cache,
            &self.task,
            self.lock_options,
            &result.graph,
        ) {
            tracing::warn!(
                target = "kiln.compile",
                task = %self.task.task(),
                error = %err,
                "failed to persist class dependency graph; next build will recompile everything"
            );
        }

        Ok(RecompilationOutcome {
            recompiled: result.recompiled,
            full_rebuild,
        })
    }

    /// Discards the persisted graph, forcing the next build to recompile
    /// everything.
    pub fn invalidate(&self) -> Result<()> {
        info_store::invalidate_class_dependency_graph(&self.cache, &self.task, self.lock_options)?;
        Ok(())
    }

    fn load_previous_graph(&self) -> Option<ClassDependencyGraph> {
        let graph = match info_store::get_class_dependency_graph(
            &self.cache,
            &self.task,
            self.lock_options,
        ) {
            Ok(Some(graph)) => graph,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(
                    target = "kiln.compile",
                    task = %self.task.task(),
                    error = %err,
                    "class dependency store unavailable; forcing full recompilation"
                );
                return None;
            }
        };

        if !graph.is_consistent() {
            tracing::warn!(
                target = "kiln.compile",
                task = %self.task.task(),
                "persisted class dependency graph is inconsistent; forcing full recompilation"
            );
            return None;
        }

        Some(graph)
    }
}
