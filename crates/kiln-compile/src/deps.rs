use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of one compiled class, as produced by the compiler's own naming
/// scheme (e.g. `com.acme.Widget$Inner`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ClassName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Reverse dependency index over compiled classes: for each class, the set
/// of classes whose compiled output references it.
///
/// Every class ever seen as a dependent or a dependency is a key, possibly
/// with an empty dependent set. The graph is a pure value (the only thing
/// the incremental store persists), and cyclic class relationships are
/// representable and round-trip untouched. Ordered collections keep
/// iteration lexicographic and persisted bytes stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDependencyGraph {
    dependents: BTreeMap<ClassName, BTreeSet<ClassName>>,
}

impl ClassDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classes whose compiled output references `class`.
    ///
    /// Empty for a name the graph has never seen; an unknown class is not
    /// an error.
    pub fn dependents_of<'a>(
        &'a self,
        class: &ClassName,
    ) -> impl Iterator<Item = &'a ClassName> + 'a {
        self.dependents.get(class).into_iter().flatten()
    }

    /// Records that `dependent`'s compiled output references `dependency`.
    ///
    /// Both ends become keys; recording the same edge twice is a no-op.
    pub fn record_edge(&mut self, dependent: ClassName, dependency: ClassName) {
        self.dependents.entry(dependent.clone()).or_default();
        self.dependents.entry(dependency).or_default().insert(dependent);
    }

    /// Forgets `class` entirely: its key and every reference to it from
    /// other dependent sets.
    pub fn remove_class(&mut self, class: &ClassName) {
        self.dependents.remove(class);
        for dependents in self.dependents.values_mut() {
            dependents.remove(class);
        }
    }

    /// Replaces the full outgoing edge set of `dependent`.
    ///
    /// A recompiled class may have dropped dependencies; its stale outgoing
    /// edges must not survive the merge. The dependent remains a key even
    /// when the new set is empty, and every new dependency becomes one.
    pub fn replace_outgoing(&mut self, dependent: &ClassName, new_dependencies: BTreeSet<ClassName>) {
        for dependents in self.dependents.values_mut() {
            dependents.remove(dependent);
        }
        self.dependents.entry(dependent.clone()).or_default();
        for dependency in new_dependencies {
            self.dependents
                .entry(dependency)
                .or_default()
                .insert(dependent.clone());
        }
    }

    /// All known classes, in lexicographic order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassName> {
        self.dependents.keys()
    }

    pub fn contains(&self, class: &ClassName) -> bool {
        self.dependents.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Checks that every recorded dependent is itself a key.
    ///
    /// A persisted record failing this check is stale or hand-edited;
    /// callers degrade to a full rebuild instead of trusting it.
    pub fn is_consistent(&self) -> bool {
        self.dependents
            .values()
            .flatten()
            .all(|dependent| self.dependents.contains_key(dependent))
    }
}
