use scrutiny_core::{Analyzer, Capabilities, ScrutinyError, ScrutinyResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct Registration {
    analyzer: Arc<dyn Analyzer>,
    enabled: bool,
}

/// A dependency name that does not resolve to a registered analyzer.
///
/// Unresolved dependencies are a soft condition: they contribute no
/// ordering constraint, but callers should surface them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDependency {
    /// The analyzer declaring the dependency.
    pub analyzer: String,
    /// The dependency name that did not resolve.
    pub dependency: String,
}

/// Registry of analysis units, keyed by unique name.
///
/// The registry owns each unit for its lifetime and is read-only while a
/// run executes. Execution order is derived from declared dependencies
/// with a priority-sorted deterministic base ordering.
#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Registration>,
}

impl AnalyzerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analyzer. Fails if the name is already taken.
    pub fn register<A: Analyzer + 'static>(&mut self, analyzer: A) -> ScrutinyResult<()> {
        self.register_shared(Arc::new(analyzer))
    }

    /// Registers an already-shared analyzer. Fails if the name is taken.
    pub fn register_shared(&mut self, analyzer: Arc<dyn Analyzer>) -> ScrutinyResult<()> {
        let name = analyzer.name().to_string();
        if self.analyzers.contains_key(&name) {
            return Err(ScrutinyError::Registry(format!(
                "analyzer '{name}' is already registered"
            )));
        }
        self.analyzers.insert(
            name,
            Registration {
                analyzer,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Removes an analyzer. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.analyzers.remove(name).is_some()
    }

    /// Looks up an analyzer by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.get(name).map(|r| Arc::clone(&r.analyzer))
    }

    /// All registered analyzers, in unspecified order.
    pub fn all(&self) -> Vec<Arc<dyn Analyzer>> {
        self.analyzers
            .values()
            .map(|r| Arc::clone(&r.analyzer))
            .collect()
    }

    /// Analyzers whose capabilities satisfy `predicate`.
    pub fn by_capability<F>(&self, predicate: F) -> Vec<Arc<dyn Analyzer>>
    where
        F: Fn(&Capabilities) -> bool,
    {
        self.analyzers
            .values()
            .filter(|r| predicate(&r.analyzer.capabilities()))
            .map(|r| Arc::clone(&r.analyzer))
            .collect()
    }

    /// Enables or disables an analyzer. Returns whether it exists.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.analyzers.get_mut(name) {
            Some(registration) => {
                registration.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether the named analyzer exists and is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.analyzers.get(name).is_some_and(|r| r.enabled)
    }

    /// Number of registered analyzers.
    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Reports every declared dependency that does not resolve to a
    /// registered analyzer. Does not fail; missing dependencies only
    /// relax ordering.
    pub fn validate_dependencies(&self) -> Vec<UnresolvedDependency> {
        let mut unresolved = Vec::new();
        for registration in self.analyzers.values() {
            for dependency in registration.analyzer.dependencies() {
                if !self.analyzers.contains_key(&dependency) {
                    unresolved.push(UnresolvedDependency {
                        analyzer: registration.analyzer.name().to_string(),
                        dependency,
                    });
                }
            }
        }
        unresolved.sort_by(|a, b| {
            a.analyzer
                .cmp(&b.analyzer)
                .then_with(|| a.dependency.cmp(&b.dependency))
        });
        unresolved
    }

    /// Computes a dependency-respecting execution order over all
    /// registered analyzers.
    ///
    /// Analyzers are first sorted by priority (then name) to fix a
    /// deterministic base ordering among independents, then each unit's
    /// dependencies are visited depth-first before the unit itself.
    /// Returns [`ScrutinyError::DependencyCycle`] before anything runs if
    /// the declared graph has a cycle.
    pub fn execution_order(&self) -> ScrutinyResult<Vec<Arc<dyn Analyzer>>> {
        let mut base: Vec<&Registration> = self.analyzers.values().collect();
        base.sort_by(|a, b| {
            a.analyzer
                .priority()
                .cmp(&b.analyzer.priority())
                .then_with(|| a.analyzer.name().cmp(b.analyzer.name()))
        });

        let mut order = Vec::with_capacity(base.len());
        let mut placed = HashSet::new();
        let mut visiting = HashSet::new();
        for registration in base {
            self.visit(
                registration.analyzer.name(),
                &mut order,
                &mut placed,
                &mut visiting,
            )?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        order: &mut Vec<Arc<dyn Analyzer>>,
        placed: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
    ) -> ScrutinyResult<()> {
        if placed.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            return Err(ScrutinyError::DependencyCycle {
                analyzer: name.to_string(),
            });
        }
        // A dependency that is not registered contributes no constraint;
        // validate_dependencies surfaces it separately.
        let Some(registration) = self.analyzers.get(name) else {
            return Ok(());
        };

        visiting.insert(name.to_string());
        for dependency in registration.analyzer.dependencies() {
            self.visit(&dependency, order, placed, visiting)?;
        }
        visiting.remove(name);

        placed.insert(name.to_string());
        order.push(Arc::clone(&registration.analyzer));
        Ok(())
    }
}
