//! Engine registry for managing available analysis engines

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use verdict_core::{AnalysisEngine, EngineDescriptor, EngineKind, Error, Reliability, Result};

type EngineMap = BTreeMap<String, Arc<dyn AnalysisEngine>>;

/// Optional criteria for listing descriptors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorFilter {
    /// Only engines of this kind
    pub kind: Option<EngineKind>,
    /// Only engines at or above this tier
    pub min_reliability: Option<Reliability>,
}

impl DescriptorFilter {
    pub fn kind(mut self, kind: EngineKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn min_reliability(mut self, level: Reliability) -> Self {
        self.min_reliability = Some(level);
        self
    }

    /// Whether `descriptor` satisfies every set criterion
    pub fn matches(&self, descriptor: &EngineDescriptor) -> bool {
        self.kind.is_none_or(|kind| descriptor.kind == kind)
            && self
                .min_reliability
                .is_none_or(|min| descriptor.reliability >= min)
    }
}

/// Registry of named analysis engines
///
/// Reads take a shared lock and never block each other. `register` and
/// `unregister` take the exclusive lock, so a reader iterating the engine set
/// never observes a half-registered engine. Batches work on a
/// [`snapshot`](EngineRegistry::snapshot), so later registrations do not
/// affect a batch already in flight.
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<EngineMap>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineMap> {
        self.engines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineMap> {
        self.engines.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an engine
    ///
    /// Fails with [`Error::DuplicateEngineName`] if an engine with the same
    /// name is already present; the registry is left unchanged.
    pub fn register(&self, engine: Arc<dyn AnalysisEngine>) -> Result<()> {
        let name = engine.name().to_string();
        let mut engines = self.write();
        if engines.contains_key(&name) {
            return Err(Error::DuplicateEngineName(name));
        }
        info!(
            engine = %name,
            kind = %engine.kind(),
            reliability = %engine.reliability(),
            "registered engine"
        );
        engines.insert(name, engine);
        Ok(())
    }

    /// Remove an engine by name; a no-op if it is absent
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn AnalysisEngine>> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            info!(engine = %name, "unregistered engine");
        }
        removed
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisEngine>> {
        self.read().get(name).cloned()
    }

    /// Check whether an engine is registered
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// All registered engines, ordered by name
    pub fn snapshot(&self) -> Vec<Arc<dyn AnalysisEngine>> {
        self.read().values().cloned().collect()
    }

    /// Resolve an explicit list of names to engines
    ///
    /// Fails with [`Error::EngineNotFound`] on the first unknown name. A name
    /// listed twice resolves to a single engine; first occurrence order is kept.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn AnalysisEngine>>> {
        let engines = self.read();
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                debug!(engine = %name, "duplicate engine name in selection, ignoring");
                continue;
            }
            let engine = engines
                .get(name)
                .ok_or_else(|| Error::EngineNotFound(name.to_string()))?;
            resolved.push(Arc::clone(engine));
        }

        Ok(resolved)
    }

    /// Descriptors of every registered engine, ordered by name
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.list(DescriptorFilter::default())
    }

    /// Descriptors matching `filter`, ordered by name
    pub fn list(&self, filter: DescriptorFilter) -> Vec<EngineDescriptor> {
        self.read()
            .values()
            .map(|engine| engine.descriptor())
            .filter(|descriptor| filter.matches(descriptor))
            .collect()
    }

    /// Descriptors of engines of the given kind
    pub fn by_kind(&self, kind: EngineKind) -> Vec<EngineDescriptor> {
        self.list(DescriptorFilter::default().kind(kind))
    }

    /// Descriptors of engines at or above `min` reliability
    pub fn by_min_reliability(&self, min: Reliability) -> Vec<EngineDescriptor> {
        self.list(DescriptorFilter::default().min_reliability(min))
    }

    /// Get the number of registered engines
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use verdict_core::{AnalysisRequest, Facts, QualityMeta, ResultEnvelope, RunContext};

    struct StubEngine {
        name: &'static str,
        kind: EngineKind,
        reliability: Reliability,
    }

    impl StubEngine {
        fn arc(name: &'static str, kind: EngineKind, reliability: Reliability) -> Arc<dyn AnalysisEngine> {
            Arc::new(Self {
                name,
                kind,
                reliability,
            })
        }
    }

    #[async_trait]
    impl AnalysisEngine for StubEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn reliability(&self) -> Reliability {
            self.reliability
        }

        async fn run(&self, request: &AnalysisRequest, _ctx: &RunContext) -> Result<ResultEnvelope> {
            Ok(ResultEnvelope::for_request(
                self.name,
                request,
                Facts::new(),
                QualityMeta::new(1.0, 0.0, 1.0),
            ))
        }
    }

    fn populated() -> EngineRegistry {
        let registry = EngineRegistry::new();
        registry
            .register(StubEngine::arc("trend", EngineKind::Traditional, Reliability::High))
            .unwrap();
        registry
            .register(StubEngine::arc("phase", EngineKind::Traditional, Reliability::Medium))
            .unwrap();
        registry
            .register(StubEngine::arc("gaps", EngineKind::Scanner, Reliability::Low))
            .unwrap();
        registry
    }

    #[test]
    fn test_register_and_get() {
        let registry = populated();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("trend"));
        assert_eq!(registry.get("phase").unwrap().name(), "phase");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = populated();
        let result =
            registry.register(StubEngine::arc("trend", EngineKind::Scanner, Reliability::Low));

        match tokio_test::assert_err!(result) {
            Error::DuplicateEngineName(name) => assert_eq!(name, "trend"),
            other => panic!("Expected DuplicateEngineName, got {other:?}"),
        }
        // The original registration is untouched
        assert_eq!(registry.get("trend").unwrap().reliability(), Reliability::High);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unregister_is_noop_when_absent() {
        let registry = populated();
        assert!(registry.unregister("missing").is_none());
        assert!(registry.unregister("gaps").is_some());
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister("gaps").is_none());
    }

    #[test]
    fn test_filters() {
        let registry = populated();

        let traditional: Vec<_> = registry
            .by_kind(EngineKind::Traditional)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(traditional, vec!["phase", "trend"]);

        assert_eq!(registry.by_min_reliability(Reliability::Low).len(), 3);
        assert_eq!(registry.by_min_reliability(Reliability::Medium).len(), 2);
        let high = registry.by_min_reliability(Reliability::High);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].name, "trend");

        let filter = DescriptorFilter::default()
            .kind(EngineKind::Scanner)
            .min_reliability(Reliability::Medium);
        assert!(registry.list(filter).is_empty());
    }

    #[test]
    fn test_resolve() {
        let registry = populated();

        let engines = registry.resolve(&["trend", "gaps", "trend"]).unwrap();
        let names: Vec<_> = engines.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["trend", "gaps"]);

        match registry.resolve(&["trend", "nope"]) {
            Err(Error::EngineNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("Expected EngineNotFound, got {:?}", other.map(|v| v.len())),
        }

        let none: [&str; 0] = [];
        assert!(registry.resolve(&none).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let registry = Arc::new(populated());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for _ in 0..100 {
                        let snapshot = registry.snapshot();
                        assert!(snapshot.len() >= 3);
                    }
                });
            }
            let writer = Arc::clone(&registry);
            scope.spawn(move || {
                writer
                    .register(StubEngine::arc("late", EngineKind::Scanner, Reliability::Low))
                    .unwrap();
            });
        });

        assert_eq!(registry.len(), 4);
    }
}
