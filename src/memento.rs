//! Named-query mementos and the process-wide registry that stores them.
//!
//! A memento is an immutable snapshot of a query definition: its text, its
//! language, and the execution options it should default to. The registry is
//! shared by every session in the process; reads never block each other and
//! writes are short (an entry swap under a write lock).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::binder::scan;
use crate::error::Error;
use crate::error::Result;
use crate::options::ExecutionOptions;
use crate::query::LiveQuery;

/// The language a query text is written in. HQL-like text is handed to the
/// configured translator before execution; literal SQL passes through
/// unchanged apart from placeholder normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryLanguage {
    Hql,
    Sql,
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLanguage::Hql => write!(f, "hql"),
            QueryLanguage::Sql => write!(f, "sql"),
        }
    }
}

/// An immutable named-query definition.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryMemento {
    name:       String,
    query_text: String,
    language:   QueryLanguage,
    defaults:   ExecutionOptions,
}

impl QueryMemento {
    /// Builds a memento, scanning the query text eagerly so a malformed or
    /// style-mixing query fails at registration time, not at first use.
    pub fn new(
        name: impl Into<String>,
        query_text: impl Into<String>,
        language: QueryLanguage,
        defaults: ExecutionOptions,
    ) -> Result<Self> {
        let query_text = query_text.into();
        scan(&query_text)?;
        Ok(Self { name: name.into(), query_text, language, defaults })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn language(&self) -> QueryLanguage {
        self.language
    }

    pub fn default_options(&self) -> &ExecutionOptions {
        &self.defaults
    }
}

/// Process-wide named-query store.
///
/// Shared across sessions; pass it by handle (`Arc`) to the components that
/// need it rather than reaching for ambient global state. Reads go through
/// an atomically-swapped immutable snapshot, so a lookup never waits on a
/// writer building the next map; writers serialize among themselves and
/// publish with a single pointer swap.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    entries: RwLock<Arc<HashMap<String, Arc<QueryMemento>>>>,
    writer:  Mutex<()>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<HashMap<String, Arc<QueryMemento>>> {
        Arc::clone(&self.entries.read())
    }

    fn publish(&self, next: HashMap<String, Arc<QueryMemento>>) {
        *self.entries.write() = Arc::new(next);
    }

    /// Stores `memento` under its name. Re-registration under an existing
    /// name is refused; overwriting is a deliberate act, spelled
    /// [`register_replacing`](Self::register_replacing).
    pub fn register(&self, memento: QueryMemento) -> Result<Arc<QueryMemento>> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        if current.contains_key(memento.name()) {
            return Err(Error::DuplicateName(memento.name().to_string()));
        }
        tracing::debug!(name = memento.name(), language = %memento.language(), "registering named query");
        let stored = Arc::new(memento);
        let mut next = HashMap::clone(&current);
        next.insert(stored.name().to_string(), Arc::clone(&stored));
        self.publish(next);
        Ok(stored)
    }

    /// Stores `memento`, replacing any existing definition under the same
    /// name.
    pub fn register_replacing(&self, memento: QueryMemento) -> Arc<QueryMemento> {
        let _writer = self.writer.lock();
        tracing::debug!(name = memento.name(), "registering named query (replace)");
        let stored = Arc::new(memento);
        let mut next = HashMap::clone(&self.snapshot());
        next.insert(stored.name().to_string(), Arc::clone(&stored));
        self.publish(next);
        stored
    }

    /// Stores every memento, or none of them: the batch is checked for
    /// duplicate names (against the store and within itself) before
    /// anything is published.
    pub fn register_many(&self, mementos: Vec<QueryMemento>) -> Result<Vec<Arc<QueryMemento>>> {
        let _writer = self.writer.lock();
        let mut next = HashMap::clone(&self.snapshot());
        let mut stored = Vec::with_capacity(mementos.len());

        for memento in mementos {
            if next.contains_key(memento.name()) {
                return Err(Error::DuplicateName(memento.name().to_string()));
            }
            tracing::debug!(name = memento.name(), language = %memento.language(), "registering named query");
            let memento = Arc::new(memento);
            next.insert(memento.name().to_string(), Arc::clone(&memento));
            stored.push(memento);
        }

        self.publish(next);
        Ok(stored)
    }

    /// Captures a live query's current text and options into a new memento
    /// stored under `name`, with replace semantics. This is how an ad-hoc
    /// query becomes a reusable named one.
    pub fn promote(&self, name: impl Into<String>, query: &LiveQuery) -> Result<Arc<QueryMemento>> {
        let memento = QueryMemento::new(name, query.text(), query.language(), query.options().clone())?;
        Ok(self.register_replacing(memento))
    }

    /// Looks up a named query. Absence is a valid outcome, not an error.
    pub fn lookup(&self, name: &str) -> Option<Arc<QueryMemento>> {
        self.snapshot().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FlushMode;

    fn memento(name: &str) -> QueryMemento {
        QueryMemento::new(name, "select * from book", QueryLanguage::Hql, ExecutionOptions::new()).unwrap()
    }

    #[test]
    fn test_register_then_lookup_round_trip() {
        let registry = QueryRegistry::new();
        let defaults = ExecutionOptions::new().with_max_results(5).with_flush_mode(FlushMode::Commit);
        let memento =
            QueryMemento::new("simple", "select * from book", QueryLanguage::Hql, defaults.clone()).unwrap();
        registry.register(memento).unwrap();

        let found = registry.lookup("simple").unwrap();
        assert_eq!(found.name(), "simple");
        assert_eq!(found.query_text(), "select * from book");
        assert_eq!(found.language(), QueryLanguage::Hql);
        assert_eq!(found.default_options(), &defaults);
    }

    #[test]
    fn test_lookup_miss_is_none_not_error() {
        let registry = QueryRegistry::new();
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let registry = QueryRegistry::new();
        registry.register(memento("simple")).unwrap();

        let first = registry.lookup("simple").unwrap();
        for _ in 0..5 {
            assert_eq!(registry.lookup("simple").unwrap(), first);
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = QueryRegistry::new();
        registry.register(memento("simple")).unwrap();

        let err = registry.register(memento("simple")).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "simple"));
    }

    #[test]
    fn test_register_replacing_overwrites() {
        let registry = QueryRegistry::new();
        registry.register(memento("simple")).unwrap();

        let replacement =
            QueryMemento::new("simple", "select id from book", QueryLanguage::Sql, ExecutionOptions::new()).unwrap();
        registry.register_replacing(replacement);

        let found = registry.lookup("simple").unwrap();
        assert_eq!(found.query_text(), "select id from book");
        assert_eq!(found.language(), QueryLanguage::Sql);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_memento_rejects_mixed_parameter_styles_at_registration() {
        let err = QueryMemento::new(
            "broken",
            "select * from book where isbn = :isbn and title like ?1",
            QueryLanguage::Sql,
            ExecutionOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MixedParameterStyle));
    }

    #[test]
    fn test_names_and_len() {
        let registry = QueryRegistry::new();
        assert!(registry.is_empty());

        registry.register(memento("a")).unwrap();
        registry.register(memento("b")).unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_many_is_all_or_nothing() {
        let registry = QueryRegistry::new();
        registry.register(memento("existing")).unwrap();

        let err = registry.register_many(vec![memento("a"), memento("existing")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "existing"));
        assert!(registry.lookup("a").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_many_rejects_duplicates_within_the_batch() {
        let registry = QueryRegistry::new();

        let err = registry.register_many(vec![memento("a"), memento("a")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookups_proceed_during_concurrent_registration() {
        let registry = Arc::new(QueryRegistry::new());
        registry.register(memento("anchor")).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for q in 0..100 {
                    registry.register(memento(&format!("w-{}", q))).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(registry.lookup("anchor").is_some());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.len(), 101);
    }

    #[test]
    fn test_concurrent_registration_from_many_threads() {
        let registry = Arc::new(QueryRegistry::new());
        let mut handles = Vec::new();

        for t in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for q in 0..25 {
                    let name = format!("query-{}-{}", t, q);
                    registry.register(memento(&name)).unwrap();
                    assert!(registry.lookup(&name).is_some());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
    }
}
