//! Live queries: mutable, in-progress query configurations.
//!
//! A live query carries text, language, execution options, and any
//! arguments set so far. It can be executed directly, or captured into the
//! registry as a named memento via
//! [`Session::add_named_query`](crate::session::Session::add_named_query).

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::binder::Arguments;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Invocation;
use crate::executor::ResultStream;
use crate::memento::QueryLanguage;
use crate::memento::QueryMemento;
use crate::options::CacheMode;
use crate::options::ExecutionOptions;
use crate::options::FlushMode;
use crate::session::Session;
use crate::value::FromRow;
use crate::value::IntoValue;

#[derive(Clone, Debug)]
pub struct LiveQuery {
    name:       Option<String>,
    text:       String,
    language:   QueryLanguage,
    options:    ExecutionOptions,
    positional: BTreeMap<usize, crate::value::Value>,
    named:      HashMap<String, crate::value::Value>,
}

impl LiveQuery {
    pub(crate) fn new(text: impl Into<String>, language: QueryLanguage) -> Self {
        Self {
            name:       None,
            text:       text.into(),
            language,
            options:    ExecutionOptions::new(),
            positional: BTreeMap::new(),
            named:      HashMap::new(),
        }
    }

    pub(crate) fn from_memento(memento: &Arc<QueryMemento>) -> Self {
        Self {
            name:       Some(memento.name().to_string()),
            text:       memento.query_text().to_string(),
            language:   memento.language(),
            options:    memento.default_options().clone(),
            positional: BTreeMap::new(),
            named:      HashMap::new(),
        }
    }

    /// The registered name this query was created from, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> QueryLanguage {
        self.language
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    // Argument setters.

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl IntoValue) -> &mut Self {
        self.named.insert(name.into(), value.into_value());
        self
    }

    /// Sets the argument for an ordinal `?index` marker; indices are
    /// 1-based.
    pub fn set_positional(&mut self, index: usize, value: impl IntoValue) -> &mut Self {
        self.positional.insert(index, value.into_value());
        self
    }

    // Option setters, mirrored by getters below; a promoted memento
    // captures whatever is set here.

    pub fn set_fetch_size(&mut self, fetch_size: u32) -> &mut Self {
        self.options.fetch_size = Some(fetch_size);
        self
    }

    pub fn set_first_result(&mut self, first_result: usize) -> &mut Self {
        self.options.first_result = Some(first_result);
        self
    }

    pub fn set_max_results(&mut self, max_results: usize) -> &mut Self {
        self.options.max_results = Some(max_results);
        self
    }

    pub fn set_flush_mode(&mut self, flush_mode: FlushMode) -> &mut Self {
        self.options.flush_mode = Some(flush_mode);
        self
    }

    pub fn set_cache_mode(&mut self, cache_mode: CacheMode) -> &mut Self {
        self.options.cache_mode = Some(cache_mode);
        self
    }

    pub fn set_cache_region(&mut self, cache_region: impl Into<String>) -> &mut Self {
        self.options.cache_region = Some(cache_region.into());
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn fetch_size(&self) -> Option<u32> {
        self.options.fetch_size
    }

    pub fn first_result(&self) -> Option<usize> {
        self.options.first_result
    }

    pub fn max_results(&self) -> Option<usize> {
        self.options.max_results
    }

    pub fn flush_mode(&self) -> Option<FlushMode> {
        self.options.flush_mode
    }

    pub fn cache_mode(&self) -> Option<CacheMode> {
        self.options.cache_mode
    }

    pub fn cache_region(&self) -> Option<&str> {
        self.options.cache_region.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.options.timeout
    }

    /// The call-site arguments accumulated so far. Setting both ordinal and
    /// named arguments on one query is a style mix and fails here.
    pub fn arguments(&self) -> Result<Arguments> {
        match (self.positional.is_empty(), self.named.is_empty()) {
            (true, true) => Ok(Arguments::None),
            (false, false) => Err(Error::MixedParameterStyle),
            (true, false) => Ok(Arguments::Named(self.named.clone())),
            (false, true) => {
                // Ordinal arguments must be contiguous from 1; a gap means
                // some referenced index has no value.
                let max = *self.positional.keys().next_back().unwrap_or(&0);
                if self.positional.len() != max {
                    return Err(Error::ParameterCountMismatch { referenced: max, supplied: self.positional.len() });
                }
                Ok(Arguments::Positional(self.positional.values().cloned().collect()))
            }
        }
    }

    /// Produces the lazy result stream for this query's current state.
    pub fn stream(&self, session: &Session) -> Result<ResultStream> {
        let name = self.name.clone().unwrap_or_else(|| "(ad-hoc)".to_string());
        // The live options already include any memento defaults (inherited
        // at creation), so the backing memento carries none.
        let memento = Arc::new(QueryMemento::new(name, &self.text, self.language, ExecutionOptions::new())?);
        Invocation::new(memento).bind(&self.arguments()?)?.options(&self.options).run(session)
    }

    /// Executes and materializes every row.
    pub async fn list(&self, session: &Session) -> Result<Vec<turso::Row>> {
        self.stream(session)?.collect().await
    }

    /// Executes and materializes every row, decoded as `T`.
    pub async fn list_as<T: FromRow>(&self, session: &Session) -> Result<Vec<T>> {
        self.stream(session)?.collect_as().await
    }

    /// Executes and returns the first row, if any.
    pub async fn one(&self, session: &Session) -> Result<Option<turso::Row>> {
        self.stream(session)?.first().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn query(text: &str) -> LiveQuery {
        LiveQuery::new(text, QueryLanguage::Sql)
    }

    #[test]
    fn test_option_setters_and_getters_round_trip() {
        let mut q = query("select * from book");
        q.set_fetch_size(20)
            .set_first_result(20)
            .set_max_results(20)
            .set_flush_mode(FlushMode::Commit)
            .set_cache_mode(CacheMode::Ignore)
            .set_cache_region("custom-region");

        assert_eq!(q.fetch_size(), Some(20));
        assert_eq!(q.first_result(), Some(20));
        assert_eq!(q.max_results(), Some(20));
        assert_eq!(q.flush_mode(), Some(FlushMode::Commit));
        assert_eq!(q.cache_mode(), Some(CacheMode::Ignore));
        assert_eq!(q.cache_region(), Some("custom-region"));
    }

    #[test]
    fn test_arguments_named() {
        let mut q = query("select * from book where isbn = :isbn");
        q.set_parameter("isbn", "978-3");

        match q.arguments().unwrap() {
            Arguments::Named(map) => assert_eq!(map.get("isbn"), Some(&Value::Text("978-3".to_string()))),
            other => panic!("unexpected arguments: {:?}", other),
        }
    }

    #[test]
    fn test_arguments_positional_in_index_order() {
        let mut q = query("select * from book where a = ?1 and b = ?2");
        q.set_positional(2, 20i64);
        q.set_positional(1, 10i64);

        match q.arguments().unwrap() {
            Arguments::Positional(values) => {
                assert_eq!(values, vec![Value::Integer(10), Value::Integer(20)]);
            }
            other => panic!("unexpected arguments: {:?}", other),
        }
    }

    #[test]
    fn test_arguments_positional_gap_is_count_mismatch() {
        let mut q = query("select * from book where a = ?1 and b = ?3");
        q.set_positional(1, 1i64);
        q.set_positional(3, 3i64);

        let err = q.arguments().unwrap_err();
        assert!(matches!(err, Error::ParameterCountMismatch { referenced: 3, supplied: 2 }));
    }

    #[test]
    fn test_arguments_mixing_styles_fails() {
        let mut q = query("select * from book");
        q.set_parameter("name", "x");
        q.set_positional(1, 1i64);

        assert!(matches!(q.arguments().unwrap_err(), Error::MixedParameterStyle));
    }

    #[test]
    fn test_from_memento_inherits_definition() {
        let defaults = ExecutionOptions::new().with_max_results(7);
        let memento = Arc::new(
            QueryMemento::new("byId", "select * from book where id = :id", QueryLanguage::Hql, defaults).unwrap(),
        );

        let q = LiveQuery::from_memento(&memento);
        assert_eq!(q.name(), Some("byId"));
        assert_eq!(q.text(), "select * from book where id = :id");
        assert_eq!(q.language(), QueryLanguage::Hql);
        assert_eq!(q.max_results(), Some(7));
    }
}
