//! Execution options attached to live queries and captured into mementos.

use std::time::Duration;

/// When the session's pending changes are flushed relative to query
/// execution. Flushing itself belongs to the session, not this engine; the
/// mode is carried so mementos can capture and replay it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushMode {
    #[default]
    Auto,
    Commit,
    Manual,
    Always,
}

/// How the second-level cache participates in a query, carried for the same
/// reason as [`FlushMode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    #[default]
    Normal,
    Ignore,
    Get,
    Put,
    Refresh,
}

/// Per-invocation execution configuration. Every field is optional; unset
/// fields fall through to the memento's defaults and then to system
/// defaults (first result 0, max results unbounded, fetch size left to the
/// driver, no timeout).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionOptions {
    pub fetch_size:   Option<u32>,
    pub first_result: Option<usize>,
    pub max_results:  Option<usize>,
    pub flush_mode:   Option<FlushMode>,
    pub cache_mode:   Option<CacheMode>,
    pub cache_region: Option<String>,
    pub timeout:      Option<Duration>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    pub fn with_first_result(mut self, first_result: usize) -> Self {
        self.first_result = Some(first_result);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_flush_mode(mut self, flush_mode: FlushMode) -> Self {
        self.flush_mode = Some(flush_mode);
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = Some(cache_mode);
        self
    }

    pub fn with_cache_region(mut self, cache_region: impl Into<String>) -> Self {
        self.cache_region = Some(cache_region.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-by-field merge: a field set on `self` (the live options) wins,
    /// an unset field takes the memento default.
    pub fn overlay(&self, defaults: &ExecutionOptions) -> ExecutionOptions {
        ExecutionOptions {
            fetch_size:   self.fetch_size.or(defaults.fetch_size),
            first_result: self.first_result.or(defaults.first_result),
            max_results:  self.max_results.or(defaults.max_results),
            flush_mode:   self.flush_mode.or(defaults.flush_mode),
            cache_mode:   self.cache_mode.or(defaults.cache_mode),
            cache_region: self.cache_region.clone().or_else(|| defaults.cache_region.clone()),
            timeout:      self.timeout.or(defaults.timeout),
        }
    }

    /// The row offset actually applied: unset means 0.
    pub fn effective_first_result(&self) -> usize {
        self.first_result.unwrap_or(0)
    }

    /// The row cap actually applied: unset means unbounded.
    pub fn effective_max_results(&self) -> Option<usize> {
        self.max_results
    }
}
