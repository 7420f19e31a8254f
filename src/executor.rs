//! Query execution: the per-invocation state machine and the lazy result
//! stream it produces.
//!
//! An invocation moves through `Built -> ParametersBound -> OptionsApplied
//! -> Executing -> Completed | Failed`. No transition is skipped; the
//! substrate fetch happens at most once, on first consumption of the
//! stream. Nothing here retries: query execution can have side effects, so
//! retry policy belongs to the caller.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::binder::Arguments;
use crate::binder::BoundParameterSet;
use crate::binder::bind;
use crate::error::Error;
use crate::error::ExecutionFailure;
use crate::error::Result;
use crate::memento::QueryLanguage;
use crate::memento::QueryMemento;
use crate::options::ExecutionOptions;
use crate::session::Session;
use crate::value::FromRow;
use crate::value::Value;

/// The execution substrate a session runs statements against. The blanket
/// implementation for [`Connection`](crate::connection::Connection) is the
/// production path; tests substitute slow or failing substrates.
#[async_trait::async_trait]
pub trait Substrate: Send + Sync {
    async fn fetch(&self, sql: &str, params: Vec<Value>) -> turso::Result<turso::Rows>;
}

#[async_trait::async_trait]
impl Substrate for crate::connection::Connection {
    async fn fetch(&self, sql: &str, params: Vec<Value>) -> turso::Result<turso::Rows> {
        self.query(sql, params).await
    }
}

/// Translates HQL-like query text into the substrate's native form.
/// Translation proper is an external collaborator; the default
/// implementation passes text through unchanged.
pub trait QueryTranslator: Send + Sync {
    fn translate(&self, text: &str) -> Result<String>;
}

/// Identity translation: the text is treated as already native.
#[derive(Debug, Default)]
pub struct PassthroughTranslator;

impl QueryTranslator for PassthroughTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Lifecycle of a single query invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryState {
    Built,
    ParametersBound,
    OptionsApplied,
    Executing,
    Completed,
    Failed,
}

/// A query invocation in flight, from memento to result stream.
#[derive(Debug)]
pub struct Invocation {
    memento: Arc<QueryMemento>,
    bound:   Option<BoundParameterSet>,
    options: Option<ExecutionOptions>,
    state:   QueryState,
}

impl Invocation {
    pub fn new(memento: Arc<QueryMemento>) -> Self {
        Self { memento, bound: None, options: None, state: QueryState::Built }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Resolves the memento's declared placeholders against `arguments`.
    pub fn bind(mut self, arguments: &Arguments) -> Result<Self> {
        self.bound = Some(bind(self.memento.query_text(), arguments)?);
        self.state = QueryState::ParametersBound;
        Ok(self)
    }

    /// Applies live options over the memento's defaults, field by field.
    /// Options applied here are honored regardless of when `bind` is
    /// called.
    pub fn options(mut self, live: &ExecutionOptions) -> Self {
        self.options = Some(live.overlay(self.memento.default_options()));
        self.state = QueryState::OptionsApplied;
        self
    }

    /// Produces the lazy result stream. Binding and option application are
    /// performed here (with empty arguments / options) if the caller did
    /// not do them explicitly, so the state machine never skips a step.
    pub fn run(self, session: &Session) -> Result<ResultStream> {
        let Self { memento, bound, options, .. } = self;

        let bound = match bound {
            Some(bound) => bound,
            None => bind(memento.query_text(), &Arguments::None)?,
        };
        let options = match options {
            Some(options) => options,
            None => ExecutionOptions::new().overlay(memento.default_options()),
        };

        let (sql, params) = bound.to_sql();
        let sql = match memento.language() {
            QueryLanguage::Sql => sql,
            QueryLanguage::Hql => session.translator().translate(&sql)?,
        };

        tracing::trace!(query = memento.name(), sql = %sql, params = ?params, "invocation ready");
        if let Some(fetch_size) = options.fetch_size {
            // The driver streams rows itself; the hint is recorded only.
            tracing::trace!(fetch_size, "fetch size hint not applied by substrate");
        }

        Ok(ResultStream {
            substrate: session.substrate_handle(),
            cancel: session.cancel_token(),
            sql,
            params,
            options,
            state: QueryState::OptionsApplied,
            rows: None,
            deadline: None,
            yielded: 0,
        })
    }
}

/// A lazy, single-pass, non-restartable result sequence. The first
/// `next().await` performs the substrate fetch; re-execution requires a
/// fresh invocation.
pub struct ResultStream {
    substrate: Arc<dyn Substrate>,
    cancel:    CancellationToken,
    sql:       String,
    params:    Vec<Value>,
    options:   ExecutionOptions,
    state:     QueryState,
    rows:      Option<turso::Rows>,
    deadline:  Option<Instant>,
    yielded:   usize,
}

// Manual impl: the substrate handle and the driver's row cursor are not
// Debug.
impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("options", &self.options)
            .field("yielded", &self.yielded)
            .finish_non_exhaustive()
    }
}

impl ResultStream {
    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Fetches the next row, entering `Executing` (and performing the
    /// underlying fetch) exactly once, on first call. Returns `Ok(None)`
    /// once the sequence is exhausted or after a terminal state.
    pub async fn next(&mut self) -> Result<Option<turso::Row>> {
        match self.state {
            QueryState::Completed | QueryState::Failed => return Ok(None),
            QueryState::Executing => {}
            _ => self.start().await?,
        }

        if let Some(max) = self.options.effective_max_results() {
            if self.yielded >= max {
                self.finish();
                return Ok(None);
            }
        }

        match self.advance().await {
            Ok(Some(row)) => {
                self.yielded += 1;
                Ok(Some(row))
            }
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(err) => {
                self.state = QueryState::Failed;
                self.rows = None;
                Err(err)
            }
        }
    }

    /// Drains the remaining rows.
    pub async fn collect(mut self) -> Result<Vec<turso::Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Drains the remaining rows, decoding each. Rows that fail to decode
    /// are logged and skipped.
    pub async fn collect_as<T: FromRow>(mut self) -> Result<Vec<T>> {
        let mut results = Vec::new();
        while let Some(row) = self.next().await? {
            match T::from_row(&row) {
                Ok(decoded) => results.push(decoded),
                Err(err) => {
                    #[cfg(feature = "serde")]
                    tracing::warn!("Failed to decode row: {}", serde_json::to_string_pretty(&raw_row_json(&row)?)?);
                    tracing::warn!("{}", err.to_string());
                    continue;
                }
            }
        }
        Ok(results)
    }

    /// Consumes the stream and returns its first row, if any.
    pub async fn first(mut self) -> Result<Option<turso::Row>> {
        self.next().await
    }

    async fn start(&mut self) -> Result<()> {
        self.state = QueryState::Executing;
        if let Some(timeout) = self.options.timeout {
            self.deadline = Some(Instant::now() + timeout);
        }

        let fetched = {
            let cancel = self.cancel.clone();
            let fetch = self.substrate.fetch(&self.sql, self.params.clone());
            let guarded = bounded(self.deadline, self.options.timeout, fetch);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Execution(ExecutionFailure::Cancelled)),
                result = guarded => result,
            }
        };

        match fetched {
            Ok(rows) => {
                self.rows = Some(rows);
                // Window start: rows before first_result are consumed and
                // discarded here, while still inside the first fetch.
                for _ in 0..self.options.effective_first_result() {
                    match self.advance().await {
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(err) => {
                            self.state = QueryState::Failed;
                            self.rows = None;
                            return Err(err);
                        }
                    }
                }
                Ok(())
            }
            Err(err) => {
                self.state = QueryState::Failed;
                Err(err)
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<turso::Row>> {
        let cancel = self.cancel.clone();
        let deadline = self.deadline;
        let timeout = self.options.timeout;
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Execution(ExecutionFailure::Cancelled)),
            result = bounded(deadline, timeout, rows.next()) => result,
        }
    }

    fn finish(&mut self) {
        self.state = QueryState::Completed;
        self.rows = None;
    }
}

/// Races `fut` against the invocation deadline, if one is armed.
async fn bounded<F, T>(deadline: Option<Instant>, configured: Option<Duration>, fut: F) -> Result<T>
where F: Future<Output = turso::Result<T>> {
    match deadline {
        Some(at) => match tokio::time::timeout_at(at, fut).await {
            Ok(result) => result.map_err(|err| Error::Execution(ExecutionFailure::Substrate(err))),
            Err(_) => Err(Error::Execution(ExecutionFailure::Timeout(configured.unwrap_or_default()))),
        },
        None => fut.await.map_err(|err| Error::Execution(ExecutionFailure::Substrate(err))),
    }
}

#[cfg(feature = "serde")]
fn raw_row_json(row: &turso::Row) -> Result<serde_json::Value> {
    use serde_json::json;

    let mut values = Vec::with_capacity(row.column_count());
    for i in 0..row.column_count() {
        let value = match row.get_value(i).map_err(|err| Error::Execution(ExecutionFailure::Substrate(err)))? {
            Value::Integer(v) => json!(v),
            Value::Real(v) => json!(v),
            Value::Text(v) => json!(v),
            Value::Blob(v) => json!(v),
            Value::Null => json!(null),
        };
        values.push(value);
    }
    Ok(json!(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExecutionOptions;

    #[test]
    fn test_invocation_state_progression() {
        let memento = Arc::new(
            QueryMemento::new("q", "select * from book", QueryLanguage::Sql, ExecutionOptions::new()).unwrap(),
        );

        let invocation = Invocation::new(Arc::clone(&memento));
        assert_eq!(invocation.state(), QueryState::Built);

        let invocation = invocation.bind(&Arguments::None).unwrap();
        assert_eq!(invocation.state(), QueryState::ParametersBound);

        let invocation = invocation.options(&ExecutionOptions::new());
        assert_eq!(invocation.state(), QueryState::OptionsApplied);
    }

    #[test]
    fn test_invocation_bind_propagates_binder_errors() {
        let memento = Arc::new(
            QueryMemento::new("q", "select * from book where id = ?1", QueryLanguage::Sql, ExecutionOptions::new())
                .unwrap(),
        );

        let err = Invocation::new(memento).bind(&Arguments::None).unwrap_err();
        assert!(matches!(err, Error::ParameterCountMismatch { .. }));
    }

    #[test]
    fn test_invocation_options_overlay_memento_defaults() {
        let defaults = ExecutionOptions::new().with_max_results(100).with_fetch_size(50);
        let memento =
            Arc::new(QueryMemento::new("q", "select 1", QueryLanguage::Sql, defaults).unwrap());

        let invocation = Invocation::new(memento)
            .bind(&Arguments::None)
            .unwrap()
            .options(&ExecutionOptions::new().with_max_results(10));

        let options = invocation.options.as_ref().unwrap();
        assert_eq!(options.max_results, Some(10));
        assert_eq!(options.fetch_size, Some(50));
    }

    #[test]
    fn test_options_applied_before_bind_are_honored() {
        let memento = Arc::new(
            QueryMemento::new("q", "select 1", QueryLanguage::Sql, ExecutionOptions::new()).unwrap(),
        );
        let registry = Arc::new(crate::memento::QueryRegistry::new());
        let session = Session::with_substrate(Arc::new(NeverSubstrate), registry);

        let stream = Invocation::new(memento)
            .options(&ExecutionOptions::new().with_max_results(7))
            .bind(&Arguments::None)
            .unwrap()
            .run(&session)
            .unwrap();

        assert_eq!(stream.options().max_results, Some(7));
    }

    #[test]
    fn test_result_stream_debug_omits_the_substrate() {
        let memento = Arc::new(
            QueryMemento::new("q", "select 1", QueryLanguage::Sql, ExecutionOptions::new()).unwrap(),
        );
        let registry = Arc::new(crate::memento::QueryRegistry::new());
        let session = Session::with_substrate(Arc::new(NeverSubstrate), registry);

        let stream = Invocation::new(memento).run(&session).unwrap();
        let rendered = format!("{:?}", stream);
        assert!(rendered.contains("select 1"));
        assert!(rendered.contains("OptionsApplied"));
    }

    #[test]
    fn test_passthrough_translator_is_identity() {
        let translator = PassthroughTranslator;
        assert_eq!(translator.translate("select e from Entity e").unwrap(), "select e from Entity e");
    }

    struct NeverSubstrate;

    #[async_trait::async_trait]
    impl Substrate for NeverSubstrate {
        async fn fetch(&self, _sql: &str, _params: Vec<Value>) -> turso::Result<turso::Rows> {
            std::future::pending().await
        }
    }
}
