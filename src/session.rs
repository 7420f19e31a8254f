//! The session handle queries execute through.
//!
//! One session serves one logical execution context. The named-query
//! registry it holds is the process-wide shared resource; the session
//! itself only owns its substrate connection and a cancellation token that
//! covers its in-flight executions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::executor::PassthroughTranslator;
use crate::executor::QueryTranslator;
use crate::executor::Substrate;
use crate::memento::QueryLanguage;
use crate::memento::QueryMemento;
use crate::memento::QueryRegistry;
use crate::query::LiveQuery;

#[derive(Clone)]
pub struct Session {
    substrate:  Arc<dyn Substrate>,
    registry:   Arc<QueryRegistry>,
    translator: Arc<dyn QueryTranslator>,
    cancel:     CancellationToken,
}

impl Session {
    pub fn new(connection: Connection, registry: Arc<QueryRegistry>) -> Self {
        Self::with_substrate(Arc::new(connection), registry)
    }

    /// Builds a session over an arbitrary substrate. The production path is
    /// [`Session::new`]; this is the seam tests use for slow or failing
    /// backends.
    pub fn with_substrate(substrate: Arc<dyn Substrate>, registry: Arc<QueryRegistry>) -> Self {
        Self {
            substrate,
            registry,
            translator: Arc::new(PassthroughTranslator),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn QueryTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn registry(&self) -> &Arc<QueryRegistry> {
        &self.registry
    }

    pub(crate) fn substrate_handle(&self) -> Arc<dyn Substrate> {
        Arc::clone(&self.substrate)
    }

    pub(crate) fn translator(&self) -> &dyn QueryTranslator {
        self.translator.as_ref()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts an HQL-like query from scratch.
    pub fn create_query(&self, text: impl Into<String>) -> LiveQuery {
        LiveQuery::new(text, QueryLanguage::Hql)
    }

    /// Starts a literal-SQL query from scratch.
    pub fn create_native_query(&self, text: impl Into<String>) -> LiveQuery {
        LiveQuery::new(text, QueryLanguage::Sql)
    }

    /// Instantiates a live query from a stored memento, inheriting its text,
    /// language, and default options.
    ///
    /// Unlike [`QueryRegistry::lookup`], a miss here is a hard error: a
    /// session asking for a name that was never registered is misconfigured.
    pub fn create_named_query(&self, name: &str) -> Result<LiveQuery> {
        match self.registry.lookup(name) {
            Some(memento) => Ok(LiveQuery::from_memento(&memento)),
            None => Err(Error::UnknownNamedQuery(name.to_string())),
        }
    }

    /// Stores the live query's current definition under `name`, replacing
    /// any previous definition. Delegates to
    /// [`QueryRegistry::promote`].
    pub fn add_named_query(&self, name: impl Into<String>, query: &LiveQuery) -> Result<Arc<QueryMemento>> {
        self.registry.promote(name, query)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels every in-flight execution owned by this session. The
    /// registry and the dialect table are untouched.
    pub fn cancel(&self) {
        tracing::debug!("cancelling session executions");
        self.cancel.cancel();
    }

    /// Closes the session, cancelling in-flight executions.
    pub fn close(self) {
        self.cancel();
    }
}
