//! Database connection plumbing over the Turso driver.

use std::time::Duration;

pub(crate) type ConnectionResult<T> = std::result::Result<T, turso::Error>;

/// Builder for a local (or in-memory) database.
pub struct Builder {
    path:         String,
    enable_mvcc:  bool,
    busy_timeout: Option<Duration>,
}

impl Builder {
    pub fn new_local(path: &str) -> Self {
        Self { path: path.to_string(), enable_mvcc: false, busy_timeout: None }
    }

    pub fn with_mvcc(mut self, mvcc: bool) -> Self {
        self.enable_mvcc = mvcc;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> ConnectionResult<Database> {
        let mut turso_builder = turso::Builder::new_local(&self.path);
        turso_builder = turso_builder.with_mvcc(self.enable_mvcc);
        let db = turso_builder.build().await?;
        Ok(Database { inner: db, path: self.path, busy_timeout: self.busy_timeout })
    }
}

/// An open database. Connections are cheap handles onto it.
pub struct Database {
    inner:        turso::Database,
    path:         String,
    busy_timeout: Option<Duration>,
}

impl Database {
    pub fn connect(&self) -> ConnectionResult<Connection> {
        let conn = self.inner.connect()?;
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(Connection { inner: conn, path: self.path.clone() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A single connection, the execution substrate for one session.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: turso::Connection,
    path:  String,
}

impl Connection {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn query(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<turso::Rows> {
        self.inner.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<u64> {
        self.inner.execute(sql, params).await
    }

    pub async fn execute_batch(&self, sql: &str) -> turso::Result<()> {
        self.inner.execute_batch(sql).await
    }

    pub async fn prepare(&self, sql: &str) -> turso::Result<turso::Statement> {
        self.inner.prepare(sql).await
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.inner.last_insert_rowid()
    }

    pub fn busy_timeout(&self, duration: Duration) -> turso::Result<()> {
        self.inner.busy_timeout(duration)
    }
}
