#![deny(warnings)]

//! # qurso
//!
//! The query-definition core of an ORM for [Turso](https://turso.tech):
//! a named-query registry, a `?n`/`:name` parameter binder, a dialect
//! capability table for physical type selection, and a lazy executor that
//! runs inside a session handle.
//!
//! ## Features
//!
//! - Named-query mementos: immutable snapshots of a query's text, language,
//!   and default execution options, stored in a process-wide registry
//! - Parameter binding for ordinal (`?1`) and named (`:name`) placeholders,
//!   validated at registration time
//! - Dialect capability table resolving logical types (e.g. uuid) to
//!   backend-specific physical representations, with version gates
//! - Lazy, single-pass result streams with first/max-result windowing,
//!   statement timeout, and session-scoped cancellation
//! - Descriptor-driven repository accessors in free-function or
//!   bound-method shape
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use qurso::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = Builder::new_local(":memory:").build().await?;
//!     let registry = Arc::new(QueryRegistry::new());
//!     let session = Session::new(db.connect()?, Arc::clone(&registry));
//!
//!     // Define an ad-hoc query and promote it to a named one.
//!     let mut query = session.create_native_query("select * from book where isbn = :isbn");
//!     query.set_max_results(10);
//!     session.add_named_query("byIsbn", &query)?;
//!
//!     // Execute it later, anywhere the registry is shared.
//!     let mut byIsbn = session.create_named_query("byIsbn")?;
//!     byIsbn.set_parameter("isbn", "978-1");
//!     let rows = byIsbn.list(&session).await?;
//!     println!("{} rows", rows.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Dialect type selection
//!
//! ```ignore
//! use qurso::dialect::{Dialect, LogicalType, PhysicalType, TypeRegistry};
//!
//! let types = TypeRegistry::built_in();
//! let h2: Dialect = "H2".parse()?;
//! let pg: Dialect = "PostgreSQL:9.4.0".parse()?;
//! assert_eq!(types.resolve(LogicalType::UUID, &h2)?, PhysicalType::BINARY_16);
//! assert_eq!(types.resolve(LogicalType::UUID, &pg)?, PhysicalType::NATIVE_UUID);
//! ```

pub mod binder;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod memento;
pub mod options;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod session;
pub mod value;
// Re-export main types at crate root
pub use binder::Arguments;
pub use binder::BoundParameterSet;
pub use binder::Parameter;
pub use binder::ParameterStyle;
pub use connection::Builder;
pub use connection::Connection;
pub use connection::Database;
pub use dialect::Dialect;
pub use dialect::DialectVersion;
pub use dialect::LogicalType;
pub use dialect::PhysicalType;
pub use dialect::TypeRegistry;
pub use error::Error;
pub use error::ExecutionFailure;
pub use error::Result;
pub use executor::Invocation;
pub use executor::PassthroughTranslator;
pub use executor::QueryState;
pub use executor::QueryTranslator;
pub use executor::ResultStream;
pub use executor::Substrate;
pub use memento::QueryLanguage;
pub use memento::QueryMemento;
pub use memento::QueryRegistry;
pub use options::CacheMode;
pub use options::ExecutionOptions;
pub use options::FlushMode;
pub use query::LiveQuery;
pub use repository::AccessorShape;
pub use repository::BoundRepository;
pub use repository::MethodDescriptor;
pub use repository::ParameterSpec;
pub use repository::Repository;
pub use repository::RepositoryDescriptor;
pub use repository::ReturnCategory;
pub use session::Session;
pub use turso::Row;
pub use turso::Rows;
pub use value::FromRow;
pub use value::FromValue;
pub use value::IntoValue;
pub use value::Value;
