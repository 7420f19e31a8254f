//! Prelude module for qurso
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```ignore
//! use qurso::prelude::*;
//! ```

pub use crate::binder::Arguments;
pub use crate::binder::Parameter;
pub use crate::connection::Builder;
pub use crate::connection::Connection;
pub use crate::dialect::Dialect;
pub use crate::dialect::LogicalType;
pub use crate::dialect::PhysicalType;
pub use crate::dialect::TypeRegistry;
pub use crate::error::Error;
pub use crate::error::ExecutionFailure;
pub use crate::error::Result;
pub use crate::executor::QueryState;
pub use crate::executor::ResultStream;
pub use crate::memento::QueryLanguage;
pub use crate::memento::QueryMemento;
pub use crate::memento::QueryRegistry;
pub use crate::options::CacheMode;
pub use crate::options::ExecutionOptions;
pub use crate::options::FlushMode;
pub use crate::query::LiveQuery;
pub use crate::repository::AccessorShape;
pub use crate::repository::MethodDescriptor;
pub use crate::repository::ParameterSpec;
pub use crate::repository::Repository;
pub use crate::repository::RepositoryDescriptor;
pub use crate::repository::ReturnCategory;
pub use crate::session::Session;
pub use crate::value::FromRow;
pub use crate::value::FromValue;
pub use crate::value::IntoValue;
pub use crate::value::Value;
