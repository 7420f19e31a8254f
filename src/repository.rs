//! Descriptor-driven repository accessors.
//!
//! An upstream discovery step (annotation scanning, config parsing) is
//! expected to produce plain descriptor records for each repository-style
//! method: its query text, language, return category, and parameter list.
//! Registering a descriptor pre-registers one memento per method under
//! `"{repository}.{method}"` and cross-checks every method's placeholders
//! against its declared parameters, so a misdeclared query fails at startup
//! rather than at first call.

use std::sync::Arc;

use crate::binder::Arguments;
use crate::binder::Parameter;
use crate::binder::ParameterStyle;
use crate::binder::scan;
use crate::error::Error;
use crate::error::Result;
use crate::executor::Invocation;
use crate::executor::ResultStream;
use crate::memento::QueryLanguage;
use crate::memento::QueryMemento;
use crate::memento::QueryRegistry;
use crate::options::ExecutionOptions;
use crate::session::Session;

/// What an accessor method is declared to return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnCategory {
    /// A single entity row.
    Entity,
    /// A list of rows.
    List,
    /// A reusable query handle.
    Query,
}

/// A method's declared parameter list: names for named binding, or a bare
/// arity for ordinal binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterSpec {
    Named(Vec<String>),
    Arity(usize),
}

impl ParameterSpec {
    fn arity(&self) -> usize {
        match self {
            ParameterSpec::Named(names) => names.len(),
            ParameterSpec::Arity(arity) => *arity,
        }
    }

    fn declares(&self, name: &str) -> bool {
        match self {
            ParameterSpec::Named(names) => names.iter().any(|n| n == name),
            ParameterSpec::Arity(_) => false,
        }
    }
}

/// One repository-style method, as produced by metadata discovery.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    pub method:     String,
    pub query_text: String,
    pub language:   QueryLanguage,
    pub returns:    ReturnCategory,
    pub parameters: ParameterSpec,
    pub defaults:   ExecutionOptions,
}

impl MethodDescriptor {
    pub fn new(method: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            method:     method.into(),
            query_text: query_text.into(),
            language:   QueryLanguage::Sql,
            returns:    ReturnCategory::List,
            parameters: ParameterSpec::Arity(0),
            defaults:   ExecutionOptions::new(),
        }
    }

    pub fn language(mut self, language: QueryLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn returns(mut self, returns: ReturnCategory) -> Self {
        self.returns = returns;
        self
    }

    pub fn parameters(mut self, parameters: ParameterSpec) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn defaults(mut self, defaults: ExecutionOptions) -> Self {
        self.defaults = defaults;
        self
    }
}

/// How accessors are generated for a declaring type: free functions that
/// take a session per call, or methods bound to an owned session. Chosen
/// once per declaring type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorShape {
    FreeFunction,
    BoundMethod,
}

/// A declaring type's worth of methods.
#[derive(Clone, Debug)]
pub struct RepositoryDescriptor {
    pub name:     String,
    pub accessor: AccessorShape,
    pub methods:  Vec<MethodDescriptor>,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, accessor: AccessorShape) -> Self {
        Self { name: name.into(), accessor, methods: Vec::new() }
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }
}

/// A registered repository: mementos stored, descriptors validated.
/// Invocation follows the free-function protocol (session per call);
/// [`bind_session`](Repository::bind_session) yields the instance-style
/// counterpart.
#[derive(Clone, Debug)]
pub struct Repository {
    name:     String,
    accessor: AccessorShape,
    methods:  Vec<String>,
    registry: Arc<QueryRegistry>,
}

impl Repository {
    /// The startup registration loop. Two-phase: every method descriptor is
    /// validated and its memento built before anything is stored, so a
    /// misdeclared method leaves the registry untouched and a corrected
    /// descriptor can be registered afterwards.
    pub fn register(registry: &Arc<QueryRegistry>, descriptor: RepositoryDescriptor) -> Result<Self> {
        let mut mementos = Vec::with_capacity(descriptor.methods.len());
        let mut methods = Vec::with_capacity(descriptor.methods.len());

        for method in &descriptor.methods {
            validate(method)?;
            mementos.push(QueryMemento::new(
                qualified_name(&descriptor.name, &method.method),
                &method.query_text,
                method.language,
                method.defaults.clone(),
            )?);
            methods.push(method.method.clone());
        }
        registry.register_many(mementos)?;

        tracing::debug!(repository = %descriptor.name, methods = methods.len(), "repository registered");

        Ok(Self {
            name: descriptor.name,
            accessor: descriptor.accessor,
            methods,
            registry: Arc::clone(registry),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessor(&self) -> AccessorShape {
        self.accessor
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn qualified(&self, method: &str) -> String {
        qualified_name(&self.name, method)
    }

    /// Free-function protocol: the session is supplied per call.
    pub fn invoke(&self, session: &Session, method: &str, arguments: &Arguments) -> Result<ResultStream> {
        let qualified = self.qualified(method);
        let memento = self
            .registry
            .lookup(&qualified)
            .ok_or_else(|| Error::UnknownNamedQuery(qualified))?;
        Invocation::new(memento).bind(arguments)?.options(&ExecutionOptions::new()).run(session)
    }

    /// Bound-method protocol: the repository takes ownership of a session
    /// and accessors no longer need one per call.
    pub fn bind_session(self, session: Session) -> BoundRepository {
        BoundRepository { repository: self, session }
    }
}

/// A repository bound to its own session, the instance-method shape.
#[derive(Clone)]
pub struct BoundRepository {
    repository: Repository,
    session:    Session,
}

impl BoundRepository {
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn invoke(&self, method: &str, arguments: &Arguments) -> Result<ResultStream> {
        self.repository.invoke(&self.session, method, arguments)
    }
}

fn qualified_name(repository: &str, method: &str) -> String {
    format!("{}.{}", repository, method)
}

/// Cross-checks a method's query placeholders against its declared
/// parameter list.
fn validate(method: &MethodDescriptor) -> Result<()> {
    let scanned = scan(&method.query_text)?;
    match scanned.style() {
        ParameterStyle::None => Ok(()),
        ParameterStyle::Positional => {
            let referenced = scanned.max_ordinal();
            let supplied = method.parameters.arity();
            if referenced > supplied {
                return Err(Error::ParameterCountMismatch { referenced, supplied });
            }
            Ok(())
        }
        ParameterStyle::Named => {
            for parameter in scanned.parameters() {
                if let Parameter::Named(name) = parameter {
                    if !method.parameters.declares(name) {
                        return Err(Error::UnboundParameter(name.clone()));
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books_descriptor() -> RepositoryDescriptor {
        RepositoryDescriptor::new("Books", AccessorShape::FreeFunction)
            .method(
                MethodDescriptor::new("findBookByIsbn", "select * from book where isbn = :isbn")
                    .returns(ReturnCategory::Entity)
                    .parameters(ParameterSpec::Named(vec!["isbn".to_string()])),
            )
            .method(
                MethodDescriptor::new(
                    "findBooksByTitleWithPagination",
                    "select * from book where title like ?1 order by title limit ?2 offset ?3",
                )
                .parameters(ParameterSpec::Arity(3)),
            )
    }

    #[test]
    fn test_registration_stores_qualified_mementos() {
        let registry = Arc::new(QueryRegistry::new());
        let repository = Repository::register(&registry, books_descriptor()).unwrap();

        assert_eq!(repository.methods().len(), 2);
        assert!(registry.lookup("Books.findBookByIsbn").is_some());
        assert!(registry.lookup("Books.findBooksByTitleWithPagination").is_some());
        assert!(registry.lookup("findBookByIsbn").is_none());
    }

    #[test]
    fn test_undeclared_named_parameter_fails_at_registration() {
        let registry = Arc::new(QueryRegistry::new());
        let descriptor = RepositoryDescriptor::new("Books", AccessorShape::FreeFunction).method(
            MethodDescriptor::new("findByTitle", "select * from book where title = :title")
                .parameters(ParameterSpec::Named(vec!["isbn".to_string()])),
        );

        let err = Repository::register(&registry, descriptor).unwrap_err();
        assert!(matches!(err, Error::UnboundParameter(name) if name == "title"));
    }

    #[test]
    fn test_ordinal_beyond_arity_fails_at_registration() {
        let registry = Arc::new(QueryRegistry::new());
        let descriptor = RepositoryDescriptor::new("Books", AccessorShape::FreeFunction).method(
            MethodDescriptor::new("paged", "select * from book limit ?1 offset ?2")
                .parameters(ParameterSpec::Arity(1)),
        );

        let err = Repository::register(&registry, descriptor).unwrap_err();
        assert!(matches!(err, Error::ParameterCountMismatch { referenced: 2, supplied: 1 }));
    }

    #[test]
    fn test_named_style_with_bare_arity_fails() {
        let registry = Arc::new(QueryRegistry::new());
        let descriptor = RepositoryDescriptor::new("Books", AccessorShape::FreeFunction).method(
            MethodDescriptor::new("find", "select * from book where isbn = :isbn")
                .parameters(ParameterSpec::Arity(1)),
        );

        assert!(matches!(
            Repository::register(&registry, descriptor).unwrap_err(),
            Error::UnboundParameter(_)
        ));
    }

    #[test]
    fn test_failed_registration_leaves_registry_untouched() {
        let registry = Arc::new(QueryRegistry::new());
        let descriptor = RepositoryDescriptor::new("Books", AccessorShape::FreeFunction)
            .method(MethodDescriptor::new("findAll", "select * from book"))
            .method(
                MethodDescriptor::new("findByIsbn", "select * from book where isbn = :isbn")
                    .parameters(ParameterSpec::Arity(1)),
            );

        let err = Repository::register(&registry, descriptor).unwrap_err();
        assert!(matches!(err, Error::UnboundParameter(_)));
        assert!(registry.lookup("Books.findAll").is_none());
        assert!(registry.is_empty());

        // A corrected descriptor registers cleanly under the same names.
        let corrected = RepositoryDescriptor::new("Books", AccessorShape::FreeFunction)
            .method(MethodDescriptor::new("findAll", "select * from book"))
            .method(
                MethodDescriptor::new("findByIsbn", "select * from book where isbn = :isbn")
                    .parameters(ParameterSpec::Named(vec!["isbn".to_string()])),
            );
        Repository::register(&registry, corrected).unwrap();
        assert!(registry.lookup("Books.findAll").is_some());
        assert!(registry.lookup("Books.findByIsbn").is_some());
    }

    #[test]
    fn test_duplicate_method_registration_fails() {
        let registry = Arc::new(QueryRegistry::new());
        Repository::register(&registry, books_descriptor()).unwrap();

        let err = Repository::register(&registry, books_descriptor()).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
    }

    #[test]
    fn test_accessor_shape_is_carried() {
        let registry = Arc::new(QueryRegistry::new());
        let descriptor = RepositoryDescriptor::new("Empty", AccessorShape::BoundMethod);
        let repository = Repository::register(&registry, descriptor).unwrap();
        assert_eq!(repository.accessor(), AccessorShape::BoundMethod);
    }
}
