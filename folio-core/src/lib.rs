//! Folio Core - search query building and publishing section discovery
//!
//! This library turns query patterns and declarative where clauses into
//! search engine queries, and finds the section folders a user may
//! publish documents into.

pub mod config;
pub mod document;
pub mod error;
pub mod finder;
pub mod memory;
pub mod query;
pub mod schema;
pub mod search;
pub mod session;
pub mod value;
pub mod where_clause;

pub use config::{Config, ProviderDefinition, ProviderSource, PublishingConfig, QueryConfig};
pub use document::{DocRef, DocumentModel, Permission};
pub use error::{ErrorEnvelope, FolioError};
pub use finder::{DefaultSectionRootsStrategy, RootSectionsFinder, SectionFilter, SectionRootsStrategy};
pub use memory::{MemoryRepository, MemorySession};
pub use query::{convert_param, substitute_parameters, QueryBuilder};
pub use schema::{FacetTypeCache, SchemaManager};
pub use search::{BoolOperator, ExpressionBuilder, QueryConverter, SearchQuery, StandardConverter};
pub use session::{run_unrestricted, CoreSession, DocumentQuery};
pub use value::Value;
pub use where_clause::{PredicateDefinition, PredicateField, WhereClauseDefinition};

/// Result type alias for folio operations
pub type Result<T> = std::result::Result<T, FolioError>;
