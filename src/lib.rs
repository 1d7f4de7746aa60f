//! # content-elements - Identity/Variant content model
//!
//! A logical content entity (an *Identity*) owns several stored rows
//! (*Variants*) that differ along *Dimensions* such as locale or version and
//! are narrowed by *Filters* such as "published now". This crate decides,
//! for one request, which Variant of an Identity is the right one and which
//! Identities are visible at all.
//!
//! ## Core Concepts
//!
//! - **Schema**: declarative table of types, their identity declarations and
//!   which Variant properties act as Dimensions or Filters
//! - **Context**: immutable per-request snapshot of every resolved Dimension
//!   and Filter value
//! - **Restriction**: one shared `EXISTS` per Identity query, so every
//!   criterion is checked against the same Variant row
//! - **Variant resolution**: one ranked query per Identity returning its best
//!   Variant, attached at read time and never persisted
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use content_elements::schema::{IdentityDeclaration, Marker, PropertyDecl, Schema, TypeSchema};
//! use content_elements::storage::{InMemoryRecordStore, RecordStore};
//! use content_elements::{ContentConfig, ContentEngine, EntityType, Record, RequestScope};
//!
//! let schema = Schema::new()
//!     .with_type(TypeSchema::new("Article").identity(IdentityDeclaration::new("ArticleVariant")))
//!     .with_type(
//!         TypeSchema::new("ArticleVariant")
//!             .property(PropertyDecl::new("identity").references("Article"))
//!             .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
//!     );
//!
//! let store = Arc::new(InMemoryRecordStore::new());
//! let article = Record::new("Article", "a1");
//! store.insert(article.clone())?;
//! store.insert(
//!     Record::new("ArticleVariant", "a1-es")
//!         .with_field("identity", article.reference())
//!         .with_field("locale", "es"),
//! )?;
//!
//! let engine = ContentEngine::new(ContentConfig::default(), schema, store)?;
//! let session = engine.session(RequestScope::new().with_attribute("locale", "es,en"));
//! let articles = session
//!     .provider()?
//!     .provide_collection(&EntityType::new("Article"), [("title", "asc")])?;
//!
//! assert_eq!(articles[0].attached("variant").map(|v| v.id.as_str()), Some("a1-es"));
//! # Ok::<(), content_elements::ContentError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod record;
pub mod schema;
pub mod value;

// Configuration and per-request state
pub mod config;
pub mod context;
pub mod metadata;

// Query boundary and storage
pub mod query;
pub mod storage;

// Plugins
pub mod dimension;
pub mod filter;
pub mod order;
pub mod plugins;

// Resolution and request-level operations
pub mod api;
pub mod engine;
pub mod finder;
pub mod translation;

// Re-export primary types at crate root for convenience
pub use config::ContentConfig;
pub use context::{Context, ContextResolver, RequestScope, ResolvedValue, ScopeId, VariantOverrides};
pub use engine::{ContentEngine, RequestSession};
pub use error::{ContentError, ContentResult, ExecutionError, ValidationError};
pub use metadata::MetadataRegistry;
pub use plugins::PluginSet;
pub use record::{EntityType, Record, RecordId};
pub use value::Value;

pub use api::{
    DeleteOutcome, IdentityWithVariantProvider, PublishableProcessor, TranslateFieldsInput,
    TranslateFieldsOutput, TranslateFieldsProcessor, VariantDeleteProcessor,
};
pub use finder::{HydrateVariants, IdentityFinder, IdentityQueryRestrictor, VariantFinder, VariantHydrator};
pub use storage::{InMemoryRecordStore, RecordStore, StorageError};
