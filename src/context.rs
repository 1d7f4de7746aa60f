//! Request scope and the per-request resolved context.
//!
//! A [`RequestScope`] describes one logical request: its id, the instant it is
//! evaluated at, and the string attributes plugins read (locale chain,
//! publication mode, ...). A [`ContextResolver`] turns a scope into an
//! immutable [`Context`] once and hands out the same instance for the rest of
//! the request. Resolvers are owned by the request; nothing here is global.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ContentResult;
use crate::filter::PublishableResolvedValue;
use crate::plugins::PluginSet;
use crate::record::EntityType;

/// Unique identifier for a request scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Creates a new random scope ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logical request.
///
/// # Examples
///
/// ```
/// use content_elements::{EntityType, RequestScope};
///
/// let scope = RequestScope::new()
///     .with_attribute("locale", "es,en")
///     .with_resource_type("Article");
///
/// assert_eq!(scope.attribute("locale"), Some("es,en"));
/// assert!(!scope.is_sub_fetch(&EntityType::new("Article")));
/// assert!(scope.is_sub_fetch(&EntityType::new("Author")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    id: ScopeId,
    now: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
    resource_type: Option<EntityType>,
}

impl RequestScope {
    /// Scope evaluated at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Scope evaluated at a fixed instant.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            id: ScopeId::new(),
            now,
            attributes: BTreeMap::new(),
            resource_type: None,
        }
    }

    /// Sets a request attribute read by plugin resolvers.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Marks the primary resource type the request was made for.
    #[must_use]
    pub fn with_resource_type(mut self, entity_type: impl Into<EntityType>) -> Self {
        self.resource_type = Some(entity_type.into());
        self
    }

    /// Identity of this scope.
    #[must_use]
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Instant the request is evaluated at.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns a request attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Primary resource type of the request, if marked.
    #[must_use]
    pub fn resource_type(&self) -> Option<&EntityType> {
        self.resource_type.as_ref()
    }

    /// True when `queried` is being loaded as a nested reference of a request
    /// made for a different resource type.
    #[must_use]
    pub fn is_sub_fetch(&self, queried: &EntityType) -> bool {
        self.resource_type.as_ref().is_some_and(|primary| primary != queried)
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Value a Dimension or Filter resolved to for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// No restriction requested.
    Unrestricted,
    /// Ordered fallback chain, entries may be `!`-negated.
    Chain(Vec<String>),
    /// Publication filter evaluated at a fixed instant.
    Publishable(PublishableResolvedValue),
    /// Boolean switch; `false` disables the plugin.
    Flag(bool),
    /// Value of a host-defined plugin.
    Custom(serde_json::Value),
}

impl ResolvedValue {
    /// Chain from string slices.
    #[must_use]
    pub fn chain<S: AsRef<str>>(entries: &[S]) -> Self {
        Self::Chain(entries.iter().map(|e| e.as_ref().to_string()).collect())
    }

    /// Returns true for `Unrestricted`.
    #[must_use]
    pub const fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }
}

/// Immutable snapshot of every resolved Dimension and Filter value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    dimensions: BTreeMap<String, ResolvedValue>,
    filters: BTreeMap<String, ResolvedValue>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of dimension `key`.
    #[must_use]
    pub fn with_dimension(mut self, key: impl Into<String>, value: ResolvedValue) -> Self {
        self.dimensions.insert(key.into(), value);
        self
    }

    /// Sets the value of filter `key`.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: ResolvedValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    /// Value of dimension `key`, if resolved.
    #[must_use]
    pub fn dimension(&self, key: &str) -> Option<&ResolvedValue> {
        self.dimensions.get(key)
    }

    /// Value of filter `key`, if resolved.
    #[must_use]
    pub fn filter(&self, key: &str) -> Option<&ResolvedValue> {
        self.filters.get(key)
    }

    /// All dimension values by key.
    #[must_use]
    pub fn dimensions(&self) -> &BTreeMap<String, ResolvedValue> {
        &self.dimensions
    }

    /// All filter values by key.
    #[must_use]
    pub fn filters(&self) -> &BTreeMap<String, ResolvedValue> {
        &self.filters
    }
}

/// Per-dimension replacements for the context values, e.g. to preview the
/// variant of an explicitly requested locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantOverrides {
    dimensions: BTreeMap<String, ResolvedValue>,
}

impl VariantOverrides {
    /// Creates an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the context value of dimension `key`.
    #[must_use]
    pub fn with_dimension(mut self, key: impl Into<String>, value: ResolvedValue) -> Self {
        self.dimensions.insert(key.into(), value);
        self
    }

    /// Override for dimension `key`, if any.
    #[must_use]
    pub fn dimension(&self, key: &str) -> Option<&ResolvedValue> {
        self.dimensions.get(key)
    }

    /// True when nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Resolves and memoizes the [`Context`] of one request scope.
#[derive(Debug)]
pub struct ContextResolver {
    plugins: Arc<PluginSet>,
    scope: RequestScope,
    context: OnceLock<Arc<Context>>,
}

impl ContextResolver {
    /// Creates a resolver; nothing resolves until [`Self::resolve`] is called.
    #[must_use]
    pub fn new(plugins: Arc<PluginSet>, scope: RequestScope) -> Self {
        Self {
            plugins,
            scope,
            context: OnceLock::new(),
        }
    }

    /// Scope the context is resolved for.
    #[must_use]
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Returns the context of this scope, resolving every plugin exactly once
    /// on first call. Later calls return the same instance.
    ///
    /// # Errors
    ///
    /// Returns the first error a plugin's value resolution reports (e.g. an
    /// invalid locale chain). Nothing is cached on error.
    pub fn resolve(&self) -> ContentResult<Arc<Context>> {
        if let Some(context) = self.context.get() {
            return Ok(Arc::clone(context));
        }

        let mut context = Context::new();
        for dimension in self.plugins.dimensions() {
            context = context.with_dimension(dimension.key(), dimension.resolve_value(&self.scope)?);
        }
        for filter in self.plugins.filters() {
            context = context.with_filter(filter.key(), filter.resolve_value(&self.scope)?);
        }
        debug!(scope = %self.scope.id(), context = ?context, "resolved context");

        Ok(Arc::clone(self.context.get_or_init(|| Arc::new(context))))
    }
}
