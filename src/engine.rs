//! Engine facade.
//!
//! [`ContentEngine`] owns the process-wide pieces (configuration, metadata
//! registry, plugin set, store) and is cheap to clone. Each logical request
//! opens a [`RequestSession`], which owns that request's context resolver;
//! nothing request-scoped is stored on the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::api::{IdentityWithVariantProvider, PublishableProcessor, TranslateFieldsProcessor, VariantDeleteProcessor};
use crate::config::ContentConfig;
use crate::context::{Context, ContextResolver, RequestScope, VariantOverrides};
use crate::error::ContentResult;
use crate::finder::{IdentityFinder, IdentityQueryRestrictor, VariantFinder, VariantHydrator};
use crate::metadata::MetadataRegistry;
use crate::order::VariantOrderFilter;
use crate::plugins::PluginSet;
use crate::query::Query;
use crate::record::{EntityType, Record};
use crate::schema::Schema;
use crate::storage::RecordStore;
use crate::translation::Translator;

/// Content engine.
#[derive(Clone)]
pub struct ContentEngine {
    config: Arc<ContentConfig>,
    registry: Arc<MetadataRegistry>,
    plugins: Arc<PluginSet>,
    store: Arc<dyn RecordStore>,
    order_properties: BTreeMap<String, String>,
    translator: Option<Arc<dyn Translator>>,
}

impl ContentEngine {
    /// Creates an engine with the standard plugin set.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if `config` does not validate.
    pub fn new(config: ContentConfig, schema: Schema, store: Arc<dyn RecordStore>) -> ContentResult<Self> {
        config.validate()?;
        let plugins = PluginSet::standard(&config);
        debug!(types = schema.len(), plugins = ?plugins, "content engine created");
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(MetadataRegistry::new(Arc::new(schema))),
            plugins: Arc::new(plugins),
            store,
            order_properties: BTreeMap::new(),
            translator: None,
        })
    }

    /// Replaces the plugin set.
    #[must_use]
    pub fn with_plugins(mut self, plugins: PluginSet) -> Self {
        self.plugins = Arc::new(plugins);
        self
    }

    /// Maps request sort keys to Variant fields, e.g. `publishAt`.
    #[must_use]
    pub fn with_order_properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.order_properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Enables field translation through `translator`.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    /// Shared metadata registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// Registered plugins.
    #[must_use]
    pub fn plugins(&self) -> &Arc<PluginSet> {
        &self.plugins
    }

    /// Backing record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Opens a session for one logical request.
    #[must_use]
    pub fn session(&self, scope: RequestScope) -> RequestSession {
        RequestSession {
            engine: self.clone(),
            resolver: ContextResolver::new(Arc::clone(&self.plugins), scope),
        }
    }

    /// Restrictor honoring the configured depth limit.
    #[must_use]
    pub fn restrictor(&self) -> IdentityQueryRestrictor {
        IdentityQueryRestrictor::new(Arc::clone(&self.registry), Arc::clone(&self.plugins))
            .with_max_depth(self.config.max_identity_depth)
    }

    /// Variant finder using [`Self::restrictor`].
    #[must_use]
    pub fn variant_finder(&self) -> VariantFinder {
        VariantFinder::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.plugins),
            Arc::clone(&self.store),
        )
        .with_restrictor(self.restrictor())
    }

    /// Finder walking variants back to identities.
    #[must_use]
    pub fn identity_finder(&self) -> IdentityFinder {
        IdentityFinder::new(Arc::clone(&self.registry), Arc::clone(&self.store))
    }

    /// Processor deleting variants and empty identities.
    #[must_use]
    pub fn delete_processor(&self) -> VariantDeleteProcessor {
        VariantDeleteProcessor::new(Arc::clone(&self.registry), Arc::clone(&self.store))
    }

    /// Processor setting publication timestamps.
    #[must_use]
    pub fn publishable_processor(&self) -> PublishableProcessor {
        PublishableProcessor::new(Arc::clone(&self.registry), Arc::clone(&self.store))
    }

    /// `None` until a translator is configured.
    #[must_use]
    pub fn translate_processor(&self) -> Option<TranslateFieldsProcessor> {
        self.translator.as_ref().map(|translator| {
            TranslateFieldsProcessor::new(
                Arc::clone(&self.registry),
                Arc::clone(translator),
                Arc::clone(&self.store),
            )
        })
    }

    fn order_filter(&self) -> Option<VariantOrderFilter> {
        if self.order_properties.is_empty() {
            return None;
        }
        Some(
            VariantOrderFilter::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.plugins),
                self.order_properties.clone(),
            )
            .with_max_depth(self.config.max_identity_depth),
        )
    }
}

impl std::fmt::Debug for ContentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentEngine")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .field("order_properties", &self.order_properties)
            .finish_non_exhaustive()
    }
}

/// One logical request against a [`ContentEngine`].
///
/// The context is resolved on first use and shared by everything the session
/// builds. Dropping the session drops the context.
#[derive(Debug)]
pub struct RequestSession {
    engine: ContentEngine,
    resolver: ContextResolver,
}

impl RequestSession {
    /// Scope of this session.
    #[must_use]
    pub fn scope(&self) -> &RequestScope {
        self.resolver.scope()
    }

    /// The resolved context of this request.
    ///
    /// # Errors
    ///
    /// Returns plugin resolution errors (e.g. a mixed locale chain).
    pub fn context(&self) -> ContentResult<Arc<Context>> {
        self.resolver.resolve()
    }

    /// Restricts an Identity query to Identities visible to this request.
    ///
    /// # Errors
    ///
    /// See [`IdentityQueryRestrictor::restrict`].
    pub fn restrict(&self, query: &mut Query, identity_type: &EntityType) -> ContentResult<bool> {
        self.engine.restrictor().restrict(query, identity_type, &*self.context()?)
    }

    /// # Errors
    ///
    /// See [`VariantFinder::find_best_variant`].
    pub fn find_best_variant(
        &self,
        identity: &Record,
        overrides: &VariantOverrides,
    ) -> ContentResult<Option<Record>> {
        self.engine
            .variant_finder()
            .find_best_variant(identity, &*self.context()?, overrides)
    }

    /// A hydrator bound to this request's context.
    ///
    /// # Errors
    ///
    /// Returns context resolution errors.
    pub fn hydrator(&self) -> ContentResult<VariantHydrator> {
        Ok(VariantHydrator::new(self.engine.variant_finder(), self.context()?)
            .with_max_depth(self.engine.config.max_identity_depth))
    }

    /// A provider bound to this request, with variant ordering when the
    /// engine has order properties configured.
    ///
    /// # Errors
    ///
    /// Returns context resolution errors.
    pub fn provider(&self) -> ContentResult<IdentityWithVariantProvider> {
        let provider = IdentityWithVariantProvider::new(
            Arc::clone(&self.engine.registry),
            Arc::clone(&self.engine.store),
            self.engine.restrictor(),
            Arc::new(self.hydrator()?),
            self.scope().clone(),
            self.context()?,
        );
        Ok(match self.engine.order_filter() {
            Some(order) => provider.with_order_filter(order),
            None => provider,
        })
    }
}
