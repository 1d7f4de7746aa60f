use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, RequestScope};
use crate::error::ContentResult;
use crate::finder::{HydrateVariants, IdentityQueryRestrictor};
use crate::metadata::MetadataRegistry;
use crate::order::VariantOrderFilter;
use crate::query::{Expr, Query};
use crate::record::{EntityType, Record, RecordId};
use crate::storage::RecordStore;

/// Loads Identities restricted to those with a matching Variant and attaches
/// the resolved Variant to each.
///
/// Sub-fetches (a type loaded as a nested reference of a request for another
/// type) bypass restriction, ordering and hydration.
pub struct IdentityWithVariantProvider {
    registry: Arc<MetadataRegistry>,
    store: Arc<dyn RecordStore>,
    restrictor: IdentityQueryRestrictor,
    hydrator: Arc<dyn HydrateVariants>,
    order: Option<VariantOrderFilter>,
    scope: RequestScope,
    context: Arc<Context>,
}

impl IdentityWithVariantProvider {
    /// Provider for one request; `order` is applied when given.
    #[must_use]
    pub fn new(
        registry: Arc<MetadataRegistry>,
        store: Arc<dyn RecordStore>,
        restrictor: IdentityQueryRestrictor,
        hydrator: Arc<dyn HydrateVariants>,
        scope: RequestScope,
        context: Arc<Context>,
    ) -> Self {
        Self {
            registry,
            store,
            restrictor,
            hydrator,
            order: None,
            scope,
            context,
        }
    }

    /// Enables `variant.<field>` sort keys on collections.
    #[must_use]
    pub fn with_order_filter(mut self, order: VariantOrderFilter) -> Self {
        self.order = Some(order);
        self
    }

    /// Every visible Identity of `entity_type`, each with its Variant attached.
    ///
    /// `order` holds requested `(sort key, direction)` pairs, applied in order;
    /// keys without a configured variant field are ignored.
    ///
    /// # Errors
    ///
    /// Returns restriction, ordering and storage errors, and
    /// `ExecutionError::VariantNotFound` if a returned Identity cannot be
    /// hydrated.
    pub fn provide_collection<K, D>(
        &self,
        entity_type: &EntityType,
        order: impl IntoIterator<Item = (K, D)>,
    ) -> ContentResult<Vec<Record>>
    where
        K: AsRef<str>,
        D: AsRef<str>,
    {
        let mut query = Query::select(entity_type.clone(), "o");
        if self.scope.is_sub_fetch(entity_type) {
            debug!(entity_type = %entity_type, "sub-fetch, skipping variant handling");
            return Ok(self.store.fetch(&query)?);
        }

        self.restrictor.restrict(&mut query, entity_type, &self.context)?;
        if let Some(filter) = &self.order {
            filter.apply(&mut query, entity_type, order, &self.context)?;
        }
        let mut identities = self.store.fetch(&query)?;
        if self.registry.get_identity_declaration(entity_type)?.is_some() {
            self.hydrator.hydrate_all(&mut identities)?;
        }
        Ok(identities)
    }

    /// One Identity by id with its Variant attached. `None` when the row does
    /// not exist or has no Variant visible to this request.
    ///
    /// # Errors
    ///
    /// Returns restriction, storage and hydration errors.
    pub fn provide_item(&self, entity_type: &EntityType, id: &RecordId) -> ContentResult<Option<Record>> {
        let mut query = Query::select(entity_type.clone(), "o");
        let key = query.parameter("id", id.clone());
        query.and_where(Expr::eq(query.field("id"), key));
        query.set_max_results(1);

        let sub_fetch = self.scope.is_sub_fetch(entity_type);
        if !sub_fetch {
            self.restrictor.restrict(&mut query, entity_type, &self.context)?;
        }
        let Some(mut identity) = self.store.fetch(&query)?.into_iter().next() else {
            return Ok(None);
        };
        if !sub_fetch && self.registry.get_identity_declaration(entity_type)?.is_some() {
            self.hydrator.hydrate(&mut identity)?;
        }
        Ok(Some(identity))
    }
}

impl std::fmt::Debug for IdentityWithVariantProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityWithVariantProvider")
            .field("restrictor", &self.restrictor)
            .field("scope", &self.scope.id())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::context::ResolvedValue;
    use crate::finder::{VariantFinder, VariantHydrator};
    use crate::plugins::PluginSet;
    use crate::schema::{IdentityDeclaration, Marker, PropertyDecl, Schema, TypeSchema};
    use crate::storage::InMemoryRecordStore;

    fn provider(scope: RequestScope, chain: &[&str]) -> IdentityWithVariantProvider {
        let schema = Schema::new()
            .with_type(TypeSchema::new("Article").identity(IdentityDeclaration::new("ArticleVariant")))
            .with_type(
                TypeSchema::new("ArticleVariant")
                    .property(PropertyDecl::new("identity").references("Article"))
                    .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
            )
            .with_type(TypeSchema::new("Author"));
        let registry = Arc::new(MetadataRegistry::new(Arc::new(schema)));
        let plugins = Arc::new(PluginSet::standard(&ContentConfig::default()));

        let store = Arc::new(InMemoryRecordStore::new());
        for (article, locale) in [("a1", "en"), ("a2", "fr")] {
            let identity = Record::new("Article", article);
            store.insert(identity.clone()).unwrap();
            store
                .insert(
                    Record::new("ArticleVariant", format!("{article}-{locale}"))
                        .with_field("identity", identity.reference())
                        .with_field("locale", locale),
                )
                .unwrap();
        }
        store.insert(Record::new("Author", "jane")).unwrap();
        let store: Arc<dyn RecordStore> = store;

        let context = Arc::new(Context::new().with_dimension("locale", ResolvedValue::chain(chain)));
        let finder = VariantFinder::new(Arc::clone(&registry), Arc::clone(&plugins), Arc::clone(&store));
        let hydrator = VariantHydrator::new(finder, Arc::clone(&context));
        IdentityWithVariantProvider::new(
            Arc::clone(&registry),
            store,
            IdentityQueryRestrictor::new(registry, plugins),
            Arc::new(hydrator),
            scope,
            context,
        )
    }

    const NO_ORDER: [(&str, &str); 0] = [];

    #[test]
    fn test_collection_is_restricted_and_hydrated() {
        let provider = provider(RequestScope::new(), &["en"]);
        let articles = provider
            .provide_collection(&EntityType::new("Article"), NO_ORDER)
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id.as_str(), "a1");
        assert_eq!(articles[0].attached("variant").unwrap().id.as_str(), "a1-en");
    }

    #[test]
    fn test_item_without_visible_variant_is_none() {
        let provider = provider(RequestScope::new(), &["en"]);
        let ty = EntityType::new("Article");
        assert!(provider.provide_item(&ty, &RecordId::new("a2")).unwrap().is_none());
        let item = provider.provide_item(&ty, &RecordId::new("a1")).unwrap().unwrap();
        assert!(item.attached("variant").is_some());
        assert!(provider.provide_item(&ty, &RecordId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_sub_fetch_bypasses_restriction() {
        let provider = provider(RequestScope::new().with_resource_type("Author"), &["en"]);
        let articles = provider
            .provide_collection(&EntityType::new("Article"), NO_ORDER)
            .unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.attached("variant").is_none()));
    }

    #[test]
    fn test_plain_types_pass_through() {
        let provider = provider(RequestScope::new(), &["en"]);
        let authors = provider
            .provide_collection(&EntityType::new("Author"), NO_ORDER)
            .unwrap();
        assert_eq!(authors.len(), 1);
    }
}
