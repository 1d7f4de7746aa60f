//! Attaching resolved Variants to Identities.

use std::sync::Arc;

use tracing::warn;

use crate::context::{Context, VariantOverrides};
use crate::error::{ContentResult, ExecutionError};
use crate::record::Record;

use super::{VariantFinder, DEFAULT_MAX_IDENTITY_DEPTH};

/// Hydration shapes over one identity or a batch.
///
/// Only [`try_hydrate`](Self::try_hydrate) is required; the strict and batch
/// shapes are built on it.
pub trait HydrateVariants: Send + Sync {
    /// Attaches the best variant to `identity`. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Returns finder and storage errors. A missing variant is not an error.
    fn try_hydrate(&self, identity: &mut Record) -> ContentResult<bool>;

    /// Attaches the best variant, failing if there is none.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::VariantNotFound` carrying the identity's type
    /// and id when no variant matches.
    fn hydrate(&self, identity: &mut Record) -> ContentResult<()> {
        if self.try_hydrate(identity)? {
            return Ok(());
        }
        warn!(identity_type = %identity.entity_type, identity = %identity.id, "no variant found");
        Err(ExecutionError::VariantNotFound {
            identity_type: identity.entity_type.clone(),
            id: identity.id.clone(),
        }
        .into())
    }

    /// Strict hydration of every identity; stops at the first failure.
    ///
    /// # Errors
    ///
    /// See [`Self::hydrate`].
    fn hydrate_all(&self, identities: &mut [Record]) -> ContentResult<()> {
        identities.iter_mut().try_for_each(|identity| self.hydrate(identity))
    }

    /// Best-effort hydration of every identity. Returns how many were hydrated;
    /// the rest are left without a variant.
    ///
    /// # Errors
    ///
    /// See [`Self::try_hydrate`].
    fn try_hydrate_all(&self, identities: &mut [Record]) -> ContentResult<usize> {
        let mut hydrated = 0;
        for identity in identities {
            if self.try_hydrate(identity)? {
                hydrated += 1;
            }
        }
        Ok(hydrated)
    }

    /// Best-effort hydration that drops identities without a variant,
    /// preserving the order of the rest.
    ///
    /// # Errors
    ///
    /// See [`Self::try_hydrate`].
    fn try_hydrate_all_filtered(&self, identities: Vec<Record>) -> ContentResult<Vec<Record>> {
        let mut kept = Vec::with_capacity(identities.len());
        for mut identity in identities {
            if self.try_hydrate(&mut identity)? {
                kept.push(identity);
            }
        }
        Ok(kept)
    }
}

/// Hydrates through a [`VariantFinder`] using one request's context.
///
/// The variant is attached under the declaration's variant slot and never
/// written back. When the variant is itself an Identity, its own best variant
/// is attached to it in turn.
#[derive(Debug, Clone)]
pub struct VariantHydrator {
    finder: VariantFinder,
    context: Arc<Context>,
    overrides: VariantOverrides,
    max_depth: usize,
}

impl VariantHydrator {
    /// Hydrator resolving variants against `context`.
    #[must_use]
    pub fn new(finder: VariantFinder, context: Arc<Context>) -> Self {
        Self {
            finder,
            context,
            overrides: VariantOverrides::new(),
            max_depth: DEFAULT_MAX_IDENTITY_DEPTH,
        }
    }

    /// Per-dimension values replacing the context's, e.g. a requested locale.
    #[must_use]
    pub fn with_overrides(mut self, overrides: VariantOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Limits how many nested identity levels are hydrated.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn hydrate_level(&self, identity: &mut Record, depth: usize) -> ContentResult<bool> {
        if depth >= self.max_depth {
            return Err(ExecutionError::IdentityChainTooDeep {
                entity_type: identity.entity_type.clone(),
                max_depth: self.max_depth,
            }
            .into());
        }
        let registry = self.finder.registry();
        let Some(declaration) = registry.get_identity_declaration(&identity.entity_type)? else {
            return Err(ExecutionError::MissingIdentityDeclaration {
                entity_type: identity.entity_type.clone(),
            }
            .into());
        };
        let Some(mut variant) = self
            .finder
            .find_best_variant(identity, &self.context, &self.overrides)?
        else {
            return Ok(false);
        };
        // A nested identity without a variant of its own fails the whole chain.
        if registry.get_identity_declaration(&variant.entity_type)?.is_some()
            && !self.hydrate_level(&mut variant, depth + 1)?
        {
            return Ok(false);
        }
        identity.attach(declaration.variant_property.clone(), variant);
        Ok(true)
    }
}

impl HydrateVariants for VariantHydrator {
    fn try_hydrate(&self, identity: &mut Record) -> ContentResult<bool> {
        self.hydrate_level(identity, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::context::ResolvedValue;
    use crate::metadata::MetadataRegistry;
    use crate::plugins::PluginSet;
    use crate::schema::{IdentityDeclaration, Marker, PropertyDecl, Schema, TypeSchema};
    use crate::storage::{InMemoryRecordStore, RecordStore};

    fn schema() -> Schema {
        Schema::new()
            .with_type(TypeSchema::new("Page").identity(IdentityDeclaration::new("PageVariant")))
            .with_type(
                TypeSchema::new("PageVariant")
                    .identity(IdentityDeclaration::new("PageRevision").identity_property("variant_ref"))
                    .property(PropertyDecl::new("identity").references("Page"))
                    .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
            )
            .with_type(
                TypeSchema::new("PageRevision")
                    .property(PropertyDecl::new("variant_ref").references("PageVariant"))
                    .property(PropertyDecl::new("archivedAt").filter(Marker::ARCHIVABLE)),
            )
    }

    fn hydrator(store: &Arc<InMemoryRecordStore>, chain: &[&str]) -> VariantHydrator {
        let finder = VariantFinder::new(
            Arc::new(MetadataRegistry::new(Arc::new(schema()))),
            Arc::new(PluginSet::standard(&ContentConfig::default())),
            Arc::clone(store) as Arc<dyn RecordStore>,
        );
        let context = Context::new()
            .with_dimension("locale", ResolvedValue::chain(chain))
            .with_filter("archivable", ResolvedValue::Flag(true));
        VariantHydrator::new(finder, Arc::new(context))
    }

    fn seed() -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        for (page, locales) in [("p1", &["en", "fr"][..]), ("p2", &["fr"][..]), ("p3", &["en"][..])] {
            let identity = Record::new("Page", page);
            store.insert(identity.clone()).unwrap();
            for locale in locales {
                let variant = Record::new("PageVariant", format!("{page}-{locale}"))
                    .with_field("identity", identity.reference())
                    .with_field("locale", *locale);
                store.insert(variant.clone()).unwrap();
                // p3's only revision is archived.
                let mut revision = Record::new("PageRevision", format!("{page}-{locale}-r1"))
                    .with_field("variant_ref", variant.reference());
                if page == "p3" {
                    revision.set("archivedAt", "2024-01-01");
                }
                store.insert(revision).unwrap();
            }
        }
        store
    }

    #[test]
    fn test_try_hydrate_attaches_nested_variants() {
        let store = seed();
        let mut page = Record::new("Page", "p1");
        assert!(hydrator(&store, &["fr", "en"]).try_hydrate(&mut page).unwrap());
        let variant = page.attached("variant").unwrap();
        assert_eq!(variant.id.as_str(), "p1-fr");
        assert_eq!(variant.attached("variant").unwrap().id.as_str(), "p1-fr-r1");
    }

    #[test]
    fn test_strict_hydrate_reports_identity() {
        let store = seed();
        let mut page = Record::new("Page", "p2");
        let err = hydrator(&store, &["en"]).hydrate(&mut page).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Execution error: Page p2 found no variant");
        assert!(page.attached("variant").is_none());
    }

    #[test]
    fn test_variant_without_matching_revision_is_skipped() {
        let store = seed();
        let mut page = Record::new("Page", "p3");
        assert!(!hydrator(&store, &["en"]).try_hydrate(&mut page).unwrap());
    }

    #[test]
    fn test_filtered_batch_preserves_order() {
        let store = seed();
        let pages = vec![
            Record::new("Page", "p3"),
            Record::new("Page", "p2"),
            Record::new("Page", "p1"),
        ];
        let kept = hydrator(&store, &["fr"]).try_hydrate_all_filtered(pages).unwrap();
        let ids: Vec<_> = kept.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[test]
    fn test_batch_shapes() {
        let store = seed();
        let hydrator = hydrator(&store, &["en"]);
        let mut pages = vec![Record::new("Page", "p1"), Record::new("Page", "p2")];
        assert_eq!(hydrator.try_hydrate_all(&mut pages).unwrap(), 1);
        assert!(pages[0].attached("variant").is_some());
        assert!(pages[1].attached("variant").is_none());
        assert!(hydrator.hydrate_all(&mut pages).is_err());
    }

    #[test]
    fn test_nested_level_without_variant_fails_chain() {
        // Both levels vary by locale; the override only matches the outer level.
        let schema = Schema::new()
            .with_type(TypeSchema::new("Doc").identity(IdentityDeclaration::new("DocVariant")))
            .with_type(
                TypeSchema::new("DocVariant")
                    .identity(IdentityDeclaration::new("DocRevision").identity_property("variant_ref"))
                    .property(PropertyDecl::new("identity").references("Doc"))
                    .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
            )
            .with_type(
                TypeSchema::new("DocRevision")
                    .property(PropertyDecl::new("variant_ref").references("DocVariant"))
                    .property(PropertyDecl::new("locale").dimension(Marker::LOCALE)),
            );
        let store = Arc::new(InMemoryRecordStore::new());
        let doc = Record::new("Doc", "d1");
        let variant = Record::new("DocVariant", "d1-fr")
            .with_field("identity", doc.reference())
            .with_field("locale", "fr");
        let revision = Record::new("DocRevision", "d1-fr-r1")
            .with_field("variant_ref", variant.reference())
            .with_field("locale", "en");
        for record in [doc.clone(), variant, revision] {
            store.insert(record).unwrap();
        }

        let finder = VariantFinder::new(
            Arc::new(MetadataRegistry::new(Arc::new(schema))),
            Arc::new(PluginSet::standard(&ContentConfig::default())),
            store as Arc<dyn RecordStore>,
        );
        let context = Context::new().with_dimension("locale", ResolvedValue::chain(&["en"]));
        let hydrator = VariantHydrator::new(finder, Arc::new(context))
            .with_overrides(VariantOverrides::new().with_dimension("locale", ResolvedValue::chain(&["fr"])));

        let mut doc = doc;
        assert!(!hydrator.try_hydrate(&mut doc).unwrap());
        assert!(doc.attached("variant").is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let store = seed();
        let mut page = Record::new("Page", "p2");
        let hydrator = hydrator(&store, &["en"])
            .with_overrides(VariantOverrides::new().with_dimension("locale", ResolvedValue::chain(&["fr"])));
        hydrator.hydrate(&mut page).unwrap();
        assert_eq!(page.attached("variant").unwrap().id.as_str(), "p2-fr");
    }
}
