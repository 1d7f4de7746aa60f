//! Ordered registry of Dimension, Filter and order-selector plugins.
//!
//! Registration order matters: dimensions run before filters, and within each
//! kind earlier plugins contribute their order keys first.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::ContentConfig;
use crate::dimension::{Dimension, Locale, Version};
use crate::error::{ContentResult, ValidationError};
use crate::filter::{Archivable, Filter, Publishable};
use crate::order::VariantOrderSelector;

/// The plugin set shared by every request.
#[derive(Clone, Default)]
pub struct PluginSet {
    dimensions: Vec<Arc<dyn Dimension>>,
    filters: Vec<Arc<dyn Filter>>,
    selectors: Vec<Arc<dyn VariantOrderSelector>>,
}

impl PluginSet {
    /// Starts an empty set.
    #[must_use]
    pub fn builder() -> PluginSetBuilder {
        PluginSetBuilder::default()
    }

    /// Locale and Version dimensions, Publishable and Archivable filters, and
    /// the Locale and Version order selectors.
    #[must_use]
    pub fn standard(config: &ContentConfig) -> Self {
        let locale = Arc::new(Locale::from_config(config));
        let version = Arc::new(Version::new());
        Self {
            dimensions: vec![locale.clone(), version.clone()],
            filters: vec![
                Arc::new(Publishable::from_config(config)),
                Arc::new(Archivable::from_config(config)),
            ],
            selectors: vec![locale, version],
        }
    }

    /// Dimensions in registration order.
    #[must_use]
    pub fn dimensions(&self) -> &[Arc<dyn Dimension>] {
        &self.dimensions
    }

    /// Filters in registration order.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Order selectors in registration order.
    #[must_use]
    pub fn selectors(&self) -> &[Arc<dyn VariantOrderSelector>] {
        &self.selectors
    }

    /// Dimension registered under `key`.
    #[must_use]
    pub fn dimension(&self, key: &str) -> Option<&Arc<dyn Dimension>> {
        self.dimensions.iter().find(|d| d.key() == key)
    }

    /// Filter registered under `key`.
    #[must_use]
    pub fn filter(&self, key: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.iter().find(|f| f.key() == key)
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSet")
            .field("dimensions", &self.dimensions.iter().map(|d| d.key()).collect::<Vec<_>>())
            .field("filters", &self.filters.iter().map(|p| p.key()).collect::<Vec<_>>())
            .field("selectors", &self.selectors.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`PluginSet`], validated on [`build`](Self::build).
#[derive(Default)]
pub struct PluginSetBuilder {
    set: PluginSet,
}

impl PluginSetBuilder {
    /// Appends a dimension.
    #[must_use]
    pub fn dimension(mut self, dimension: Arc<dyn Dimension>) -> Self {
        self.set.dimensions.push(dimension);
        self
    }

    /// Appends a filter.
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.set.filters.push(filter);
        self
    }

    /// Appends an order selector.
    #[must_use]
    pub fn selector(mut self, selector: Arc<dyn VariantOrderSelector>) -> Self {
        self.set.selectors.push(selector);
        self
    }

    /// Validates and returns the set.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicatePluginKey` if two dimensions or two
    /// filters share a key, and `ValidationError::MissingSelectorKey` if an
    /// order selector does not name the dimension it orders by.
    pub fn build(self) -> ContentResult<PluginSet> {
        let mut seen = HashSet::new();
        for key in self.set.dimensions.iter().map(|d| d.key()) {
            if !seen.insert(key) {
                return Err(ValidationError::DuplicatePluginKey { key: key.to_string() }.into());
            }
        }
        let mut seen = HashSet::new();
        for key in self.set.filters.iter().map(|f| f.key()) {
            if !seen.insert(key) {
                return Err(ValidationError::DuplicatePluginKey { key: key.to_string() }.into());
            }
        }
        for selector in &self.set.selectors {
            if selector.dimension_key().map_or(true, str::is_empty) {
                return Err(ValidationError::MissingSelectorKey {
                    selector: selector.name().to_string(),
                }
                .into());
            }
        }
        Ok(self.set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolvedValue;
    use crate::metadata::DimensionMetadata;
    use crate::order::OrderJoin;

    struct Keyless;

    impl VariantOrderSelector for Keyless {
        fn name(&self) -> &str {
            "keyless"
        }

        fn dimension_key(&self) -> Option<&str> {
            None
        }

        fn constrain_order_join(
            &self,
            _join: &mut OrderJoin<'_>,
            _metadata: &DimensionMetadata,
            _value: &ResolvedValue,
        ) -> ContentResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_standard_set_order() {
        let set = PluginSet::standard(&ContentConfig::default());
        let dims: Vec<_> = set.dimensions().iter().map(|d| d.key()).collect();
        let filters: Vec<_> = set.filters().iter().map(|f| f.key()).collect();
        assert_eq!(dims, vec!["locale", "version"]);
        assert_eq!(filters, vec!["publishable", "archivable"]);
        let selectors: Vec<_> = set.selectors().iter().map(|s| s.name()).collect();
        assert_eq!(selectors, vec!["locale", "version"]);
        assert!(set.dimension("locale").is_some());
        assert!(set.filter("locale").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = PluginSet::builder()
            .dimension(Arc::new(Version::new()))
            .dimension(Arc::new(Version::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'version'"));
    }

    #[test]
    fn test_selector_without_key_rejected() {
        let err = PluginSet::builder()
            .selector(Arc::new(Keyless))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("keyless"));
    }

    #[test]
    fn test_same_key_allowed_across_kinds() {
        let set = PluginSet::builder()
            .dimension(Arc::new(Version::new()))
            .filter(Arc::new(Archivable::new("archived")))
            .build()
            .unwrap();
        assert_eq!(format!("{set:?}"), "PluginSet { dimensions: [\"version\"], filters: [\"archivable\"], selectors: [] }");
    }
}
