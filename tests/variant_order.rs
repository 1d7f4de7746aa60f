use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use content_elements::schema::{IdentityDeclaration, Marker, PropertyDecl, Schema, TypeSchema};
use content_elements::{
    ContentConfig, ContentEngine, EntityType, InMemoryRecordStore, Record, RecordStore, RequestScope,
};
use pretty_assertions::assert_eq;

fn at(month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()
}

/// A: en@Jan, es@Dec. B: en@Jun.
fn engine() -> ContentEngine {
    engine_with(&[
        ("A-en", "A", "en", 1, at(1)),
        ("A-es", "A", "es", 1, at(12)),
        ("B-en", "B", "en", 1, at(6)),
    ])
}

/// Variants as `(id, identity, locale, version, publishAt)`.
fn engine_with(variants: &[(&str, &str, &str, i64, DateTime<Utc>)]) -> ContentEngine {
    let schema = Schema::new()
        .with_type(TypeSchema::new("Article").identity(IdentityDeclaration::new("ArticleVariant")))
        .with_type(
            TypeSchema::new("ArticleVariant")
                .property(PropertyDecl::new("identity").references("Article"))
                .property(PropertyDecl::new("locale").dimension(Marker::LOCALE))
                .property(PropertyDecl::new("version").dimension(Marker::VERSION))
                .property(PropertyDecl::new("publishAt").filter(Marker::PUBLISHABLE)),
        );
    let store = Arc::new(InMemoryRecordStore::new());
    for (id, identity, locale, version, published) in variants {
        let owner = Record::new("Article", *identity);
        if store.get(&owner.entity_type, &owner.id).unwrap().is_none() {
            store.insert(owner.clone()).unwrap();
        }
        store
            .insert(
                Record::new("ArticleVariant", *id)
                    .with_field("identity", owner.reference())
                    .with_field("locale", *locale)
                    .with_field("version", *version)
                    .with_field("publishAt", *published),
            )
            .unwrap();
    }
    ContentEngine::new(ContentConfig::default(), schema, store as Arc<dyn RecordStore>)
        .unwrap()
        .with_order_properties([("publishAt", "publishAt")])
}

fn sorted(locale: &str, direction: &str) -> Vec<(String, String)> {
    sorted_in(&engine(), locale, direction)
}

fn sorted_in(engine: &ContentEngine, locale: &str, direction: &str) -> Vec<(String, String)> {
    let scope = RequestScope::at(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap())
        .with_attribute("locale", locale);
    engine
        .session(scope)
        .provider()
        .unwrap()
        .provide_collection(&EntityType::new("Article"), [("publishAt", direction)])
        .unwrap()
        .into_iter()
        .map(|article| {
            let variant = article.attached("variant").map(|v| v.id.to_string()).unwrap_or_default();
            (article.id.to_string(), variant)
        })
        .collect()
}

fn pair(identity: &str, variant: &str) -> (String, String) {
    (identity.to_string(), variant.to_string())
}

#[test]
fn sort_uses_variant_in_request_locale_only() {
    // A's December Spanish variant must not lift A above B.
    assert_eq!(sorted("en", "desc"), vec![pair("B", "B-en"), pair("A", "A-en")]);
    assert_eq!(sorted("en", "asc"), vec![pair("A", "A-en"), pair("B", "B-en")]);
}

#[test]
fn sort_uses_best_ranked_locale_per_identity() {
    assert_eq!(sorted("es,en", "desc"), vec![pair("A", "A-es"), pair("B", "B-en")]);
}

#[test]
fn all_match_chain_skips_variant_sort() {
    // Insertion order, unsorted.
    assert_eq!(sorted("en,!en", "desc"), vec![pair("A", "A-en"), pair("B", "B-en")]);
}

#[test]
fn unknown_sort_key_is_ignored() {
    let scope = RequestScope::at(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap());
    let articles = engine()
        .session(scope)
        .provider()
        .unwrap()
        .provide_collection(&EntityType::new("Article"), [("title", "desc")])
        .unwrap();
    assert_eq!(articles.len(), 2);
}

#[test]
fn sort_ignores_variants_hidden_by_filters() {
    // A's Spanish variant is scheduled for 2025, so A is shown (and sorted) in English.
    let engine = engine_with(&[
        ("A-es", "A", "es", 1, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        ("A-en", "A", "en", 1, at(1)),
        ("B-en", "B", "en", 1, at(6)),
    ]);
    assert_eq!(
        sorted_in(&engine, "es,en", "desc"),
        vec![pair("B", "B-en"), pair("A", "A-en")]
    );
}

#[test]
fn sort_uses_highest_version_within_locale() {
    let engine = engine_with(&[
        ("A-en-1", "A", "en", 1, at(12)),
        ("A-en-2", "A", "en", 2, at(1)),
        ("B-en-1", "B", "en", 1, at(6)),
    ]);
    assert_eq!(
        sorted_in(&engine, "en", "desc"),
        vec![pair("B", "B-en-1"), pair("A", "A-en-2")]
    );
}
