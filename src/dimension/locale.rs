//! Locale dimension with fallback chains.
//!
//! A chain is an ordered list of locales, earlier entries preferred. An entry
//! prefixed with `!` negates a locale:
//!
//! - `["es", "en"]`: the variant must be `es` or `en`, `es` preferred.
//! - `["en", "!en"]`: prefer `en`, otherwise anything. No restriction.
//! - `["!de"]`: the identity must have no `de` variant at all.
//!
//! A negation may only be combined with its own positive entry; `["en", "!de"]`
//! is rejected.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ContentConfig;
use crate::context::{RequestScope, ResolvedValue};
use crate::error::{ContentError, ContentResult, ValidationError};
use crate::finder::IdentityConstraint;
use crate::metadata::DimensionMetadata;
use crate::order::{OrderJoin, VariantOrderSelector};
use crate::query::{CmpOp, Direction, Expr, Operand, Query, SortExpr, SubQuery};
use crate::schema::Marker;

use super::Dimension;

const LOCALE_TOKEN_PATTERN: &str = r"^[A-Za-z]{2,3}([_-][A-Za-z0-9]{2,8})*$";

fn locale_token() -> ContentResult<&'static Regex> {
    static TOKEN: OnceLock<Result<Regex, String>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(LOCALE_TOKEN_PATTERN).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ContentError::internal(format!("invalid locale token pattern: {e}")))
}

/// How a chain restricts Identity queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainMode {
    /// Any locale is acceptable.
    All,
    /// A variant in one of the preferred locales must exist.
    Membership,
    /// No variant in any of these locales may exist.
    ExcludeOnly(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    locale: String,
    negated: bool,
}

/// A validated locale fallback chain.
///
/// # Examples
///
/// ```
/// use content_elements::dimension::{ChainMode, LocaleChain};
///
/// let chain = LocaleChain::parse(&["es", "en"]).unwrap();
/// assert_eq!(chain.mode(), &ChainMode::Membership);
/// assert_eq!(chain.preferred(), &["es".to_string(), "en".to_string()]);
///
/// assert_eq!(LocaleChain::parse(&["en", "!en"]).unwrap().mode(), &ChainMode::All);
/// assert!(LocaleChain::parse(&["en", "!de"]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleChain {
    entries: Vec<Entry>,
    preferred: Vec<String>,
    mode: ChainMode,
}

impl LocaleChain {
    /// Validates a chain.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidLocaleToken` for malformed entries and
    /// `ValidationError::MixedLocaleChain` when a negation has no matching
    /// positive entry while other positives are present.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> ContentResult<Self> {
        let token = locale_token()?;
        let mut entries = Vec::with_capacity(raw.len());
        let mut preferred: Vec<String> = Vec::new();
        let mut excluded: Vec<String> = Vec::new();

        for item in raw {
            let item = item.as_ref().trim();
            let (negated, locale) = match item.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, item),
            };
            if !token.is_match(locale) {
                return Err(ValidationError::InvalidLocaleToken {
                    token: item.to_string(),
                }
                .into());
            }
            let bucket = if negated { &mut excluded } else { &mut preferred };
            if !bucket.iter().any(|l| l == locale) {
                bucket.push(locale.to_string());
            }
            entries.push(Entry {
                locale: locale.to_string(),
                negated,
            });
        }

        let mode = if excluded.is_empty() {
            if preferred.is_empty() {
                ChainMode::All
            } else {
                ChainMode::Membership
            }
        } else if preferred.is_empty() {
            ChainMode::ExcludeOnly(excluded)
        } else if excluded.iter().all(|locale| preferred.contains(locale)) {
            ChainMode::All
        } else {
            return Err(ValidationError::MixedLocaleChain {
                chain: raw.iter().map(|s| s.as_ref().to_string()).collect(),
            }
            .into());
        };

        Ok(Self {
            entries,
            preferred,
            mode,
        })
    }

    /// Interprets a resolved value. `Unrestricted` and non-chain values give `None`.
    ///
    /// # Errors
    ///
    /// See [`Self::parse`].
    pub fn from_resolved(value: &ResolvedValue) -> ContentResult<Option<Self>> {
        match value {
            ResolvedValue::Chain(entries) => Self::parse(entries).map(Some),
            _ => Ok(None),
        }
    }

    /// How the chain restricts variants.
    #[must_use]
    pub fn mode(&self) -> &ChainMode {
        &self.mode
    }

    /// Positive entries in preference order.
    #[must_use]
    pub fn preferred(&self) -> &[String] {
        &self.preferred
    }

    /// True when the chain names no locale.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One predicate per entry: `= locale` for positives, `<> locale` for negations.
    fn entry_predicates(&self, field: &Operand, query: &mut Query) -> Vec<Expr> {
        self.entries
            .iter()
            .map(|entry| {
                let (prefix, op) = if entry.negated {
                    ("locale_negative", CmpOp::Ne)
                } else {
                    ("locale_positive", CmpOp::Eq)
                };
                let param = query.parameter(prefix, entry.locale.as_str());
                Expr::compare(field.clone(), op, param)
            })
            .collect()
    }
}

/// The locale dimension.
#[derive(Debug, Clone)]
pub struct Locale {
    marker: Marker,
    attribute: String,
    default_chain: Vec<String>,
}

impl Locale {
    /// Registry key of the dimension.
    pub const KEY: &'static str = "locale";

    /// Reads the chain from `attribute`, falling back to `default_chain`.
    #[must_use]
    pub fn new(attribute: impl Into<String>, default_chain: Vec<String>) -> Self {
        Self {
            marker: Marker::LOCALE,
            attribute: attribute.into(),
            default_chain,
        }
    }

    /// Builds the dimension from the configured attribute and default chain.
    #[must_use]
    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(config.locale_attribute.clone(), config.default_locales.clone())
    }
}

impl Dimension for Locale {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Reads a comma-separated chain from the request (e.g. `es,en` or
    /// `en,!en`), falling back to the configured default chain when the
    /// attribute is absent or names no locale.
    fn resolve_value(&self, scope: &RequestScope) -> ContentResult<ResolvedValue> {
        let requested: Vec<String> = scope
            .attribute(&self.attribute)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let chain = if requested.is_empty() {
            self.default_chain.clone()
        } else {
            requested
        };
        LocaleChain::parse(&chain)?;
        Ok(ResolvedValue::Chain(chain))
    }

    fn apply_to_identity_query(
        &self,
        constraint: &mut IdentityConstraint<'_>,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool> {
        let Some(chain) = LocaleChain::from_resolved(value)? else {
            return Ok(false);
        };
        match chain.mode() {
            ChainMode::All => Ok(false),
            ChainMode::Membership => {
                let field = constraint.variant_field(&metadata.property);
                let locales = constraint.parameter("locale", chain.preferred().to_vec());
                constraint.and_shared(Expr::is_in(field, locales));
                Ok(true)
            }
            ChainMode::ExcludeOnly(excluded) => {
                for locale in excluded {
                    let alias = constraint.generate_alias("excluded");
                    let param = constraint.parameter("locale_neg", locale.as_str());
                    let subquery = SubQuery::new(constraint.variant_type().clone(), alias.as_str())
                        .and_where(constraint.correlate(&alias))
                        .and_where(Expr::eq(Operand::field(alias.as_str(), metadata.property.as_str()), param));
                    constraint.and_identity(Expr::not_exists(subquery));
                }
                Ok(false)
            }
        }
    }

    /// Keeps variants matching any chain entry and ranks them by entry
    /// position; rows matching no entry rank last.
    fn apply_to_variant_query(
        &self,
        query: &mut Query,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<()> {
        let Some(chain) = LocaleChain::from_resolved(value)? else {
            return Ok(());
        };
        if chain.is_empty() {
            return Ok(());
        }
        let field = query.field(&metadata.property);
        let predicates = chain.entry_predicates(&field, query);
        let fallback = i64::try_from(predicates.len()).unwrap_or(i64::MAX);
        let arms = predicates
            .iter()
            .cloned()
            .zip(0_i64..)
            .collect::<Vec<_>>();
        query.and_where(Expr::any(predicates));
        query.add_order_by(
            SortExpr::Case {
                arms,
                otherwise: fallback,
            },
            Direction::Asc,
        );
        Ok(())
    }
}

impl VariantOrderSelector for Locale {
    fn name(&self) -> &str {
        "locale"
    }

    fn dimension_key(&self) -> Option<&str> {
        Some(Self::KEY)
    }

    /// A positive chain admits its locales and ranks them by position. In
    /// all-match mode, or without a chain, no single variant can be chosen
    /// and the sort key is skipped.
    fn constrain_order_join(
        &self,
        join: &mut OrderJoin<'_>,
        metadata: &DimensionMetadata,
        value: &ResolvedValue,
    ) -> ContentResult<bool> {
        let Some(chain) = LocaleChain::from_resolved(value)? else {
            return Ok(false);
        };
        let property = metadata.property.as_str();
        match chain.mode() {
            ChainMode::All => Ok(false),
            ChainMode::Membership => {
                let preferred = chain.preferred();
                let locales = join.parameter("order_locale", preferred.to_vec());
                join.and_visible(|alias| Expr::is_in(Operand::field(alias, property), locales.clone()));

                let candidate = join.candidate_field(property);
                let rival = join.rival_field(property);
                let mut beats = Vec::new();
                for (i, locale) in preferred.iter().enumerate().skip(1) {
                    let locale = join.parameter("order_locale", locale.as_str());
                    let ranked_higher = join.parameter("order_locale", preferred[..i].to_vec());
                    beats.push(Expr::all(vec![
                        Expr::eq(candidate.clone(), locale),
                        Expr::is_in(rival.clone(), ranked_higher),
                    ]));
                }
                let beats = (!beats.is_empty()).then(|| Expr::any(beats));
                join.then_rank(beats, Expr::eq(rival, candidate));
                Ok(true)
            }
            ChainMode::ExcludeOnly(excluded) => {
                let list = join.parameter("order_locale", excluded.clone());
                join.and_visible(|alias| {
                    Expr::negate(Expr::is_in(Operand::field(alias, property), list.clone()))
                });
                Ok(true)
            }
        }
    }
}
