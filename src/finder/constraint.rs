//! The shared "Identity has a matching Variant" check under construction.

use std::sync::Arc;

use crate::query::{Expr, Operand, Query};
use crate::record::EntityType;
use crate::schema::IdentityDeclaration;
use crate::value::Value;

/// Builder handed to every plugin while restricting an Identity query.
///
/// All conditions added with [`and_shared`](Self::and_shared) end up in one
/// `EXISTS` over the Variant type, so they are checked against the same
/// candidate row. Conditions added with [`and_identity`](Self::and_identity)
/// apply to the Identity row itself (e.g. a `NOT EXISTS` for an excluded
/// locale).
#[derive(Debug)]
pub struct IdentityConstraint<'q> {
    query: &'q mut Query,
    declaration: Arc<IdentityDeclaration>,
    identity_alias: String,
    variant_alias: String,
    shared: Vec<Expr>,
    identity: Vec<Expr>,
}

impl<'q> IdentityConstraint<'q> {
    pub(crate) fn new(
        query: &'q mut Query,
        declaration: Arc<IdentityDeclaration>,
        identity_alias: impl Into<String>,
        variant_alias: impl Into<String>,
    ) -> Self {
        Self {
            query,
            declaration,
            identity_alias: identity_alias.into(),
            variant_alias: variant_alias.into(),
            shared: Vec::new(),
            identity: Vec::new(),
        }
    }

    /// Declaration of the identity being restricted.
    #[must_use]
    pub fn declaration(&self) -> &IdentityDeclaration {
        &self.declaration
    }

    /// Variant type the shared subquery scans.
    #[must_use]
    pub fn variant_type(&self) -> &EntityType {
        &self.declaration.variant_type
    }

    /// Alias of the shared candidate variant.
    #[must_use]
    pub fn variant_alias(&self) -> &str {
        &self.variant_alias
    }

    /// Alias of the identity row being restricted.
    #[must_use]
    pub fn identity_alias(&self) -> &str {
        &self.identity_alias
    }

    /// `property` of the shared candidate variant.
    #[must_use]
    pub fn variant_field(&self, property: &str) -> Operand {
        Operand::field(self.variant_alias.clone(), property)
    }

    /// `alias.<back-reference> = identity`, correlating another variant alias
    /// with the identity row.
    #[must_use]
    pub fn correlate(&self, alias: &str) -> Expr {
        Expr::eq(
            Operand::field(alias, self.declaration.identity_property.clone()),
            Operand::row(self.identity_alias.clone()),
        )
    }

    /// Binds a parameter on the enclosing query.
    pub fn parameter(&mut self, prefix: &str, value: impl Into<Value>) -> Operand {
        self.query.parameter(prefix, value)
    }

    /// Fresh alias from the enclosing query's generator.
    pub fn generate_alias(&mut self, prefix: &str) -> String {
        self.query.generate_alias(prefix)
    }

    /// Adds a condition on the shared candidate variant.
    pub fn and_shared(&mut self, condition: Expr) {
        self.shared.push(condition);
    }

    /// Adds a condition on the identity row.
    pub fn and_identity(&mut self, condition: Expr) {
        self.identity.push(condition);
    }

    /// Consumes the builder, returning `(shared, identity)` conditions.
    pub(crate) fn into_parts(self) -> (Vec<Expr>, Vec<Expr>) {
        (self.shared, self.identity)
    }
}
