//! Variant resolution: restricting Identity queries, selecting the best
//! Variant of one Identity, attaching it, and walking back from a Variant to
//! its Identity.

mod constraint;
mod hydrator;
mod identity;
mod restrictor;
mod variant;

pub use constraint::IdentityConstraint;
pub use hydrator::{HydrateVariants, VariantHydrator};
pub use identity::IdentityFinder;
pub use restrictor::{IdentityQueryRestrictor, DEFAULT_MAX_IDENTITY_DEPTH};
pub use variant::VariantFinder;
