//! Request-level operations built on the finder: loading Identities with
//! their Variant, deleting Variants, publishing, and translation assist.

mod processor;
mod provider;
mod translate;

pub use processor::{DeleteOutcome, PublishableProcessor, VariantDeleteProcessor};
pub use provider::IdentityWithVariantProvider;
pub use translate::{TranslateFieldsInput, TranslateFieldsOutput, TranslateFieldsProcessor};
