//! Collision-free alias and parameter names.

use serde::{Deserialize, Serialize};

/// Hands out unique alias and parameter names within one query.
///
/// Plugins and nested restriction levels all write into the same query, so
/// every name they introduce goes through one generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameGenerator {
    next_alias: u32,
    next_param: u32,
}

impl NameGenerator {
    /// Generator starting both counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh alias such as `variant_0`.
    pub fn alias(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.next_alias);
        self.next_alias += 1;
        name
    }

    /// Returns a fresh parameter name such as `locale_0`.
    pub fn parameter(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.next_param);
        self.next_param += 1;
        name
    }
}
