//! Upstream registry tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream tier a registry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Registries on the private network, always tried first
    Internal,
    /// Public registries, only consulted by cache-aware requests
    External,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Internal => "internal",
            Tier::External => "external",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered upstream base URLs per tier
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamList {
    #[serde(default)]
    pub internal: Vec<String>,
    #[serde(default)]
    pub external: Vec<String>,
}

impl UpstreamList {
    pub fn new(internal: Vec<String>, external: Vec<String>) -> Self {
        Self { internal, external }
    }

    /// Base URLs of one tier, in configured order
    pub fn tier(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Internal => &self.internal,
            Tier::External => &self.external,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }

    /// Total number of configured upstreams
    pub fn len(&self) -> usize {
        self.internal.len() + self.external.len()
    }
}
