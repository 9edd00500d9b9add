//! Engine configuration

use url::Url;

use crate::cache::MismatchPolicy;
use crate::error::CoreError;
use crate::upstream::UpstreamList;

/// Settings the resolver runs with
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub upstreams: UpstreamList,
    pub on_mismatch: MismatchPolicy,
}

impl EngineConfig {
    pub fn new(upstreams: UpstreamList) -> Self {
        Self {
            upstreams,
            on_mismatch: MismatchPolicy::default(),
        }
    }

    pub fn with_mismatch_policy(mut self, on_mismatch: MismatchPolicy) -> Self {
        self.on_mismatch = on_mismatch;
        self
    }

    /// Check that at least one upstream exists and every URL is usable
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.upstreams.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one internal or external upstream is required".to_string(),
            ));
        }
        for base in self
            .upstreams
            .internal
            .iter()
            .chain(self.upstreams.external.iter())
        {
            validate_upstream_url(base)?;
        }
        Ok(())
    }
}

/// Validate an upstream base URL.
///
/// Must be absolute http(s) with a host and no query or fragment, since
/// request paths are appended to it verbatim.
pub fn validate_upstream_url(base: &str) -> Result<(), CoreError> {
    let url = Url::parse(base)
        .map_err(|e| CoreError::InvalidConfig(format!("upstream {}: {}", base, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::InvalidConfig(format!(
            "upstream {}: scheme must be http or https",
            base
        )));
    }
    if url.host_str().is_none() {
        return Err(CoreError::InvalidConfig(format!(
            "upstream {}: missing host",
            base
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(CoreError::InvalidConfig(format!(
            "upstream {}: must not carry a query or fragment",
            base
        )));
    }
    Ok(())
}
