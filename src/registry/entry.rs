//! Registry entry type and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Reasons a name/URL pair cannot become a registry entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service name must not be empty")]
    EmptyName,

    #[error("service url must not be empty")]
    EmptyUrl,

    #[error("invalid service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A name-to-base-URL binding used to route proxy calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub url: String,
}

impl ServiceEntry {
    /// Build an entry, checking that the name is non-empty and the URL is an
    /// absolute http(s) URL with a host.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        let url = url.into();

        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if url.trim().is_empty() {
            return Err(RegistryError::EmptyUrl);
        }

        let parsed = Url::parse(&url).map_err(|e| RegistryError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl {
                url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(RegistryError::InvalidUrl {
                url,
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { name, url })
    }
}
