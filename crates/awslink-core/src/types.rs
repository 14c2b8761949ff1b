//! Common AWS type definitions shared across services.

use std::fmt;

use aws_config::Region;

use crate::error::{ConnectionError, ConnectionResult};

/// Validated AWS region identifier (e.g. `eu-central-1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Create a region after checking its format.
    ///
    /// # Errors
    /// Returns a configuration error unless the region is a non-empty run of
    /// lowercase ASCII letters, digits and inner hyphens.
    pub fn new(region: impl Into<String>) -> ConnectionResult<Self> {
        let region = region.into();
        let well_formed = !region.is_empty()
            && !region.starts_with('-')
            && !region.ends_with('-')
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !well_formed {
            return Err(ConnectionError::Configuration(format!(
                "invalid AWS region: '{region}'"
            )));
        }
        Ok(Self(region))
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the SDK region type.
    #[must_use]
    pub fn to_sdk(&self) -> Region {
        Region::new(self.0.clone())
    }
}

impl TryFrom<String> for AwsRegion {
    type Error = ConnectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AwsRegion> for String {
    fn from(region: AwsRegion) -> Self {
        region.0
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `true` when the string is empty or whitespace only.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
