//! Authentication providers.
//!
//! [`Authentication`] selects how a connection obtains credentials. Resolution
//! happens in [`Authentication::resolve`], which the connection calls during
//! `init`; building a connection never validates credentials.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, ConnectionResult};
use crate::types::is_blank;

/// Provider name attached to explicitly configured credentials.
const KEYS_PROVIDER_NAME: &str = "awslink-keys";

/// Credentials handed to a client factory.
///
/// The `Debug` output of the explicit variant redacts the secret key.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Resolved by the SDK default credential chain (environment, profile,
    /// web identity, container or instance role) when requests are signed.
    Ambient,
    /// An explicitly configured key pair.
    Explicit(aws_credential_types::Credentials),
}

impl Credentials {
    /// Whether the credentials come from the SDK default chain.
    #[must_use]
    pub fn is_ambient(&self) -> bool {
        matches!(self, Self::Ambient)
    }
}

/// How a connection authenticates against AWS.
///
/// Deserializes from a tagged object, e.g. `{"type": "default"}` or
/// `{"type": "keys", "accessKey": "...", "secretKey": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Authentication {
    /// Defer to the SDK default credential chain.
    #[default]
    Default,
    /// Use a static access key / secret key pair.
    Keys(KeysAuthentication),
}

impl Authentication {
    /// Explicit key pair authentication.
    pub fn keys(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::Keys(KeysAuthentication::new(access_key, secret_key))
    }

    /// Resolve the credentials this authentication describes.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Authentication`] if an explicit key pair has a
    /// blank access key or secret key.
    pub fn resolve(&self) -> ConnectionResult<Credentials> {
        match self {
            Self::Default => Ok(Credentials::Ambient),
            Self::Keys(keys) => keys.resolve(),
        }
    }
}

/// Static key pair authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysAuthentication {
    /// Access key ID.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default, skip_serializing)]
    pub secret_key: String,
    /// Optional session token for temporary credentials.
    #[serde(default, skip_serializing)]
    pub session_token: Option<String>,
}

impl KeysAuthentication {
    /// Create a key pair without a session token.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn resolve(&self) -> ConnectionResult<Credentials> {
        if is_blank(&self.access_key) {
            return Err(ConnectionError::Authentication(
                "access key must not be blank".to_owned(),
            ));
        }
        if is_blank(&self.secret_key) {
            return Err(ConnectionError::Authentication(
                "secret key must not be blank".to_owned(),
            ));
        }
        let session_token = self
            .session_token
            .as_deref()
            .filter(|token| !is_blank(token))
            .map(ToOwned::to_owned);
        Ok(Credentials::Explicit(aws_credential_types::Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            session_token,
            None,
            KEYS_PROVIDER_NAME,
        )))
    }
}

impl fmt::Debug for KeysAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeysAuthentication")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}
