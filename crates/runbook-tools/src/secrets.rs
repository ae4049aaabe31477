//! Secret resolution for credential-backed executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SecretError;

/// Kind of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Private key for SSH blocks.
    Ssh,
    /// Token injected into an HTTP header for API blocks.
    Api,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialKind::Ssh => write!(f, "ssh"),
            CredentialKind::Api => write!(f, "api"),
        }
    }
}

impl std::str::FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(CredentialKind::Ssh),
            "api" => Ok(CredentialKind::Api),
            other => Err(format!("unknown credential type '{other}'")),
        }
    }
}

/// A decrypted credential secret.
#[derive(Clone)]
pub struct Secret {
    pub kind: CredentialKind,
    pub value: String,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Resolves a credential id to its decrypted secret.
///
/// `Ok(None)` means no credential of the `expected` kind exists under that
/// id. A credential of another kind is never decrypted.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(
        &self,
        credential_id: Uuid,
        expected: CredentialKind,
    ) -> Result<Option<Secret>, SecretError>;
}

/// Resolver with no credentials at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

#[async_trait]
impl SecretResolver for NoSecrets {
    async fn resolve(
        &self,
        _credential_id: Uuid,
        _expected: CredentialKind,
    ) -> Result<Option<Secret>, SecretError> {
        Ok(None)
    }
}
