//! Secret resolution backed by the credential store.

use async_trait::async_trait;
use runbook_tools::{CredentialKind, Secret, SecretError, SecretResolver};
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::Encryptor;
use crate::store::CredentialStore;

/// Reads credentials from the store and decrypts them on demand.
pub struct StoredSecretResolver {
    credentials: Arc<dyn CredentialStore>,
    encryptor: Option<Encryptor>,
}

impl StoredSecretResolver {
    /// Without an encryptor every decryption fails.
    pub fn new(credentials: Arc<dyn CredentialStore>, encryptor: Option<Encryptor>) -> Self {
        Self {
            credentials,
            encryptor,
        }
    }
}

#[async_trait]
impl SecretResolver for StoredSecretResolver {
    async fn resolve(
        &self,
        credential_id: Uuid,
        expected: CredentialKind,
    ) -> Result<Option<Secret>, SecretError> {
        let credential = self
            .credentials
            .get_credential(credential_id)
            .await
            .map_err(|e| SecretError::Store(e.to_string()))?;

        let Some(credential) = credential else {
            return Ok(None);
        };

        if credential.kind != expected {
            tracing::warn!(
                %credential_id,
                kind = %credential.kind,
                %expected,
                "Credential has the wrong type, ignoring it"
            );
            return Ok(None);
        }

        let Some(encryptor) = &self.encryptor else {
            return Err(SecretError::Decryption {
                id: credential_id,
                reason: "encryption key is not configured".to_string(),
            });
        };

        let value = encryptor
            .decrypt_secret(&credential.encrypted_secret)
            .map_err(|e| SecretError::Decryption {
                id: credential_id,
                reason: e.to_string(),
            })?;

        tracing::debug!(%credential_id, kind = %credential.kind, "Credential decrypted");
        Ok(Some(Secret {
            kind: credential.kind,
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Credential;
    use crate::store::MemoryStore;
    use chrono::Utc;

    async fn store_with(encryptor: &Encryptor, secret: &str) -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let credential = Credential {
            id: Uuid::new_v4(),
            name: "deploy-token".to_string(),
            kind: CredentialKind::Api,
            encrypted_secret: encryptor.encrypt_secret(secret).unwrap(),
            created_at: Utc::now(),
        };
        let id = credential.id;
        store.put_credential(credential).await;
        (store, id)
    }

    #[tokio::test]
    async fn test_resolves_and_decrypts() {
        let encryptor = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let (store, id) = store_with(&encryptor, "Bearer xyz").await;

        let resolver = StoredSecretResolver::new(store, Some(encryptor));
        let secret = resolver.resolve(id, CredentialKind::Api).await.unwrap().unwrap();
        assert_eq!(secret.kind, CredentialKind::Api);
        assert_eq!(secret.value, "Bearer xyz");
    }

    #[tokio::test]
    async fn test_missing_credential_is_none() {
        let resolver = StoredSecretResolver::new(Arc::new(MemoryStore::new()), None);
        assert!(resolver
            .resolve(Uuid::new_v4(), CredentialKind::Api)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails() {
        let encryptor = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let (store, id) = store_with(&encryptor, "Bearer xyz").await;

        let resolver = StoredSecretResolver::new(store, None);
        let err = resolver.resolve(id, CredentialKind::Api).await.unwrap_err();
        assert!(err.to_string().contains("encryption key is not configured"));
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let encryptor = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let (store, id) = store_with(&encryptor, "Bearer xyz").await;

        let other = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let resolver = StoredSecretResolver::new(store, Some(other));
        assert!(matches!(
            resolver.resolve(id, CredentialKind::Api).await,
            Err(SecretError::Decryption { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_ignored_without_decrypting() {
        let encryptor = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let (store, id) = store_with(&encryptor, "Bearer xyz").await;

        // a key that cannot decrypt the credential proves nothing was decrypted
        let other = Encryptor::from_base64(&Encryptor::generate_key()).unwrap();
        let resolver = StoredSecretResolver::new(store, Some(other));
        let resolved = tokio_test::assert_ok!(resolver.resolve(id, CredentialKind::Ssh).await);
        assert!(resolved.is_none());

        let resolver = StoredSecretResolver::new(Arc::new(MemoryStore::new()), None);
        assert!(resolver
            .resolve(Uuid::new_v4(), CredentialKind::Ssh)
            .await
            .unwrap()
            .is_none());
    }
}
