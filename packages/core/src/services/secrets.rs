//! Credential decryption.
//!
//! Deployed configuration stores hosts, users and passwords as base64 KMS
//! ciphertext. Local runs use [`PlaintextDecryptor`] and read them as-is.

use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Credential is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("KMS decrypt failed: {detail}")]
    Kms { detail: String },

    #[error("KMS returned no plaintext")]
    EmptyPlaintext,

    #[error("Decrypted credential is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError>;
}

/// AWS KMS backed decryption.
#[derive(Debug, Clone)]
pub struct KmsDecryptor {
    client: aws_sdk_kms::Client,
}

impl KmsDecryptor {
    /// Build a client from the ambient AWS configuration (env, profile or
    /// instance role).
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_from_env().await;
        tracing::debug!(region = ?sdk_config.region(), "KMS client initialized");
        Self {
            client: aws_sdk_kms::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl Decryptor for KmsDecryptor {
    async fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError> {
        let blob = base64::decode(ciphertext.trim())?;

        let output = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(blob))
            .send()
            .await
            .map_err(|e| SecretsError::Kms {
                detail: e.to_string(),
            })?;

        let plaintext = output.plaintext().ok_or(SecretsError::EmptyPlaintext)?;
        Ok(String::from_utf8(plaintext.as_ref().to_vec())?)
    }
}

/// Pass-through used when credentials are configured unencrypted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextDecryptor;

#[async_trait]
impl Decryptor for PlaintextDecryptor {
    async fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError> {
        Ok(ciphertext.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plaintext_decryptor_is_identity() {
        let value = PlaintextDecryptor.decrypt("redshift.example.org").await.unwrap();
        assert_eq!(value, "redshift.example.org");
    }

    #[test]
    fn invalid_base64_maps_to_encoding_error() {
        let err: SecretsError = base64::decode("not base64!").unwrap_err().into();
        assert!(matches!(err, SecretsError::Encoding(_)));
    }
}
