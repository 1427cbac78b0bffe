//! Ed25519 mediator key store
//!
//! Holds the signing keys of the mediators this node produces for, keyed by
//! the mediator's signing reference.

use crate::domain::Mediator;
use crate::error::{Result, SchedulingError};
use crate::ports::UnitSigner;
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::collections::HashMap;

/// Local key custody backed by ed25519 keys
#[derive(Default)]
pub struct Ed25519KeyStore {
    keys: HashMap<String, SigningKey>,
}

impl Ed25519KeyStore {
    /// Empty key store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key for `signing_reference` from a 32-byte secret seed
    pub fn insert_seed(&mut self, signing_reference: impl Into<String>, seed: [u8; 32]) {
        self.keys
            .insert(signing_reference.into(), SigningKey::from_bytes(&seed));
    }

    /// Builder form of [`Ed25519KeyStore::insert_seed`]
    pub fn with_seed(mut self, signing_reference: impl Into<String>, seed: [u8; 32]) -> Self {
        self.insert_seed(signing_reference, seed);
        self
    }

    /// Public key for `signing_reference`
    pub fn verifying_key(&self, signing_reference: &str) -> Option<VerifyingKey> {
        self.keys.get(signing_reference).map(SigningKey::verifying_key)
    }

    /// Check `signature` over `payload` against the key for `signing_reference`
    pub fn verify(&self, signing_reference: &str, payload: &[u8], signature: &[u8]) -> bool {
        let Some(key) = self.verifying_key(signing_reference) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(payload, &signature).is_ok()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are held
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl UnitSigner for Ed25519KeyStore {
    fn can_sign(&self, mediator: &Mediator) -> bool {
        self.keys.contains_key(&mediator.signing_reference)
    }

    async fn sign(&self, mediator: &Mediator, payload: &[u8]) -> Result<Vec<u8>> {
        let key = self.keys.get(&mediator.signing_reference).ok_or_else(|| {
            SchedulingError::SignerError(format!(
                "no key for signing reference {}",
                mediator.signing_reference
            ))
        })?;
        Ok(key.sign(payload).to_bytes().to_vec())
    }
}
