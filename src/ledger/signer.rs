/// Owner to signing-key resolution backed by the `[ledger.signers]` config table
use async_trait::async_trait;
use std::collections::HashMap;

use super::types::{OwnerId, SigningHandle};
use super::SignerResolver;
use crate::errors::ExecutionError;

pub struct KeystoreSigners {
    keys: HashMap<OwnerId, String>,
}

impl KeystoreSigners {
    pub fn new(keys: HashMap<OwnerId, String>) -> Self {
        Self { keys }
    }

    /// Build from the raw config map (owner address -> key reference)
    pub fn from_config(signers: &HashMap<String, String>) -> Self {
        let keys = signers
            .iter()
            .map(|(owner, key_ref)| (OwnerId::new(owner.trim()), key_ref.trim().to_string()))
            .collect();
        Self::new(keys)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl SignerResolver for KeystoreSigners {
    async fn resolve_signer(&self, owner: &OwnerId) -> Result<SigningHandle, ExecutionError> {
        match self.keys.get(owner) {
            Some(key_ref) if !key_ref.is_empty() => Ok(SigningHandle {
                owner: owner.clone(),
                key_ref: key_ref.clone(),
            }),
            Some(_) => Err(ExecutionError::Signer(format!(
                "empty key reference configured for owner {}",
                owner
            ))),
            None => Err(ExecutionError::Signer(format!(
                "no signing key configured for owner {}",
                owner
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_configured_owner() {
        let mut raw = HashMap::new();
        raw.insert(" 0xabc ".to_string(), "keystore:ops".to_string());
        raw.insert("0xdead".to_string(), "  ".to_string());
        let signers = KeystoreSigners::from_config(&raw);
        assert_eq!(signers.len(), 2);

        let handle = signers.resolve_signer(&OwnerId::from("0xabc")).await.unwrap();
        assert_eq!(handle.key_ref, "keystore:ops");

        let empty = signers.resolve_signer(&OwnerId::from("0xdead")).await;
        assert!(matches!(empty, Err(ExecutionError::Signer(_))));

        let missing = signers.resolve_signer(&OwnerId::from("0xbeef")).await;
        assert!(matches!(missing, Err(ExecutionError::Signer(msg)) if msg.contains("0xbeef")));
    }
}
