/*
 * Responsibility
 * - At-rest key container format: a JSON envelope whose payload (the
 *   alias -> key-material map) is authenticated with HMAC-SHA256 under the
 *   container password
 * - ContainerBuilder for provisioning tooling and tests
 */
use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::KeyStoreError;
use crate::services::token::AlgorithmId;

pub(crate) const CONTAINER_VERSION: u32 = 1;

/// Outer envelope. `payload` is the base64url of the serialized alias map;
/// `mac` authenticates those exact payload bytes under the password.
#[derive(Debug, Serialize, Deserialize)]
struct ContainerDocument {
    version: u32,
    mac: String,
    payload: String,
}

/// One alias entry. MAC aliases carry `secret`; signature aliases carry a
/// PKCS#8 private key and an SPKI public key, both PEM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ContainerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_pem: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
}

fn payload_mac(password: &str, payload: &str) -> Vec<u8> {
    // HMAC accepts any key length; new_from_slice cannot fail here.
    let mut mac = match Hmac::<Sha256>::new_from_slice(password.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Parse and authenticate a sealed container document, returning the alias
/// map. Any structural problem is `Malformed`; a MAC mismatch is
/// `BadPassword`. Individual entries are not validated here.
pub(crate) fn unseal(
    document: &str,
    password: &str,
) -> Result<BTreeMap<String, ContainerEntry>, KeyStoreError> {
    let doc: ContainerDocument =
        serde_json::from_str(document).map_err(|_| KeyStoreError::Malformed)?;
    if doc.version != CONTAINER_VERSION {
        return Err(KeyStoreError::Malformed);
    }

    let presented = URL_SAFE_NO_PAD
        .decode(&doc.mac)
        .map_err(|_| KeyStoreError::Malformed)?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(password.as_bytes()).map_err(|_| KeyStoreError::Malformed)?;
    mac.update(doc.payload.as_bytes());
    if mac.verify_slice(&presented).is_err() {
        return Err(KeyStoreError::BadPassword);
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(&doc.payload)
        .map_err(|_| KeyStoreError::Malformed)?;
    serde_json::from_slice(&payload_bytes).map_err(|_| KeyStoreError::Malformed)
}

/// Builds a sealed key container document.
///
/// Aliases equal the algorithm names; an absent alias simply disables that
/// algorithm at load time.
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    entries: BTreeMap<String, ContainerEntry>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a MAC secret under the algorithm's alias.
    pub fn secret(mut self, algorithm: AlgorithmId, secret: &[u8]) -> Self {
        self.entries.insert(
            algorithm.name().to_string(),
            ContainerEntry {
                secret: Some(URL_SAFE_NO_PAD.encode(secret)),
                ..ContainerEntry::default()
            },
        );
        self
    }

    /// Register an asymmetric pair (PKCS#8 private PEM, SPKI public PEM)
    /// under the algorithm's alias.
    pub fn key_pair(
        mut self,
        algorithm: AlgorithmId,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Self {
        self.entries.insert(
            algorithm.name().to_string(),
            ContainerEntry {
                secret: None,
                private_key_pem: Some(private_key_pem.to_string()),
                public_key_pem: Some(public_key_pem.to_string()),
            },
        );
        self
    }

    /// Serialize and authenticate the container under `password`.
    pub fn seal(self, password: &str) -> Result<String, KeyStoreError> {
        let payload_bytes =
            serde_json::to_vec(&self.entries).map_err(|_| KeyStoreError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(payload_bytes);
        let mac = URL_SAFE_NO_PAD.encode(payload_mac(password, &payload));

        let doc = ContainerDocument {
            version: CONTAINER_VERSION,
            mac,
            payload,
        };
        serde_json::to_string(&doc).map_err(|_| KeyStoreError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal_round_trip() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[7u8; 32])
            .seal("hunter2")
            .unwrap();

        let entries = unseal(&document, "hunter2").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries["HS256"].secret.is_some());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[7u8; 32])
            .seal("hunter2")
            .unwrap();

        assert!(matches!(
            unseal(&document, "hunter3"),
            Err(KeyStoreError::BadPassword)
        ));
    }

    #[test]
    fn garbage_document_is_malformed() {
        assert!(matches!(
            unseal("not json", "pw"),
            Err(KeyStoreError::Malformed)
        ));
        assert!(matches!(
            unseal(r#"{"version":9,"mac":"","payload":""}"#, "pw"),
            Err(KeyStoreError::Malformed)
        ));
    }

    #[test]
    fn tampered_payload_fails_authentication() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[7u8; 32])
            .seal("hunter2")
            .unwrap();

        let mut doc: serde_json::Value = serde_json::from_str(&document).unwrap();
        let payload = doc["payload"].as_str().unwrap().to_string();
        let swapped = if payload.starts_with('A') { "B" } else { "A" };
        doc["payload"] = serde_json::json!(format!("{swapped}{}", &payload[1..]));

        assert!(matches!(
            unseal(&doc.to_string(), "hunter2"),
            Err(KeyStoreError::BadPassword)
        ));
    }
}
