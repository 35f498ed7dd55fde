/*
 * Responsibility
 * - Load the sealed key container once at startup into an immutable
 *   alias -> KeyEntry map
 * - Per-alias extraction failures disable the alias, never the whole load
 * - Hand out fresh CryptoPrimitive engine handles built from the material
 */
use std::collections::HashMap;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::KeyStoreError;
use crate::services::token::container::{ContainerEntry, unseal};
use crate::services::token::primitive::{CryptoPrimitive, MacEngine, SignatureEngine};
use crate::services::token::AlgorithmId;

/// Key material held for one algorithm alias: either a MAC secret or an
/// asymmetric pair (private signing key + public verification key).
#[derive(Clone)]
pub enum KeyEntry {
    Secret(Vec<u8>),
    KeyPair(SignatureKeys),
}

/// Parsed asymmetric material, one arm per key family.
#[derive(Clone)]
pub enum SignatureKeys {
    Rsa {
        private: RsaPrivateKey,
        public: RsaPublicKey,
    },
    P256 {
        signing: p256::ecdsa::SigningKey,
        verifying: p256::ecdsa::VerifyingKey,
    },
    P384 {
        signing: p384::ecdsa::SigningKey,
        verifying: p384::ecdsa::VerifyingKey,
    },
    P521 {
        signing: p521::ecdsa::SigningKey,
        verifying: p521::ecdsa::VerifyingKey,
    },
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        match self {
            KeyEntry::Secret(_) => f.write_str("KeyEntry::Secret(..)"),
            KeyEntry::KeyPair(_) => f.write_str("KeyEntry::KeyPair(..)"),
        }
    }
}

#[derive(Debug, Error)]
enum ExtractError {
    #[error("entry kind does not match the alias")]
    WrongKind,
    #[error("secret is not valid base64url")]
    BadSecretEncoding,
    #[error("secret shorter than {0} bytes")]
    WeakSecret(usize),
    #[error("private key PEM rejected")]
    BadPrivateKey,
    #[error("public key PEM rejected")]
    BadPublicKey,
}

/// Immutable per-process key material, built once at startup.
///
/// Safe for unsynchronized concurrent reads; the crypto engine handles built
/// from it are not, which is why codecs are pooled per thread.
pub struct KeyMaterialStore {
    entries: HashMap<AlgorithmId, KeyEntry>,
}

impl KeyMaterialStore {
    /// Read and open a sealed container file.
    pub fn load(path: impl AsRef<Path>, password: &str) -> Result<Self, KeyStoreError> {
        let document = std::fs::read_to_string(path)?;
        Self::open(&document, password)
    }

    /// Open a sealed container document.
    ///
    /// A container that cannot be parsed or authenticated fails the load.
    /// Each known alias is then extracted independently: a bad entry is
    /// logged and skipped, leaving that algorithm unavailable.
    pub fn open(document: &str, password: &str) -> Result<Self, KeyStoreError> {
        let aliases = unseal(document, password)?;

        let mut entries = HashMap::new();
        for algorithm in AlgorithmId::ALL {
            let Some(entry) = aliases.get(algorithm.name()) else {
                continue;
            };
            match extract(algorithm, entry) {
                Ok(material) => {
                    debug!(algorithm = %algorithm, "loaded key material");
                    entries.insert(algorithm, material);
                }
                Err(e) => {
                    warn!(algorithm = %algorithm, error = %e, "skipping key alias");
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, algorithm: AlgorithmId) -> Option<&KeyEntry> {
        self.entries.get(&algorithm)
    }

    pub fn is_loaded(&self, algorithm: AlgorithmId) -> bool {
        self.entries.contains_key(&algorithm)
    }

    /// Build a fresh engine handle for `algorithm` from the stored material.
    ///
    /// Handles are cheap to construct and are owned by exactly one codec;
    /// the store itself stays shared and read-only.
    pub fn primitive(&self, algorithm: AlgorithmId) -> Option<CryptoPrimitive> {
        match self.entries.get(&algorithm)? {
            KeyEntry::Secret(secret) => {
                MacEngine::new(algorithm, secret.clone()).map(CryptoPrimitive::Mac)
            }
            KeyEntry::KeyPair(keys) => {
                SignatureEngine::for_algorithm(algorithm, keys).map(CryptoPrimitive::Signature)
            }
        }
    }
}

fn extract(algorithm: AlgorithmId, entry: &ContainerEntry) -> Result<KeyEntry, ExtractError> {
    if algorithm.is_mac() {
        let encoded = entry.secret.as_deref().ok_or(ExtractError::WrongKind)?;
        let secret = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| ExtractError::BadSecretEncoding)?;
        if secret.len() < algorithm.min_secret_len() {
            return Err(ExtractError::WeakSecret(algorithm.min_secret_len()));
        }
        return Ok(KeyEntry::Secret(secret));
    }

    let private_pem = entry
        .private_key_pem
        .as_deref()
        .ok_or(ExtractError::WrongKind)?;
    let public_pem = entry
        .public_key_pem
        .as_deref()
        .ok_or(ExtractError::WrongKind)?;

    let keys = match algorithm {
        AlgorithmId::RS256 | AlgorithmId::RS384 | AlgorithmId::RS512 => {
            let private = RsaPrivateKey::from_pkcs8_pem(private_pem)
                .map_err(|_| ExtractError::BadPrivateKey)?;
            let public = RsaPublicKey::from_public_key_pem(public_pem)
                .map_err(|_| ExtractError::BadPublicKey)?;
            SignatureKeys::Rsa { private, public }
        }
        AlgorithmId::ES256 => {
            let secret = p256::SecretKey::from_pkcs8_pem(private_pem)
                .map_err(|_| ExtractError::BadPrivateKey)?;
            let public = p256::PublicKey::from_public_key_pem(public_pem)
                .map_err(|_| ExtractError::BadPublicKey)?;
            SignatureKeys::P256 {
                signing: p256::ecdsa::SigningKey::from(&secret),
                verifying: p256::ecdsa::VerifyingKey::from(&public),
            }
        }
        AlgorithmId::ES384 => {
            let secret = p384::SecretKey::from_pkcs8_pem(private_pem)
                .map_err(|_| ExtractError::BadPrivateKey)?;
            let public = p384::PublicKey::from_public_key_pem(public_pem)
                .map_err(|_| ExtractError::BadPublicKey)?;
            SignatureKeys::P384 {
                signing: p384::ecdsa::SigningKey::from(&secret),
                verifying: p384::ecdsa::VerifyingKey::from(&public),
            }
        }
        AlgorithmId::ES512 => {
            let secret = p521::SecretKey::from_pkcs8_pem(private_pem)
                .map_err(|_| ExtractError::BadPrivateKey)?;
            let public = p521::PublicKey::from_public_key_pem(public_pem)
                .map_err(|_| ExtractError::BadPublicKey)?;
            // p521's ecdsa wrappers lack the SecretKey/PublicKey conversions
            // the other curves have; go through the raw encodings.
            let signing = p521::ecdsa::SigningKey::from_slice(&secret.to_bytes())
                .map_err(|_| ExtractError::BadPrivateKey)?;
            let verifying =
                p521::ecdsa::VerifyingKey::from_sec1_bytes(public.to_sec1_bytes().as_ref())
                    .map_err(|_| ExtractError::BadPublicKey)?;
            SignatureKeys::P521 { signing, verifying }
        }
        // MAC ids are handled above.
        AlgorithmId::HS256 | AlgorithmId::HS384 | AlgorithmId::HS512 => {
            return Err(ExtractError::WrongKind);
        }
    };

    Ok(KeyEntry::KeyPair(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token::container::ContainerBuilder;
    use crate::services::token::test_keys;

    #[test]
    fn absent_alias_means_unavailable_algorithm() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[1u8; 32])
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        assert!(store.is_loaded(AlgorithmId::HS256));
        assert!(!store.is_loaded(AlgorithmId::HS384));
        assert!(store.primitive(AlgorithmId::RS256).is_none());
    }

    #[test]
    fn undersized_secret_is_skipped_not_fatal() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[1u8; 8])
            .secret(AlgorithmId::HS512, &[1u8; 64])
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        assert!(!store.is_loaded(AlgorithmId::HS256));
        assert!(store.is_loaded(AlgorithmId::HS512));
    }

    #[test]
    fn bad_pem_is_skipped_not_fatal() {
        let document = ContainerBuilder::new()
            .key_pair(AlgorithmId::ES256, "not a pem", "also not a pem")
            .secret(AlgorithmId::HS256, &[1u8; 32])
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        assert!(!store.is_loaded(AlgorithmId::ES256));
        assert!(store.is_loaded(AlgorithmId::HS256));
    }

    #[test]
    fn wrong_entry_kind_for_alias_is_skipped() {
        // A secret filed under an asymmetric alias must not load.
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::RS256, &[1u8; 64])
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        assert!(!store.is_loaded(AlgorithmId::RS256));
    }

    #[test]
    fn load_reads_container_from_disk() {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[1u8; 32])
            .seal("pw")
            .unwrap();
        let path = std::env::temp_dir().join(format!(
            "session-auth-keystore-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, &document).unwrap();

        let store = KeyMaterialStore::load(&path, "pw").unwrap();
        assert!(store.is_loaded(AlgorithmId::HS256));

        std::fs::remove_file(&path).ok();
        assert!(matches!(
            KeyMaterialStore::load("/definitely/not/here", "pw"),
            Err(crate::error::KeyStoreError::Unreadable(_))
        ));
    }

    #[test]
    fn every_curve_family_loads_and_signs() {
        let (p384_private, p384_public) = test_keys::p384_pair_pem();
        let (p521_private, p521_public) = test_keys::p521_pair_pem();
        let document = ContainerBuilder::new()
            .key_pair(AlgorithmId::ES384, &p384_private, &p384_public)
            .key_pair(AlgorithmId::ES512, &p521_private, &p521_public)
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        for alg in [AlgorithmId::ES384, AlgorithmId::ES512] {
            let primitive = store.primitive(alg).unwrap();
            let sig = primitive.sign(b"payload").unwrap();
            assert!(primitive.verify(&sig, b"payload"), "{alg}");
            assert!(!primitive.verify(&sig, b"tampered"), "{alg}");
        }
    }

    #[test]
    fn ec_pair_loads_and_builds_primitive() {
        let (private_pem, public_pem) = test_keys::p256_pair_pem();
        let document = ContainerBuilder::new()
            .key_pair(AlgorithmId::ES256, &private_pem, &public_pem)
            .seal("pw")
            .unwrap();
        let store = KeyMaterialStore::open(&document, "pw").unwrap();

        let primitive = store.primitive(AlgorithmId::ES256).unwrap();
        let sig = primitive.sign(b"payload").unwrap();
        assert!(primitive.verify(&sig, b"payload"));
        assert!(!primitive.verify(&sig, b"other payload"));
    }
}
