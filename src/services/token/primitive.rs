/*
 * Responsibility
 * - The two crypto capability variants: MAC (keyed SHA-2) and asymmetric
 *   signature (RSA PKCS#1 v1.5, ECDSA P-256/P-384/P-521)
 * - sign(bytes) -> bytes and verify(sig, bytes) -> bool, nothing else
 */
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::TokenError;
use crate::services::token::keystore::SignatureKeys;
use crate::services::token::AlgorithmId;

/// A signing/verification capability for one algorithm.
///
/// Instances are built per codec from the immutable key store and are never
/// shared between threads; repeated calls on one instance are fine,
/// concurrent calls on one instance are not part of the contract.
pub enum CryptoPrimitive {
    Mac(MacEngine),
    Signature(SignatureEngine),
}

impl CryptoPrimitive {
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            CryptoPrimitive::Mac(engine) => engine.compute(payload),
            CryptoPrimitive::Signature(engine) => engine.sign(payload),
        }
    }

    pub fn verify(&self, signature: &[u8], payload: &[u8]) -> bool {
        match self {
            CryptoPrimitive::Mac(engine) => engine.check(signature, payload),
            CryptoPrimitive::Signature(engine) => engine.check(signature, payload),
        }
    }
}

/// Deterministic keyed-hash engine. Verification recomputes the MAC and
/// compares in constant time (`Mac::verify_slice`).
pub struct MacEngine {
    algorithm: AlgorithmId,
    secret: Vec<u8>,
}

impl MacEngine {
    pub(crate) fn new(algorithm: AlgorithmId, secret: Vec<u8>) -> Option<Self> {
        algorithm
            .is_mac()
            .then_some(Self { algorithm, secret })
    }

    fn compute(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self.algorithm {
            AlgorithmId::HS256 => mac_compute::<Hmac<Sha256>>(&self.secret, payload),
            AlgorithmId::HS384 => mac_compute::<Hmac<Sha384>>(&self.secret, payload),
            AlgorithmId::HS512 => mac_compute::<Hmac<Sha512>>(&self.secret, payload),
            _ => Err(TokenError::SigningFailed),
        }
    }

    fn check(&self, signature: &[u8], payload: &[u8]) -> bool {
        match self.algorithm {
            AlgorithmId::HS256 => mac_check::<Hmac<Sha256>>(&self.secret, signature, payload),
            AlgorithmId::HS384 => mac_check::<Hmac<Sha384>>(&self.secret, signature, payload),
            AlgorithmId::HS512 => mac_check::<Hmac<Sha512>>(&self.secret, signature, payload),
            _ => false,
        }
    }
}

fn mac_compute<M: Mac + KeyInit>(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, TokenError> {
    // Both Mac and KeyInit expose new_from_slice; qualify to pick one.
    let mut mac = <M as Mac>::new_from_slice(secret).map_err(|_| TokenError::SigningFailed)?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn mac_check<M: Mac + KeyInit>(secret: &[u8], signature: &[u8], payload: &[u8]) -> bool {
    let Ok(mut mac) = <M as Mac>::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(signature).is_ok()
}

/// Asymmetric signature engine. RSA signatures are PKCS#1 v1.5; ECDSA
/// signatures use the fixed-width `r || s` form, which is the JWS wire
/// encoding. ECDSA output may vary between signings of the same payload;
/// that is a property of the scheme, not a defect.
pub enum SignatureEngine {
    Rsa {
        algorithm: AlgorithmId,
        private: rsa::RsaPrivateKey,
        public: rsa::RsaPublicKey,
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

impl SignatureEngine {
    /// Bind stored key material to an algorithm id. Returns `None` when the
    /// material's key family does not match the alias (such an alias behaves
    /// as if it were absent).
    pub(crate) fn for_algorithm(algorithm: AlgorithmId, keys: &SignatureKeys) -> Option<Self> {
        match (algorithm, keys) {
            (
                AlgorithmId::RS256 | AlgorithmId::RS384 | AlgorithmId::RS512,
                SignatureKeys::Rsa { private, public },
            ) => Some(SignatureEngine::Rsa {
                algorithm,
                private: private.clone(),
                public: public.clone(),
            }),
            (AlgorithmId::ES256, SignatureKeys::P256 { signing, verifying }) => {
                Some(SignatureEngine::P256 {
                    signing: signing.clone(),
                    verifying: verifying.clone(),
                })
            }
            (AlgorithmId::ES384, SignatureKeys::P384 { signing, verifying }) => {
                Some(SignatureEngine::P384 {
                    signing: signing.clone(),
                    verifying: verifying.clone(),
                })
            }
            (AlgorithmId::ES512, SignatureKeys::P521 { signing, verifying }) => {
                Some(SignatureEngine::P521 {
                    signing: signing.clone(),
                    verifying: verifying.clone(),
                })
            }
            _ => None,
        }
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            SignatureEngine::Rsa {
                algorithm,
                private,
                ..
            } => match algorithm {
                AlgorithmId::RS256 => {
                    let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private.clone());
                    let sig = key.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                    Ok(sig.to_vec())
                }
                AlgorithmId::RS384 => {
                    let key = rsa::pkcs1v15::SigningKey::<Sha384>::new(private.clone());
                    let sig = key.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                    Ok(sig.to_vec())
                }
                AlgorithmId::RS512 => {
                    let key = rsa::pkcs1v15::SigningKey::<Sha512>::new(private.clone());
                    let sig = key.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                    Ok(sig.to_vec())
                }
                _ => Err(TokenError::SigningFailed),
            },
            SignatureEngine::P256 { signing, .. } => {
                let sig: p256::ecdsa::Signature =
                    signing.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                Ok(sig.to_vec())
            }
            SignatureEngine::P384 { signing, .. } => {
                let sig: p384::ecdsa::Signature =
                    signing.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                Ok(sig.to_vec())
            }
            SignatureEngine::P521 { signing, .. } => {
                let sig: p521::ecdsa::Signature =
                    signing.try_sign(payload).map_err(|_| TokenError::SigningFailed)?;
                Ok(sig.to_vec())
            }
        }
    }

    fn check(&self, signature: &[u8], payload: &[u8]) -> bool {
        match self {
            SignatureEngine::Rsa {
                algorithm, public, ..
            } => {
                let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                match algorithm {
                    AlgorithmId::RS256 => rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public.clone())
                        .verify(payload, &sig)
                        .is_ok(),
                    AlgorithmId::RS384 => rsa::pkcs1v15::VerifyingKey::<Sha384>::new(public.clone())
                        .verify(payload, &sig)
                        .is_ok(),
                    AlgorithmId::RS512 => rsa::pkcs1v15::VerifyingKey::<Sha512>::new(public.clone())
                        .verify(payload, &sig)
                        .is_ok(),
                    _ => false,
                }
            }
            SignatureEngine::P256 { verifying, .. } => {
                let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying.verify(payload, &sig).is_ok()
            }
            SignatureEngine::P384 { verifying, .. } => {
                let Ok(sig) = p384::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying.verify(payload, &sig).is_ok()
            }
            SignatureEngine::P521 { verifying, .. } => {
                let Ok(sig) = p521::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                verifying.verify(payload, &sig).is_ok()
            }
        }
    }
}
