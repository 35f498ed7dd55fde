/*
 * Responsibility
 * - Compact token encode/decode: segment split, base64url, JSON header and
 *   claims, algorithm lookup, signature computation and verification
 * - Stamps iat/exp at sign time; never trusts caller timestamps when minting
 */
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TokenError;
use crate::services::token::keystore::KeyMaterialStore;
use crate::services::token::primitive::CryptoPrimitive;
use crate::services::token::{AlgorithmId, Claims};

/// Fixed-shape compact header. Field order matters for byte-identical
/// MAC-signed output: `typ` first, then `alg`.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    typ: String,
    alg: String,
}

const HEADER_TYP: &str = "JWT";

/// Compact token codec bound to one immutable key store.
///
/// The codec caches one engine handle per algorithm in a `RefCell`, so it is
/// deliberately `!Sync`: hand-out goes through
/// [`PerThreadCodecPool`](crate::services::token::PerThreadCodecPool), never
/// by sharing an instance across threads.
pub struct TokenCodec {
    store: Arc<KeyMaterialStore>,
    default_algorithm: AlgorithmId,
    engines: RefCell<HashMap<AlgorithmId, Rc<CryptoPrimitive>>>,
}

impl TokenCodec {
    pub fn new(store: Arc<KeyMaterialStore>, default_algorithm: AlgorithmId) -> Self {
        Self {
            store,
            default_algorithm,
            engines: RefCell::new(HashMap::new()),
        }
    }

    fn engine(&self, algorithm: AlgorithmId) -> Option<Rc<CryptoPrimitive>> {
        if let Some(engine) = self.engines.borrow().get(&algorithm) {
            return Some(engine.clone());
        }
        let engine = Rc::new(self.store.primitive(algorithm)?);
        self.engines
            .borrow_mut()
            .insert(algorithm, engine.clone());
        Some(engine)
    }

    /// Decode and verify a compact token.
    ///
    /// Shape checks run before any cryptography. Undecodable base64 and
    /// unparsable JSON collapse into `VerificationFailed` on purpose (see
    /// [`TokenError`]). Timestamps in the returned claims are surfaced
    /// as-is; expiry enforcement stays with the caller, which lets renewal
    /// flows decode expired tokens.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::MalformedToken(segments.len()));
        }
        if segments[2].is_empty() {
            return Err(TokenError::MissingSignature);
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(segments[0])
            .map_err(|_| TokenError::VerificationFailed)?;
        let claims_bytes = URL_SAFE_NO_PAD
            .decode(segments[1])
            .map_err(|_| TokenError::VerificationFailed)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::VerificationFailed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::VerificationFailed)?;
        if header.typ != HEADER_TYP || !claims.has_valid_schema() {
            return Err(TokenError::VerificationFailed);
        }

        let algorithm = AlgorithmId::from_name(&header.alg)
            .ok_or_else(|| TokenError::AlgorithmNotSupported(header.alg.clone()))?;
        let engine = self
            .engine(algorithm)
            .ok_or_else(|| TokenError::AlgorithmNotSupported(header.alg.clone()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(segments[2])
            .map_err(|_| TokenError::VerificationFailed)?;
        let signing_input = [segments[0], segments[1]].join(".");
        if !engine.verify(&signature, signing_input.as_bytes()) {
            debug!(algorithm = %algorithm, "token signature rejected");
            return Err(TokenError::VerificationFailed);
        }

        Ok(claims)
    }

    /// Sign claims into a compact token.
    ///
    /// `issued_at` is stamped with the current second; `expires_at` with
    /// now + ttl when a TTL is given, cleared otherwise; `not_before` is
    /// always cleared. The caller's copy is untouched (working-copy rule).
    pub fn sign(
        &self,
        claims: &Claims,
        ttl_seconds: Option<u64>,
        algorithm: Option<AlgorithmId>,
    ) -> Result<String, TokenError> {
        let algorithm = algorithm.unwrap_or(self.default_algorithm);
        let engine = self
            .engine(algorithm)
            .ok_or_else(|| TokenError::AlgorithmNotSupported(algorithm.name().to_string()))?;

        let now = Utc::now().timestamp();
        let mut stamped = claims.clone();
        stamped.schema = crate::services::token::CLAIMS_SCHEMA.to_string();
        stamped.issued_at = Some(now);
        stamped.expires_at = ttl_seconds.map(|ttl| now + ttl as i64);
        stamped.not_before = None;

        let header = Header {
            typ: HEADER_TYP.to_string(),
            alg: algorithm.name().to_string(),
        };
        let header_json = serde_json::to_vec(&header).map_err(|_| TokenError::SigningFailed)?;
        let claims_json = serde_json::to_vec(&stamped).map_err(|_| TokenError::SigningFailed)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = engine.sign(signing_input.as_bytes())?;

        debug!(algorithm = %algorithm, ttl_seconds, "minted token");
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}
