/*
 * Responsibility
 * - Typed error taxonomy for the token codec and the authentication dispatcher
 * - Keeps the attacker-facing categories deliberately coarse (no parser detail)
 */
use thiserror::Error;

/// Errors surfaced by [`TokenCodec`](crate::services::token::TokenCodec).
///
/// Undecodable base64 and unparsable JSON are intentionally collapsed into
/// `VerificationFailed` so a caller relaying the error outward cannot be used
/// as a parsing oracle. `AlgorithmNotSupported` stays distinguishable: it is
/// a configuration fact, not an attack signal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: expected 3 segments, got {0}")]
    MalformedToken(usize),

    #[error("token signature segment is empty")]
    MissingSignature,

    #[error("algorithm not supported: {0}")]
    AlgorithmNotSupported(String),

    #[error("token verification failed")]
    VerificationFailed,

    #[error("token signing failed")]
    SigningFailed,
}

/// Errors opening the key container. A container-level failure is fatal to
/// the load; per-alias extraction failures are not (they only disable the
/// affected algorithm).
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key container unreadable")]
    Unreadable(#[from] std::io::Error),

    #[error("key container malformed")]
    Malformed,

    #[error("key container password rejected")]
    BadPassword,
}

/// Outward result channel of the dispatcher.
///
/// `Denied` is uniform on purpose: a non-existent user and a wrong password
/// must be indistinguishable to the caller. The specific reason is logged
/// internally where the denial is decided. `UnhandledVariant` and `Internal`
/// are the fault channel (configuration/programming errors and collaborator
/// failures), never produced by bad credentials.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("access denied")]
    Denied,

    #[error("no fallback authenticator configured for scheme: {0}")]
    UnhandledVariant(String),

    #[error("internal authentication error")]
    Internal,
}

impl From<crate::repos::directory::DirectoryError> for AuthError {
    fn from(_: crate::repos::directory::DirectoryError) -> Self {
        AuthError::Internal
    }
}
