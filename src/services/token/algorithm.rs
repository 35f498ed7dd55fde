/*
 * Responsibility
 * - Closed set of signing algorithm identifiers (JWS wire names)
 * - Name <-> id mapping used by the codec header and key container aliases
 */

/// The nine supported signing algorithms.
///
/// The set is closed: an algorithm missing from the key container is a valid
/// runtime state (that algorithm is simply unavailable), an algorithm name
/// outside this set is rejected at the codec boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 9] = [
        AlgorithmId::HS256,
        AlgorithmId::HS384,
        AlgorithmId::HS512,
        AlgorithmId::RS256,
        AlgorithmId::RS384,
        AlgorithmId::RS512,
        AlgorithmId::ES256,
        AlgorithmId::ES384,
        AlgorithmId::ES512,
    ];

    /// JWS name; doubles as the key container alias.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmId::HS256 => "HS256",
            AlgorithmId::HS384 => "HS384",
            AlgorithmId::HS512 => "HS512",
            AlgorithmId::RS256 => "RS256",
            AlgorithmId::RS384 => "RS384",
            AlgorithmId::RS512 => "RS512",
            AlgorithmId::ES256 => "ES256",
            AlgorithmId::ES384 => "ES384",
            AlgorithmId::ES512 => "ES512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// MAC algorithms use a shared secret; the rest sign with a private key.
    pub fn is_mac(&self) -> bool {
        matches!(self, AlgorithmId::HS256 | AlgorithmId::HS384 | AlgorithmId::HS512)
    }

    /// Minimum accepted secret length for MAC algorithms (the hash output
    /// size). Shorter secrets are rejected at key extraction.
    pub fn min_secret_len(&self) -> usize {
        match self {
            AlgorithmId::HS256 => 32,
            AlgorithmId::HS384 => 48,
            AlgorithmId::HS512 => 64,
            _ => 0,
        }
    }
}

impl Default for AlgorithmId {
    fn default() -> Self {
        AlgorithmId::HS256
    }
}

impl std::fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
