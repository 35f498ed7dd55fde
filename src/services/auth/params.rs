/*
 * Responsibility
 * - Closed variant type for authentication credentials; exactly one variant
 *   per call, exhaustively matched by the dispatcher
 * - Session-scoped overrides applied to the minted claims
 */

/// Credentials for one authentication attempt. Adding a variant here forces
/// a matching dispatcher arm at compile time.
#[derive(Debug, Clone)]
pub enum AuthenticationParameter {
    Password {
        username: String,
        password: String,
    },
    ApiKey {
        key: String,
    },
    /// A token minted by an external federated identity provider.
    ExternalToken {
        token: String,
    },
    /// A previously-issued token presented for renewal.
    JwtRefresh {
        token: String,
    },
    /// Installation-specific scheme, routed to the fallback authenticator.
    Other {
        scheme: String,
        payload: serde_json::Value,
    },
}

/// Session-scoped overrides merged into the response (and the signed claims)
/// on success.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub locale: Option<String>,
    pub zoneinfo: Option<String>,
    /// Tenant-switch request; must name a tenant the user is allowed into.
    pub tenant: Option<String>,
}
