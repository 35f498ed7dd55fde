/*
 * Responsibility
 * - Merge session-scoped overrides into a claims working copy before signing
 * - Package the dispatcher outcome into the outward-facing AuthResponse
 */
use serde::Serialize;

use crate::services::auth::params::SessionOverrides;
use crate::services::token::Claims;

/// Outward-facing result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,

    pub user_id: String,
    pub tenant_id: Option<String>,
    pub locale: Option<String>,
    pub zoneinfo: Option<String>,

    /// Soft-success flag: the token is valid but the password has aged out.
    pub password_expired: bool,

    pub previous_login: Option<i64>,
    pub failed_attempts: u32,
}

/// Bookkeeping a strategy hands to the assembler alongside the claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFlags {
    pub password_expired: bool,
    pub previous_login: Option<i64>,
    pub failed_attempts: u32,
}

/// Finalizes dispatcher output. Stateless; locale/zoneinfo overrides go into
/// the claims working copy (so they are part of the signed token), the
/// tenant-switch override is validated and applied by the dispatcher before
/// the claims reach this point.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Apply locale/zoneinfo overrides onto a working copy of `claims`.
    pub fn merge_overrides(&self, claims: &Claims, overrides: &SessionOverrides) -> Claims {
        let mut merged = claims.clone();
        if let Some(locale) = &overrides.locale {
            merged.locale = Some(locale.clone());
        }
        if let Some(zoneinfo) = &overrides.zoneinfo {
            merged.zoneinfo = Some(zoneinfo.clone());
        }
        merged
    }

    /// Package the minted token into the outward result. `expires_in` comes
    /// from the dispatcher's TTL (the codec stamps the claims internally).
    pub fn assemble(
        &self,
        claims: &Claims,
        token: String,
        expires_in: u64,
        flags: ResponseFlags,
    ) -> AuthResponse {
        AuthResponse {
            token,
            token_type: "Bearer",
            expires_in,
            user_id: claims.user_id.clone().unwrap_or_default(),
            tenant_id: claims.tenant_id.clone(),
            locale: claims.locale.clone(),
            zoneinfo: claims.zoneinfo.clone(),
            password_expired: flags.password_expired,
            previous_login: flags.previous_login,
            failed_attempts: flags.failed_attempts,
        }
    }
}
