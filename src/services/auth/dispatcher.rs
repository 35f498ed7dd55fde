/*
 * Responsibility
 * - Select and run one authentication strategy per credential variant
 * - Uniform outward denial (reasons only in the log), soft success for
 *   expired passwords, fault channel for unhandled schemes
 */
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::repos::directory::{
    DirectoryCode, DirectoryTenant, DirectoryUser, FallbackAuthenticator, FederatedProvider,
    PasswordVerdict, UserDirectory,
};
use crate::services::auth::params::{AuthenticationParameter, SessionOverrides};
use crate::services::auth::response::{AuthResponse, ResponseAssembler, ResponseFlags};
use crate::services::token::{Claims, PerThreadCodecPool};

/// Dispatches one authentication attempt to the strategy matching its
/// credential variant. Stateless between calls: every variant runs to a
/// terminal result in one pass.
///
/// Denials are uniform on the outside; the deciding reason is logged where
/// it is known. Directory infrastructure failures surface as
/// [`AuthError::Internal`], never as denials.
pub struct AuthenticationDispatcher {
    directory: Arc<dyn UserDirectory>,
    federated: Option<Arc<dyn FederatedProvider>>,
    fallback: Option<Arc<dyn FallbackAuthenticator>>,
    codecs: PerThreadCodecPool,
    assembler: ResponseAssembler,
    issuer: String,
    token_ttl_seconds: u64,
}

impl AuthenticationDispatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        codecs: PerThreadCodecPool,
        issuer: String,
        token_ttl_seconds: u64,
    ) -> Self {
        Self {
            directory,
            federated: None,
            fallback: None,
            codecs,
            assembler: ResponseAssembler::new(),
            issuer,
            token_ttl_seconds,
        }
    }

    pub fn with_federated(mut self, provider: Arc<dyn FederatedProvider>) -> Self {
        self.federated = Some(provider);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackAuthenticator>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Entry point: exactly one variant is processed per call.
    pub async fn authenticate(
        &self,
        parameter: AuthenticationParameter,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        match parameter {
            AuthenticationParameter::Password { username, password } => {
                self.password_auth(username, password, overrides).await
            }
            AuthenticationParameter::ApiKey { key } => self.api_key_auth(key, overrides).await,
            AuthenticationParameter::ExternalToken { token } => {
                self.external_token_auth(token, overrides).await
            }
            AuthenticationParameter::JwtRefresh { token } => {
                self.refresh_auth(token, overrides).await
            }
            AuthenticationParameter::Other { scheme, payload } => {
                self.fallback_auth(scheme, payload, overrides).await
            }
        }
    }

    async fn password_auth(
        &self,
        username: String,
        password: String,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.directory.find_user_by_name(&username).await? else {
            warn!(username = %username, "denied: unknown user");
            return Err(AuthError::Denied);
        };
        if !user.enabled {
            warn!(user_id = %user.id, "denied: user disabled");
            return Err(AuthError::Denied);
        }

        let verdict = match &self.federated {
            Some(provider) if provider.requires(&user) => {
                debug!(user_id = %user.id, "delegating to federated provider");
                provider.authenticate(&username, &password).await?
            }
            _ => self.directory.verify_password(&user.id, &password).await?,
        };

        let password_expired = match verdict.code {
            DirectoryCode::Ok => false,
            DirectoryCode::PasswordExpired => {
                debug!(user_id = %user.id, "password expired, issuing token with flag");
                true
            }
            code => {
                warn!(user_id = %user.id, code = ?code, "denied: password verification");
                return Err(AuthError::Denied);
            }
        };

        let tenant = self.resolve_tenant(&user, overrides.tenant.as_deref()).await?;
        let claims = self.claims_for(&user, &tenant);
        self.finish(claims, &overrides, flags_from(&verdict, password_expired))
    }

    async fn api_key_auth(
        &self,
        key: String,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        let Some(record) = self.directory.resolve_api_key(&key).await? else {
            warn!("denied: unknown api key");
            return Err(AuthError::Denied);
        };
        if !record.enabled {
            warn!(key_id = %record.key_id, "denied: api key disabled");
            return Err(AuthError::Denied);
        }

        let Some(user) = self.directory.find_user(&record.user_id).await? else {
            warn!(key_id = %record.key_id, "denied: api key owner missing");
            return Err(AuthError::Denied);
        };
        if !user.enabled {
            warn!(user_id = %user.id, "denied: api key owner disabled");
            return Err(AuthError::Denied);
        }

        let tenant = self.resolve_tenant(&user, overrides.tenant.as_deref()).await?;
        let mut claims = self.claims_for(&user, &tenant);
        claims.session_ref = Some(record.key_id.clone());
        self.finish(claims, &overrides, ResponseFlags::default())
    }

    async fn external_token_auth(
        &self,
        token: String,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        let Some(subject) = self.directory.resolve_external_subject(&token).await? else {
            warn!("denied: external token did not resolve");
            return Err(AuthError::Denied);
        };

        let Some(user) = self.directory.find_user(&subject).await? else {
            warn!(subject = %subject, "denied: external subject unknown to directory");
            return Err(AuthError::Denied);
        };
        if !user.enabled {
            warn!(user_id = %user.id, "denied: user disabled");
            return Err(AuthError::Denied);
        }

        let tenant = self.resolve_tenant(&user, overrides.tenant.as_deref()).await?;
        let claims = self.claims_for(&user, &tenant);
        self.finish(claims, &overrides, ResponseFlags::default())
    }

    /// Token renewal: decode the presented token (expiry is deliberately not
    /// enforced here), confirm the tenant still exists and is enabled, and
    /// re-sign a working copy. No other directory round-trip.
    async fn refresh_auth(
        &self,
        token: String,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        let claims = self.codecs.decode(&token).map_err(|e| {
            warn!(error = %e, "denied: refresh token rejected");
            AuthError::Denied
        })?;

        if claims.user_id.as_deref().is_none_or(str::is_empty) {
            warn!("denied: refresh token carries no subject");
            return Err(AuthError::Denied);
        }
        let Some(tenant_id) = claims.tenant_id.as_deref() else {
            warn!("denied: refresh token carries no tenant");
            return Err(AuthError::Denied);
        };

        let Some(tenant) = self.directory.find_tenant(tenant_id).await? else {
            warn!(tenant_id = %tenant_id, "denied: refresh tenant missing");
            return Err(AuthError::Denied);
        };
        if !tenant.enabled {
            warn!(tenant_id = %tenant.id, "denied: refresh tenant disabled");
            return Err(AuthError::Denied);
        }

        if overrides.tenant.is_some() {
            // Tenant switching needs the user record; renewal skips that
            // lookup, so the override is not honored here.
            debug!("ignoring tenant override on refresh");
        }

        let mut renewed = claims.clone();
        renewed.issuer = Some(self.issuer.clone());
        renewed.tenant_ref = tenant.ref_code.clone();
        self.finish(renewed, &overrides, ResponseFlags::default())
    }

    async fn fallback_auth(
        &self,
        scheme: String,
        payload: serde_json::Value,
        overrides: SessionOverrides,
    ) -> Result<AuthResponse, AuthError> {
        let Some(fallback) = &self.fallback else {
            error!(scheme = %scheme, "no fallback authenticator configured");
            return Err(AuthError::UnhandledVariant(scheme));
        };

        let Some(identity) = fallback.authenticate(&scheme, &payload).await? else {
            warn!(scheme = %scheme, "denied: fallback rejected credentials");
            return Err(AuthError::Denied);
        };

        let Some(mut user) = self.directory.find_user(&identity.user_id).await? else {
            warn!(scheme = %scheme, "denied: fallback subject unknown to directory");
            return Err(AuthError::Denied);
        };
        if !user.enabled {
            warn!(user_id = %user.id, "denied: user disabled");
            return Err(AuthError::Denied);
        }

        // The fallback may rehome the user; the tenant still has to resolve.
        if let Some(tenant_id) = identity.tenant_id.clone() {
            user.tenant_id = tenant_id;
        }

        let tenant = self.resolve_tenant(&user, overrides.tenant.as_deref()).await?;
        let mut claims = self.claims_for(&user, &tenant);
        claims.merge_extensions(identity.extensions);
        self.finish(claims, &overrides, ResponseFlags::default())
    }

    /// Resolve the effective tenant: the requested switch target when given
    /// (must be allowed for the user), else the user's home tenant. Either
    /// way the tenant must exist and be enabled.
    async fn resolve_tenant(
        &self,
        user: &DirectoryUser,
        requested: Option<&str>,
    ) -> Result<DirectoryTenant, AuthError> {
        let tenant_id = match requested {
            Some(t) if t != user.tenant_id => {
                if !user.allowed_tenants.iter().any(|a| a == t) {
                    warn!(user_id = %user.id, tenant_id = %t, "denied: tenant switch not allowed");
                    return Err(AuthError::Denied);
                }
                t
            }
            _ => user.tenant_id.as_str(),
        };

        let Some(tenant) = self.directory.find_tenant(tenant_id).await? else {
            warn!(user_id = %user.id, tenant_id = %tenant_id, "denied: tenant unresolved");
            return Err(AuthError::Denied);
        };
        if !tenant.enabled {
            warn!(user_id = %user.id, tenant_id = %tenant.id, "denied: tenant disabled");
            return Err(AuthError::Denied);
        }
        Ok(tenant)
    }

    fn claims_for(&self, user: &DirectoryUser, tenant: &DirectoryTenant) -> Claims {
        let mut claims = Claims::new();
        claims.issuer = Some(self.issuer.clone());
        claims.user_id = Some(user.id.clone());
        claims.tenant_id = Some(tenant.id.clone());
        claims.tenant_ref = tenant.ref_code.clone();
        claims.roles = user.roles.clone();
        claims.locale = user.locale.clone();
        claims.zoneinfo = user.zoneinfo.clone();
        claims
    }

    fn finish(
        &self,
        claims: Claims,
        overrides: &SessionOverrides,
        flags: ResponseFlags,
    ) -> Result<AuthResponse, AuthError> {
        let merged = self.assembler.merge_overrides(&claims, overrides);
        let token = self
            .codecs
            .sign(&merged, Some(self.token_ttl_seconds), None)
            .map_err(|e| {
                error!(error = %e, "token mint failed");
                AuthError::Internal
            })?;

        Ok(self
            .assembler
            .assemble(&merged, token, self.token_ttl_seconds, flags))
    }
}

fn flags_from(verdict: &PasswordVerdict, password_expired: bool) -> ResponseFlags {
    ResponseFlags {
        password_expired,
        previous_login: verdict.previous_login,
        failed_attempts: verdict.failed_attempts,
    }
}
