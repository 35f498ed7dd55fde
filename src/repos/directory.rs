/*
 * Responsibility
 * - Seam to the external user/tenant directory (credential checks, api-key
 *   and federated-subject resolution)
 * - Record types and status codes the dispatcher consumes; no persistence
 *   lives in this crate
 */
use async_trait::async_trait;
use thiserror::Error;

/// Infrastructure failure talking to the directory. Deliberately opaque;
/// never a credential verdict.
#[derive(Debug, Error)]
#[error("directory error: {0}")]
pub struct DirectoryError(pub String);

/// Directory-side outcome of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryCode {
    Ok,
    /// Credentials are right but the password has aged out. Soft success:
    /// the dispatcher still issues a token and flags the expiry.
    PasswordExpired,
    WrongPassword,
    UnknownUser,
    Disabled,
    Locked,
}

/// Verdict plus the directory-side bookkeeping that rides along with it.
#[derive(Debug, Clone)]
pub struct PasswordVerdict {
    pub code: DirectoryCode,
    /// Epoch seconds of the login before this one, if any.
    pub previous_login: Option<i64>,
    pub failed_attempts: u32,
}

impl PasswordVerdict {
    pub fn ok() -> Self {
        Self {
            code: DirectoryCode::Ok,
            previous_login: None,
            failed_attempts: 0,
        }
    }

    pub fn of(code: DirectoryCode) -> Self {
        Self {
            code,
            previous_login: None,
            failed_attempts: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub id: String,
    pub username: String,
    pub tenant_id: String,
    /// Tenants this user may switch into (includes the home tenant).
    pub allowed_tenants: Vec<String>,
    pub roles: Vec<String>,
    pub locale: Option<String>,
    pub zoneinfo: Option<String>,
    pub enabled: bool,
    /// User may only authenticate through the federated provider.
    pub federated_only: bool,
}

#[derive(Debug, Clone)]
pub struct DirectoryTenant {
    pub id: String,
    pub ref_code: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub key_id: String,
    pub user_id: String,
    pub enabled: bool,
}

/// External user/tenant directory.
///
/// Lookup failures of the "no such record" kind are `Ok(None)`;
/// `DirectoryError` is reserved for infrastructure trouble. Timeout and
/// retry policy belong to the implementation, not to this crate.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_name(
        &self,
        username: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<DirectoryUser>, DirectoryError>;

    async fn find_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Option<DirectoryTenant>, DirectoryError>;

    async fn verify_password(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<PasswordVerdict, DirectoryError>;

    /// Resolve an API key to its record, or `None` when unknown.
    async fn resolve_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, DirectoryError>;

    /// Resolve a federated token to the directory user id it represents.
    async fn resolve_external_subject(
        &self,
        token: &str,
    ) -> Result<Option<String>, DirectoryError>;
}

/// Installation-specific federated authentication provider. When configured,
/// users marked `federated_only` are delegated here wholesale.
#[async_trait]
pub trait FederatedProvider: Send + Sync {
    fn requires(&self, user: &DirectoryUser) -> bool {
        user.federated_only
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<PasswordVerdict, DirectoryError>;
}

/// Identity produced by a pluggable fallback scheme. The dispatcher still
/// resolves and validates the referenced user and tenant through the
/// directory before minting anything.
#[derive(Debug, Clone)]
pub struct FallbackIdentity {
    pub user_id: String,
    /// Overrides the user's home tenant when set.
    pub tenant_id: Option<String>,
    /// Extra entries for the claims `z` map.
    pub extensions: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Pluggable handler for installation-specific authentication schemes.
#[async_trait]
pub trait FallbackAuthenticator: Send + Sync {
    /// `Ok(None)` means the credentials were examined and rejected.
    async fn authenticate(
        &self,
        scheme: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<FallbackIdentity>, DirectoryError>;
}
