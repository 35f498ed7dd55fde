//! End-to-end dispatcher scenarios through the public API only: password
//! login, renewal with the minted token, and denial opacity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use session_auth::{
    AlgorithmId, ApiKeyRecord, AuthError, AuthenticationDispatcher, AuthenticationParameter,
    ContainerBuilder, DirectoryCode, DirectoryError, DirectoryTenant, DirectoryUser,
    KeyMaterialStore, PasswordVerdict, PerThreadCodecPool, SessionOverrides, TokenCodec,
    UserDirectory,
};

struct SeedDirectory {
    users: Vec<DirectoryUser>,
    tenants: Vec<DirectoryTenant>,
    passwords: HashMap<String, String>,
}

impl SeedDirectory {
    fn seeded() -> Self {
        let alice = DirectoryUser {
            id: "u-alice".into(),
            username: "alice".into(),
            tenant_id: "T1".into(),
            allowed_tenants: vec!["T1".into()],
            roles: vec!["admin".into()],
            locale: Some("en".into()),
            zoneinfo: Some("UTC".into()),
            enabled: true,
            federated_only: false,
        };
        let tenant = DirectoryTenant {
            id: "T1".into(),
            ref_code: Some("acme".into()),
            enabled: true,
        };
        let mut passwords = HashMap::new();
        passwords.insert("u-alice".to_string(), "s3cret".to_string());
        Self {
            users: vec![alice],
            tenants: vec![tenant],
            passwords,
        }
    }
}

#[async_trait]
impl UserDirectory for SeedDirectory {
    async fn find_user_by_name(
        &self,
        username: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Option<DirectoryTenant>, DirectoryError> {
        Ok(self.tenants.iter().find(|t| t.id == tenant_id).cloned())
    }

    async fn verify_password(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<PasswordVerdict, DirectoryError> {
        Ok(match self.passwords.get(user_id) {
            Some(expected) if expected == password => PasswordVerdict::ok(),
            Some(_) => PasswordVerdict::of(DirectoryCode::WrongPassword),
            None => PasswordVerdict::of(DirectoryCode::UnknownUser),
        })
    }

    async fn resolve_api_key(&self, _key: &str) -> Result<Option<ApiKeyRecord>, DirectoryError> {
        Ok(None)
    }

    async fn resolve_external_subject(
        &self,
        _token: &str,
    ) -> Result<Option<String>, DirectoryError> {
        Ok(None)
    }
}

fn init_tracing() {
    // RUST_LOG=debug cargo test -- --nocapture to see denial reasons.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

fn store() -> Arc<KeyMaterialStore> {
    let document = ContainerBuilder::new()
        .secret(AlgorithmId::HS256, &[21u8; 32])
        .seal("pw")
        .unwrap();
    Arc::new(KeyMaterialStore::open(&document, "pw").unwrap())
}

fn dispatcher() -> AuthenticationDispatcher {
    let pool = PerThreadCodecPool::new(store(), AlgorithmId::HS256);
    AuthenticationDispatcher::new(
        Arc::new(SeedDirectory::seeded()),
        pool,
        "idp.test".into(),
        3600,
    )
}

#[tokio::test]
async fn login_then_refresh_with_the_minted_token() {
    init_tracing();
    let dispatcher = dispatcher();

    let login = dispatcher
        .authenticate(
            AuthenticationParameter::Password {
                username: "alice".into(),
                password: "s3cret".into(),
            },
            SessionOverrides::default(),
        )
        .await
        .expect("login");

    assert_eq!(login.user_id, "u-alice");
    assert_eq!(login.tenant_id.as_deref(), Some("T1"));
    assert_eq!(login.expires_in, 3600);

    // The issued token itself is the refresh credential.
    let renewed = dispatcher
        .authenticate(
            AuthenticationParameter::JwtRefresh {
                token: login.token.clone(),
            },
            SessionOverrides::default(),
        )
        .await
        .expect("refresh");

    assert_eq!(renewed.user_id, "u-alice");
    assert_eq!(renewed.tenant_id.as_deref(), Some("T1"));
    assert!(!renewed.token.is_empty());

    // Both tokens verify under the same store and carry the same identity.
    let codec = TokenCodec::new(store(), AlgorithmId::HS256);
    let first = codec.decode(&login.token).unwrap();
    let second = codec.decode(&renewed.token).unwrap();
    assert_eq!(first.user_id, second.user_id);
    assert_eq!(first.tenant_id, second.tenant_id);
    assert_eq!(second.tenant_ref.as_deref(), Some("acme"));
}

#[tokio::test]
async fn denial_is_opaque_across_failure_modes() {
    init_tracing();
    let dispatcher = dispatcher();

    let mut denials = Vec::new();
    for (username, password) in [
        ("alice", "wrong-password"),
        ("nobody", "s3cret"),
        ("", ""),
    ] {
        let err = dispatcher
            .authenticate(
                AuthenticationParameter::Password {
                    username: username.into(),
                    password: password.into(),
                },
                SessionOverrides::default(),
            )
            .await
            .unwrap_err();
        denials.push(err);
    }

    for err in &denials {
        assert_eq!(*err, AuthError::Denied);
        assert_eq!(err.to_string(), "access denied");
    }
}

#[tokio::test]
async fn api_key_against_a_directory_without_keys_is_denied() {
    init_tracing();
    let dispatcher = dispatcher();
    let err = dispatcher
        .authenticate(
            AuthenticationParameter::ApiKey {
                key: "any-key".into(),
            },
            SessionOverrides::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::Denied);
}
