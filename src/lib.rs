//! Compact session-token codec and authentication-strategy dispatcher.
//!
//! Every other subsystem of the platform represents an authenticated
//! identity as a signed compact token minted here. This crate owns:
//!
//! - the sealed key container and the immutable per-process
//!   [`KeyMaterialStore`](services::token::KeyMaterialStore),
//! - the [`TokenCodec`](services::token::TokenCodec) (compact JWT/JWS
//!   encode/decode) and its per-thread pool,
//! - the [`AuthenticationDispatcher`](services::auth::AuthenticationDispatcher)
//!   multiplexing password, api-key, external-token, refresh and pluggable
//!   fallback strategies against an external user/tenant directory.
//!
//! Out of scope by design: credential/session persistence, TLS,
//! permission-bit evaluation, and any protocol adapter. Those collaborate
//! through [`repos::directory::UserDirectory`] and the decoded
//! [`Claims`](services::token::Claims).

pub mod config;
pub mod error;
pub mod repos;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::{AuthError, KeyStoreError, TokenError};
pub use repos::directory::{
    ApiKeyRecord, DirectoryCode, DirectoryError, DirectoryTenant, DirectoryUser,
    FallbackAuthenticator, FallbackIdentity, FederatedProvider, PasswordVerdict, UserDirectory,
};
pub use services::auth::{
    AuthResponse, AuthenticationDispatcher, AuthenticationParameter, ResponseAssembler,
    SessionOverrides,
};
pub use services::token::{
    AlgorithmId, Claims, ContainerBuilder, KeyMaterialStore, PerThreadCodecPool, TokenCodec,
};
