/*
 * Responsibility
 * - Claims payload carried inside a signed token (identity, tenant, session,
 *   locale, free-form "z" extension map, timestamps)
 * - Working-copy semantics: a signed Claims value is never mutated; edits go
 *   through an explicit clone
 */
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Schema discriminator embedded in every claims payload. Decoding rejects
/// payloads carrying anything else.
pub const CLAIMS_SCHEMA: &str = "session-claims/1";

/// The structured identity/session payload of a token.
///
/// NOTE on timestamps: `issued_at` / `expires_at` / `not_before` are stamped
/// by the codec at sign time and must never be trusted from caller input when
/// minting. On decode they are surfaced as-is; expiry enforcement is an
/// explicit caller policy (renewal flows decode expired tokens on purpose),
/// so [`Claims::expired_at`] exists but is never called by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "schema", default)]
    pub schema: String,

    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Subject / user id.
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(rename = "tenantId", default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(rename = "tenantRef", default, skip_serializing_if = "Option::is_none")]
    pub tenant_ref: Option<String>,

    #[serde(rename = "sessionRef", default, skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,

    /// Permission hints consumed by the downstream policy engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoneinfo: Option<String>,

    /// Free-form extension map.
    #[serde(rename = "z", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,

    /// Unix epoch seconds.
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
}

impl Default for Claims {
    fn default() -> Self {
        Self {
            schema: CLAIMS_SCHEMA.to_string(),
            issuer: None,
            user_id: None,
            tenant_id: None,
            tenant_ref: None,
            session_ref: None,
            roles: Vec::new(),
            locale: None,
            zoneinfo: None,
            extensions: BTreeMap::new(),
            issued_at: None,
            expires_at: None,
            not_before: None,
        }
    }
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_valid_schema(&self) -> bool {
        self.schema == CLAIMS_SCHEMA
    }

    /// Caller-side expiry policy helper (epoch seconds).
    pub fn expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    /// Caller-side not-before policy helper (epoch seconds).
    pub fn not_yet_valid_at(&self, now: i64) -> bool {
        matches!(self.not_before, Some(nbf) if nbf > now)
    }

    /// Merge entries into the `z` extension map. Existing keys win; a signed
    /// extension is never silently overwritten by collaborator data.
    pub fn merge_extensions(&mut self, entries: BTreeMap<String, serde_json::Value>) {
        for (key, value) in entries {
            self.extensions.entry(key).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_compact_jwt() {
        let mut claims = Claims::new();
        claims.issuer = Some("idp".into());
        claims.user_id = Some("alice".into());
        claims.tenant_id = Some("T1".into());
        claims.issued_at = Some(1_700_000_000);
        claims.expires_at = Some(1_700_003_600);

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["schema"], CLAIMS_SCHEMA);
        assert_eq!(json["iss"], "idp");
        assert_eq!(json["sub"], "alice");
        assert_eq!(json["tenantId"], "T1");
        assert_eq!(json["iat"], 1_700_000_000);
        assert_eq!(json["exp"], 1_700_003_600);
        // Empty collections and absent options are omitted entirely.
        assert!(json.get("roles").is_none());
        assert!(json.get("z").is_none());
        assert!(json.get("nbf").is_none());
    }

    #[test]
    fn expiry_helpers_are_pure_predicates() {
        let mut claims = Claims::new();
        assert!(!claims.expired_at(i64::MAX));
        claims.expires_at = Some(100);
        assert!(claims.expired_at(100));
        assert!(!claims.expired_at(99));
        claims.not_before = Some(200);
        assert!(claims.not_yet_valid_at(199));
        assert!(!claims.not_yet_valid_at(200));
    }

    #[test]
    fn merge_extensions_keeps_existing_keys() {
        let mut claims = Claims::new();
        claims
            .extensions
            .insert("device".into(), serde_json::json!("laptop"));

        let mut incoming = BTreeMap::new();
        incoming.insert("device".into(), serde_json::json!("phone"));
        incoming.insert("channel".into(), serde_json::json!("web"));
        claims.merge_extensions(incoming);

        assert_eq!(claims.extensions["device"], serde_json::json!("laptop"));
        assert_eq!(claims.extensions["channel"], serde_json::json!("web"));
    }
}
