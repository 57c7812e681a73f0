//! Durable credential storage.
//!
//! Like the web client's local storage: the bearer token and the
//! user's email survive restarts, and a remembered email/password pair is
//! kept only when the user opts in. The file is TOML and is rewritten whole
//! on every change.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remembered_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remembered_password: Option<String>,
}

/// Claims the viewer cares about from the access token's JWT payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<u64>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT. Signature is not verified; the
    /// backend does that on every request.
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.exp.is_some_and(|exp| exp <= now_secs)
    }
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state. A missing file is an empty store.
    pub fn load(&self) -> Result<StoredCredentials> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => toml::from_str(&text).map_err(|e| self.err(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredCredentials::default()),
            Err(e) => Err(self.err(e)),
        }
    }

    pub fn save(&self, creds: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.err(e))?;
            }
        }
        let text = toml::to_string(creds).map_err(|e| self.err(e))?;
        std::fs::write(&self.path, text).map_err(|e| self.err(e))
    }

    /// Persist a fresh login. `remember` controls whether the email and
    /// password are kept for pre-filling the next login; declining erases
    /// any previously remembered pair.
    pub fn record_login(&self, email: &str, password: &str, token: &str, remember: bool) -> Result<()> {
        let mut creds = self.load()?;
        creds.access_token = Some(token.to_string());
        creds.user_email = Some(email.to_string());
        if remember {
            creds.remembered_email = Some(email.to_string());
            creds.remembered_password = Some(password.to_string());
        } else {
            creds.remembered_email = None;
            creds.remembered_password = None;
        }
        self.save(&creds)
    }

    /// Drop the session but keep any remembered login.
    pub fn logout(&self) -> Result<()> {
        let mut creds = self.load()?;
        creds.access_token = None;
        creds.user_email = None;
        self.save(&creds)
    }

    /// The stored token if it is present and not known to be expired.
    pub fn valid_token(&self, now_secs: u64) -> Result<Option<String>> {
        let creds = self.load()?;
        Ok(creds.access_token.filter(|token| {
            TokenClaims::decode(token).map_or(true, |c| !c.is_expired_at(now_secs))
        }))
    }

    fn err(&self, e: impl std::fmt::Display) -> ViewerError {
        ViewerError::Store {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        }
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    fn temp_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("creds.toml"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load().unwrap(), StoredCredentials::default());
    }

    #[test]
    fn login_persists_token_and_email() {
        let (_dir, store) = temp_store();
        store.record_login("a@b.com", "pw", "tok", false).unwrap();
        let creds = store.load().unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("tok"));
        assert_eq!(creds.user_email.as_deref(), Some("a@b.com"));
        assert!(creds.remembered_email.is_none());
        assert!(creds.remembered_password.is_none());
    }

    #[test]
    fn remember_then_forget() {
        let (_dir, store) = temp_store();
        store.record_login("a@b.com", "pw", "tok", true).unwrap();
        assert_eq!(store.load().unwrap().remembered_password.as_deref(), Some("pw"));
        store.record_login("a@b.com", "pw", "tok2", false).unwrap();
        let creds = store.load().unwrap();
        assert!(creds.remembered_email.is_none());
        assert!(creds.remembered_password.is_none());
    }

    #[test]
    fn logout_keeps_remembered_login() {
        let (_dir, store) = temp_store();
        store.record_login("a@b.com", "pw", "tok", true).unwrap();
        store.logout().unwrap();
        let creds = store.load().unwrap();
        assert!(creds.access_token.is_none());
        assert!(creds.user_email.is_none());
        assert_eq!(creds.remembered_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn corrupt_file_is_store_error() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "access_token = [").unwrap();
        assert!(matches!(store.load(), Err(ViewerError::Store { .. })));
    }

    #[test]
    fn claims_decode_role_and_exp() {
        let claims = TokenClaims::decode(&jwt(r#"{"sub":"a@b.com","role":"admin","exp":100}"#)).unwrap();
        assert!(claims.is_admin());
        assert!(claims.is_expired_at(100));
        assert!(!claims.is_expired_at(99));
    }

    #[test]
    fn claims_decode_rejects_garbage() {
        assert!(TokenClaims::decode("not-a-jwt").is_none());
        assert!(TokenClaims::decode("a.!!!.c").is_none());
    }

    #[test]
    fn valid_token_filters_expired() {
        let (_dir, store) = temp_store();
        let token = jwt(r#"{"sub":"a@b.com","exp":1000}"#);
        store.record_login("a@b.com", "pw", &token, false).unwrap();
        assert_eq!(store.valid_token(999).unwrap().as_deref(), Some(token.as_str()));
        assert!(store.valid_token(1000).unwrap().is_none());
    }

    #[test]
    fn opaque_token_is_kept() {
        let (_dir, store) = temp_store();
        store.record_login("a@b.com", "pw", "opaque", false).unwrap();
        assert_eq!(store.valid_token(u64::MAX).unwrap().as_deref(), Some("opaque"));
    }
}
