//! Identity provider abstraction and the signed-cookie session provider.
//!
//! The application never owns user accounts. It only asks an
//! [`IdentityProvider`] whether a request carries a valid session and, if so,
//! which profile it belongs to.
//!
//! # Session token format
//!
//! ```text
//! base64url(json(claims)) "." hex(hmac_sha256(secret, base64url(json(claims))))
//! ```
//!
//! Claims carry the user id, optional email and first name, and an expiry as
//! a Unix timestamp. A token with a bad signature, a malformed body or a past
//! expiry resolves to "no session".

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{header::COOKIE, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::models::{Profile, Session};

type HmacSha256 = Hmac<Sha256>;

/// Resolves the session attached to an incoming request.
///
/// `Ok(None)` means the request is anonymous. `Err` means the provider itself
/// could not answer; callers guarding protected paths treat that as anonymous.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn session(&self, headers: &HeaderMap) -> Result<Option<Session>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    exp: i64,
}

/// Verifies HMAC-signed session cookies.
#[derive(Clone)]
pub struct SignedCookieProvider {
    secret: Vec<u8>,
    cookie_name: String,
    ttl: Duration,
}

impl SignedCookieProvider {
    pub fn new(secret: &str, cookie_name: &str, ttl_secs: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            cookie_name: cookie_name.to_string(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Mints a token for `profile` valid for the configured TTL.
    pub fn issue(&self, profile: &Profile) -> String {
        self.issue_at(profile, Utc::now())
    }

    pub fn issue_at(&self, profile: &Profile, now: DateTime<Utc>) -> String {
        let claims = SessionClaims {
            sub: profile.id.clone(),
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            exp: (now + self.ttl).timestamp(),
        };
        // Serializing a struct of strings and an integer cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.sign(payload.as_bytes()));
        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str) -> Option<Session> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let (payload, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&json).ok()?;
        let expires_at = Utc.timestamp_opt(claims.exp, 0).single()?;
        if expires_at <= now {
            return None;
        }

        Some(Session {
            profile: Profile {
                id: claims.sub,
                email: claims.email,
                first_name: claims.first_name,
            },
            expires_at,
        })
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl IdentityProvider for SignedCookieProvider {
    async fn session(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        Ok(cookie_value(headers, &self.cookie_name).and_then(|token| self.verify(token)))
    }
}

/// Finds a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SignedCookieProvider {
        SignedCookieProvider::new("test-secret", "__session", 3600)
    }

    fn profile() -> Profile {
        Profile {
            id: "user_123".to_string(),
            email: Some("ada@example.com".to_string()),
            first_name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let p = provider();
        let session = p.verify(&p.issue(&profile())).unwrap();
        assert_eq!(session.profile, profile());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let p = provider();
        let token = p.issue(&profile());
        let (_, sig) = token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":"admin","exp":9999999999}"#);
        assert!(p.verify(&format!("{}.{}", forged, sig)).is_none());
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = provider().issue(&profile());
        let other = SignedCookieProvider::new("different", "__session", 3600);
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let p = provider();
        let issued = Utc::now() - Duration::hours(2);
        let token = p.issue_at(&profile(), issued);
        assert!(p.verify(&token).is_none());
        assert!(p.verify_at(&token, issued).is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        let p = provider();
        assert!(p.verify("").is_none());
        assert!(p.verify("no-dot").is_none());
        assert!(p.verify("abc.not-hex").is_none());
    }

    #[tokio::test]
    async fn session_is_read_from_cookie_header() {
        let p = provider();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("theme=dark; __session={}; other=1", p.issue(&profile()))
                .parse()
                .unwrap(),
        );
        let session = p.session(&headers).await.unwrap().unwrap();
        assert_eq!(session.profile.id, "user_123");

        assert!(p.session(&HeaderMap::new()).await.unwrap().is_none());
    }
}
