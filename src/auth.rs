//! Identity provider integration (OAuth implicit flow).
//!
//! Sign-in is a browser redirect to the provider; the provider redirects back
//! with the session in the URL fragment, which is parsed here and persisted.

use crate::api::models::UserProfile;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_MS: i64 = 30_000;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum IdentityState {
    /// Stored session is still being restored.
    #[default]
    Unknown,
    SignedOut,
    SignedIn(UserProfile),
}

impl IdentityState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            IdentityState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AuthSession {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at
            .map(|at| now_ms + EXPIRY_SKEW_MS >= at)
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Reads the `exp` claim (seconds) of a JWT and returns it in milliseconds.
pub fn token_expiry(access_token: &str) -> Option<i64> {
    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp.map(|seconds| seconds.saturating_mul(1_000))
}

/// Parses `#access_token=..&expires_in=..&refresh_token=..` as left by the
/// provider redirect. Returns `None` for fragments without a token.
pub fn parse_redirect_fragment(fragment: &str, now_ms: i64) -> Option<AuthSession> {
    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;

    for pair in fragment.trim_start_matches('#').split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "access_token" if !value.is_empty() => access_token = Some(value),
            "refresh_token" if !value.is_empty() => refresh_token = Some(value),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            _ => {}
        }
    }

    let access_token = access_token?;
    let expires_at = expires_in
        .map(|seconds| now_ms.saturating_add(seconds.saturating_mul(1_000)))
        .or_else(|| token_expiry(&access_token));

    Some(AuthSession {
        access_token,
        refresh_token,
        expires_at,
    })
}
