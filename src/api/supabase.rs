use crate::api::gateway::{
    SongGateway, LEADERBOARD_RPC, RANDOM_SONGS_RPC, SUBMIT_COMPARISON_RPC,
};
use crate::api::models::*;
use crate::config::AppConfig;
use crate::error::GatewayError;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Client for the hosted Postgres/REST backend and its auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CountParams {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

fn json_pick_string(value: &serde_json::Value, keys: &[&str]) -> Option<String> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(|found| found.as_str())
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Extracts a readable message from a REST or auth error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    json_pick_string(&value, &["message", "msg", "error_description", "error"])
}

fn profile_from_user(user: AuthUser) -> UserProfile {
    let metadata = &user.user_metadata;
    UserProfile {
        id: user.id,
        email: user.email.filter(|email| !email.trim().is_empty()),
        display_name: json_pick_string(metadata, &["user_name", "full_name", "name"]),
        avatar_url: json_pick_string(metadata, &["avatar_url", "picture"]),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });
    Err(GatewayError::Rpc {
        status: status.as_u16(),
        message,
    })
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            access_token: None,
        }
    }

    /// Same backend, acting as the given user (or anonymously for `None`).
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.anon_key.is_empty()
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::NotConfigured)
        }
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn post_rpc<B>(&self, function: &str, body: &B) -> Result<reqwest::Response, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.ensure_configured()?;
        let url = self.rest_url(&format!("rpc/{function}"));
        debug!(function, "calling rpc");
        let response = self
            .authorized(HTTP_CLIENT.post(&url), self.bearer())
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    pub async fn rpc<B, T>(&self, function: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post_rpc(function, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// URL the browser is sent to for the OAuth sign-in flow.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.auth_url("authorize"),
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to)
        )
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<UserProfile, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .authorized(HTTP_CLIENT.get(self.auth_url("user")), access_token)
            .send()
            .await?;
        let user: AuthUser = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(profile_from_user(user))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError> {
        self.ensure_configured()?;
        let response = self
            .authorized(HTTP_CLIENT.post(self.auth_url("logout")), access_token)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Inserts or merges rows into a table keyed by its primary key.
    pub async fn upsert_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), GatewayError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.ensure_configured()?;
        let response = self
            .authorized(HTTP_CLIENT.post(self.rest_url(table)), self.bearer())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

impl SongGateway for SupabaseClient {
    async fn random_songs(&self, count: usize) -> Result<Vec<Song>, GatewayError> {
        let songs: Option<Vec<Song>> = self.rpc(RANDOM_SONGS_RPC, &CountParams { count }).await?;
        let songs = songs.unwrap_or_default();
        if songs.len() < count {
            debug!(requested = count, received = songs.len(), "catalog returned a short batch");
        }
        Ok(songs)
    }

    async fn submit_comparison(&self, comparison: &Comparison) -> Result<(), GatewayError> {
        self.post_rpc(SUBMIT_COMPARISON_RPC, comparison)
            .await
            .map(|_| ())
            .inspect_err(|err| warn!(%err, winner = %comparison.winner_id, "comparison was not recorded"))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<Song>, GatewayError> {
        let songs: Option<Vec<Song>> = self.rpc(LEADERBOARD_RPC, &CountParams { count: limit }).await?;
        Ok(songs.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new(&AppConfig::new("https://demo.supabase.co", "anon"))
    }

    #[test]
    fn reads_postgrest_and_gotrue_error_bodies() {
        assert_eq!(
            error_message(r#"{"code":"P0001","message":"function does not exist","hint":null}"#)
                .as_deref(),
            Some("function does not exist")
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Token expired"}"#)
                .as_deref(),
            Some("Token expired")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn authorize_url_encodes_redirect() {
        let url = client().authorize_url("google", "http://localhost:8080/rank?x=1");
        assert_eq!(
            url,
            "https://demo.supabase.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A8080%2Frank%3Fx%3D1"
        );
    }

    #[test]
    fn profile_prefers_provider_user_name() {
        let user: AuthUser = serde_json::from_str(
            r#"{"id":"abc","email":"fan@example.com",
                "user_metadata":{"full_name":"Fan Person","avatar_url":"https://img/a.png"}}"#,
        )
        .unwrap();
        let profile = profile_from_user(user);
        assert_eq!(profile.display_name.as_deref(), Some("Fan Person"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(profile.label(), "Fan Person");
    }

    #[tokio::test]
    async fn unconfigured_client_never_hits_the_network() {
        let client = SupabaseClient::new(&AppConfig::new("", ""));
        assert_eq!(client.random_songs(10).await, Err(GatewayError::NotConfigured));
        assert_eq!(client.leaderboard(5).await, Err(GatewayError::NotConfigured));
    }

    #[test]
    fn access_token_replaces_anon_bearer() {
        let anonymous = client();
        assert_eq!(anonymous.bearer(), "anon");
        let signed_in = client().with_access_token(Some("jwt".into()));
        assert_eq!(signed_in.bearer(), "jwt");
    }
}
