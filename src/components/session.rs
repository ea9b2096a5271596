//! Session context shared by every view: configuration, the signed-in user,
//! local settings and a way to build gateway clients. Created once by the
//! app shell and dropped with it.

use crate::api::SupabaseClient;
use crate::auth::{parse_redirect_fragment, AuthSession, IdentityState};
use crate::config::AppConfig;
use crate::db::{load_session, load_settings, save_session, AppSettings};
use crate::queue::driver::QueueHandle;
use crate::queue::SongQueueController;
use crate::utils::now_ms;
use crate::GatewayError;
use dioxus::prelude::*;
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SessionContext {
    config: Rc<AppConfig>,
    pub identity: Signal<IdentityState>,
    pub auth_session: Signal<Option<AuthSession>>,
    pub settings: Signal<AppSettings>,
}

impl SessionContext {
    pub fn new(
        config: AppConfig,
        identity: Signal<IdentityState>,
        auth_session: Signal<Option<AuthSession>>,
        settings: Signal<AppSettings>,
    ) -> Self {
        Self {
            config: Rc::new(config),
            identity,
            auth_session,
            settings,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Gateway client acting as the current user, or anonymously.
    pub fn gateway(&self) -> SupabaseClient {
        let token = self
            .auth_session
            .peek()
            .as_ref()
            .map(|session| session.access_token.clone());
        SupabaseClient::new(&self.config).with_access_token(token)
    }

    /// Restores settings and the stored session, consuming an OAuth redirect
    /// fragment first when the page was just opened by the provider.
    pub async fn restore(&self) {
        let mut settings = self.settings;
        match load_settings().await {
            Ok(loaded) => settings.set(loaded),
            Err(err) => warn!(%err, "failed to load settings"),
        }

        let now = now_ms();
        let session = match take_redirect_fragment().and_then(|f| parse_redirect_fragment(&f, now)) {
            Some(session) => {
                info!("completing sign-in from provider redirect");
                if let Err(err) = save_session(Some(session.clone())).await {
                    warn!(%err, "failed to persist session");
                }
                Some(session)
            }
            None => load_session().await.ok().flatten(),
        };

        match session {
            Some(session) if !session.is_expired(now) => self.complete_sign_in(session).await,
            Some(_) => {
                debug!("stored session expired");
                self.clear_session().await;
            }
            None => {
                let mut identity = self.identity;
                identity.set(IdentityState::SignedOut);
            }
        }
    }

    async fn complete_sign_in(&self, session: AuthSession) {
        let client = SupabaseClient::new(&self.config);
        match client.fetch_user(&session.access_token).await {
            Ok(user) => {
                info!(user = %user.id, "signed in");
                let mut auth_session = self.auth_session;
                let mut identity = self.identity;
                auth_session.set(Some(session));
                identity.set(IdentityState::SignedIn(user));
            }
            Err(err @ GatewayError::Rpc { status: 401 | 403, .. }) => {
                warn!(%err, "stored session rejected");
                self.clear_session().await;
            }
            Err(err) => {
                // Keep the stored session for the next launch.
                warn!(%err, "could not verify stored session");
                let mut identity = self.identity;
                identity.set(IdentityState::SignedOut);
            }
        }
    }

    async fn clear_session(&self) {
        let mut auth_session = self.auth_session;
        let mut identity = self.identity;
        auth_session.set(None);
        identity.set(IdentityState::SignedOut);
        if let Err(err) = save_session(None).await {
            warn!(%err, "failed to clear stored session");
        }
    }

    /// Sends the browser to the identity provider.
    pub fn sign_in(&self) {
        let client = SupabaseClient::new(&self.config);
        if !client.is_configured() {
            warn!("sign-in unavailable: backend is not configured");
            return;
        }
        redirect_to_provider(&client, &self.config.oauth_provider);
    }

    /// Forgets the local session and tells the provider, fire-and-forget.
    pub fn sign_out(&self) {
        let context = self.clone();
        let token = self
            .auth_session
            .peek()
            .as_ref()
            .map(|session| session.access_token.clone());
        spawn(async move {
            context.clear_session().await;
            if let Some(token) = token {
                if let Err(err) = SupabaseClient::new(&context.config).sign_out(&token).await {
                    debug!(%err, "provider logout failed");
                }
            }
        });
    }
}

impl QueueHandle for Signal<SongQueueController> {
    fn update<R>(&self, f: impl FnOnce(&mut SongQueueController) -> R) -> R {
        let mut signal = *self;
        let mut queue = signal.write();
        f(&mut *queue)
    }
}

#[cfg(target_arch = "wasm32")]
fn take_redirect_fragment() -> Option<String> {
    let window = web_sys::window()?;
    let location = window.location();
    let hash = location.hash().ok()?;
    if !hash.contains("access_token=") {
        return None;
    }
    // Drop the tokens from the address bar and history.
    let path = location.pathname().unwrap_or_else(|_| "/".to_string());
    if let Ok(history) = window.history() {
        let _ = history.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&path));
    }
    Some(hash)
}

#[cfg(not(target_arch = "wasm32"))]
fn take_redirect_fragment() -> Option<String> {
    None
}

#[cfg(target_arch = "wasm32")]
fn redirect_to_provider(client: &SupabaseClient, provider: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let location = window.location();
    let return_to = location.href().unwrap_or_default();
    let url = client.authorize_url(provider, &return_to);
    if location.set_href(&url).is_err() {
        warn!("failed to redirect to identity provider");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn redirect_to_provider(client: &SupabaseClient, provider: &str) {
    let url = client.authorize_url(provider, "http://localhost:8080/");
    let script = format!("window.location.href = {};", serde_json::Value::String(url));
    let _ = document::eval(&script);
}
