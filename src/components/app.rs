use crate::auth::{AuthSession, IdentityState};
use crate::components::{view_label, AppView, Navbar, SessionContext};
use crate::config::AppConfig;
use crate::db::{save_settings, AppSettings};
use dioxus::prelude::*;
use tracing::warn;

#[component]
pub fn AppShell() -> Element {
    let identity = use_signal(|| IdentityState::Unknown);
    let auth_session = use_signal(|| None::<AuthSession>);
    let settings = use_signal(AppSettings::default);
    let mut settings_loaded = use_signal(|| false);

    // One context per app lifetime, replacing ambient globals.
    let session = use_context_provider(|| {
        SessionContext::new(AppConfig::from_env(), identity, auth_session, settings)
    });

    // Restore the stored session (or finish an OAuth redirect) on mount
    {
        let session = session.clone();
        use_effect(move || {
            let session = session.clone();
            spawn(async move {
                session.restore().await;
                settings_loaded.set(true);
            });
        });
    }

    // Persist settings whenever they change after the initial load
    use_effect(move || {
        let current = settings();
        if !settings_loaded() {
            return;
        }
        spawn(async move {
            if let Err(err) = save_settings(current).await {
                warn!(%err, "failed to save settings");
            }
        });
    });

    let view = use_route::<AppView>();
    let configured = session.config().is_configured();

    rsx! {
        document::Title { "AniTunes · {view_label(&view)}" }
        div { class: "app-container min-h-screen bg-black text-gray-100 pt-20",
            Navbar {}
            main { class: "container mx-auto px-4 py-6",
                if !configured {
                    div { class: "mb-6 rounded-xl border border-amber-500/40 bg-amber-500/10 px-4 py-3 text-sm text-amber-200",
                        "No backend configured. Set ANITUNES_SUPABASE_URL and ANITUNES_SUPABASE_ANON_KEY when building."
                    }
                }
                Outlet::<AppView> {}
            }
        }
    }
}
