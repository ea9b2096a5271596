use crate::auth::IdentityState;
use crate::components::{AppView, Icon, SessionContext};
use dioxus::prelude::*;

#[component]
pub fn HomeView() -> Element {
    let session = use_context::<SessionContext>();
    let greeting = match (session.identity)() {
        IdentityState::SignedIn(user) => format!("Welcome back, {}", user.label()),
        _ => "Which anime song is better?".to_string(),
    };

    rsx! {
        section { class: "max-w-3xl mx-auto text-center space-y-8 py-12",
            h1 { class: "text-4xl md:text-5xl font-bold text-white", "{greeting}" }
            p { class: "text-lg text-gray-400",
                "Two openings or endings, one pick. Every vote nudges the community ranking."
            }
            div { class: "flex flex-col sm:flex-row justify-center gap-4",
                Link {
                    to: AppView::RankView {},
                    class: "inline-flex items-center justify-center gap-2 rounded-xl bg-purple-600 px-6 py-3 font-semibold text-white hover:bg-purple-500",
                    Icon {
                        name: "versus".to_string(),
                        class: "w-5 h-5".to_string(),
                    }
                    "Start ranking"
                }
                Link {
                    to: AppView::LeaderboardView {},
                    class: "inline-flex items-center justify-center gap-2 rounded-xl border border-white/20 px-6 py-3 font-semibold text-gray-200 hover:bg-white/10",
                    Icon {
                        name: "trophy".to_string(),
                        class: "w-5 h-5".to_string(),
                    }
                    "View leaderboard"
                }
            }
        }
    }
}
