use crate::auth::IdentityState;
use crate::components::{nav_links, view_label, AppView, Icon, SessionContext};
use dioxus::prelude::*;

#[component]
pub fn Navbar() -> Element {
    let session = use_context::<SessionContext>();
    let mut menu_open = use_signal(|| false);
    let current = use_route::<AppView>();
    let identity = (session.identity)();

    rsx! {
        nav { class: "fixed top-0 w-full z-40 bg-[rgba(10,10,10,0.8)] backdrop-blur-lg border-b border-white/10 shadow-lg",
            div { class: "max-w-5xl mx-auto px-4",
                div { class: "flex justify-between items-center h-16",
                    Link {
                        to: AppView::HomeView {},
                        class: "font-mono text-xl font-bold text-white",
                        "Ani"
                        span { class: "text-purple-500", "Tunes" }
                    }

                    // Desktop links
                    div { class: "hidden md:flex items-center space-x-8",
                        for target in nav_links() {
                            NavLink {
                                active: target == current,
                                label: view_label(&target),
                                target: target.clone(),
                                class: "text-gray-300 hover:text-white transition-colors",
                            }
                        }
                    }

                    // Desktop auth
                    div { class: "hidden md:flex items-center",
                        AuthArea { identity: identity.clone() }
                    }

                    // Mobile menu button
                    div { class: "md:hidden",
                        button {
                            class: "text-gray-300 focus:outline-none",
                            aria_label: "Toggle menu",
                            onclick: move |_| {
                                let open = menu_open();
                                menu_open.set(!open);
                            },
                            Icon {
                                name: if menu_open() { "x".to_string() } else { "menu".to_string() },
                                class: "w-6 h-6".to_string(),
                            }
                        }
                    }
                }
            }

            if menu_open() {
                div { class: "md:hidden px-2 pb-3 space-y-1",
                    for target in nav_links() {
                        NavLink {
                            active: target == current,
                            label: view_label(&target),
                            target: target.clone(),
                            class: "block px-3 py-2 rounded-md text-base font-medium text-gray-300 hover:text-white hover:bg-gray-700",
                        }
                    }
                    div { class: "px-3 py-2",
                        AuthArea { identity }
                    }
                }
            }
        }
    }
}

#[component]
fn NavLink(target: AppView, label: &'static str, active: bool, class: &'static str) -> Element {
    let weight = if active { "text-white font-semibold" } else { "" };
    rsx! {
        Link { to: target, class: "{class} {weight}", "{label}" }
    }
}

#[component]
fn AuthArea(identity: IdentityState) -> Element {
    let session = use_context::<SessionContext>();

    match identity {
        IdentityState::Unknown => rsx! {
            Icon {
                name: "loader".to_string(),
                class: "w-5 h-5 text-gray-500".to_string(),
            }
        },
        IdentityState::SignedIn(user) => {
            let label = user.label().to_string();
            rsx! {
                div { class: "flex items-center space-x-4",
                    if let Some(avatar) = user.avatar_url.clone() {
                        img {
                            src: "{avatar}",
                            alt: "User avatar",
                            class: "w-8 h-8 rounded-full object-cover",
                        }
                    }
                    span { class: "text-gray-300", "{label}" }
                    button {
                        class: "bg-red-500 px-3 py-1 rounded",
                        onclick: move |_| session.sign_out(),
                        "Sign Out"
                    }
                }
            }
        }
        IdentityState::SignedOut => rsx! {
            button {
                class: "bg-blue-500 px-3 py-1 rounded",
                onclick: move |_| session.sign_in(),
                "Sign In With Google"
            }
        },
    }
}
