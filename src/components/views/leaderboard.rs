use crate::api::{format_rating, rank_songs, LeaderboardEntry, SongGateway};
use crate::components::{Icon, SessionContext};
use dioxus::prelude::*;
use tracing::warn;

#[component]
pub fn LeaderboardView() -> Element {
    let session = use_context::<SessionContext>();
    let limit = session.config().leaderboard_size;
    let mut reload = use_signal(|| 0u32);

    let entries = use_resource(move || {
        let _ = reload();
        let gateway = session.gateway();
        async move {
            gateway
                .leaderboard(limit)
                .await
                .map(rank_songs)
                .inspect_err(|err| warn!(%err, "failed to load leaderboard"))
        }
    });

    rsx! {
        div { class: "max-w-4xl mx-auto space-y-6",
            header { class: "flex items-center justify-between",
                div {
                    h1 { class: "text-3xl font-bold text-white flex items-center gap-3",
                        Icon {
                            name: "trophy".to_string(),
                            class: "w-7 h-7 text-yellow-400".to_string(),
                        }
                        "Leaderboard"
                    }
                    p { class: "text-gray-400", "Top {limit} songs by community rating" }
                }
                button {
                    class: "inline-flex items-center gap-2 rounded-lg border border-white/20 px-3 py-2 text-sm text-gray-200 hover:bg-white/10",
                    onclick: move |_| reload += 1,
                    Icon {
                        name: "refresh".to_string(),
                        class: "w-4 h-4".to_string(),
                    }
                    "Refresh"
                }
            }

            match entries() {
                None => rsx! {
                    div { class: "flex justify-center py-16 text-gray-400",
                        Icon {
                            name: "loader".to_string(),
                            class: "w-8 h-8".to_string(),
                        }
                    }
                },
                Some(Err(err)) => rsx! {
                    div { class: "rounded-xl border border-red-500/40 bg-red-500/10 px-4 py-3 text-red-200",
                        "Couldn't load the leaderboard: {err}"
                    }
                },
                Some(Ok(list)) if list.is_empty() => rsx! {
                    p { class: "py-16 text-center text-gray-500", "No songs have been ranked yet." }
                },
                Some(Ok(list)) => rsx! {
                    ol { class: "divide-y divide-white/10 rounded-xl border border-white/10 bg-zinc-900/50",
                        for entry in list {
                            LeaderboardRow { key: "{entry.song.id}", entry }
                        }
                    }
                },
            }
        }
    }
}

#[component]
fn LeaderboardRow(entry: LeaderboardEntry) -> Element {
    let song = &entry.song;
    let rating = format_rating(song.rating, song.rating_deviation);
    let show = song
        .anime_name
        .clone()
        .or_else(|| song.show_label())
        .unwrap_or_default();
    let medal = match entry.rank {
        1 => "text-yellow-400",
        2 => "text-gray-300",
        3 => "text-amber-600",
        _ => "text-gray-500",
    };

    rsx! {
        li { class: "flex items-center gap-4 px-4 py-3",
            span { class: "w-8 text-right font-mono font-bold {medal}", "{entry.rank}" }
            if let Some(image) = song.anime_image.clone() {
                img {
                    src: "{image}",
                    alt: "",
                    class: "w-10 h-10 rounded object-cover",
                    loading: "lazy",
                }
            }
            div { class: "min-w-0 flex-1",
                p { class: "truncate font-semibold text-white", "{song.title}" }
                p { class: "truncate text-sm text-gray-400", "{song.display_artist()} · {show}" }
            }
            div { class: "text-right",
                p { class: "font-mono text-white", "{rating}" }
                p { class: "text-xs text-gray-500", "{song.matches_played} matches" }
            }
        }
    }
}
