use crate::api::{Song, SongId};
use crate::components::{Icon, SessionContext, SongCard};
use crate::queue::driver::{choose, request_batch};
use crate::queue::retry::RetryTimer;
use crate::queue::{Advance, FetchReport, QueueStatus, SongQueueController};
use crate::utils::{now_ms, sleep_ms};
use dioxus::prelude::*;
use tracing::{debug, info, warn};

/// Render snapshot of the controller, taken without holding the borrow.
#[derive(Clone, PartialEq)]
struct RankSnapshot {
    status: QueueStatus,
    pair: Option<(Song, Song)>,
    preload: Vec<Song>,
    error: Option<String>,
    retries_exhausted: bool,
    cursor: usize,
    picks: usize,
}

/// A hidden card warming one upcoming song. Keyed by queue position since
/// the same song may be buffered more than once.
#[derive(Clone, PartialEq)]
struct PreloadSlot {
    key: String,
    song: Song,
}

impl RankSnapshot {
    fn of(queue: &SongQueueController) -> Self {
        Self {
            status: queue.status(),
            pair: queue
                .displayed_pair()
                .map(|(left, right)| (left.clone(), right.clone())),
            preload: queue.preload_window().to_vec(),
            error: queue.last_error().map(str::to_string),
            retries_exhausted: queue.backoff().is_exhausted(),
            cursor: queue.cursor(),
            picks: queue.cursor() / 2,
        }
    }

    fn preload_slots(&self) -> Vec<PreloadSlot> {
        // The preload window starts right after the displayed pair
        let first = self.cursor + 2;
        self.preload
            .iter()
            .enumerate()
            .map(|(offset, song)| PreloadSlot {
                key: format!("preload-{}", first + offset),
                song: song.clone(),
            })
            .collect()
    }
}

#[component]
pub fn RankView() -> Element {
    let session = use_context::<SessionContext>();
    let queue_config = session.config().queue;
    let mut queue = use_signal(move || SongQueueController::new(queue_config));
    let mut retry_tick = use_signal(|| 0u64);
    let mut retry_timer = use_signal(RetryTimer::default);

    // Re-evaluated after every queue mutation and every retry timer.
    {
        let session = session.clone();
        use_effect(move || {
            let _ = retry_tick();
            let now = now_ms();
            let (due, retry_at) = {
                let queue = queue.read();
                (queue.refill_due(now), queue.next_retry_at_ms())
            };

            if due {
                let gateway = session.gateway();
                spawn(async move {
                    if let FetchReport::Failed(reason) = request_batch(&queue, &gateway).await {
                        debug!(%reason, "refill failed");
                    }
                });
            } else if let Some(at) = retry_at {
                if !retry_timer.write().arm(at) {
                    return;
                }
                let wait = (at - now).max(0) as u64;
                spawn(async move {
                    sleep_ms(wait).await;
                    if retry_timer.write().fire(at) {
                        retry_tick += 1;
                    }
                });
            }
        });
    }

    let on_select = use_callback(move |choice: SongId| {
        let gateway = session.gateway();
        let submit = session.settings.peek().submit_comparisons;
        spawn(async move {
            match choose(&queue, &gateway, &choice, submit).await {
                Ok(report) if report.advance == Advance::Waiting => {
                    info!(refill = ?report.refill, "pick recorded, waiting for the next pair");
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "pick ignored"),
            }
        });
    });

    let snapshot = RankSnapshot::of(&queue.read());

    let body = match snapshot.status {
        QueueStatus::NotStarted => rsx! {
            div { class: "flex flex-col items-center gap-6 py-16 text-center",
                h1 { class: "text-3xl font-bold text-white", "Pick the better song" }
                p { class: "max-w-xl text-gray-400",
                    "Hover a card to hear it, then click your favourite. A new pair appears right away."
                }
                button {
                    class: "inline-flex items-center gap-2 rounded-xl bg-purple-600 px-6 py-3 font-semibold text-white hover:bg-purple-500",
                    onclick: move |_| {
                        if queue.write().start() {
                            info!("ranking session started");
                        }
                    },
                    Icon {
                        name: "play".to_string(),
                        class: "w-5 h-5".to_string(),
                    }
                    "Start"
                }
            }
        },
        QueueStatus::InitialLoading => rsx! {
            div { class: "flex flex-col items-center gap-3 py-24 text-gray-400",
                Icon {
                    name: "loader".to_string(),
                    class: "w-8 h-8".to_string(),
                }
                "Loading songs..."
            }
        },
        QueueStatus::InitialFailed => {
            let message = snapshot.error.clone().unwrap_or_default();
            rsx! {
                div { class: "flex flex-col items-center gap-4 py-24 text-center",
                    Icon {
                        name: "alert".to_string(),
                        class: "w-8 h-8 text-red-400".to_string(),
                    }
                    p { class: "text-red-300", "Couldn't load songs: {message}" }
                    if !snapshot.retries_exhausted {
                        p { class: "text-sm text-gray-500", "Retrying automatically..." }
                    }
                    RetryButton { queue }
                }
            }
        }
        QueueStatus::Ready | QueueStatus::WaitingForNextPair => {
            let waiting = snapshot.status == QueueStatus::WaitingForNextPair;
            rsx! {
                if let Some(message) = snapshot.error.clone() {
                    div { class: "mb-4 flex items-center justify-between gap-4 rounded-xl border border-red-500/40 bg-red-500/10 px-4 py-3 text-sm text-red-200",
                        span { "Couldn't load more songs: {message}" }
                        if snapshot.retries_exhausted {
                            RetryButton { queue }
                        }
                    }
                }
                if waiting {
                    div { class: "mb-4 flex items-center gap-2 text-sm text-gray-400",
                        Icon {
                            name: "loader".to_string(),
                            class: "w-4 h-4".to_string(),
                        }
                        "Loading the next pair..."
                    }
                }
                if let Some((left, right)) = snapshot.pair.clone() {
                    div { class: "grid grid-cols-1 md:grid-cols-2 gap-6",
                        SongCard {
                            song: left,
                            slot: "left".to_string(),
                            disabled: waiting,
                            onselect: on_select,
                        }
                        SongCard {
                            song: right,
                            slot: "right".to_string(),
                            disabled: waiting,
                            onselect: on_select,
                        }
                    }
                }
                p { class: "mt-6 text-center text-xs text-gray-500", "{snapshot.picks} picks this session" }
            }
        }
    };

    rsx! {
        section { class: "max-w-5xl mx-auto",
            {body}
            PreloadCards { slots: snapshot.preload_slots() }
        }
    }
}

/// Warms the media cache for the songs after the displayed pair.
#[component]
fn PreloadCards(slots: Vec<PreloadSlot>) -> Element {
    rsx! {
        div { class: "hidden", aria_hidden: "true",
            for slot in slots {
                SongCard {
                    key: "{slot.key}",
                    song: slot.song,
                    slot: slot.key.clone(),
                    preloading: true,
                }
            }
        }
    }
}

#[component]
fn RetryButton(queue: Signal<SongQueueController>) -> Element {
    let mut queue = queue;
    rsx! {
        button {
            class: "inline-flex items-center gap-2 rounded-lg border border-white/20 px-4 py-2 text-sm text-gray-200 hover:bg-white/10",
            onclick: move |_| queue.write().retry_now(),
            Icon {
                name: "refresh".to_string(),
                class: "w-4 h-4".to_string(),
            }
            "Try again"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, IdentityState};
    use crate::config::AppConfig;
    use crate::db::AppSettings;
    use dioxus::dioxus_core::{NoOpMutations, ScopeId, VirtualDom};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn song(id: &str) -> Song {
        Song {
            id: SongId::new(id),
            title: format!("Song {id}"),
            video: Some(format!("https://v.example/{id}.webm")),
            ..Song::default()
        }
    }

    fn loaded(ids: &[&str]) -> SongQueueController {
        let mut queue = SongQueueController::default();
        queue.start();
        let ticket = queue.begin_fetch().unwrap();
        queue.finish_fetch(ticket, Ok(ids.iter().map(|id| song(id)).collect()), 0);
        queue
    }

    #[test]
    fn repeated_song_gets_distinct_preload_slots() {
        let mut queue = loaded(&["a", "b", "c", "d", "x", "x"]);
        queue.select(&SongId::new("a")).unwrap();

        let slots = RankSnapshot::of(&queue).preload_slots();

        let keys: Vec<&str> = slots.iter().map(|slot| slot.key.as_str()).collect();
        assert_eq!(keys, vec!["preload-4", "preload-5"]);
        assert!(slots.iter().all(|slot| slot.song.id == SongId::new("x")));
    }

    /// Renders the preload cards for a controller and advances it by one
    /// pick once `advance` is set.
    #[component]
    fn PreloadHarness(advance: Rc<Cell<bool>>) -> Element {
        let identity = use_signal(|| IdentityState::SignedOut);
        let auth_session = use_signal(|| None::<AuthSession>);
        let settings = use_signal(AppSettings::default);
        use_context_provider(|| {
            SessionContext::new(AppConfig::new("", ""), identity, auth_session, settings)
        });
        let queue = use_hook(|| Rc::new(RefCell::new(loaded(&["a", "b", "c", "d", "x", "x"]))));

        if advance.get() && queue.borrow().cursor() == 0 {
            let _ = queue.borrow_mut().select(&SongId::new("a"));
        }
        let slots = RankSnapshot::of(&queue.borrow()).preload_slots();

        rsx! {
            PreloadCards { slots }
        }
    }

    #[test]
    fn preload_window_with_repeated_song_rerenders() {
        let advance = Rc::new(Cell::new(false));
        let mut dom = VirtualDom::new_with_props(
            PreloadHarness,
            PreloadHarnessProps {
                advance: advance.clone(),
            },
        );
        dom.rebuild_in_place();

        // Window moves from [c, d] to [x, x]
        advance.set(true);
        dom.mark_dirty(ScopeId::APP);
        dom.render_immediate(&mut NoOpMutations);
    }
}
