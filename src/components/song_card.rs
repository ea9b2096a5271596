use crate::api::{Song, SongId};
use crate::components::{Icon, SessionContext};
use crate::media::{MediaCommand, MediaEvent, MediaUnit};
use dioxus::prelude::*;
use tracing::debug;

/// DOM id of the video element for one card slot.
fn video_element_id(song: &Song, slot: &str) -> String {
    let id: String = song
        .id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("anitunes-video-{slot}-{id}")
}

/// One song with a hover-to-play preview. With `preloading` set the card is
/// invisible and inert; it only warms the media cache.
#[component]
pub fn SongCard(
    song: Song,
    #[props(default = "main".to_string())] slot: String,
    #[props(default)] preloading: bool,
    #[props(default)] disabled: bool,
    #[props(default)] onselect: Option<EventHandler<SongId>>,
) -> Element {
    let session = use_context::<SessionContext>();
    let mut media = use_signal(move || MediaUnit::new(preloading));
    let element_id = video_element_id(&song, &slot);

    // Reset to Loading on mount and whenever the song behind the card changes
    use_effect(use_reactive((&song.id,), move |(_id,)| {
        if let Some(MediaCommand::Pause) = media.write().handle(MediaEvent::SourceChanged) {
            debug!("source changed while playing");
        }
    }));

    let dispatch = {
        let element_id = element_id.clone();
        move |event: MediaEvent| {
            let command = media.write().handle(event);
            if let Some(command) = command {
                let settings = session.settings.peek().clone();
                let volume = if settings.muted { 0.0 } else { settings.video_volume };
                run_media_command(element_id.clone(), command, volume, media);
            }
        }
    };

    let unit = media();
    let video_src = song.video.clone().filter(|_| song.has_video());

    if preloading {
        return rsx! {
            if let Some(src) = video_src {
                video {
                    id: "{element_id}",
                    class: "hidden",
                    src: "{src}",
                    preload: "auto",
                    muted: true,
                    oncanplaythrough: {
                        let mut dispatch = dispatch.clone();
                        move |_| dispatch(MediaEvent::CanPlayThrough)
                    },
                    onerror: {
                        let mut dispatch = dispatch.clone();
                        move |_| dispatch(MediaEvent::Failed)
                    },
                }
            }
        };
    }

    let tags: Vec<String> = song.tags().into_iter().map(str::to_string).collect();
    let show_label = song.show_label();
    let video_opacity = if unit.video_visible() { "" } else { "opacity-0" };
    let card_state = if disabled {
        "opacity-60 cursor-wait"
    } else {
        "cursor-pointer hover:scale-105 hover:shadow-[0_0_12px_6px_rgba(59,130,246,0.9)]"
    };

    rsx! {
        div {
            class: "rounded-xl border p-4 bg-white w-full transition duration-100 ease-in-out transform {card_state}",
            onclick: {
                let id = song.id.clone();
                move |_| {
                    if disabled {
                        return;
                    }
                    if let Some(handler) = onselect {
                        handler.call(id.clone());
                    }
                }
            },
            onmouseenter: {
                let mut dispatch = dispatch.clone();
                move |_| dispatch(MediaEvent::PointerEnter)
            },
            onmouseleave: {
                let mut dispatch = dispatch.clone();
                move |_| dispatch(MediaEvent::PointerLeave)
            },

            if let Some(src) = video_src {
                div { class: "flex justify-center items-center relative",
                    if unit.shows_loading_indicator() {
                        div { class: "absolute z-10 flex items-center gap-2 text-gray-500 text-sm",
                            Icon {
                                name: "loader".to_string(),
                                class: "w-4 h-4".to_string(),
                            }
                            "Loading video..."
                        }
                    }
                    if unit.shows_fallback() {
                        div { class: "flex h-[300px] w-full max-w-lg flex-col items-center justify-center gap-2 rounded-xl bg-gray-100 text-gray-500 text-sm",
                            Icon {
                                name: "alert".to_string(),
                                class: "w-6 h-6".to_string(),
                            }
                            "Preview unavailable"
                        }
                    } else {
                        video {
                            id: "{element_id}",
                            class: "w-full max-w-lg h-[300px] object-cover mt-2 rounded-xl shadow-lg transition-opacity duration-300 {video_opacity}",
                            src: "{src}",
                            preload: "auto",
                            r#loop: true,
                            "playsinline": "true",
                            oncanplaythrough: {
                                let mut dispatch = dispatch.clone();
                                move |_| dispatch(MediaEvent::CanPlayThrough)
                            },
                            onerror: {
                                let mut dispatch = dispatch.clone();
                                move |_| dispatch(MediaEvent::Failed)
                            },
                        }
                    }
                }
            } else {
                div { class: "flex h-[300px] items-center justify-center rounded-xl bg-gray-100 text-gray-500 text-sm",
                    "No preview for this song"
                }
            }

            h3 { class: "text-lg text-gray-800 font-semibold mt-4", "{song.title}" }
            p { class: "text-gray-600", "{song.display_artist()}" }
            if let Some(label) = show_label {
                p { class: "text-xs text-gray-400", "{label}" }
            }
            for tag in tags {
                span { class: "inline-block mt-2 mr-2 px-2 py-1 text-xs font-medium text-blue-600 bg-blue-100 rounded",
                    "{tag}"
                }
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn video_element(element_id: &str) -> Option<web_sys::HtmlVideoElement> {
    use wasm_bindgen::JsCast;

    web_sys::window()?
        .document()?
        .get_element_by_id(element_id)?
        .dyn_into::<web_sys::HtmlVideoElement>()
        .ok()
}

#[cfg(target_arch = "wasm32")]
fn run_media_command(element_id: String, command: MediaCommand, volume: f64, mut media: Signal<MediaUnit>) {
    let Some(video) = video_element(&element_id) else {
        return;
    };
    match command {
        MediaCommand::Play => {
            video.set_volume(volume);
            match video.play() {
                Ok(promise) => {
                    spawn(async move {
                        if wasm_bindgen_futures::JsFuture::from(promise).await.is_err() {
                            media.write().handle(MediaEvent::PlaybackRejected);
                        }
                    });
                }
                Err(_) => {
                    media.write().handle(MediaEvent::PlaybackRejected);
                }
            }
        }
        MediaCommand::Pause => {
            let _ = video.pause();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run_media_command(element_id: String, command: MediaCommand, volume: f64, mut media: Signal<MediaUnit>) {
    let id = serde_json::Value::String(element_id);
    match command {
        MediaCommand::Play => {
            let script = format!(
                r#"return (async function () {{
                    const video = document.getElementById({id});
                    if (!video) return false;
                    video.volume = {volume};
                    try {{ await video.play(); return true; }} catch (_) {{ return false; }}
                }})();"#
            );
            spawn(async move {
                let started = document::eval(&script).join::<bool>().await.unwrap_or(false);
                if !started {
                    media.write().handle(MediaEvent::PlaybackRejected);
                }
            });
        }
        MediaCommand::Pause => {
            let _ = document::eval(&format!("document.getElementById({id})?.pause();"));
        }
    }
}
