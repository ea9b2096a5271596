//! Per-card media state: loading, hover-to-play and failure fallback.
//!
//! The view feeds element events in and executes the returned commands on
//! the real `<video>` element.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    /// Terminal for the current source.
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// Mounted, or the song behind the card changed.
    SourceChanged,
    /// Enough data is buffered to play through.
    CanPlayThrough,
    /// Load or decode failure.
    Failed,
    PointerEnter,
    PointerLeave,
    /// The platform refused `play()`, e.g. autoplay policy.
    PlaybackRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaUnit {
    phase: MediaPhase,
    hovering: bool,
    preloading: bool,
}

impl MediaUnit {
    pub fn new(preloading: bool) -> Self {
        Self {
            phase: MediaPhase::Idle,
            hovering: false,
            preloading,
        }
    }

    pub fn phase(&self) -> MediaPhase {
        self.phase
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading
    }

    pub fn handle(&mut self, event: MediaEvent) -> Option<MediaCommand> {
        let before = self.phase;
        let command = self.transition(event);
        if before != self.phase {
            debug!(?event, from = ?before, to = ?self.phase, "media transition");
        }
        command
    }

    fn transition(&mut self, event: MediaEvent) -> Option<MediaCommand> {
        use MediaPhase::*;

        match event {
            MediaEvent::SourceChanged => {
                let was_playing = self.phase == Playing;
                self.phase = Loading;
                self.hovering = false;
                was_playing.then_some(MediaCommand::Pause)
            }
            MediaEvent::CanPlayThrough => {
                if self.phase != Loading {
                    return None;
                }
                if self.hovering && !self.preloading {
                    self.phase = Playing;
                    Some(MediaCommand::Play)
                } else {
                    self.phase = Ready;
                    None
                }
            }
            MediaEvent::Failed => {
                self.phase = Errored;
                None
            }
            MediaEvent::PointerEnter => {
                self.hovering = true;
                if self.phase == Ready && !self.preloading {
                    self.phase = Playing;
                    Some(MediaCommand::Play)
                } else {
                    None
                }
            }
            MediaEvent::PointerLeave => {
                self.hovering = false;
                if self.phase == Playing {
                    self.phase = Ready;
                    Some(MediaCommand::Pause)
                } else {
                    None
                }
            }
            MediaEvent::PlaybackRejected => {
                if self.phase == Playing {
                    self.phase = Ready;
                }
                None
            }
        }
    }

    pub fn shows_loading_indicator(&self) -> bool {
        !self.preloading && matches!(self.phase, MediaPhase::Idle | MediaPhase::Loading)
    }

    pub fn shows_fallback(&self) -> bool {
        !self.preloading && self.phase == MediaPhase::Errored
    }

    /// The video fades in only once it can play.
    pub fn video_visible(&self) -> bool {
        !self.preloading && matches!(self.phase, MediaPhase::Ready | MediaPhase::Playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loading(preloading: bool) -> MediaUnit {
        let mut unit = MediaUnit::new(preloading);
        unit.handle(MediaEvent::SourceChanged);
        unit
    }

    #[test]
    fn loads_then_plays_on_hover() {
        let mut unit = loading(false);
        assert!(unit.shows_loading_indicator());
        assert_eq!(unit.handle(MediaEvent::CanPlayThrough), None);
        assert_eq!(unit.phase(), MediaPhase::Ready);
        assert!(unit.video_visible());
        assert_eq!(unit.handle(MediaEvent::PointerEnter), Some(MediaCommand::Play));
        assert_eq!(unit.phase(), MediaPhase::Playing);
        assert_eq!(unit.handle(MediaEvent::PointerLeave), Some(MediaCommand::Pause));
        assert_eq!(unit.phase(), MediaPhase::Ready);
    }

    #[test]
    fn hover_before_ready_starts_playback_when_ready() {
        let mut unit = loading(false);
        assert_eq!(unit.handle(MediaEvent::PointerEnter), None);
        assert_eq!(unit.phase(), MediaPhase::Loading);
        assert_eq!(unit.handle(MediaEvent::CanPlayThrough), Some(MediaCommand::Play));
        assert_eq!(unit.phase(), MediaPhase::Playing);
    }

    #[test]
    fn error_while_loading_shows_fallback() {
        let mut unit = loading(false);
        unit.handle(MediaEvent::Failed);
        assert_eq!(unit.phase(), MediaPhase::Errored);
        assert!(unit.shows_fallback());
        assert!(!unit.shows_loading_indicator());
        assert_eq!(unit.handle(MediaEvent::CanPlayThrough), None);
        assert_eq!(unit.handle(MediaEvent::PointerEnter), None);
        assert_eq!(unit.phase(), MediaPhase::Errored);
    }

    #[test]
    fn error_after_ready_is_terminal_until_source_changes() {
        let mut unit = loading(false);
        unit.handle(MediaEvent::CanPlayThrough);
        unit.handle(MediaEvent::Failed);
        assert_eq!(unit.phase(), MediaPhase::Errored);
        unit.handle(MediaEvent::SourceChanged);
        assert_eq!(unit.phase(), MediaPhase::Loading);
    }

    #[test]
    fn rejected_playback_stays_ready_without_error() {
        let mut unit = loading(false);
        unit.handle(MediaEvent::CanPlayThrough);
        unit.handle(MediaEvent::PointerEnter);
        assert_eq!(unit.handle(MediaEvent::PlaybackRejected), None);
        assert_eq!(unit.phase(), MediaPhase::Ready);
        assert!(!unit.shows_fallback());
    }

    #[test]
    fn source_change_resets_hover_and_pauses() {
        let mut unit = loading(false);
        unit.handle(MediaEvent::CanPlayThrough);
        unit.handle(MediaEvent::PointerEnter);
        assert_eq!(unit.handle(MediaEvent::SourceChanged), Some(MediaCommand::Pause));
        assert!(!unit.is_hovering());
        assert_eq!(unit.handle(MediaEvent::CanPlayThrough), None);
        assert_eq!(unit.phase(), MediaPhase::Ready);
    }

    #[test]
    fn preloading_unit_never_plays_or_shows_chrome() {
        let mut unit = loading(true);
        assert!(!unit.shows_loading_indicator());
        unit.handle(MediaEvent::PointerEnter);
        assert_eq!(unit.handle(MediaEvent::CanPlayThrough), None);
        assert_eq!(unit.phase(), MediaPhase::Ready);
        assert!(!unit.video_visible());
        unit.handle(MediaEvent::Failed);
        assert!(!unit.shows_fallback());
    }
}
