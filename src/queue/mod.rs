//! Song queue controller.
//!
//! Keeps a rolling, append-only buffer of songs fetched from the gateway, a
//! read cursor pointing at the displayed pair, and decides when to fetch more.
//! The controller never performs I/O itself: `begin_fetch` hands out a
//! [`FetchTicket`] and the caller reports the result through `finish_fetch`.
//! See [`driver`] for the async glue.

pub mod driver;
pub mod retry;

use crate::api::models::{Comparison, Song, SongId};
use crate::config::QueueConfig;
use crate::error::GatewayError;
use retry::RefillBackoff;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const PAIR: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Queue was empty; the page shows a blocking loader.
    Initial,
    /// Silent refill while songs are still on screen.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Initial,
    Background,
}

/// What the ranking page should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    NotStarted,
    InitialLoading,
    InitialFailed,
    Ready,
    WaitingForNextPair,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchReport {
    /// Another fetch was in flight, or no refill was due.
    Skipped,
    Appended(usize),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced,
    /// The next pair is not buffered yet; the cursor stays put until a
    /// refill lands.
    Waiting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOutcome {
    /// `None` when both cards showed the same song.
    pub comparison: Option<Comparison>,
    pub advance: Advance,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("no pair is currently displayed")]
    NoPairDisplayed,

    #[error("song {0} is not part of the displayed pair")]
    UnknownChoice(SongId),

    #[error("still waiting for the next pair to load")]
    AwaitingNextPair,
}

/// Holds the single in-flight marker for as long as it lives.
#[derive(Debug)]
struct InFlightPermit {
    flag: Arc<AtomicBool>,
}

impl InFlightPermit {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Proof that a fetch was admitted. Dropping it, whether the request
/// finished or the future was cancelled, frees the in-flight slot.
#[derive(Debug)]
pub struct FetchTicket {
    kind: FetchKind,
    count: usize,
    permit: InFlightPermit,
}

impl FetchTicket {
    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    /// Number of songs to request.
    pub fn count(&self) -> usize {
        self.count
    }

    fn issued_by(&self, flag: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.permit.flag, flag)
    }
}

#[derive(Debug)]
pub struct SongQueueController {
    config: QueueConfig,
    songs: Vec<Song>,
    cursor: usize,
    started: bool,
    in_flight: Arc<AtomicBool>,
    fetch_kind: FetchKind,
    last_error: Option<String>,
    awaiting_next: bool,
    backoff: RefillBackoff,
}

impl Default for SongQueueController {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl SongQueueController {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_backoff(config, RefillBackoff::default())
    }

    pub fn with_backoff(config: QueueConfig, backoff: RefillBackoff) -> Self {
        Self {
            config,
            songs: Vec::new(),
            cursor: 0,
            started: false,
            in_flight: Arc::new(AtomicBool::new(false)),
            fetch_kind: FetchKind::Initial,
            last_error: None,
            awaiting_next: false,
            backoff,
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Returns `true` only for the first call.
    pub fn start(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        debug!("ranking session started");
        true
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Buffered songs that have not been displayed yet, including the
    /// current pair.
    pub fn remaining(&self) -> usize {
        self.songs.len() - self.cursor
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn fetch_state(&self) -> FetchState {
        if !self.is_fetching() {
            return FetchState::Idle;
        }
        match self.fetch_kind {
            FetchKind::Initial => FetchState::Initial,
            FetchKind::Background => FetchState::Background,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_awaiting_next(&self) -> bool {
        self.awaiting_next
    }

    pub fn backoff(&self) -> &RefillBackoff {
        &self.backoff
    }

    pub fn displayed_pair(&self) -> Option<(&Song, &Song)> {
        match self.songs.get(self.cursor..self.cursor + PAIR) {
            Some([first, second]) => Some((first, second)),
            _ => None,
        }
    }

    /// Songs right after the displayed pair whose media should be warmed.
    pub fn preload_window(&self) -> &[Song] {
        let start = (self.cursor + PAIR).min(self.songs.len());
        let end = (start + self.config.preload_count()).min(self.songs.len());
        &self.songs[start..end]
    }

    pub fn status(&self) -> QueueStatus {
        if !self.started {
            return QueueStatus::NotStarted;
        }
        if self.displayed_pair().is_none() {
            if self.last_error.is_some() && !self.is_fetching() {
                return QueueStatus::InitialFailed;
            }
            return QueueStatus::InitialLoading;
        }
        if self.awaiting_next {
            QueueStatus::WaitingForNextPair
        } else {
            QueueStatus::Ready
        }
    }

    /// Background refill condition, re-evaluated after every mutation.
    pub fn refill_due(&self, now_ms: i64) -> bool {
        self.started
            && self.remaining() <= self.config.refill_threshold()
            && !self.is_fetching()
            && self.backoff.allows(now_ms)
    }

    /// When the next automatic attempt becomes possible after a failure.
    pub fn next_retry_at_ms(&self) -> Option<i64> {
        if !self.started
            || self.is_fetching()
            || self.backoff.is_exhausted()
            || self.remaining() > self.config.refill_threshold()
        {
            return None;
        }
        self.backoff.retry_at_ms()
    }

    /// Clears the failure history so automatic refills resume immediately.
    pub fn retry_now(&mut self) {
        self.backoff.reset();
    }

    /// Admits one batch request unless another is already in flight.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let permit = InFlightPermit::acquire(&self.in_flight)?;
        let kind = if self.songs.is_empty() {
            FetchKind::Initial
        } else {
            FetchKind::Background
        };
        self.fetch_kind = kind;
        debug!(?kind, buffered = self.remaining(), "requesting song batch");
        Some(FetchTicket {
            kind,
            count: self.config.batch_size(),
            permit,
        })
    }

    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Song>, GatewayError>,
        now_ms: i64,
    ) -> FetchReport {
        if !ticket.issued_by(&self.in_flight) {
            warn!("ignoring a batch issued by another queue");
            return FetchReport::Skipped;
        }

        let report = match result {
            Ok(songs) if songs.is_empty() => {
                let message = "The catalog returned no songs".to_string();
                self.last_error = Some(message.clone());
                self.backoff.record_failure(now_ms);
                FetchReport::Failed(message)
            }
            Ok(songs) => {
                let received = songs.len();
                self.songs.extend(songs);
                self.last_error = None;
                self.backoff.reset();
                if self.awaiting_next && self.remaining() >= PAIR * 2 {
                    self.cursor += PAIR;
                    self.awaiting_next = false;
                }
                debug!(received, buffered = self.remaining(), "song batch appended");
                FetchReport::Appended(received)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(%err, failures = self.backoff.failures() + 1, "song batch failed");
                self.last_error = Some(message.clone());
                self.backoff.record_failure(now_ms);
                FetchReport::Failed(message)
            }
        };

        drop(ticket);
        report
    }

    /// Records the user's pick for the displayed pair.
    pub fn select(&mut self, choice: &SongId) -> Result<SelectOutcome, SelectError> {
        if self.awaiting_next {
            return Err(SelectError::AwaitingNextPair);
        }

        let comparison = {
            let (first, second) = self.displayed_pair().ok_or(SelectError::NoPairDisplayed)?;
            let (winner, loser) = if first.id == *choice {
                (first, second)
            } else if second.id == *choice {
                (second, first)
            } else {
                return Err(SelectError::UnknownChoice(choice.clone()));
            };
            (winner.id != loser.id).then(|| Comparison {
                winner_id: winner.id.clone(),
                loser_id: loser.id.clone(),
            })
        };

        let advance = if self.remaining() >= PAIR * 2 {
            self.cursor += PAIR;
            Advance::Advanced
        } else {
            self.awaiting_next = true;
            Advance::Waiting
        };

        Ok(SelectOutcome {
            comparison,
            advance,
        })
    }
}
