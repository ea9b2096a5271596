//! Async glue between a [`SongQueueController`] and a [`SongGateway`].
//!
//! The controller is only touched through short, synchronous `update` calls so
//! no borrow is ever held across an `.await`.

use super::{Advance, FetchReport, SelectError, SongQueueController};
use crate::api::gateway::SongGateway;
use crate::api::models::{Comparison, SongId};
use crate::error::GatewayError;
use crate::utils::now_ms;
use futures_util::future::join;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Anything that can lend out the controller for a moment.
pub trait QueueHandle {
    fn update<R>(&self, f: impl FnOnce(&mut SongQueueController) -> R) -> R;
}

impl QueueHandle for RefCell<SongQueueController> {
    fn update<R>(&self, f: impl FnOnce(&mut SongQueueController) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

impl QueueHandle for Rc<RefCell<SongQueueController>> {
    fn update<R>(&self, f: impl FnOnce(&mut SongQueueController) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceReport {
    pub advance: Advance,
    pub comparison: Option<Comparison>,
    /// `None` when nothing was submitted.
    pub submitted: Option<Result<(), GatewayError>>,
    /// The urgent fetch issued because the next pair was missing.
    pub refill: FetchReport,
}

/// `requestBatch()`: one gateway call, guarded by the in-flight flag.
pub async fn request_batch<H, G>(handle: &H, gateway: &G) -> FetchReport
where
    H: QueueHandle + ?Sized,
    G: SongGateway + ?Sized,
{
    let Some(ticket) = handle.update(|queue| queue.begin_fetch()) else {
        debug!("batch request skipped: another fetch is in flight");
        return FetchReport::Skipped;
    };
    let result = gateway.random_songs(ticket.count()).await;
    handle.update(|queue| queue.finish_fetch(ticket, result, now_ms()))
}

/// Runs a background refill if the buffer has dropped to the threshold.
pub async fn refill_if_due<H, G>(handle: &H, gateway: &G) -> FetchReport
where
    H: QueueHandle + ?Sized,
    G: SongGateway + ?Sized,
{
    if !handle.update(|queue| queue.refill_due(now_ms())) {
        return FetchReport::Skipped;
    }
    request_batch(handle, gateway).await
}

/// Applies the user's pick, records it with the gateway when `submit` is
/// set, and fetches urgently when the next pair is not buffered yet. The
/// submission and the urgent fetch run concurrently.
pub async fn choose<H, G>(
    handle: &H,
    gateway: &G,
    choice: &SongId,
    submit: bool,
) -> Result<ChoiceReport, SelectError>
where
    H: QueueHandle + ?Sized,
    G: SongGateway + ?Sized,
{
    let outcome = handle.update(|queue| queue.select(choice))?;

    let submission = async {
        match (&outcome.comparison, submit) {
            (Some(comparison), true) => {
                let result = gateway.submit_comparison(comparison).await;
                if let Err(err) = &result {
                    warn!(%err, "failed to submit comparison");
                }
                Some(result)
            }
            _ => None,
        }
    };
    let urgent_fetch = async {
        match outcome.advance {
            Advance::Advanced => FetchReport::Skipped,
            Advance::Waiting => request_batch(handle, gateway).await,
        }
    };
    let (submitted, refill) = join(submission, urgent_fetch).await;

    Ok(ChoiceReport {
        advance: outcome.advance,
        comparison: outcome.comparison,
        submitted,
        refill,
    })
}
