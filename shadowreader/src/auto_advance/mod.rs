//! Timed page turning.
//!
//! [`AutoAdvance`] owns at most one background ticker. Each tick turns the
//! session forward by the configured page size and pushes the display text
//! to the host. A tick that finds another turn in flight is skipped, and
//! missed ticks are never replayed in a burst.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::errors::ReaderError;
use crate::session::{DisplaySink, ReadingSession};

/// Result of asking the controller to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceState {
    /// A new ticker was scheduled.
    Started,
    /// A ticker was already running; nothing changed.
    AlreadyRunning,
    /// The configured interval is zero.
    Disabled,
    /// The running ticker was cancelled.
    Stopped,
    /// No ticker was running.
    NotRunning,
}

#[derive(Debug)]
struct Ticker {
    handle: JoinHandle<()>,
    token: Arc<CancellationToken>,
}

impl Ticker {
    fn shutdown(self) {
        self.token.cancel("auto-advance stopped");
        self.handle.abort();
    }
}

/// Single-slot controller for the auto-advance ticker.
///
/// Dropping the controller stops its ticker.
#[derive(Debug, Default)]
pub struct AutoAdvance {
    slot: parking_lot::Mutex<Option<Ticker>>,
}

impl AutoAdvance {
    /// Creates a stopped controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking at the session's configured interval.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, session: Arc<ReadingSession>, display: Arc<dyn DisplaySink>) -> AdvanceState {
        match session.config().auto_advance_interval() {
            Some(period) => self.start_with_interval(session, display, period),
            None => {
                debug!("Auto-advance disabled by configuration");
                AdvanceState::Disabled
            }
        }
    }

    /// Starts ticking every `period`.
    pub fn start_with_interval(
        &self,
        session: Arc<ReadingSession>,
        display: Arc<dyn DisplaySink>,
        period: Duration,
    ) -> AdvanceState {
        if period.is_zero() {
            return AdvanceState::Disabled;
        }

        let mut slot = self.slot.lock();
        if slot.is_some() {
            return AdvanceState::AlreadyRunning;
        }

        let token = Arc::new(CancellationToken::new());
        let handle = tokio::spawn(run_ticker(session, display, period, token.clone()));
        *slot = Some(Ticker { handle, token });
        info!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "Auto-advance started");
        AdvanceState::Started
    }

    /// Cancels the running ticker, if any.
    pub fn stop(&self) -> AdvanceState {
        match self.slot.lock().take() {
            Some(ticker) => {
                ticker.shutdown();
                info!("Auto-advance stopped");
                AdvanceState::Stopped
            }
            None => AdvanceState::NotRunning,
        }
    }

    /// Stops a running ticker, otherwise starts one.
    pub fn toggle(&self, session: Arc<ReadingSession>, display: Arc<dyn DisplaySink>) -> AdvanceState {
        if self.is_running() {
            self.stop()
        } else {
            self.start(session, display)
        }
    }

    /// Whether a ticker is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Drop for AutoAdvance {
    fn drop(&mut self) {
        if let Some(ticker) = self.slot.get_mut().take() {
            ticker.shutdown();
        }
    }
}

async fn run_ticker(
    session: Arc<ReadingSession>,
    display: Arc<dyn DisplaySink>,
    period: Duration,
    token: Arc<CancellationToken>,
) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let page_size = session.config().page_size;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        match session.try_turn_forward(page_size).await {
            Ok(reading) => display.show(&reading.display_text()),
            Err(ReaderError::Busy) => debug!("Page turn in flight, skipping tick"),
            Err(e) => warn!(error = %e, "Auto-advance tick failed"),
        }
    }
}
