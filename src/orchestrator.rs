//! Summarization request lifecycle.
//!
//! IDLE → IN PROGRESS → SUCCEEDED | FAILED
//!
//! Progress is simulated: the service exposes no completion signal, so a
//! periodic ticker walks the indicator toward 90% and the real response
//! carries it to 100. The ticker is held by a drop-guard, so every exit
//! path of a submission cancels it. A monotonic generation counter makes
//! the latest submission own all visible state; a stale request's late
//! completion is discarded entirely, history append included.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::history::HistoryStore;
use crate::remote::SummarizeBackend;
use crate::summary::{self, SummaryResult};

const TICK_INTERVAL: Duration = Duration::from_millis(200);
const TICK_STEP: u8 = 10;
const TICK_CAP: u8 = 90;
/// How long the indicator sits at 100% before clearing.
const RESET_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    InProgress,
    Succeeded(SummaryResult),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The query was empty or whitespace — nothing happened.
    SkippedEmpty,
    /// The request ran to completion; the state channel carries the result.
    Completed,
    /// A newer submission took over while this one was in flight.
    Superseded,
}

pub struct RequestOrchestrator {
    backend: Arc<dyn SummarizeBackend>,
    history: Arc<HistoryStore>,
    generation: Arc<AtomicU64>,
    state_tx: watch::Sender<RequestState>,
    progress_tx: watch::Sender<u8>,
}

impl RequestOrchestrator {
    pub fn new(backend: Arc<dyn SummarizeBackend>, history: Arc<HistoryStore>) -> Self {
        let (state_tx, _) = watch::channel(RequestState::Idle);
        let (progress_tx, _) = watch::channel(0);

        Self {
            backend,
            history,
            generation: Arc::new(AtomicU64::new(0)),
            state_tx,
            progress_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<RequestState> {
        self.state_tx.subscribe()
    }

    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    /// Run one query through the full lifecycle. Drives the state and
    /// progress channels; exactly one history append on success.
    pub async fn submit(&self, query: &str) -> SubmitOutcome {
        let query = query.trim();
        if query.is_empty() {
            debug!("Skipping empty query");
            return SubmitOutcome::SkippedEmpty;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish_state(generation, RequestState::Idle);
        self.publish_progress(generation, 0);
        self.publish_state(generation, RequestState::InProgress);

        let ticker = ProgressTicker::start(
            Arc::clone(&self.generation),
            self.progress_tx.clone(),
            generation,
        );

        info!("Summarizing: \"{query}\"");

        match self.backend.summarize(query).await {
            Ok(raw) => {
                drop(ticker);
                if !self.is_current(generation) {
                    debug!("Discarding stale response for \"{query}\"");
                    return SubmitOutcome::Superseded;
                }

                self.publish_progress(generation, 100);
                let result = summary::normalize(query, &raw);
                self.history.append(result.clone()).await;
                self.publish_state(generation, RequestState::Succeeded(result));

                tokio::time::sleep(RESET_DELAY).await;
                self.publish_progress(generation, 0);
                SubmitOutcome::Completed
            }
            Err(e) => {
                drop(ticker);
                if !self.is_current(generation) {
                    debug!("Discarding stale failure for \"{query}\"");
                    return SubmitOutcome::Superseded;
                }

                warn!("Summarization failed: {e}");
                self.publish_progress(generation, 0);
                self.publish_state(generation, RequestState::Failed(e.to_string()));
                SubmitOutcome::Completed
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish_state(&self, generation: u64, state: RequestState) {
        if self.is_current(generation) {
            let _ = self.state_tx.send(state);
        }
    }

    fn publish_progress(&self, generation: u64, progress: u8) {
        if self.is_current(generation) {
            let _ = self.progress_tx.send(progress);
        }
    }
}

/// Periodic task walking the progress indicator toward the cap.
/// Aborted on drop, so the owning submission cannot leak it.
struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    fn start(
        generation: Arc<AtomicU64>,
        progress_tx: watch::Sender<u8>,
        own_generation: u64,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + TICK_INTERVAL;
            let mut interval = tokio::time::interval_at(start, TICK_INTERVAL);
            loop {
                interval.tick().await;
                if generation.load(Ordering::SeqCst) != own_generation {
                    break;
                }
                progress_tx.send_if_modified(|p| {
                    if *p < TICK_CAP {
                        *p = (*p + TICK_STEP).min(TICK_CAP);
                        true
                    } else {
                        false
                    }
                });
            }
        });

        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
