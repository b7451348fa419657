// Submission Session
// Per-submission snapshots and a stale-response guard for the latest rendered result

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Which flow a submission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Detect,
    Paraphrase,
    Plagiarism,
}

impl Mode {
    /// Verb used when a submission in this mode is blocked upstream.
    pub fn action(self) -> &'static str {
        match self {
            Mode::Detect => "Detection",
            Mode::Paraphrase => "Paraphrasing",
            Mode::Plagiarism => "Plagiarism check",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Immutable snapshot of one submission. Everything downstream reads the text
/// from here, never from shared state.
#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: Ticket,
    pub mode: Mode,
    pub text: Arc<str>,
}

/// Hands out tickets and keeps the most recent accepted result.
///
/// Only the holder of the newest ticket may publish; a response that arrives
/// after a newer submission (or a mode switch) is dropped.
pub struct Session<T> {
    generation: AtomicU64,
    latest: RwLock<Option<(Ticket, T)>>,
}

impl<T: Clone> Default for Session<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Session<T> {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    /// Start a submission. Any earlier result is cleared.
    pub async fn begin(&self, mode: Mode, text: &str) -> Submission {
        let mut latest = self.latest.write().await;
        let ticket = Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        *latest = None;
        debug!("[session] Begin {:?} submission #{}", mode, ticket.0);
        Submission {
            ticket,
            mode,
            text: Arc::from(text),
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Store `value` if `ticket` is still the newest; returns whether it was kept.
    pub async fn publish(&self, ticket: Ticket, value: T) -> bool {
        let mut latest = self.latest.write().await;
        if !self.is_current(ticket) {
            debug!("[session] Dropping stale result #{}", ticket.0);
            return false;
        }
        *latest = Some((ticket, value));
        true
    }

    /// Invalidate whatever is in flight and clear the shown result (e.g. on a mode switch).
    pub async fn cancel(&self) {
        let mut latest = self.latest.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *latest = None;
    }

    pub async fn latest(&self) -> Option<T> {
        self.latest.read().await.as_ref().map(|(_, v)| v.clone())
    }
}
