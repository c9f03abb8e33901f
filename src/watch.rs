//! Background re-indexing.
//!
//! An [`IndexWorker`] owns a single consumer task. Every reason to re-index
//! (a filesystem event, `POST /reindex`, a manual trigger) is sent to it as
//! an [`IndexSignal`]. The task runs at most one pass at a time; signals that
//! arrive while a pass runs or during the debounce window collapse into a
//! single follow-up pass.
//!
//! ```text
//! notify ─┐
//! server ─┼─► mpsc<IndexSignal> ─► consumer task ─► run_index_pass
//! cli    ─┘                              │
//!                                        └─► broadcast<PassOutcome>
//! ```

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use brain_assistant_core::gateway::EmbeddingGateway;
use brain_assistant_core::store::VectorIndex;

use crate::config::VaultConfig;
use crate::indexer::{run_index_pass, IndexStats};
use crate::scanner::in_excluded_dir;

const SIGNAL_CAPACITY: usize = 64;
const OUTCOME_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSignal {
    /// Something under the vault may have changed.
    ContentChanged(String),
    Shutdown,
}

/// Report broadcast after every pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    /// Reason carried by the most recent signal folded into the pass.
    pub reason: String,
    /// Number of signals the pass absorbed.
    pub signals: usize,
    pub duration_ms: u64,
    pub stats: Option<IndexStats>,
    pub error: Option<String>,
}

impl PassOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle to the background index task. Cheap to clone.
#[derive(Clone)]
pub struct IndexWorker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    signal_tx: mpsc::Sender<IndexSignal>,
    outcome_tx: broadcast::Sender<PassOutcome>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Everything a pass needs, owned by the consumer task.
pub struct PassContext {
    pub vault: VaultConfig,
    pub gateway: Arc<dyn EmbeddingGateway>,
    pub index: Arc<dyn VectorIndex>,
    pub batch_size: usize,
}

impl IndexWorker {
    /// Start the consumer task on the current tokio runtime.
    pub fn spawn(ctx: PassContext, debounce: Duration) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (outcome_tx, _) = broadcast::channel(OUTCOME_CAPACITY);

        let task = tokio::spawn(consume_signals(ctx, debounce, signal_rx, outcome_tx.clone()));

        Self {
            inner: Arc::new(WorkerInner {
                signal_tx,
                outcome_tx,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Request a pass.
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .signal_tx
            .send(IndexSignal::ContentChanged(reason.into()))
            .await
            .map_err(|_| anyhow::anyhow!("index worker has stopped"))
    }

    /// Request a pass without waiting for queue space.
    ///
    /// Returns `false` only if the worker has stopped. A full queue already
    /// guarantees a follow-up pass, so the signal is dropped.
    pub fn try_trigger(&self, reason: impl Into<String>) -> bool {
        match self
            .inner
            .signal_tx
            .try_send(IndexSignal::ContentChanged(reason.into()))
        {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PassOutcome> {
        self.inner.outcome_tx.subscribe()
    }

    /// Stop the consumer task and wait for it to exit.
    ///
    /// A pass already running is allowed to finish; pending signals are dropped.
    pub async fn shutdown(&self) {
        let _ = self.inner.signal_tx.send(IndexSignal::Shutdown).await;
        if let Some(task) = self.inner.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "index worker task panicked");
            }
        }
    }
}

async fn consume_signals(
    ctx: PassContext,
    debounce: Duration,
    mut signal_rx: mpsc::Receiver<IndexSignal>,
    outcome_tx: broadcast::Sender<PassOutcome>,
) {
    while let Some(signal) = signal_rx.recv().await {
        let mut reason = match signal {
            IndexSignal::ContentChanged(reason) => reason,
            IndexSignal::Shutdown => break,
        };
        let mut signals = 1usize;
        let mut shutdown = false;

        let deadline = time::Instant::now() + debounce;
        loop {
            tokio::select! {
                biased;
                next = signal_rx.recv() => match next {
                    Some(IndexSignal::ContentChanged(r)) => {
                        signals += 1;
                        reason = r;
                    }
                    Some(IndexSignal::Shutdown) | None => {
                        shutdown = true;
                        break;
                    }
                },
                () = time::sleep_until(deadline) => break,
            }
        }
        if shutdown {
            break;
        }

        tracing::debug!(%reason, signals, "starting index pass");
        let started = Instant::now();
        let result = run_index_pass(
            &ctx.vault,
            ctx.gateway.as_ref(),
            ctx.index.as_ref(),
            ctx.batch_size,
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(stats) => PassOutcome {
                reason,
                signals,
                duration_ms,
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "index pass failed; index left unchanged");
                PassOutcome {
                    reason,
                    signals,
                    duration_ms,
                    stats: None,
                    error: Some(e.to_string()),
                }
            }
        };
        let _ = outcome_tx.send(outcome);
    }
    tracing::debug!("index worker stopped");
}

/// Watch `vault.root` recursively and trigger `worker` on relevant changes.
///
/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch_vault(vault: &VaultConfig, worker: IndexWorker) -> Result<RecommendedWatcher> {
    let root = vault.root.clone();
    let exclude_dirs = vault.exclude_dirs.clone();

    let callback_root = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_relevant(&callback_root, &exclude_dirs, &event) && !worker.try_trigger("fs_event") {
                tracing::warn!("index worker has stopped; dropping filesystem event");
            }
        }
        Err(e) => tracing::warn!(error = %e, "watcher error"),
    })
    .context("failed to initialise filesystem watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;
    tracing::info!(root = %root.display(), "watching vault");
    Ok(watcher)
}

fn is_relevant(root: &std::path::Path, exclude_dirs: &[String], event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    // Rescan notifications carry no paths.
    if event.paths.is_empty() {
        return true;
    }
    event
        .paths
        .iter()
        .any(|path| !in_excluded_dir(root, path, exclude_dirs))
}
