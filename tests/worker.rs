mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify, Semaphore};

use brain_assistant::watch::{IndexWorker, PassContext, PassOutcome};
use brain_assistant_core::error::GatewayError;
use brain_assistant_core::gateway::{AnswerDocument, AnswerResponse, EmbeddingGateway};
use brain_assistant_core::store::memory::InMemoryIndex;
use brain_assistant_core::store::VectorIndex;

use common::{vault, vector_for, write_note, DIMS};

/// Gateway whose `embed` blocks until the test releases it.
struct GatedGateway {
    entered: Notify,
    gate: Semaphore,
    embed_calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingGateway for GatedGateway {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        Ok(texts.iter().map(|t| vector_for(t)).collect())
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        Ok(vector_for(text))
    }
    async fn answer(&self, _q: &str, _d: &[AnswerDocument]) -> AnswerResponse {
        AnswerResponse::no_answer()
    }
    fn dims(&self) -> usize {
        DIMS
    }
}

async fn next_outcome(rx: &mut broadcast::Receiver<PassOutcome>) -> PassOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a pass")
        .expect("worker stopped")
}

#[tokio::test]
async fn test_signals_during_a_pass_collapse_into_one_follow_up() {
    let tmp = TempDir::new().unwrap();
    write_note(tmp.path(), "a.md", "first");

    let gateway = Arc::new(GatedGateway {
        entered: Notify::new(),
        gate: Semaphore::new(0),
        embed_calls: AtomicUsize::new(0),
    });
    let index = Arc::new(InMemoryIndex::new(DIMS));
    let worker = IndexWorker::spawn(
        PassContext {
            vault: vault(tmp.path()),
            gateway: gateway.clone(),
            index: index.clone(),
            batch_size: 8,
        },
        Duration::from_millis(20),
    );
    let mut outcomes = worker.subscribe();

    worker.trigger("initial").await.unwrap();
    gateway.entered.notified().await;

    // The first pass is blocked inside embed; pile up more signals.
    write_note(tmp.path(), "b.md", "second");
    for i in 0..5 {
        worker.trigger(format!("burst-{}", i)).await.unwrap();
    }
    gateway.gate.add_permits(10);

    let first = next_outcome(&mut outcomes).await;
    assert_eq!(first.reason, "initial");
    assert!(first.succeeded());

    let second = next_outcome(&mut outcomes).await;
    assert_eq!(second.signals, 5);
    assert_eq!(second.reason, "burst-4");
    assert_eq!(second.stats.as_ref().unwrap().added, 1);

    // Nothing else is queued.
    let extra = tokio::time::timeout(Duration::from_millis(300), outcomes.recv()).await;
    assert!(extra.is_err(), "unexpected third pass");
    assert_eq!(gateway.embed_calls.load(Ordering::SeqCst), 2);
    assert_eq!(index.list_all().await.unwrap().len(), 2);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_debounce_window_merges_rapid_triggers() {
    let tmp = TempDir::new().unwrap();
    write_note(tmp.path(), "a.md", "note");

    let gateway = Arc::new(common::ScriptedGateway::new());
    let index = Arc::new(InMemoryIndex::new(DIMS));
    let worker = IndexWorker::spawn(
        PassContext {
            vault: vault(tmp.path()),
            gateway: gateway.clone(),
            index,
            batch_size: 8,
        },
        Duration::from_millis(200),
    );
    let mut outcomes = worker.subscribe();

    for _ in 0..3 {
        worker.trigger("fs_event").await.unwrap();
    }
    let outcome = next_outcome(&mut outcomes).await;
    assert_eq!(outcome.signals, 3);
    assert_eq!(gateway.embed_call_count(), 1);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_failed_pass_is_reported_and_worker_keeps_running() {
    let tmp = TempDir::new().unwrap();
    write_note(tmp.path(), "a.md", "note");

    let gateway = Arc::new(common::ScriptedGateway::new());
    gateway.set_fail_embed(true);
    let index = Arc::new(InMemoryIndex::new(DIMS));
    let worker = IndexWorker::spawn(
        PassContext {
            vault: vault(tmp.path()),
            gateway: gateway.clone(),
            index: index.clone(),
            batch_size: 8,
        },
        Duration::from_millis(10),
    );
    let mut outcomes = worker.subscribe();

    worker.trigger("first").await.unwrap();
    let failed = next_outcome(&mut outcomes).await;
    assert!(!failed.succeeded());
    assert!(failed.stats.is_none());
    assert!(index.is_empty());

    gateway.set_fail_embed(false);
    worker.trigger("retry").await.unwrap();
    let ok = next_outcome(&mut outcomes).await;
    assert!(ok.succeeded());
    assert_eq!(index.len(), 1);

    worker.shutdown().await;
    assert!(worker.trigger("late").await.is_err());
}
