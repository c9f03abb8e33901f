#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use brain_assistant::config::VaultConfig;
use brain_assistant_core::error::GatewayError;
use brain_assistant_core::gateway::{Answer, AnswerDocument, AnswerResponse, EmbeddingGateway};

pub const DIMS: usize = 4;

/// Deterministic stand-in for the remote provider.
///
/// Vectors are character-class histograms of the input, so identical texts
/// embed identically and a query equal to a note's text scores 1.0 against it.
#[derive(Default)]
pub struct ScriptedGateway {
    pub fail_embed: AtomicBool,
    pub fail_query: AtomicBool,
    pub embed_calls: AtomicUsize,
    pub embedded: Mutex<Vec<String>>,
    pub answer_calls: Mutex<Vec<(String, Vec<AnswerDocument>)>>,
    pub answer_text: Mutex<Option<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(text: &str) -> Self {
        let gateway = Self::default();
        *gateway.answer_text.lock().unwrap() = Some(text.to_string());
        gateway
    }

    pub fn set_fail_embed(&self, fail: bool) {
        self.fail_embed.store(fail, Ordering::SeqCst);
    }

    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn answer_call_count(&self) -> usize {
        self.answer_calls.lock().unwrap().len()
    }
}

pub fn vector_for(text: &str) -> Vec<f32> {
    let mut v = vec![1.0; DIMS];
    for c in text.chars() {
        v[(c as usize) % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingGateway for ScriptedGateway {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                endpoint: "/batch_semantic_embed".into(),
                status: 500,
                body: "internal error".into(),
            });
        }
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(GatewayError::transport("/semantic_embed", "connection refused"));
        }
        Ok(vector_for(text))
    }

    async fn answer(&self, query: &str, documents: &[AnswerDocument]) -> AnswerResponse {
        self.answer_calls
            .lock()
            .unwrap()
            .push((query.to_string(), documents.to_vec()));
        match self.answer_text.lock().unwrap().clone() {
            Some(answer) => AnswerResponse {
                answers: vec![Answer { answer }],
            },
            None => AnswerResponse::no_answer(),
        }
    }

    fn dims(&self) -> usize {
        DIMS
    }
}

pub fn vault(root: &Path) -> VaultConfig {
    VaultConfig {
        root: root.to_path_buf(),
        include_globs: vec!["**/*.md".to_string()],
        exclude_dirs: vec![".obsidian".to_string()],
        follow_symlinks: true,
    }
}

pub fn write_note(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
