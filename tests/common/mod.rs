#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use docchat::embedding::Embedder;
use docchat::llm::LanguageModel;
use docchat::store::MetadataStore;
use docchat::vector::VectorStore;
use docchat::{db, migrate};

/// Deterministic in-process embedder. Records batch sizes and can be told to
/// fail specific calls (0-based call index).
pub struct StubEmbedder {
    dims: usize,
    pub batch_sizes: Mutex<Vec<usize>>,
    fail_calls: Mutex<HashSet<usize>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dims: usize) -> Arc<Self> {
        Arc::new(Self {
            dims,
            batch_sizes: Mutex::new(Vec::new()),
            fail_calls: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_call(&self, index: usize) {
        self.fail_calls.lock().unwrap().insert(index);
    }

    pub fn clear_failures(&self) {
        self.fail_calls.lock().unwrap().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn embed_one(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    for (i, b) in text.bytes().enumerate() {
        v[i % dims] += b as f32;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());
        if self.fail_calls.lock().unwrap().contains(&call) {
            anyhow::bail!("injected embedding failure on call {}", call);
        }
        Ok(texts.iter().map(|t| embed_one(t, self.dims)).collect())
    }
}

/// Language model that replays a queue of scripted responses and records
/// every prompt it receives.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<anyhow::Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push_ok(&self, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("{}", message)));
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, prompt: &str, _temperature: f32) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("scripted model exhausted")))
    }
}

/// Temp workspace with a documents folder and a fresh migrated database.
pub struct TestEnv {
    pub tmp: TempDir,
    pub docs_dir: PathBuf,
    pub metadata: MetadataStore,
    pub pool: sqlx::SqlitePool,
}

pub async fn setup_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let docs_dir = tmp.path().join("docs");
    std::fs::create_dir_all(&docs_dir).unwrap();

    let pool = db::connect(&tmp.path().join("docchat.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    TestEnv {
        tmp,
        docs_dir,
        metadata: MetadataStore::new(pool.clone()),
        pool,
    }
}

impl TestEnv {
    pub fn vector_store(&self, embedder: Arc<StubEmbedder>) -> VectorStore {
        VectorStore::new(self.pool.clone(), embedder)
    }

    pub fn write_doc(&self, name: &str, content: &str) -> PathBuf {
        let path = self.docs_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn write_doc_bytes(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.docs_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

pub fn documents_config(root: &Path) -> docchat::config::DocumentsConfig {
    docchat::config::DocumentsConfig {
        root: root.to_path_buf(),
        include_globs: vec!["**/*".to_string()],
        exclude_globs: vec![],
        follow_symlinks: false,
        enabled_parsers: vec!["text".to_string()],
    }
}
