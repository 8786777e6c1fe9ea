//! Deterministic `ModelService` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ModelError, ModelService};

/// Returns fixed embeddings per text (or a fallback) and numbered generations.
/// Every call is recorded.
pub struct StubModel {
    embeddings: HashMap<String, Vec<f64>>,
    fallback: Vec<f64>,
    pending_deadlines: AtomicUsize,
    fail_generation: bool,
    pub embed_calls: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn new(fallback: &[f64]) -> Self {
        Self {
            embeddings: HashMap::new(),
            fallback: fallback.to_vec(),
            pending_deadlines: AtomicUsize::new(0),
            fail_generation: false,
            embed_calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_embedding(mut self, text: &str, embedding: &[f64]) -> Self {
        self.embeddings.insert(text.to_string(), embedding.to_vec());
        self
    }

    /// The next `count` embedding calls fail with a deadline error.
    pub fn with_deadlines(self, count: usize) -> Self {
        self.pending_deadlines.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn embed_count(&self) -> usize {
        self.embed_calls.lock().unwrap().len()
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelService for StubModel {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ModelError> {
        self.embed_calls.lock().unwrap().push(text.to_string());

        let pending = self.pending_deadlines.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_deadlines.store(pending - 1, Ordering::SeqCst);
            return Err(ModelError::DeadlineExceeded("stub deadline".to_string()));
        }

        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        if self.fail_generation {
            return Err(ModelError::Api {
                status: 500,
                message: "stub failure".to_string(),
            });
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("generated #{}", prompts.len()))
    }
}
