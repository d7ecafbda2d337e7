//! Canned-reply generator for tests and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use super::{GenerationError, GenerationRequest, TextGenerator};

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync>;

enum Script {
    /// Replies in order; the last one repeats once the queue runs dry
    Queue(Mutex<VecDeque<Result<String, GenerationError>>>),
    Function(Responder),
}

/// Replays scripted results and records every request it receives.
pub struct ScriptedGenerator {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self::from_script(Script::Queue(Mutex::new(replies.into())))
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self::from_script(Script::Function(Box::new(responder)))
    }

    fn from_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match &self.script {
            Script::Function(responder) => responder(request),
            Script::Queue(queue) => {
                let mut queue = queue
                    .lock()
                    .map_err(|_| GenerationError::failed("script lock poisoned"))?;
                match queue.len() {
                    0 => Err(GenerationError::failed("script exhausted")),
                    1 => queue
                        .front()
                        .cloned()
                        .unwrap_or_else(|| Err(GenerationError::failed("script exhausted"))),
                    _ => queue
                        .pop_front()
                        .unwrap_or_else(|| Err(GenerationError::failed("script exhausted"))),
                }
            }
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::cancelled());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.next_reply(request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
