use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::ContextKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a response is already streaming for this conversation")]
    Busy,

    #[error("no response is currently streaming for this conversation")]
    NotStreaming,
}

/// Everything needed to finalize a session's accumulator into a message.
pub struct FinishedSession {
    /// Store generation captured when the session started; appends made with
    /// it are dropped if the context switched mid-stream.
    pub generation: u64,
    /// Concatenation of every chunk received, in arrival order.
    pub content: String,
}

/// Per-context stream state.
///
/// The accumulator is exclusively owned here for the session's lifetime:
/// the drive loop pushes into it and finalization takes it, nothing else
/// touches it.
struct SessionState {
    generation: u64,
    accumulator: String,
    cancel_flag: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

/// Tracks the lifecycle of in-flight response streams, one per context.
///
/// A session moves Idle -> Streaming -> {Completed | Cancelled | Failed} and
/// back to Idle; "Idle" is simply the absence of an entry in the map.
/// Removing the entry is the single finalization point: whichever path
/// (natural completion, error, cancel) removes it first wins, so a response
/// is never finalized twice.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a streaming session for a context. Fails fast with
    /// [`SessionError::Busy`] if one is already streaming there; sessions on
    /// other contexts are unaffected.
    pub fn begin(
        &self,
        context: &ContextKey,
        generation: u64,
    ) -> Result<Arc<AtomicBool>, SessionError> {
        let key = context.storage_key();
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&key) {
            return Err(SessionError::Busy);
        }

        let cancel_flag = Arc::new(AtomicBool::new(false));
        sessions.insert(
            key,
            SessionState {
                generation,
                accumulator: String::new(),
                cancel_flag: cancel_flag.clone(),
                task: None,
            },
        );

        Ok(cancel_flag)
    }

    /// Attach the spawned drive task so it stays owned for the session's
    /// lifetime. Dropped (detached) on finalization; teardown of a cancelled
    /// transport is fire-and-forget.
    pub fn attach_task(&self, context: &ContextKey, task: JoinHandle<()>) {
        if let Some(state) = self.sessions.lock().get_mut(&context.storage_key()) {
            state.task = Some(task);
        }
    }

    /// Append streamed text to the session accumulator.
    /// Returns false when the session no longer exists (it was cancelled or
    /// finalized elsewhere), signalling the drive loop to stop.
    pub fn push_text(&self, context: &ContextKey, text: &str) -> bool {
        match self.sessions.lock().get_mut(&context.storage_key()) {
            Some(state) => {
                state.accumulator.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Remove the session and hand back its accumulator for finalization.
    /// Used by the natural completion and stream error paths.
    pub fn finish(&self, context: &ContextKey) -> Option<FinishedSession> {
        self.sessions
            .lock()
            .remove(&context.storage_key())
            .map(|state| FinishedSession {
                generation: state.generation,
                content: state.accumulator,
            })
    }

    /// Cancel an in-flight session: set its cancellation flag and remove it,
    /// returning the partial accumulator so the caller can preserve it.
    /// The drive task observes the flag (or the missing entry) on its next
    /// chunk and exits; we do not wait for transport teardown.
    pub fn cancel(&self, context: &ContextKey) -> Option<FinishedSession> {
        let state = self.sessions.lock().remove(&context.storage_key())?;
        state.cancel_flag.store(true, Ordering::Relaxed);
        debug!(context = %context, "Stream cancelled");

        // Detach the task; it exits on its own at the next suspension point.
        drop(state.task);

        Some(FinishedSession {
            generation: state.generation,
            content: state.accumulator,
        })
    }

    pub fn is_streaming(&self, context: &ContextKey) -> bool {
        self.sessions.lock().contains_key(&context.storage_key())
    }

    pub fn has_active_sessions(&self) -> bool {
        !self.sessions.lock().is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
