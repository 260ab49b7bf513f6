use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::context::ContextKey;
use super::events::{EngineEvent, EventBus};
use super::message::Message;
use crate::repositories::{ContextRecord, ContextRepository, RepositoryResult};

/// Result of a generation-checked append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The store's generation moved on (a context switch happened) between
    /// the caller capturing its generation and the append arriving. The
    /// message was discarded, not merged.
    StaleDropped,
}

struct StoreState {
    active: ContextKey,
    generation: u64,
    messages: Vec<Message>,
}

/// Owner of the active conversation's message list.
///
/// Exactly one context is active at a time. Every mutation is written back
/// to the repository as a full-list atomic replace, so the persisted list is
/// always a prefix-consistent snapshot. Appends are guarded by a generation
/// counter incremented on every context switch; a stale append (from a
/// stream that outlived a switch) is silently dropped rather than blocked.
pub struct ConversationStore {
    repo: Arc<dyn ContextRepository>,
    state: Mutex<StoreState>,
    /// Serializes concurrent `switch_context` calls; the parking_lot state
    /// lock is never held across an await point.
    switch_lock: tokio::sync::Mutex<()>,
    events: EventBus,
}

impl ConversationStore {
    /// Open the store on the global context, restoring its persisted
    /// messages if any.
    pub async fn open(repo: Arc<dyn ContextRepository>, events: EventBus) -> RepositoryResult<Self> {
        let messages = match repo.load(&ContextKey::Global.storage_key()).await? {
            Some(record) => record.decode_messages()?,
            None => Vec::new(),
        };

        Ok(Self {
            repo,
            state: Mutex::new(StoreState {
                active: ContextKey::Global,
                generation: 1,
                messages,
            }),
            switch_lock: tokio::sync::Mutex::new(()),
            events,
        })
    }

    pub fn active_context(&self) -> ContextKey {
        self.state.lock().active.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Active context and its generation in one consistent read.
    pub fn active_state(&self) -> (ContextKey, u64) {
        let state = self.state.lock();
        (state.active.clone(), state.generation)
    }

    /// Snapshot of the active context's messages.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// Switch the active context: flush the current context to storage, load
    /// the new one (empty if it was never saved), bump the generation so any
    /// in-flight append against the old context is dropped, and emit a
    /// full-replace `ContextSwitched` event.
    pub async fn switch_context(&self, key: ContextKey) -> RepositoryResult<Vec<Message>> {
        let _guard = self.switch_lock.lock().await;

        let (old_key, old_messages) = {
            let state = self.state.lock();
            (state.active.clone(), state.messages.clone())
        };

        // Flush before loading: the previous context must be fully persisted
        // before the new context becomes visible.
        self.repo
            .save(ContextRecord::encode(&old_key.storage_key(), &old_messages)?)
            .await?;

        let messages = match self.repo.load(&key.storage_key()).await? {
            Some(record) => record.decode_messages()?,
            None => Vec::new(),
        };

        let generation = {
            let mut state = self.state.lock();
            state.active = key.clone();
            state.messages = messages.clone();
            state.generation += 1;
            state.generation
        };

        debug!(context = %key, generation, count = messages.len(), "Switched conversation context");

        self.events.emit(EngineEvent::ContextSwitched {
            context: key,
            messages: messages.clone(),
        });

        Ok(messages)
    }

    /// Append a message if `generation` still matches the store's current
    /// generation, then persist the updated list. A mismatch is a silent
    /// no-op by design (see `AppendOutcome::StaleDropped`).
    pub async fn append(
        &self,
        generation: u64,
        message: Message,
    ) -> RepositoryResult<AppendOutcome> {
        let (key, messages) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(
                    expected = state.generation,
                    got = generation,
                    "Dropping append from stale context generation"
                );
                return Ok(AppendOutcome::StaleDropped);
            }
            state.messages.push(message);
            (state.active.clone(), state.messages.clone())
        };

        self.repo
            .save(ContextRecord::encode(&key.storage_key(), &messages)?)
            .await?;

        Ok(AppendOutcome::Appended)
    }

    /// Remove the persisted message list for one context. Irreversible; the
    /// caller is responsible for having confirmed this with the user.
    ///
    /// Clearing the active context also empties the in-memory list and bumps
    /// the generation, so in-flight streams cannot resurrect cleared history.
    pub async fn clear(&self, key: &ContextKey) -> RepositoryResult<()> {
        self.repo.delete(&key.storage_key()).await?;

        let cleared_active = {
            let mut state = self.state.lock();
            if state.active == *key {
                state.messages.clear();
                state.generation += 1;
                true
            } else {
                false
            }
        };

        if cleared_active {
            self.events.emit(EngineEvent::ContextSwitched {
                context: key.clone(),
                messages: Vec::new(),
            });
        }

        Ok(())
    }
}
