//! Memoized, admission-controlled thumbnail generation.
//!
//! Requests queue per key in arrival order. A dispatch pass walks the keys in
//! the order they were first seen and starts generators while fewer than
//! `capacity` are running, at most one per key. Every settlement frees its
//! slot and runs the pass again, so waiting keys get their turn.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

pub const DEFAULT_GENERATION_SLOTS: usize = 2;

type GenerationFuture = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send>>;
type Generator = Box<dyn FnOnce() -> GenerationFuture + Send>;

struct PendingRequest {
    generator: Generator,
    reply: oneshot::Sender<Result<Option<String>>>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    pending: IndexMap<String, VecDeque<PendingRequest>>,
    // Keys with a generator running right now
    generating: HashSet<String>,
    in_flight: usize,
}

struct Shared {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide thumbnail store. Clones share the same entries, queues and slots.
#[derive(Clone)]
pub struct ThumbnailCache {
    shared: Arc<Shared>,
}

impl ThumbnailCache {
    /// Creates an empty cache running at most `capacity` generators at once.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity: capacity.max(1),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn get_from_cache(&self, key: &str) -> Option<String> {
        self.shared.lock().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }

    /// Requests queued but not yet started.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.values().map(VecDeque::len).sum()
    }

    /// Returns the cached thumbnail for `key`, or queues `generator` to produce it.
    ///
    /// The request is queued when this is called, not when the returned future
    /// is first polled. `Ok(None)` means the generator produced nothing; it is
    /// not cached and the next request for `key` runs its own generator. A
    /// produced value is stored before the future resolves, and is stored even
    /// if the future was dropped in the meantime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn queue_thumbnail_generation<F, Fut>(
        &self,
        key: impl Into<String>,
        generator: F,
    ) -> impl Future<Output = Result<Option<String>>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<String>>> + Send + 'static,
    {
        let key = key.into();
        let admitted = {
            let mut state = self.shared.lock();
            match state.entries.get(&key) {
                Some(hit) => Ok(hit.clone()),
                None => {
                    let (reply, receiver) = oneshot::channel();
                    let generator: Generator =
                        Box::new(move || Box::pin(generator()) as GenerationFuture);
                    debug!("Queued thumbnail generation for {}", key);
                    state
                        .pending
                        .entry(key)
                        .or_default()
                        .push_back(PendingRequest { generator, reply });
                    Err(receiver)
                }
            }
        };

        if admitted.is_err() {
            self.dispatch();
        }

        async move {
            match admitted {
                Ok(hit) => Ok(Some(hit)),
                Err(receiver) => receiver
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("thumbnail generation was abandoned"))),
            }
        }
    }

    // Scheduling only: takes the lock, picks work, spawns. Never awaits.
    fn dispatch(&self) {
        let mut satisfied = Vec::new();
        let mut started = Vec::new();
        {
            let mut guard = self.shared.lock();
            let CacheState {
                entries,
                pending,
                generating,
                in_flight,
            } = &mut *guard;

            for (key, queue) in pending.iter_mut() {
                // Populated while these waited: answer them without regenerating.
                if let Some(hit) = entries.get(key) {
                    satisfied.extend(queue.drain(..).map(|request| (request, hit.clone())));
                    continue;
                }
                // The running one either populates the entry or hands over to the next.
                if generating.contains(key) || *in_flight >= self.shared.capacity {
                    continue;
                }
                if let Some(request) = queue.pop_front() {
                    *in_flight += 1;
                    generating.insert(key.clone());
                    started.push((key.clone(), request));
                }
            }
            pending.retain(|_, queue| !queue.is_empty());
        }

        for (request, hit) in satisfied {
            let _ = request.reply.send(Ok(Some(hit)));
        }
        for (key, request) in started {
            self.start(key, request);
        }
    }

    fn start(&self, key: String, request: PendingRequest) {
        debug!("Starting thumbnail generation for {}", key);
        let cache = self.clone();
        let PendingRequest { generator, reply } = request;

        tokio::spawn(async move {
            // Separate task so a panicking generator still gives its slot back.
            let outcome = match tokio::spawn(async move { generator().await }).await {
                Ok(outcome) => outcome,
                Err(e) => Err(anyhow!("thumbnail generator for {} did not finish: {}", key, e)),
            };

            {
                let mut state = cache.shared.lock();
                state.in_flight = state.in_flight.saturating_sub(1);
                state.generating.remove(&key);
                if let Ok(Some(value)) = &outcome {
                    state.entries.insert(key.clone(), value.clone());
                }
            }

            // The requester may have gone away; the entry is kept regardless.
            let _ = reply.send(outcome);
            cache.dispatch();
        });
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATION_SLOTS)
    }
}
