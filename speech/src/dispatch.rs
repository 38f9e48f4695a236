//! Prioritized speech output dispatcher.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::PhraseCache;
use crate::provider::{Player, Synthesizer};

/// Priority of a speech request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

/// One queued utterance.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub priority: Priority,
    pub enqueued_at: Instant,
}

struct QueueState {
    high: VecDeque<SpeechRequest>,
    normal: VecDeque<SpeechRequest>,
    /// True while the worker is synthesizing or playing a request.
    speaking: bool,
    closed: bool,
    /// Cancelled to interrupt the in-flight request; replaced per request.
    interrupt: CancellationToken,
}

impl QueueState {
    fn next(&mut self) -> Option<SpeechRequest> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }

    fn is_busy(&self) -> bool {
        self.speaking || !self.high.is_empty() || !self.normal.is_empty()
    }
}

/// Serializes all spoken output through one worker task.
///
/// Normal requests play in order; High requests jump ahead of Normal.
/// [`Dispatcher::speak_now`] interrupts whatever is playing, drops every
/// queued Normal request, and runs ahead of surviving High requests; an
/// interruption outranks anything already waiting.
pub struct Dispatcher {
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts the worker. Must be called from within a tokio runtime.
    /// `cache_capacity` bounds the phrase cache.
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn Player>,
        cache_capacity: usize,
    ) -> Self {
        let state = Arc::new(Mutex::new(QueueState {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            speaking: false,
            closed: false,
            interrupt: CancellationToken::new(),
        }));
        let wake = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let cache = Mutex::new(PhraseCache::new(cache_capacity));
        let worker = tokio::spawn(worker_loop(
            state.clone(),
            wake.clone(),
            cancel.clone(),
            cache,
            synthesizer,
            player,
        ));
        Self {
            state,
            wake,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues text for speaking. Empty text is ignored.
    pub fn enqueue(&self, text: impl Into<String>, priority: Priority) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            let request = SpeechRequest {
                text,
                priority,
                enqueued_at: Instant::now(),
            };
            match priority {
                Priority::High => state.high.push_back(request),
                Priority::Normal => state.normal.push_back(request),
            }
        }
        self.wake.notify_one();
    }

    /// Speaks text immediately: interrupts in-flight playback, drops all
    /// queued Normal requests, and runs before any queued High request.
    /// Already-queued High requests survive.
    pub fn speak_now(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.normal.clear();
            state.high.push_front(SpeechRequest {
                text,
                priority: Priority::High,
                enqueued_at: Instant::now(),
            });
            state.interrupt.cancel();
        }
        self.wake.notify_one();
    }

    /// True while anything is queued or being spoken.
    pub fn is_busy(&self) -> bool {
        self.state.lock().is_busy()
    }

    /// Interrupts playback and clears both queues.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.normal.clear();
        state.high.clear();
        state.interrupt.cancel();
    }

    /// Waits until the queue drains and playback finishes, or the timeout
    /// elapses. Used to let a final phrase play out before shutdown.
    pub async fn drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.is_busy() {
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Stops everything and terminates the worker. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.normal.clear();
            state.high.clear();
            state.interrupt.cancel();
        }
        self.cancel.cancel();
        self.wake.notify_one();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "speech worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    cache: Mutex<PhraseCache>,
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let next = {
            let mut s = state.lock();
            match s.next() {
                Some(request) => {
                    s.speaking = true;
                    // Fresh token per request: an interrupt aimed at the
                    // previous utterance must not kill this one.
                    s.interrupt = CancellationToken::new();
                    Some((request, s.interrupt.clone()))
                }
                None => None,
            }
        };

        match next {
            Some((request, interrupt)) => {
                speak_one(&request, &interrupt, &cache, &*synthesizer, &*player).await;
                state.lock().speaking = false;
            }
            None => {
                tokio::select! {
                    _ = wake.notified() => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}

async fn speak_one(
    request: &SpeechRequest,
    interrupt: &CancellationToken,
    cache: &Mutex<PhraseCache>,
    synthesizer: &dyn Synthesizer,
    player: &dyn Player,
) {
    let cached = cache.lock().get(&request.text);
    let clip = match cached {
        Some(clip) => clip,
        None => {
            let clip = tokio::select! {
                result = synthesizer.synthesize(&request.text) => match result {
                    Ok(clip) => Arc::new(clip),
                    Err(err) => {
                        // A synthesis hiccup drops one phrase, nothing more.
                        warn!(error = %err, "synthesis failed, dropping phrase");
                        return;
                    }
                },
                _ = interrupt.cancelled() => return,
            };
            cache.lock().insert(&request.text, clip.clone());
            clip
        }
    };

    debug!(text = %request.text, "speaking");
    tokio::select! {
        result = player.play(&clip) => {
            if let Err(err) = result {
                warn!(error = %err, "playback failed");
            }
        }
        _ = interrupt.cancelled() => {
            debug!(text = %request.text, "playback interrupted");
            player.stop();
        }
    }
}
