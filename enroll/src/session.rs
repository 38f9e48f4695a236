use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lobby_faces::{Detection, Embedding, FaceStoreError, IdentityStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::names::extract_name;

/// Tuning for the enrollment flow.
#[derive(Debug, Clone, Copy)]
pub struct EnrollConfig {
    /// Samples that complete a session on the normal path.
    pub max_samples: u32,

    /// Fewest samples an operator early-finish may commit with.
    pub min_samples: u32,

    /// Minimum wait between face captures, so the samples span more than
    /// one instant of pose and lighting.
    pub capture_cooldown: Duration,

    /// A session with no forward progress for this long is cancelled.
    pub timeout: Duration,
}

impl Default for EnrollConfig {
    fn default() -> Self {
        Self {
            max_samples: 5,
            min_samples: 3,
            capture_cooldown: Duration::from_millis(1200),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Enrollment flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollState {
    AwaitingName,
    CapturingFaces,
    Completed,
    Cancelled,
}

impl EnrollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollState::Completed | EnrollState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollState::AwaitingName => "awaiting_name",
            EnrollState::CapturingFaces => "capturing_faces",
            EnrollState::Completed => "completed",
            EnrollState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EnrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One in-flight enrollment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub session_id: String,
    pub person_id: String,
    pub name: Option<String>,
    pub state: EnrollState,
    pub captured: u32,
    pub started_at: Instant,
    last_progress_at: Instant,
    last_capture_at: Option<Instant>,
    last_embedding: Option<Embedding>,
}

/// Outcome of feeding speech to a session waiting for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeardName {
    Accepted(String),
    /// No usable name in the utterance; the session stays in
    /// `AwaitingName` for a retry.
    Unclear,
}

/// Outcome of one capture tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A sample was captured, `taken` of `target` so far.
    Captured { taken: u32, target: u32 },
    /// Every sample is in; the session is ready to complete.
    AllCaptured,
    /// The capture cooldown has not elapsed yet.
    CoolingDown,
    /// No face in this frame.
    NoFace,
    /// No session is capturing right now.
    Idle,
}

/// A successfully committed enrollment.
#[derive(Debug, Clone)]
pub struct Enrolled {
    pub person_id: String,
    pub name: String,
    pub samples: usize,
    /// The most recently captured embedding, for presence hand-off.
    pub embedding: Embedding,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    #[error("no active enrollment")]
    NotActive,

    #[error("enrollment is in state {0}")]
    WrongState(EnrollState),

    #[error("only {taken} of the required {required} samples captured")]
    NotEnoughSamples { taken: u32, required: u32 },

    #[error("store error: {0}")]
    Store(#[from] FaceStoreError),
}

/// 8-hex-char identifier for people and sessions.
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Drives at most one enrollment at a time.
///
/// Frame ticks and voice input arrive from different loops; callers
/// serialize all access behind one lock.
pub struct Registrar {
    store: Arc<dyn IdentityStore>,
    cfg: EnrollConfig,
    active: Option<Enrollment>,
}

impl Registrar {
    pub fn new(store: Arc<dyn IdentityStore>, cfg: EnrollConfig) -> Self {
        Self {
            store,
            cfg,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The in-flight session, for status display.
    pub fn active(&self) -> Option<&Enrollment> {
        self.active.as_ref()
    }

    /// Begins a new session. Returns `None` when one is already active,
    /// leaving the existing session untouched.
    pub fn start(&mut self, now: Instant) -> Option<Enrollment> {
        if self.is_active() {
            return None;
        }
        let enrollment = Enrollment {
            session_id: short_id(),
            person_id: short_id(),
            name: None,
            state: EnrollState::AwaitingName,
            captured: 0,
            started_at: now,
            last_progress_at: now,
            last_capture_at: None,
            last_embedding: None,
        };
        info!(
            session_id = %enrollment.session_id,
            person_id = %enrollment.person_id,
            "enrollment started"
        );
        self.active = Some(enrollment.clone());
        Some(enrollment)
    }

    /// Feeds recognized speech to a session waiting for a name.
    pub fn hear(&mut self, text: &str, now: Instant) -> Result<HeardName, EnrollError> {
        let enrollment = self.active.as_mut().ok_or(EnrollError::NotActive)?;
        if enrollment.state != EnrollState::AwaitingName {
            return Err(EnrollError::WrongState(enrollment.state));
        }
        match extract_name(text) {
            Some(name) => {
                info!(session_id = %enrollment.session_id, name = %name, "enrollment name accepted");
                enrollment.name = Some(name.clone());
                enrollment.state = EnrollState::CapturingFaces;
                enrollment.last_progress_at = now;
                Ok(HeardName::Accepted(name))
            }
            None => Ok(HeardName::Unclear),
        }
    }

    /// Frame tick while capturing: stages a sample when the cooldown has
    /// elapsed and a face is present. A store failure surfaces as an error
    /// and leaves the session active so the capture can retry.
    pub fn observe(
        &mut self,
        face: Option<&Detection>,
        image: &[u8],
        now: Instant,
    ) -> Result<CaptureOutcome, EnrollError> {
        let Some(enrollment) = self.active.as_mut() else {
            return Ok(CaptureOutcome::Idle);
        };
        if enrollment.state != EnrollState::CapturingFaces {
            return Ok(CaptureOutcome::Idle);
        }
        if let Some(last) = enrollment.last_capture_at {
            if now.duration_since(last) < self.cfg.capture_cooldown {
                return Ok(CaptureOutcome::CoolingDown);
            }
        }
        if enrollment.captured >= self.cfg.max_samples {
            // Captures are done; a failed commit is being retried.
            return Ok(CaptureOutcome::AllCaptured);
        }
        let Some(face) = face else {
            return Ok(CaptureOutcome::NoFace);
        };

        self.store
            .stage_sample(&enrollment.person_id, image, &face.embedding)?;
        enrollment.captured += 1;
        enrollment.last_capture_at = Some(now);
        enrollment.last_progress_at = now;
        enrollment.last_embedding = Some(face.embedding.clone());
        info!(
            session_id = %enrollment.session_id,
            taken = enrollment.captured,
            target = self.cfg.max_samples,
            "captured enrollment sample"
        );

        if enrollment.captured >= self.cfg.max_samples {
            Ok(CaptureOutcome::AllCaptured)
        } else {
            Ok(CaptureOutcome::Captured {
                taken: enrollment.captured,
                target: self.cfg.max_samples,
            })
        }
    }

    /// Cancels the session when a different known person takes the frame:
    /// a returning known person outranks finishing a stranger's enrollment,
    /// since continuing could mix identities. The registrant themself being
    /// recognized mid-flow never cancels it. Returns true when cancelled.
    pub fn interrupt_for_known(&mut self, name: &str, confidence: f32, threshold: f32) -> bool {
        if !self.is_active() || confidence < threshold {
            return false;
        }
        let registrant = self.active.as_ref().and_then(|e| e.name.as_deref());
        if registrant.is_some_and(|r| r.eq_ignore_ascii_case(name)) {
            return false;
        }
        info!(name = %name, confidence, "known person arrived, cancelling enrollment");
        self.cancel("interrupted by a known person");
        true
    }

    /// Commits the enrollment. Requires at least `min_samples` captured.
    /// The normal path calls this at `max_samples`; the lower bound is the
    /// operator early-finish override. A store failure leaves the session
    /// active for retry.
    pub fn complete(&mut self) -> Result<Enrolled, EnrollError> {
        let enrollment = self.active.as_mut().ok_or(EnrollError::NotActive)?;
        if enrollment.state != EnrollState::CapturingFaces {
            return Err(EnrollError::WrongState(enrollment.state));
        }
        let Some(name) = enrollment.name.clone() else {
            return Err(EnrollError::WrongState(enrollment.state));
        };
        if enrollment.captured < self.cfg.min_samples {
            return Err(EnrollError::NotEnoughSamples {
                taken: enrollment.captured,
                required: self.cfg.min_samples,
            });
        }

        let samples = self.store.commit(&enrollment.person_id, &name)?;
        enrollment.state = EnrollState::Completed;
        let enrolled = Enrolled {
            person_id: enrollment.person_id.clone(),
            name,
            samples,
            embedding: enrollment.last_embedding.clone().unwrap_or_default(),
        };
        info!(
            person_id = %enrolled.person_id,
            name = %enrolled.name,
            samples,
            "enrollment completed"
        );
        self.active = None;
        Ok(enrolled)
    }

    /// Aborts the active session and discards staged data. Cleanup errors
    /// are logged, never fatal; the slot is always freed.
    pub fn cancel(&mut self, reason: &str) {
        let Some(mut enrollment) = self.active.take() else {
            return;
        };
        enrollment.state = EnrollState::Cancelled;
        if let Err(err) = self.store.discard(&enrollment.person_id) {
            warn!(
                person_id = %enrollment.person_id,
                error = %err,
                "failed to discard partial enrollment data"
            );
        }
        info!(session_id = %enrollment.session_id, reason = reason, "enrollment cancelled");
    }

    /// Cancels a session with no forward progress for the configured
    /// timeout, an expected terminal condition rather than a failure. Returns
    /// true when a timeout fired.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        let timed_out = self
            .active
            .as_ref()
            .is_some_and(|e| now.duration_since(e.last_progress_at) > self.cfg.timeout);
        if timed_out {
            self.cancel("timed out");
        }
        timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_faces::{BoundingBox, MemoryStore};
    use std::time::Duration;

    fn detection(embedding: Embedding) -> Detection {
        Detection {
            bbox: BoundingBox {
                top: 0,
                right: 100,
                bottom: 100,
                left: 0,
            },
            embedding,
        }
    }

    fn registrar(store: Arc<MemoryStore>) -> Registrar {
        Registrar::new(store, EnrollConfig::default())
    }

    /// Walks a fresh session to CapturingFaces with the given name.
    fn named_session(reg: &mut Registrar, name: &str, t0: Instant) {
        assert!(reg.start(t0).is_some());
        let heard = reg.hear(&format!("my name is {name}"), t0).unwrap();
        assert_eq!(heard, HeardName::Accepted(title(name)));
    }

    fn title(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }

    #[test]
    fn start_while_active_fails_and_keeps_session() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();

        let first = reg.start(t0).unwrap();
        assert!(reg.start(t0).is_none());
        assert_eq!(
            reg.active().unwrap().session_id,
            first.session_id,
            "existing session untouched"
        );
    }

    #[test]
    fn unclear_name_keeps_awaiting() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        reg.start(t0);

        assert_eq!(reg.hear("um uh", t0).unwrap(), HeardName::Unclear);
        assert_eq!(reg.active().unwrap().state, EnrollState::AwaitingName);

        // Retry succeeds.
        assert_eq!(
            reg.hear("i'm bob", t0).unwrap(),
            HeardName::Accepted("Bob".into())
        );
        assert_eq!(reg.active().unwrap().state, EnrollState::CapturingFaces);
    }

    #[test]
    fn exactly_max_samples_complete_the_session() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store.clone());
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        let cooldown = EnrollConfig::default().capture_cooldown;
        let mut tick = t0;
        for expected in 1..=4u32 {
            tick += cooldown + Duration::from_millis(10);
            let outcome = reg
                .observe(Some(&detection(vec![0.1 * expected as f32])), b"jpg", tick)
                .unwrap();
            assert_eq!(
                outcome,
                CaptureOutcome::Captured {
                    taken: expected,
                    target: 5
                }
            );
        }
        tick += cooldown + Duration::from_millis(10);
        let outcome = reg.observe(Some(&detection(vec![0.5])), b"jpg", tick).unwrap();
        assert_eq!(outcome, CaptureOutcome::AllCaptured);

        let enrolled = reg.complete().unwrap();
        assert_eq!(enrolled.name, "Alice");
        assert_eq!(enrolled.samples, 5);
        assert!(!reg.is_active());

        let records = store.records();
        assert_eq!(records.len(), 5, "store gained one identity with 5 samples");
        assert!(records.iter().all(|r| r.person_id == enrolled.person_id));
    }

    #[test]
    fn cooldown_blocks_rapid_captures() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        let t1 = t0 + Duration::from_secs(2);
        assert_eq!(
            reg.observe(Some(&detection(vec![0.1])), b"", t1).unwrap(),
            CaptureOutcome::Captured { taken: 1, target: 5 }
        );
        // 100ms later: still cooling down.
        assert_eq!(
            reg.observe(Some(&detection(vec![0.1])), b"", t1 + Duration::from_millis(100))
                .unwrap(),
            CaptureOutcome::CoolingDown
        );
    }

    #[test]
    fn no_face_frames_do_not_count() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        assert_eq!(
            reg.observe(None, b"", t0 + Duration::from_secs(2)).unwrap(),
            CaptureOutcome::NoFace
        );
        assert_eq!(reg.active().unwrap().captured, 0);
    }

    #[test]
    fn complete_requires_min_samples() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        let t1 = t0 + Duration::from_secs(2);
        reg.observe(Some(&detection(vec![0.1])), b"", t1).unwrap();
        assert!(matches!(
            reg.complete(),
            Err(EnrollError::NotEnoughSamples { taken: 1, required: 3 })
        ));
        assert!(reg.is_active(), "failed complete keeps the session");
    }

    #[test]
    fn early_finish_override_at_min_samples() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store.clone());
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        let cooldown = EnrollConfig::default().capture_cooldown;
        let mut tick = t0;
        for _ in 0..3 {
            tick += cooldown + Duration::from_millis(10);
            reg.observe(Some(&detection(vec![0.1])), b"", tick).unwrap();
        }
        let enrolled = reg.complete().unwrap();
        assert_eq!(enrolled.samples, 3);
        assert_eq!(store.records().len(), 3);
    }

    #[test]
    fn known_person_interrupts_and_discards() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store.clone());
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);
        reg.observe(Some(&detection(vec![0.1])), b"", t0 + Duration::from_secs(2))
            .unwrap();

        assert!(reg.interrupt_for_known("Bob", 0.80, 0.65));
        assert!(!reg.is_active());
        assert!(store.records().is_empty(), "staged samples discarded");
        assert!(
            matches!(store.commit("whoever", "x"), Err(FaceStoreError::NothingStaged(_))),
            "nothing left staged"
        );
    }

    #[test]
    fn registrant_does_not_interrupt_their_own_session() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        assert!(!reg.interrupt_for_known("alice", 0.80, 0.65));
        assert!(!reg.interrupt_for_known("ALICE", 0.90, 0.65));
        assert!(reg.is_active());
    }

    #[test]
    fn low_confidence_does_not_interrupt() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        assert!(!reg.interrupt_for_known("Bob", 0.50, 0.65));
        assert!(reg.is_active());
    }

    #[test]
    fn timeout_cancels_and_frees_the_slot() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        reg.start(t0);

        assert!(!reg.check_timeout(t0 + Duration::from_secs(59)));
        assert!(reg.is_active());

        assert!(reg.check_timeout(t0 + Duration::from_secs(61)));
        assert!(!reg.is_active());
        assert!(reg.start(t0 + Duration::from_secs(62)).is_some(), "slot freed");
    }

    #[test]
    fn progress_defers_timeout() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        reg.start(t0);

        // Name arrives at t+50s: progress resets the timeout clock.
        let t1 = t0 + Duration::from_secs(50);
        reg.hear("my name is alice", t1).unwrap();
        assert!(!reg.check_timeout(t0 + Duration::from_secs(70)));
        assert!(reg.check_timeout(t1 + Duration::from_secs(61)));
    }

    #[test]
    fn hear_in_capture_state_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = registrar(store);
        let t0 = Instant::now();
        named_session(&mut reg, "alice", t0);

        assert!(matches!(
            reg.hear("my name is mallory", t0),
            Err(EnrollError::WrongState(EnrollState::CapturingFaces))
        ));
        assert_eq!(reg.active().unwrap().name.as_deref(), Some("Alice"));
    }

    #[test]
    fn short_ids_are_eight_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short_id(), short_id());
    }
}
