use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use lobby_enroll::{CaptureOutcome, EnrollConfig, EnrollState, HeardName, Registrar};
use lobby_faces::IdentityStore;
use lobby_identity::{Resolver, ResolverConfig, ResolvedFace, dedupe};
use lobby_presence::{PresenceConfig, PresenceEvent, PresenceTracker};
use lobby_responder::Responder;
use lobby_speech::{Dispatcher, Heard, Listener, Priority};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EngineEvent, FaceOverlay};
use crate::phrases::Phrases;
use crate::sensor::{FaceSensor, FrameObservation, SensorError};

/// Engine tuning. Component configs carry their own defaults; the
/// engine-level knobs cover frame dedup, voice pacing, and shutdown.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub presence: PresenceConfig,
    pub enroll: EnrollConfig,

    /// Bounding-box center distance below which two unknown detections are
    /// one physical face.
    pub min_face_separation_px: f32,

    /// Wait for speech to begin in one listen round.
    pub listen_timeout: Duration,

    /// Maximum length of one utterance.
    pub phrase_limit: Duration,

    /// With someone present and nothing spoken for this long, offer a
    /// still-here line.
    pub idle_checkin: Duration,

    /// How long shutdown waits for the goodbye to play out.
    pub goodbye_grace: Duration,

    pub phrases: Phrases,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            presence: PresenceConfig::default(),
            enroll: EnrollConfig::default(),
            min_face_separation_px: 100.0,
            listen_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(8),
            idle_checkin: Duration::from_secs(300),
            goodbye_grace: Duration::from_secs(5),
            phrases: Phrases::default(),
        }
    }
}

/// The kiosk receptionist.
///
/// [`Receptionist::run`] drives two loops until the cancellation token
/// fires or the sensor closes:
///
/// - the frame loop resolves and dedupes each frame's detections, feeds the
///   presence tracker, and drives the enrollment machine, strictly in that
///   order and one frame at a time;
/// - the voice loop routes recognized text to the enrollment machine when a
///   session is waiting for a name, otherwise to the responder.
///
/// Presence and enrollment are each behind one lock; both loops mutate them
/// only through those locks, so a person-change and a voice transition can
/// never interleave.
pub struct Receptionist {
    cfg: EngineConfig,
    resolver: Resolver,
    presence: Mutex<PresenceTracker>,
    registrar: Mutex<Registrar>,
    responder: Responder,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
    last_spoken: Mutex<Instant>,
}

impl Receptionist {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        dispatcher: Arc<Dispatcher>,
        responder: Responder,
        cfg: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            resolver: Resolver::new(store.clone(), cfg.resolver),
            presence: Mutex::new(PresenceTracker::new(cfg.presence)),
            registrar: Mutex::new(Registrar::new(store, cfg.enroll)),
            responder,
            dispatcher,
            events,
            cancel: CancellationToken::new(),
            last_spoken: Mutex::new(Instant::now()),
            cfg,
        }
    }

    /// Telemetry feed for overlays and status displays.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Cancelling this token stops both loops and begins shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until cancelled or the sensor closes, then speaks a goodbye,
    /// lets it play out, and closes the dispatcher.
    pub async fn run<S: FaceSensor>(&self, mut sensor: S, listener: Arc<dyn Listener>) {
        info!("receptionist running");
        self.say(&self.cfg.phrases.welcome, Priority::High);

        tokio::join!(self.frame_loop(&mut sensor), self.voice_loop(&*listener));

        info!("receptionist stopping");
        self.dispatcher.speak_now(&self.cfg.phrases.goodbye);
        self.dispatcher.drain(self.cfg.goodbye_grace).await;
        self.dispatcher.close().await;
    }

    async fn frame_loop<S: FaceSensor>(&self, sensor: &mut S) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = sensor.observe() => match result {
                    Ok(frame) => self.process_frame(frame),
                    Err(SensorError::Closed) => {
                        info!("sensor closed");
                        self.cancel.cancel();
                        return;
                    }
                    Err(err) => {
                        // One bad frame never stops the pipeline.
                        warn!(error = %err, "sensor failed, skipping frame");
                    }
                }
            }
        }
    }

    async fn voice_loop(&self, listener: &dyn Listener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = listener.listen(self.cfg.listen_timeout, self.cfg.phrase_limit) => {
                    match result {
                        Ok(Heard::Text(text)) => self.handle_utterance(&text),
                        Ok(Heard::Silence) => debug!("nothing heard"),
                        Ok(Heard::Unintelligible) => debug!("could not transcribe speech"),
                        Err(err) => warn!(error = %err, "listen failed"),
                    }
                }
            }
        }
    }

    /// One frame: resolve -> dedupe -> presence -> enrollment, in order.
    fn process_frame(&self, frame: FrameObservation) {
        let now = Instant::now();
        let resolved: Vec<ResolvedFace> = frame
            .detections
            .iter()
            .map(|detection| ResolvedFace {
                detection: detection.clone(),
                matched: self.resolver.resolve(&detection.embedding),
            })
            .collect();
        let faces = dedupe(resolved, self.cfg.min_face_separation_px);

        self.emit(EngineEvent::Frame {
            at: Utc::now(),
            faces: faces
                .iter()
                .map(|f| FaceOverlay {
                    bbox: f.detection.bbox,
                    name: f.matched.identity.as_ref().map(|m| m.name.clone()),
                    confidence: f.matched.confidence,
                })
                .collect(),
        });

        let presence_events = self.presence.lock().observe(&faces, now);

        let mut registrar = self.registrar.lock();
        for event in presence_events {
            match event {
                PresenceEvent::Greet {
                    person_id,
                    name,
                    confidence,
                } => {
                    self.say(self.cfg.phrases.greeting_for(&name), Priority::High);
                    self.emit(EngineEvent::Greeted {
                        at: Utc::now(),
                        person_id,
                        name,
                        confidence,
                    });
                }
                PresenceEvent::UnknownPerson => {
                    if let Some(enrollment) = registrar.start(now) {
                        self.speak_now(&self.cfg.phrases.unknown_prompt);
                        self.emit(EngineEvent::EnrollmentStarted {
                            at: Utc::now(),
                            session_id: enrollment.session_id,
                        });
                    }
                }
            }
        }

        if registrar.is_active() {
            self.enrollment_tick(&mut registrar, &faces, &frame, now);
        } else {
            drop(registrar);
            self.check_idle(now);
        }
    }

    /// Drives an active enrollment for one frame: timeout, then interruption
    /// by a returning known person, then capture progress and completion.
    fn enrollment_tick(
        &self,
        registrar: &mut Registrar,
        faces: &[ResolvedFace],
        frame: &FrameObservation,
        now: Instant,
    ) {
        let session_id = match registrar.active() {
            Some(enrollment) => enrollment.session_id.clone(),
            None => return,
        };

        if registrar.check_timeout(now) {
            self.say(&self.cfg.phrases.enroll_timeout, Priority::High);
            self.emit(EngineEvent::EnrollmentCancelled {
                at: Utc::now(),
                session_id,
                reason: "timed out".into(),
            });
            return;
        }

        let best_known = faces
            .iter()
            .filter_map(|f| {
                f.matched
                    .identity
                    .as_ref()
                    .map(|identity| (identity, f.matched.confidence))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((identity, confidence)) = best_known {
            if registrar.interrupt_for_known(
                &identity.name,
                confidence,
                self.cfg.presence.greet_threshold,
            ) {
                self.emit(EngineEvent::EnrollmentCancelled {
                    at: Utc::now(),
                    session_id,
                    reason: "a known person arrived".into(),
                });
                return;
            }
        }

        let face = faces.first().map(|f| &f.detection);
        match registrar.observe(face, &frame.image, now) {
            Ok(CaptureOutcome::Captured { taken, target }) => {
                self.say(
                    self.cfg.phrases.capture_progress_for(taken, target),
                    Priority::Normal,
                );
                self.emit(EngineEvent::EnrollmentProgress {
                    at: Utc::now(),
                    session_id,
                    taken,
                    target,
                });
            }
            Ok(CaptureOutcome::AllCaptured) => match registrar.complete() {
                Ok(enrolled) => {
                    self.presence.lock().note_enrolled(
                        &enrolled.person_id,
                        &enrolled.name,
                        enrolled.embedding.clone(),
                    );
                    self.say(
                        self.cfg.phrases.enroll_completed_for(&enrolled.name),
                        Priority::High,
                    );
                    self.emit(EngineEvent::EnrollmentCompleted {
                        at: Utc::now(),
                        person_id: enrolled.person_id,
                        name: enrolled.name,
                        samples: enrolled.samples,
                    });
                }
                Err(err) => {
                    // The session stays active; commit retries next frame.
                    warn!(error = %err, "enrollment commit failed");
                    self.say(&self.cfg.phrases.enroll_retry, Priority::High);
                }
            },
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "sample capture failed");
                self.say(&self.cfg.phrases.enroll_retry, Priority::Normal);
            }
        }
    }

    fn handle_utterance(&self, text: &str) {
        let now = Instant::now();
        debug!(text = %text, "heard");

        let mut registrar = self.registrar.lock();
        let awaiting = registrar
            .active()
            .is_some_and(|e| e.state == EnrollState::AwaitingName);
        if awaiting {
            let session_id = registrar
                .active()
                .map(|e| e.session_id.clone())
                .unwrap_or_default();
            match registrar.hear(text, now) {
                Ok(HeardName::Accepted(name)) => {
                    self.say(self.cfg.phrases.capture_started_for(&name), Priority::High);
                    self.emit(EngineEvent::EnrollmentNamed {
                        at: Utc::now(),
                        session_id,
                        name,
                    });
                }
                Ok(HeardName::Unclear) => {
                    self.say(&self.cfg.phrases.name_retry, Priority::High);
                }
                Err(err) => warn!(error = %err, "name routing failed"),
            }
            return;
        }
        drop(registrar);

        if let Some(reply) = self.responder.respond(text) {
            self.say(reply, Priority::High);
        }
    }

    /// Offers a still-here line when someone is present but nothing has
    /// been said for the idle window.
    fn check_idle(&self, now: Instant) {
        if self.presence.lock().current_identity().is_none() {
            return;
        }
        let mut last = self.last_spoken.lock();
        if now.duration_since(*last) > self.cfg.idle_checkin && !self.dispatcher.is_busy() {
            *last = now;
            self.dispatcher
                .enqueue(&self.cfg.phrases.idle_checkin, Priority::Normal);
        }
    }

    fn say(&self, text: impl Into<String>, priority: Priority) {
        *self.last_spoken.lock() = Instant::now();
        self.dispatcher.enqueue(text, priority);
    }

    fn speak_now(&self, text: &str) {
        *self.last_spoken.lock() = Instant::now();
        self.dispatcher.speak_now(text);
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}
