use std::collections::HashSet;
use std::time::{Duration, Instant};

use lobby_faces::{Embedding, euclidean_distance};
use lobby_identity::{MatchedIdentity, ResolvedFace};
use tracing::{debug, info};

/// Tuning for presence decisions.
#[derive(Debug, Clone, Copy)]
pub struct PresenceConfig {
    /// Minimum confidence for a known match to drive a greeting.
    pub greet_threshold: f32,

    /// Optional stricter re-check: a known match below this confidence is
    /// treated as unknown when a *different* person is already current.
    /// Borderline matches against an established baseline are more often
    /// misidentification than a genuine new arrival. `None` disables the
    /// override.
    pub recheck_threshold: Option<f32>,

    /// Embedding distance above which a differing match is a real person
    /// change rather than recognition noise.
    pub face_change_threshold: f32,

    /// Minimum wait before prompting an unrecognized person again.
    pub unknown_renotify: Duration,

    /// Without any detection for this long, the session resets: the
    /// current person is forgotten and everyone becomes greetable again.
    pub idle_reset: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            greet_threshold: 0.65,
            recheck_threshold: Some(0.60),
            face_change_threshold: 0.55,
            unknown_renotify: Duration::from_secs(60),
            idle_reset: Duration::from_secs(300),
        }
    }
}

/// Side effect requested by the tracker for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// A known person should be greeted by name, at most once per session.
    Greet {
        person_id: String,
        name: String,
        confidence: f32,
    },
    /// An unrecognized person is present and enrollment should begin.
    UnknownPerson,
}

struct Current {
    /// `None` while an unrecognized person is current.
    identity: Option<MatchedIdentity>,
    embedding: Embedding,
}

enum Observation<'a> {
    Known {
        face: &'a ResolvedFace,
        identity: MatchedIdentity,
        confidence: f32,
    },
    Unknown {
        face: &'a ResolvedFace,
    },
}

/// Tracks who is currently in front of the camera across frames.
///
/// Fed once per frame with the deduplicated match results. A frame with no
/// detections leaves the state untouched: a momentary detector miss (blink,
/// head turn) must not make the kiosk forget who is present and re-trigger
/// enrollment when the face reappears.
pub struct PresenceTracker {
    cfg: PresenceConfig,
    current: Option<Current>,
    last_seen: Option<Instant>,
    greeted: HashSet<String>,
    last_unknown_notify: Option<Instant>,
}

impl PresenceTracker {
    pub fn new(cfg: PresenceConfig) -> Self {
        Self {
            cfg,
            current: None,
            last_seen: None,
            greeted: HashSet::new(),
            last_unknown_notify: None,
        }
    }

    /// The known person currently believed present, if any.
    pub fn current_identity(&self) -> Option<&MatchedIdentity> {
        self.current.as_ref().and_then(|c| c.identity.as_ref())
    }

    /// Ingests one frame's faces and returns the side effects to perform.
    pub fn observe(&mut self, faces: &[ResolvedFace], now: Instant) -> Vec<PresenceEvent> {
        if let Some(last) = self.last_seen {
            if now.duration_since(last) > self.cfg.idle_reset {
                info!("presence idle, starting a fresh session");
                self.reset();
            }
        }
        if faces.is_empty() {
            return Vec::new();
        }
        self.last_seen = Some(now);

        let mut events = Vec::new();
        match self.classify(faces) {
            Observation::Known {
                face,
                identity,
                confidence,
            } => {
                if self.is_person_change(Some(&identity), &face.detection.embedding) {
                    debug!(person_id = %identity.person_id, confidence, "new person in frame");
                    self.current = Some(Current {
                        identity: Some(identity.clone()),
                        embedding: face.detection.embedding.clone(),
                    });
                } else if let Some(current) = &mut self.current {
                    // Same person: track their latest embedding so change
                    // detection follows pose and lighting drift.
                    if current
                        .identity
                        .as_ref()
                        .is_some_and(|c| c.person_id == identity.person_id)
                    {
                        current.embedding = face.detection.embedding.clone();
                    }
                }

                if confidence >= self.cfg.greet_threshold
                    && self.greeted.insert(identity.person_id.clone())
                {
                    events.push(PresenceEvent::Greet {
                        person_id: identity.person_id,
                        name: identity.name,
                        confidence,
                    });
                }
            }
            Observation::Unknown { face } => {
                if self.is_person_change(None, &face.detection.embedding) {
                    debug!("unfamiliar face in frame");
                    self.current = Some(Current {
                        identity: None,
                        embedding: face.detection.embedding.clone(),
                    });
                }
                let current_is_unknown =
                    self.current.as_ref().is_some_and(|c| c.identity.is_none());
                if current_is_unknown {
                    let due = self
                        .last_unknown_notify
                        .is_none_or(|t| now.duration_since(t) > self.cfg.unknown_renotify);
                    if due {
                        self.last_unknown_notify = Some(now);
                        events.push(PresenceEvent::UnknownPerson);
                    }
                }
            }
        }
        events
    }

    /// Records a freshly enrolled person as current and already greeted:
    /// someone just welcomed by name is not greeted again.
    pub fn note_enrolled(&mut self, person_id: &str, name: &str, embedding: Embedding) {
        self.current = Some(Current {
            identity: Some(MatchedIdentity {
                person_id: person_id.to_string(),
                name: name.to_string(),
            }),
            embedding,
        });
        self.greeted.insert(person_id.to_string());
        self.last_unknown_notify = None;
    }

    /// Clears the session: forgets the current person and the greeted set.
    pub fn reset(&mut self) {
        self.current = None;
        self.last_seen = None;
        self.greeted.clear();
        self.last_unknown_notify = None;
    }

    /// Picks this frame's best face: a known match wins over any unknown
    /// detection, unless the low-confidence override demotes it.
    fn classify<'a>(&self, faces: &'a [ResolvedFace]) -> Observation<'a> {
        let best_known = faces
            .iter()
            .filter_map(|f| {
                f.matched
                    .identity
                    .as_ref()
                    .map(|identity| (f, identity, f.matched.confidence))
            })
            .max_by(|a, b| a.2.total_cmp(&b.2));

        if let Some((face, identity, confidence)) = best_known {
            let demote = match (self.cfg.recheck_threshold, &self.current) {
                (Some(recheck), Some(current)) => {
                    confidence < recheck
                        && current
                            .identity
                            .as_ref()
                            .is_some_and(|c| c.person_id != identity.person_id)
                }
                _ => false,
            };
            if !demote {
                return Observation::Known {
                    face,
                    identity: identity.clone(),
                    confidence,
                };
            }
            debug!(confidence, "demoting borderline match to unknown");
            return Observation::Unknown { face };
        }

        let face = faces
            .iter()
            .max_by(|a, b| a.matched.confidence.total_cmp(&b.matched.confidence))
            .unwrap_or(&faces[0]);
        Observation::Unknown { face }
    }

    /// A first observation always establishes the current person. After
    /// that, a change needs both a differing identity and an embedding
    /// distance beyond the change threshold; the same person id is never
    /// a change, whatever the distance.
    fn is_person_change(
        &self,
        new_identity: Option<&MatchedIdentity>,
        embedding: &Embedding,
    ) -> bool {
        let Some(current) = &self.current else {
            return true;
        };
        let same_id = match (&current.identity, new_identity) {
            (Some(cur), Some(new)) => cur.person_id == new.person_id,
            (None, None) => true,
            _ => false,
        };
        if same_id {
            return false;
        }
        euclidean_distance(embedding, &current.embedding) > self.cfg.face_change_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_faces::{BoundingBox, Detection};
    use lobby_identity::MatchResult;

    fn face(matched: MatchResult, embedding: Embedding) -> ResolvedFace {
        ResolvedFace {
            detection: Detection {
                bbox: BoundingBox {
                    top: 0,
                    right: 100,
                    bottom: 100,
                    left: 0,
                },
                embedding,
            },
            matched,
        }
    }

    fn known(person_id: &str, confidence: f32, embedding: Embedding) -> ResolvedFace {
        face(
            MatchResult {
                identity: Some(MatchedIdentity {
                    person_id: person_id.into(),
                    name: person_id.to_uppercase(),
                }),
                confidence,
                distance: 1.0 - confidence,
            },
            embedding,
        )
    }

    fn unknown(embedding: Embedding) -> ResolvedFace {
        face(MatchResult::unknown(0.8), embedding)
    }

    fn greets(events: &[PresenceEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                PresenceEvent::Greet { person_id, .. } => Some(person_id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_known_person_is_greeted_once() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();

        let events = tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);
        assert_eq!(greets(&events), vec!["alice"]);

        // Many more frames of the same person: never re-greeted.
        for i in 1..20 {
            let events = tracker.observe(
                &[known("alice", 0.9, vec![1.0, 0.0])],
                t0 + Duration::from_millis(100 * i),
            );
            assert!(greets(&events).is_empty(), "frame {i} re-greeted");
        }
    }

    #[test]
    fn empty_frame_keeps_current_person() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();

        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);
        tracker.observe(&[], t0 + Duration::from_secs(1));
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("alice"),
            "a detector miss must not forget the person"
        );

        // And the reappearing face is not greeted again.
        let events = tracker.observe(
            &[known("alice", 0.9, vec![1.0, 0.0])],
            t0 + Duration::from_secs(2),
        );
        assert!(greets(&events).is_empty());
    }

    #[test]
    fn below_greet_threshold_updates_current_without_greeting() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();

        let events = tracker.observe(&[known("alice", 0.62, vec![1.0, 0.0])], t0);
        assert!(greets(&events).is_empty());
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("alice")
        );

        // Confidence recovers on a later frame: greet fires then.
        let events = tracker.observe(
            &[known("alice", 0.80, vec![1.0, 0.0])],
            t0 + Duration::from_millis(200),
        );
        assert_eq!(greets(&events), vec!["alice"]);
    }

    #[test]
    fn person_change_needs_distance() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();
        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);

        // Bob matched, but embedding is too close to Alice's: noise. The
        // confident match still greets Bob, but Alice stays current.
        let events = tracker.observe(
            &[known("bob", 0.9, vec![1.2, 0.0])],
            t0 + Duration::from_millis(100),
        );
        assert_eq!(greets(&events), vec!["bob"]);
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("alice"),
            "sub-threshold distance must not change the current person"
        );

        // A genuinely distant embedding does change it.
        let events = tracker.observe(
            &[known("bob", 0.9, vec![3.0, 0.0])],
            t0 + Duration::from_millis(200),
        );
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("bob")
        );
        assert!(greets(&events).is_empty(), "bob was already greeted");
    }

    #[test]
    fn unknown_person_triggers_enrollment_with_renotify_window() {
        let cfg = PresenceConfig {
            unknown_renotify: Duration::from_secs(60),
            ..PresenceConfig::default()
        };
        let mut tracker = PresenceTracker::new(cfg);
        let t0 = Instant::now();

        let events = tracker.observe(&[unknown(vec![5.0, 5.0])], t0);
        assert_eq!(events, vec![PresenceEvent::UnknownPerson]);

        // Still there a second later: inside the window, no re-prompt.
        let events = tracker.observe(&[unknown(vec![5.0, 5.0])], t0 + Duration::from_secs(1));
        assert!(events.is_empty());

        // Past the window: prompt again.
        let events = tracker.observe(&[unknown(vec![5.0, 5.0])], t0 + Duration::from_secs(61));
        assert_eq!(events, vec![PresenceEvent::UnknownPerson]);
    }

    #[test]
    fn low_confidence_override_demotes_borderline_match() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();
        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);

        // Bob at 0.58 (< 0.60 re-check) while Alice is current, far enough
        // to pass the change gate: demoted to unknown instead of trusted.
        let events = tracker.observe(
            &[known("bob", 0.58, vec![3.0, 0.0])],
            t0 + Duration::from_millis(100),
        );
        assert!(greets(&events).is_empty());
        assert_eq!(events, vec![PresenceEvent::UnknownPerson]);
        assert!(
            tracker.current_identity().is_none(),
            "demoted observation takes over as an unknown current"
        );
    }

    #[test]
    fn low_confidence_override_can_be_disabled() {
        let cfg = PresenceConfig {
            recheck_threshold: None,
            greet_threshold: 0.55,
            ..PresenceConfig::default()
        };
        let mut tracker = PresenceTracker::new(cfg);
        let t0 = Instant::now();
        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);

        let events = tracker.observe(
            &[known("bob", 0.58, vec![3.0, 0.0])],
            t0 + Duration::from_millis(100),
        );
        assert_eq!(greets(&events), vec!["bob"]);
    }

    #[test]
    fn override_never_applies_to_same_person() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();
        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);

        // Alice herself at low confidence stays Alice.
        tracker.observe(
            &[known("alice", 0.58, vec![1.0, 0.0])],
            t0 + Duration::from_millis(100),
        );
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("alice")
        );
    }

    #[test]
    fn known_face_beats_unknown_in_same_frame() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let events = tracker.observe(
            &[unknown(vec![5.0, 5.0]), known("alice", 0.9, vec![1.0, 0.0])],
            Instant::now(),
        );
        assert_eq!(greets(&events), vec!["alice"]);
    }

    #[test]
    fn idle_reset_allows_regreeting() {
        let cfg = PresenceConfig {
            idle_reset: Duration::from_secs(300),
            ..PresenceConfig::default()
        };
        let mut tracker = PresenceTracker::new(cfg);
        let t0 = Instant::now();

        let events = tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);
        assert_eq!(greets(&events), vec!["alice"]);

        // Alice returns after a long absence: new session, new greeting.
        let events = tracker.observe(
            &[known("alice", 0.9, vec![1.0, 0.0])],
            t0 + Duration::from_secs(301),
        );
        assert_eq!(greets(&events), vec!["alice"]);
    }

    #[test]
    fn reset_clears_greeted_set() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();
        tracker.observe(&[known("alice", 0.9, vec![1.0, 0.0])], t0);

        tracker.reset();
        let events = tracker.observe(
            &[known("alice", 0.9, vec![1.0, 0.0])],
            t0 + Duration::from_secs(1),
        );
        assert_eq!(greets(&events), vec!["alice"]);
    }

    #[test]
    fn note_enrolled_prevents_immediate_regreet() {
        let mut tracker = PresenceTracker::new(PresenceConfig::default());
        let t0 = Instant::now();
        tracker.observe(&[unknown(vec![5.0, 5.0])], t0);

        tracker.note_enrolled("p-new", "Carol", vec![5.0, 5.0]);
        let events = tracker.observe(
            &[known("p-new", 0.9, vec![5.0, 5.0])],
            t0 + Duration::from_secs(1),
        );
        assert!(events.is_empty(), "just-enrolled person is not re-greeted");
        assert_eq!(
            tracker.current_identity().map(|m| m.person_id.as_str()),
            Some("p-new")
        );
    }
}
