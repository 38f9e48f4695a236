use chrono::{DateTime, Utc};
use lobby_faces::BoundingBox;
use serde::Serialize;

/// One resolved face in the frame, for overlay drawing.
#[derive(Debug, Clone, Serialize)]
pub struct FaceOverlay {
    pub bbox: BoundingBox,
    /// Display name for known faces, `None` for strangers.
    pub name: Option<String>,
    pub confidence: f32,
}

/// Structured telemetry record emitted on the engine's broadcast channel.
/// These feed UI layers and logs; they are data, not prints.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    Frame {
        at: DateTime<Utc>,
        faces: Vec<FaceOverlay>,
    },
    Greeted {
        at: DateTime<Utc>,
        person_id: String,
        name: String,
        confidence: f32,
    },
    EnrollmentStarted {
        at: DateTime<Utc>,
        session_id: String,
    },
    EnrollmentNamed {
        at: DateTime<Utc>,
        session_id: String,
        name: String,
    },
    EnrollmentProgress {
        at: DateTime<Utc>,
        session_id: String,
        taken: u32,
        target: u32,
    },
    EnrollmentCompleted {
        at: DateTime<Utc>,
        person_id: String,
        name: String,
        samples: usize,
    },
    EnrollmentCancelled {
        at: DateTime<Utc>,
        session_id: String,
        reason: String,
    },
}
