//! The receptionist engine.
//!
//! [`Receptionist`] wires the identity resolver, presence tracker,
//! enrollment registrar, responder, and speech dispatcher into two loops:
//!
//! - the frame loop consumes a [`FaceSensor`] and runs, strictly in order,
//!   resolution -> dedup -> presence/enrollment transitions for each frame;
//! - the voice loop consumes a [`Listener`] and routes recognized text to
//!   the active enrollment or the responder.
//!
//! Both loops stop on one cancellation token; shutdown speaks a goodbye
//! and gives the dispatcher a bounded chance to drain. Observers subscribe
//! to [`EngineEvent`] telemetry records for overlays and status displays.

mod events;
mod phrases;
mod receptionist;
mod sensor;

pub use events::{EngineEvent, FaceOverlay};
pub use phrases::Phrases;
pub use receptionist::{EngineConfig, Receptionist};
pub use sensor::{FaceSensor, FrameObservation, SensorError};
