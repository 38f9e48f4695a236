//! Frame-to-frame presence tracking.
//!
//! [`PresenceTracker`] turns per-frame match results into a stable belief
//! about who is in front of the camera. It decides when a new person has
//! genuinely arrived (as opposed to recognition noise), emits greet and
//! enrollment side effects as data, and remembers who has already been
//! greeted this session.
//!
//! The tracker performs no I/O and takes explicit timestamps, so every
//! decision is deterministic and testable without a clock.

mod tracker;

pub use tracker::{PresenceConfig, PresenceEvent, PresenceTracker};
