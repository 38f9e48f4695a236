//! Spoken enrollment of unrecognized visitors.
//!
//! [`Registrar`] drives at most one [`Enrollment`] at a time through
//! `AwaitingName -> CapturingFaces -> Completed`, with `Cancelled` reachable
//! from any non-terminal state (timeout, a returning known person, or an
//! explicit abort). Captured samples are staged through the identity store
//! and only committed on completion, so a cancelled session leaves nothing
//! behind.
//!
//! The registrar is a plain state machine: it takes explicit timestamps and
//! performs no waiting of its own. The camera loop and the voice loop both
//! feed it, so callers serialize access behind one lock.

mod names;
mod session;

pub use names::extract_name;
pub use session::{
    CaptureOutcome, EnrollConfig, EnrollError, EnrollState, Enrolled, Enrollment, HeardName,
    Registrar, short_id,
};
