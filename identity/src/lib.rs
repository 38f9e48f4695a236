//! Identity resolution over face embeddings.
//!
//! [`Resolver`] turns one observed embedding into a [`MatchResult`] using a
//! four-part acceptance policy: distance tolerance, confidence floor,
//! distinct-person margin, and (optionally) an existence check against
//! backing storage. [`dedupe`] collapses detections within one frame that
//! refer to the same physical face.
//!
//! Ambiguity is not an error here: a rejected or ambiguous match is an
//! ordinary unknown result.

mod dedupe;
mod resolver;

pub use dedupe::{ResolvedFace, dedupe};
pub use resolver::{MatchResult, MatchedIdentity, Resolver, ResolverConfig};
