use std::sync::Arc;

use lobby_faces::{Embedding, IdentityStore, euclidean_distance};
use tracing::debug;

/// Runner-up distance used when fewer than two distinct people are stored.
const DEFAULT_SECOND_DISTANCE: f32 = 1.0;

/// Acceptance policy for a single embedding match.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// Maximum distance for a candidate to be considered at all.
    pub tolerance: f32,

    /// Minimum `1 - distance` confidence for acceptance.
    pub min_confidence: f32,

    /// Minimum gap between the best distance and the best distance to any
    /// *other* person. Rejects ambiguous near-ties between two stored
    /// people who look alike.
    pub margin: f32,

    /// Treat a candidate whose backing storage is gone as unknown, even if
    /// its records linger in a cache.
    pub strict_existence: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.50,
            min_confidence: 0.55,
            margin: 0.06,
            strict_existence: true,
        }
    }
}

/// The person a match resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedIdentity {
    pub person_id: String,
    pub name: String,
}

/// Result of resolving one observed embedding.
///
/// `identity` is `None` for an unknown face. `confidence` is
/// `max(0, 1 - distance)` for accepted matches and 0 otherwise; `distance`
/// is the best distance observed either way (`f32::INFINITY` when nothing
/// is stored).
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub identity: Option<MatchedIdentity>,
    pub confidence: f32,
    pub distance: f32,
}

impl MatchResult {
    /// An unknown face at the given best distance.
    pub fn unknown(distance: f32) -> Self {
        Self {
            identity: None,
            confidence: 0.0,
            distance,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_some()
    }
}

/// Decides whether one observed embedding belongs to a known person.
///
/// The distance tolerance alone is not enough: a mediocre distance to the
/// only stored candidate can pass while being wrong, and two stored people
/// who look alike can both pass. The confidence floor catches the former,
/// the margin gate the latter, and strict mode drops candidates whose
/// storage has been deleted out from under the cache.
pub struct Resolver {
    store: Arc<dyn IdentityStore>,
    cfg: ResolverConfig,
}

impl Resolver {
    pub fn new(store: Arc<dyn IdentityStore>, cfg: ResolverConfig) -> Self {
        Self { store, cfg }
    }

    /// Resolves an embedding against every stored sample.
    pub fn resolve(&self, embedding: &Embedding) -> MatchResult {
        let records = self.store.records();
        if records.is_empty() {
            return MatchResult::unknown(f32::INFINITY);
        }

        let distances: Vec<f32> = records
            .iter()
            .map(|record| euclidean_distance(embedding, &record.embedding))
            .collect();

        // Strict less-than: on an exact tie the first record wins. A
        // near-tie between two people is rejected by the margin gate below.
        let mut best_idx = 0usize;
        let mut best_dist = f32::INFINITY;
        for (i, &d) in distances.iter().enumerate() {
            if d < best_dist {
                best_idx = i;
                best_dist = d;
            }
        }
        let candidate = &records[best_idx];
        let confidence = (1.0 - best_dist).max(0.0);

        let mut second = DEFAULT_SECOND_DISTANCE;
        for (record, &d) in records.iter().zip(&distances) {
            if record.person_id != candidate.person_id && d < second {
                second = d;
            }
        }

        if best_dist > self.cfg.tolerance {
            debug!(distance = best_dist, "match rejected: outside tolerance");
            return MatchResult::unknown(best_dist);
        }
        if confidence < self.cfg.min_confidence {
            debug!(confidence, "match rejected: confidence below floor");
            return MatchResult::unknown(best_dist);
        }
        if second - best_dist < self.cfg.margin {
            debug!(best = best_dist, second, "match rejected: ambiguous near-tie");
            return MatchResult::unknown(best_dist);
        }
        if self.cfg.strict_existence && !self.store.contains(&candidate.person_id) {
            debug!(person_id = %candidate.person_id, "match rejected: identity no longer stored");
            return MatchResult::unknown(best_dist);
        }

        debug!(
            person_id = %candidate.person_id,
            distance = best_dist,
            confidence,
            "match accepted"
        );
        MatchResult {
            identity: Some(MatchedIdentity {
                person_id: candidate.person_id.clone(),
                name: candidate.name.clone(),
            }),
            confidence,
            distance: best_dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_faces::{FaceRecord, FaceStoreError, MemoryStore};

    fn record(person_id: &str, name: &str, embedding: Embedding) -> FaceRecord {
        FaceRecord {
            person_id: person_id.into(),
            name: name.into(),
            embedding,
        }
    }

    fn resolver(records: Vec<FaceRecord>, cfg: ResolverConfig) -> Resolver {
        Resolver::new(Arc::new(MemoryStore::with_records(records)), cfg)
    }

    #[test]
    fn clear_match_accepted() {
        // Probe at distance 0.10 from Alice, 0.40 from Bob: margin 0.30.
        let r = resolver(
            vec![
                record("alice", "Alice", vec![0.10, 0.0]),
                record("bob", "Bob", vec![0.40, 0.0]),
            ],
            ResolverConfig::default(),
        );

        let result = r.resolve(&vec![0.0, 0.0]);
        let identity = result.identity.expect("should match Alice");
        assert_eq!(identity.person_id, "alice");
        assert!((result.confidence - 0.90).abs() < 0.001, "got {}", result.confidence);
        assert!((result.distance - 0.10).abs() < 0.001);
    }

    #[test]
    fn near_tie_rejected_by_margin() {
        // Two stored people at 0.45 and 0.48: both inside tolerance, but
        // the 0.03 margin is ambiguous.
        let r = resolver(
            vec![
                record("alice", "Alice", vec![0.45, 0.0]),
                record("bob", "Bob", vec![0.48, 0.0]),
            ],
            ResolverConfig::default(),
        );

        let result = r.resolve(&vec![0.0, 0.0]);
        assert!(!result.is_known(), "near-tie must resolve to unknown");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn same_person_samples_do_not_trip_margin() {
        // Two samples of the same person close together: the margin only
        // measures against *other* people.
        let r = resolver(
            vec![
                record("alice", "Alice", vec![0.10, 0.0]),
                record("alice", "Alice", vec![0.12, 0.0]),
            ],
            ResolverConfig::default(),
        );

        let result = r.resolve(&vec![0.0, 0.0]);
        assert_eq!(result.identity.unwrap().person_id, "alice");
    }

    #[test]
    fn same_person_resolves_consistently() {
        let records = vec![
            record("alice", "Alice", vec![0.0, 0.1]),
            record("alice", "Alice", vec![0.05, 0.0]),
            record("bob", "Bob", vec![2.0, 2.0]),
        ];
        let r = resolver(records, ResolverConfig::default());

        // Two different probes of the same person, each passing the gates.
        let first = r.resolve(&vec![0.0, 0.0]).identity.unwrap();
        let second = r.resolve(&vec![0.02, 0.02]).identity.unwrap();
        assert_eq!(first.person_id, second.person_id);
    }

    #[test]
    fn outside_tolerance_rejected() {
        let r = resolver(
            vec![record("alice", "Alice", vec![0.60, 0.0])],
            ResolverConfig::default(),
        );
        assert!(!r.resolve(&vec![0.0, 0.0]).is_known());
    }

    #[test]
    fn low_confidence_rejected() {
        let cfg = ResolverConfig {
            tolerance: 0.50,
            min_confidence: 0.60,
            ..ResolverConfig::default()
        };
        // Distance 0.45 gives confidence 0.55 < 0.60.
        let r = resolver(vec![record("alice", "Alice", vec![0.45, 0.0])], cfg);
        assert!(!r.resolve(&vec![0.0, 0.0]).is_known());
    }

    #[test]
    fn empty_store_is_unknown() {
        let r = resolver(Vec::new(), ResolverConfig::default());
        let result = r.resolve(&vec![0.0, 0.0]);
        assert!(!result.is_known());
        assert_eq!(result.distance, f32::INFINITY);
    }

    #[test]
    fn single_candidate_uses_default_runner_up() {
        // One stored person at 0.30: second defaults to 1.0, margin 0.70.
        let r = resolver(
            vec![record("alice", "Alice", vec![0.30, 0.0])],
            ResolverConfig::default(),
        );
        assert!(r.resolve(&vec![0.0, 0.0]).is_known());
    }

    /// Store whose records linger after the identity itself is gone,
    /// mimicking a stale cache over a deleted directory.
    struct GhostStore {
        records: Vec<FaceRecord>,
    }

    impl IdentityStore for GhostStore {
        fn records(&self) -> Vec<FaceRecord> {
            self.records.clone()
        }
        fn contains(&self, _person_id: &str) -> bool {
            false
        }
        fn stage_sample(
            &self,
            _person_id: &str,
            _image: &[u8],
            _embedding: &Embedding,
        ) -> Result<(), FaceStoreError> {
            Ok(())
        }
        fn commit(&self, person_id: &str, _name: &str) -> Result<usize, FaceStoreError> {
            Err(FaceStoreError::NothingStaged(person_id.into()))
        }
        fn discard(&self, _person_id: &str) -> Result<(), FaceStoreError> {
            Ok(())
        }
        fn remove(&self, _person_id: &str) -> Result<(), FaceStoreError> {
            Ok(())
        }
        fn reload(&self) -> Result<usize, FaceStoreError> {
            Ok(self.records.len())
        }
    }

    #[test]
    fn strict_mode_drops_deleted_identity() {
        let store = Arc::new(GhostStore {
            records: vec![record("alice", "Alice", vec![0.10, 0.0])],
        });
        let strict = Resolver::new(store.clone(), ResolverConfig::default());
        assert!(!strict.resolve(&vec![0.0, 0.0]).is_known());

        let lax = Resolver::new(
            store,
            ResolverConfig {
                strict_existence: false,
                ..ResolverConfig::default()
            },
        );
        assert!(lax.resolve(&vec![0.0, 0.0]).is_known());
    }
}
