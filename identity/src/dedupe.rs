use lobby_faces::{Detection, center_distance};

use crate::resolver::MatchResult;

/// One detection paired with its resolution.
#[derive(Debug, Clone)]
pub struct ResolvedFace {
    pub detection: Detection,
    pub matched: MatchResult,
}

/// Collapses detections in one frame that refer to the same physical face.
///
/// Known faces sharing a person id keep only the highest-confidence
/// detection; a person cannot appear twice as themselves in one frame.
/// Unknown faces count as duplicates only when their box centers are closer
/// than `min_separation_px`, keeping the higher confidence; a detector that
/// split one face into overlapping boxes must not produce two strangers.
///
/// Idempotent: running it again on its own output changes nothing.
pub fn dedupe(faces: Vec<ResolvedFace>, min_separation_px: f32) -> Vec<ResolvedFace> {
    if faces.len() <= 1 {
        return faces;
    }

    let mut known: Vec<ResolvedFace> = Vec::new();
    let mut unknown: Vec<ResolvedFace> = Vec::new();

    for face in faces {
        let person_id = face.matched.identity.as_ref().map(|m| m.person_id.clone());
        match person_id {
            Some(person_id) => {
                let existing = known.iter_mut().find(|f| {
                    f.matched
                        .identity
                        .as_ref()
                        .is_some_and(|m| m.person_id == person_id)
                });
                match existing {
                    Some(existing) => {
                        if face.matched.confidence > existing.matched.confidence {
                            *existing = face;
                        }
                    }
                    None => known.push(face),
                }
            }
            None => {
                let center = face.detection.bbox.center();
                let existing = unknown.iter_mut().find(|f| {
                    center_distance(f.detection.bbox.center(), center) < min_separation_px
                });
                match existing {
                    Some(existing) => {
                        if face.matched.confidence > existing.matched.confidence {
                            *existing = face;
                        }
                    }
                    None => unknown.push(face),
                }
            }
        }
    }

    known.append(&mut unknown);
    known
}
