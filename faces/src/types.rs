use serde::{Deserialize, Serialize};

/// Fixed-length numeric vector representing one face, produced by an
/// external embedding model. Compared by distance, never by equality.
pub type Embedding = Vec<f32>;

/// Axis-aligned face region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) as f32 / 2.0,
            (self.top + self.bottom) as f32 / 2.0,
        )
    }
}

/// One observed face in one frame. Ephemeral: owned by the per-frame
/// pipeline and discarded after resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// One stored face sample of a known person. A person usually has several
/// records, one per enrollment sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub person_id: String,
    pub name: String,
    pub embedding: Embedding,
}
