use async_trait::async_trait;
use bytes::Bytes;
use lobby_faces::Detection;

/// Error from the camera + embedding pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// Transient per-frame failure; the loop logs it and continues.
    #[error("sensor failure: {0}")]
    Failed(String),

    /// The sensor has no more frames; the engine shuts down.
    #[error("sensor closed")]
    Closed,
}

/// One captured frame with its detected faces. `detections` is empty when
/// no face is visible; that is a normal frame, not an error.
#[derive(Debug, Clone)]
pub struct FrameObservation {
    /// Encoded frame bytes, stored as-is for enrollment samples.
    pub image: Bytes,
    pub detections: Vec<Detection>,
}

/// The camera + face-embedding provider.
///
/// Implementations pace themselves (target frame rate, capture blocking);
/// the engine simply awaits the next frame.
#[async_trait]
pub trait FaceSensor: Send {
    async fn observe(&mut self) -> Result<FrameObservation, SensorError>;
}

#[async_trait]
impl<S: FaceSensor + ?Sized> FaceSensor for Box<S> {
    async fn observe(&mut self) -> Result<FrameObservation, SensorError> {
        (**self).observe().await
    }
}
