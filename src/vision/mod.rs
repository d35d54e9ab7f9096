//! Vision collaborators: frame acquisition and pose classification
//!
//! The counting core never touches OpenCV. It sees frames only through the
//! [`FrameSource`] trait and labels only through the [`Classifier`] trait, so
//! tests can drive the whole pipeline with scripted stand-ins.
//!
//! Note: All trait methods take &self (not &mut self) to support Arc<dyn ...>.
//! Implementations use interior mutability for their device/model handles.

pub mod camera;
pub mod model;

use async_trait::async_trait;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use thiserror::Error;

use crate::counter::PoseLabel;

pub use camera::{probe_cameras, CameraSource};
pub use model::SvmClassifier;

/// A single camera frame (BGR or grayscale).
pub type Frame = Mat;

/// Frame acquisition errors. All of these are recoverable mid-run: the
/// controller logs and skips the tick.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device {0} unavailable")]
    Unavailable(i32),
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
    #[error("camera backend error: {0}")]
    Backend(#[from] opencv::Error),
}

/// Classifier errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model has been trained or loaded yet.
    #[error("no trained model available")]
    NotTrained,
    /// Training requires at least one sample of every class.
    #[error("training set has no {0} samples")]
    EmptyClass(&'static str),
    #[error("training failed: {0}")]
    Train(String),
    #[error("model backend error: {0}")]
    Backend(#[from] opencv::Error),
    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces one frame per poll.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Source name for logs (e.g. "camera0").
    fn name(&self) -> &str;

    /// Grab a single frame.
    async fn grab(&self) -> Result<Frame, CameraError>;
}

/// Maps a single frame to a pose label.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one frame. Pure from the caller's perspective. Takes the
    /// frame by value; a `Mat` is a cheap refcounted handle.
    async fn predict(&self, frame: Frame) -> Result<PoseLabel, ModelError>;

    /// Fit the model from a loaded training set and persist it.
    async fn train(&self, dataset: &TrainingSet) -> Result<TrainReport, ModelError>;

    /// Whether a trained model is available.
    fn is_ready(&self) -> bool;
}

/// Flattened training data as loaded from the sample store.
///
/// Each feature row is one sample image, preprocessed with the same pipeline
/// used at predict time; responses carry the matching class ids.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    /// One row of normalized pixel values per sample.
    pub features: Vec<Vec<f32>>,
    /// Class id (1 = extended, 2 = contracted) per sample.
    pub responses: Vec<i32>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of samples carrying the given label.
    pub fn count(&self, label: PoseLabel) -> usize {
        match label.class_id() {
            Some(id) => self.responses.iter().filter(|&&r| r == id).count(),
            None => 0,
        }
    }

    /// Length of a feature row, 0 when empty.
    pub fn feature_len(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub extended: usize,
    pub contracted: usize,
    pub feature_len: usize,
}

impl std::fmt::Display for TrainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} extended + {} contracted samples, {} features",
            self.extended, self.contracted, self.feature_len
        )
    }
}

/// Reduce a frame to the square grayscale thumbnail the model operates on.
///
/// Capture and prediction share this path so that stored samples and live
/// frames always go through identical preprocessing.
pub(crate) fn gray_thumbnail(frame: &Frame, side: u32) -> Result<Mat, opencv::Error> {
    let gray = if frame.channels() > 1 {
        let mut gray = Mat::default();
        imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        gray
    } else {
        frame.clone()
    };

    let mut thumb = Mat::default();
    imgproc::resize(
        &gray,
        &mut thumb,
        Size::new(side as i32, side as i32),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    Ok(thumb)
}

/// Flatten a grayscale thumbnail into a normalized f32 feature row.
pub(crate) fn feature_row(thumb: &Mat) -> Result<Vec<f32>, opencv::Error> {
    let bytes = thumb.data_bytes()?;
    Ok(bytes.iter().map(|&b| f32::from(b) / 255.0).collect())
}
