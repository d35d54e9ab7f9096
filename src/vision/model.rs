//! Trainable pose classifier
//!
//! A support vector machine with a linear kernel over flattened grayscale
//! thumbnails: one feature per pixel, one class per arm pose. The model is
//! serialized with OpenCV's own format and reloaded on startup, so a trained
//! classifier survives restarts.

use async_trait::async_trait;
use opencv::core::Mat;
use opencv::ml;
use opencv::prelude::*;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{info, warn};

use super::{feature_row, gray_thumbnail, Classifier, Frame, ModelError, TrainReport, TrainingSet};
use crate::config::ClassifierConfig;
use crate::counter::PoseLabel;

/// Linear-kernel SVM pose classifier with on-disk persistence.
pub struct SvmClassifier {
    model_path: String,
    sample_size: u32,
    model: Mutex<Option<opencv::core::Ptr<ml::SVM>>>,
}

impl SvmClassifier {
    /// Create the classifier, loading a previously trained model if one
    /// exists at the configured path. A model that fails to load is treated
    /// as absent; training writes a fresh one.
    pub fn new(config: &ClassifierConfig) -> Self {
        let model = if Path::new(&config.model_path).exists() {
            match ml::SVM::load(&config.model_path) {
                Ok(model) => {
                    info!("✅ Loaded trained model from {}", config.model_path);
                    Some(model)
                }
                Err(e) => {
                    warn!(
                        "⚠️  Failed to load model from {}: {} (train to replace it)",
                        config.model_path, e
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            model_path: config.model_path.clone(),
            sample_size: config.sample_size,
            model: Mutex::new(model),
        }
    }

    fn features_for(&self, frame: &Frame) -> Result<Vec<f32>, ModelError> {
        let thumb = gray_thumbnail(frame, self.sample_size)?;
        Ok(feature_row(&thumb)?)
    }
}

#[async_trait]
impl Classifier for SvmClassifier {
    async fn predict(&self, frame: Frame) -> Result<PoseLabel, ModelError> {
        let row = self.features_for(&frame)?;
        let sample = Mat::from_slice_2d(&[row])?;

        let guard = self.model.lock();
        let svm = guard.as_ref().ok_or(ModelError::NotTrained)?;

        let mut results = Mat::default();
        let response = svm.predict(&sample, &mut results, 0)?;
        Ok(PoseLabel::from_class_id(response.round() as i32))
    }

    async fn train(&self, dataset: &TrainingSet) -> Result<TrainReport, ModelError> {
        let extended = dataset.count(PoseLabel::Extended);
        let contracted = dataset.count(PoseLabel::Contracted);
        if extended == 0 {
            return Err(ModelError::EmptyClass("extended"));
        }
        if contracted == 0 {
            return Err(ModelError::EmptyClass("contracted"));
        }

        let samples = Mat::from_slice_2d(&dataset.features)?;
        let response_rows: Vec<Vec<i32>> = dataset.responses.iter().map(|&r| vec![r]).collect();
        let responses = Mat::from_slice_2d(&response_rows)?;

        let mut svm = ml::SVM::create()?;
        svm.set_type(ml::SVM_Types::C_SVC as i32)?;
        svm.set_kernel(ml::SVM_KernelTypes::LINEAR as i32)?;
        if !svm.train(&samples, ml::ROW_SAMPLE, &responses)? {
            return Err(ModelError::Train(
                "backend rejected the training set".to_string(),
            ));
        }
        svm.save(&self.model_path)?;

        info!(
            "✅ Model trained ({} extended, {} contracted) and saved to {}",
            extended, contracted, self.model_path
        );

        *self.model.lock() = Some(svm);

        Ok(TrainReport {
            extended,
            contracted,
            feature_len: dataset.feature_len(),
        })
    }

    fn is_ready(&self) -> bool {
        self.model.lock().is_some()
    }
}
