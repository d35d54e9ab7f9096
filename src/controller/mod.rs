//! Controller - orchestration of the grab→predict→update pipeline
//!
//! The controller owns the collaborators and drives one pipeline pass per
//! timer tick: ask the frame source for a frame, ask the classifier for a
//! label, feed the label into the rep counter. Collaborator failures are
//! recoverable: the tick is skipped and the loop carries on.


use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::capture::SampleStore;
use crate::config::AppConfig;
use crate::counter::{PoseLabel, RepCounter};
use crate::vision::{Classifier, FrameSource, ModelError, TrainReport};

/// Snapshot of the application state for the REPL `status` command.
#[derive(Debug, Clone)]
pub struct Status {
    pub counting: bool,
    pub reps: u32,
    pub extended_samples: usize,
    pub contracted_samples: usize,
    pub model_ready: bool,
    pub ticks: u64,
    pub session_started: DateTime<Local>,
}

/// Central orchestrator tying camera, classifier, counter, and sample store
/// together.
pub struct Controller {
    camera: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    counter: Arc<RwLock<RepCounter>>,
    samples: SampleStore,
    /// Pipeline passes actually executed (ticks while counting was enabled).
    ticks: AtomicU64,
    /// Ensures the "no trained model" hint is logged once, not every tick.
    untrained_warned: AtomicBool,
    session_started: DateTime<Local>,
}

impl Controller {
    /// Create a controller from configuration and collaborator handles.
    pub fn new(
        config: &AppConfig,
        camera: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let samples = SampleStore::new(&config.capture.data_dir, config.classifier.sample_size);
        let counter = RepCounter::new(config.counting.start_enabled);

        Self {
            camera,
            classifier,
            counter: Arc::new(RwLock::new(counter)),
            samples,
            ticks: AtomicU64::new(0),
            untrained_warned: AtomicBool::new(false),
            session_started: Local::now(),
        }
    }

    /// Run one grab→predict→update pass.
    ///
    /// While counting is disabled the whole pipeline is frozen: no frame is
    /// grabbed and no label is produced. Camera and model failures skip the
    /// tick without touching the counter; only the counter itself decides
    /// when a rep completes.
    pub async fn tick(&self) -> Result<()> {
        if !self.counter.read().await.is_counting() {
            return Ok(());
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let frame = match self.camera.grab().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Skipping tick, {} read failed: {}", self.camera.name(), e);
                return Ok(());
            }
        };

        let label = match self.classifier.predict(frame).await {
            Ok(label) => label,
            Err(ModelError::NotTrained) => {
                if !self.untrained_warned.swap(true, Ordering::Relaxed) {
                    warn!("⚠️  No trained model yet: capture samples of both poses, then run `train`");
                }
                return Ok(());
            }
            Err(e) => {
                debug!("Skipping tick, prediction failed: {}", e);
                return Ok(());
            }
        };

        let mut counter = self.counter.write().await;
        let before = counter.count();
        counter.update(label);
        let after = counter.count();
        drop(counter);

        if after > before {
            info!("💪 Rep {}", after);
        }
        Ok(())
    }

    /// Flip the counting gate. Returns the new state.
    pub async fn toggle_counting(&self) -> bool {
        let mut counter = self.counter.write().await;
        counter.toggle_counting();
        let enabled = counter.is_counting();
        drop(counter);

        info!(
            "Counting {}",
            if enabled { "enabled" } else { "paused" }
        );
        enabled
    }

    /// Zero the rep count (latches keep their state, see [`RepCounter::reset`]).
    pub async fn reset(&self) {
        self.counter.write().await.reset();
        info!("🔄 Rep counter reset");
    }

    /// Current rep count.
    pub async fn count(&self) -> u32 {
        self.counter.read().await.count()
    }

    /// Grab one frame and store it as a training sample for `label`.
    ///
    /// Works independently of the counting gate; capturing poses while
    /// counting is paused is the normal workflow.
    pub async fn capture_sample(&self, label: PoseLabel) -> Result<PathBuf> {
        ensure!(
            label != PoseLabel::Unknown,
            "only extended/contracted samples can be captured"
        );

        let frame = self
            .camera
            .grab()
            .await
            .context("Failed to grab a frame for the sample")?;
        let path = self.samples.save(label, &frame)?;

        info!("📸 Captured {} sample: {}", label, path.display());
        Ok(path)
    }

    /// Train the classifier from the stored samples and persist the model.
    pub async fn train(&self) -> Result<TrainReport> {
        let dataset = self
            .samples
            .load_training_set()
            .context("Failed to load training samples")?;
        let report = self.classifier.train(&dataset).await?;

        // A fresh model may exist now; re-arm the one-shot hint.
        self.untrained_warned.store(false, Ordering::Relaxed);
        Ok(report)
    }

    /// Snapshot for the REPL.
    pub async fn status(&self) -> Status {
        let counter = self.counter.read().await;
        let (extended_samples, contracted_samples) = self.samples.counts();

        Status {
            counting: counter.is_counting(),
            reps: counter.count(),
            extended_samples,
            contracted_samples,
            model_ready: self.classifier.is_ready(),
            ticks: self.ticks.load(Ordering::Relaxed),
            session_started: self.session_started,
        }
    }
}
