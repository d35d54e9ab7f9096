//! Training-sample store
//!
//! Captured frames are kept as numbered grayscale thumbnails in one folder
//! per pose class (`<data_dir>/extended`, `<data_dir>/contracted`). The same
//! folders feed the trainer, so anything dropped in by hand is picked up too.
//!
//! The next file number is derived from the folder contents rather than an
//! in-memory counter, so restarts never overwrite earlier samples.

use anyhow::{bail, Context, Result};
use opencv::core::Vector;
use opencv::imgcodecs;
use opencv::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::counter::PoseLabel;
use crate::vision::{feature_row, gray_thumbnail, Frame, TrainingSet};

/// On-disk store of labeled training frames.
pub struct SampleStore {
    root: PathBuf,
    sample_size: u32,
}

impl SampleStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first save, so constructing the store never touches the filesystem.
    pub fn new(root: impl Into<PathBuf>, sample_size: u32) -> Self {
        Self {
            root: root.into(),
            sample_size,
        }
    }

    fn class_dir(&self, label: PoseLabel) -> Result<PathBuf> {
        if label.class_id().is_none() {
            bail!("cannot store samples for label '{label}'");
        }
        Ok(self.root.join(label.as_str()))
    }

    /// Preprocess and store one frame under the given class.
    ///
    /// Returns the path of the written thumbnail.
    pub fn save(&self, label: PoseLabel, frame: &Frame) -> Result<PathBuf> {
        let dir = self.class_dir(label)?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create sample directory {}", dir.display()))?;

        let thumb = gray_thumbnail(frame, self.sample_size)
            .context("Failed to preprocess frame for storage")?;

        let index = self.count(label) + 1;
        let path = dir.join(format!("frame{index}.jpg"));
        let path_str = path
            .to_str()
            .with_context(|| format!("Non-UTF8 sample path {}", path.display()))?;

        let written = imgcodecs::imwrite(path_str, &thumb, &Vector::new())
            .with_context(|| format!("Failed to encode sample {}", path.display()))?;
        if !written {
            bail!("Image backend refused to write {}", path.display());
        }

        debug!("Stored {} sample #{} at {}", label, index, path.display());
        Ok(path)
    }

    /// Number of stored samples for one class.
    pub fn count(&self, label: PoseLabel) -> usize {
        self.class_dir(label)
            .map(|dir| sample_files(&dir).len())
            .unwrap_or(0)
    }

    /// (extended, contracted) sample counts.
    pub fn counts(&self) -> (usize, usize) {
        (
            self.count(PoseLabel::Extended),
            self.count(PoseLabel::Contracted),
        )
    }

    /// Load every stored sample of both classes as a training set.
    ///
    /// Samples are re-run through the thumbnail pipeline on load; stored
    /// files are already thumbnail-sized, but this also normalizes anything
    /// copied into the folders from elsewhere.
    pub fn load_training_set(&self) -> Result<TrainingSet> {
        let mut set = TrainingSet::default();

        for label in [PoseLabel::Extended, PoseLabel::Contracted] {
            let dir = self.class_dir(label)?;
            for path in sample_files(&dir) {
                let path_str = path
                    .to_str()
                    .with_context(|| format!("Non-UTF8 sample path {}", path.display()))?;
                let image = imgcodecs::imread(path_str, imgcodecs::IMREAD_GRAYSCALE)
                    .with_context(|| format!("Failed to read sample {}", path.display()))?;
                if image.size()?.width == 0 {
                    debug!("Skipping unreadable sample {}", path.display());
                    continue;
                }

                let thumb = gray_thumbnail(&image, self.sample_size)
                    .with_context(|| format!("Failed to preprocess sample {}", path.display()))?;
                set.features.push(feature_row(&thumb)?);
                set.responses
                    .push(label.class_id().expect("storable label has a class id"));
            }
        }

        Ok(set)
    }
}

/// Jpeg files in a class directory, sorted for deterministic ordering.
/// An absent directory simply means no samples yet.
fn sample_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Mat;

    fn test_frame(value: u8) -> Frame {
        let rows = vec![vec![value; 64]; 48];
        Mat::from_slice_2d(&rows).expect("failed to build test frame")
    }

    fn test_store(dir: &Path) -> SampleStore {
        SampleStore::new(dir, 16)
    }

    #[test]
    fn test_save_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        assert_eq!(store.counts(), (0, 0));

        let path = store.save(PoseLabel::Extended, &test_frame(200)).unwrap();
        assert!(path.ends_with("extended/frame1.jpg"));
        assert!(path.exists());

        store.save(PoseLabel::Extended, &test_frame(180)).unwrap();
        store.save(PoseLabel::Contracted, &test_frame(40)).unwrap();

        assert_eq!(store.counts(), (2, 1));
    }

    #[test]
    fn test_numbering_continues_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();

        let path1 = test_store(dir.path())
            .save(PoseLabel::Contracted, &test_frame(10))
            .unwrap();
        // A fresh instance must not start renumbering from 1 again.
        let path2 = test_store(dir.path())
            .save(PoseLabel::Contracted, &test_frame(20))
            .unwrap();

        assert!(path1.ends_with("frame1.jpg"));
        assert!(path2.ends_with("frame2.jpg"));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        assert!(store.save(PoseLabel::Unknown, &test_frame(0)).is_err());
        assert_eq!(store.count(PoseLabel::Unknown), 0);
    }

    #[test]
    fn test_load_training_set_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.save(PoseLabel::Extended, &test_frame(220)).unwrap();
        store.save(PoseLabel::Extended, &test_frame(200)).unwrap();
        store.save(PoseLabel::Contracted, &test_frame(30)).unwrap();

        let set = store.load_training_set().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.count(PoseLabel::Extended), 2);
        assert_eq!(set.count(PoseLabel::Contracted), 1);
        assert_eq!(set.feature_len(), 16 * 16);
        assert!(set
            .features
            .iter()
            .all(|row| row.iter().all(|&v| (0.0..=1.0).contains(&v))));
    }

    #[test]
    fn test_load_training_set_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let set = test_store(dir.path()).load_training_set().unwrap();
        assert!(set.is_empty());
    }
}
