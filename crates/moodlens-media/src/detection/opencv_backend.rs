//! OpenCV `CascadeClassifier` backend for the stock XML cascades.

use image::GrayImage;
use moodlens_models::Rect;
use opencv::core::{Mat, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;
use std::sync::Mutex;

use super::{DetectParams, RegionDetector};
use crate::error::{MediaError, MediaResult};

/// `detectMultiScale` is `&mut self`, so the classifier sits behind a lock.
pub struct OpenCvCascade {
    name: String,
    classifier: Mutex<CascadeClassifier>,
}

impl OpenCvCascade {
    pub fn from_path(path: &Path) -> MediaResult<Self> {
        let path_str = path.to_string_lossy().into_owned();
        let classifier = CascadeClassifier::new(&path_str).map_err(|e| {
            MediaError::invalid_model(format!("Failed to load cascade {}: {}", path_str, e))
        })?;
        if classifier
            .empty()
            .map_err(|e| MediaError::invalid_model(e.to_string()))?
        {
            return Err(MediaError::invalid_model(format!("Cascade {} is empty", path_str)));
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("cascade")
            .to_string();

        Ok(Self {
            name,
            classifier: Mutex::new(classifier),
        })
    }
}

impl RegionDetector for OpenCvCascade {
    fn detect(&self, image: &GrayImage, params: &DetectParams) -> MediaResult<Vec<Rect>> {
        params.validate()?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::new_rows_cols_with_data(height as i32, width as i32, image.as_raw().as_slice())
            .and_then(|m| m.try_clone())
            .map_err(|e| MediaError::detection_failed(format!("Mat conversion failed: {}", e)))?;

        let max_size = params
            .max_size
            .map(|(w, h)| Size::new(w as i32, h as i32))
            .unwrap_or_default();

        let mut found = Vector::<opencv::core::Rect>::new();
        {
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| MediaError::internal("cascade lock poisoned"))?;
            classifier
                .detect_multi_scale(
                    &mat,
                    &mut found,
                    params.scale_factor,
                    params.min_neighbors as i32,
                    0,
                    Size::new(params.min_size.0 as i32, params.min_size.1 as i32),
                    max_size,
                )
                .map_err(|e| MediaError::detection_failed(format!("detectMultiScale: {}", e)))?;
        }

        Ok(found
            .iter()
            .filter_map(|r| {
                Rect::new(r.x.max(0) as u32, r.y.max(0) as u32, r.width.max(0) as u32, r.height.max(0) as u32)
                    .clip_to(width, height)
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
