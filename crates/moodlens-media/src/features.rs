//! Scalar summaries of the eyes and smiles found inside one face.

use moodlens_models::Rect;

/// Geometry the emotion rules look at.
///
/// Eye statistics are taken over the first two eyes in detector order; the
/// detector may report more, which only shows up in `eye_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFeatures {
    pub face_width: f64,
    pub face_height: f64,
    pub eye_count: usize,
    pub smile_count: usize,
    /// Mean vertical center of the first two eyes, relative to the face top
    pub avg_eye_center_y: Option<f64>,
    /// Mean height of the first two eyes
    pub avg_eye_height: Option<f64>,
    /// Widest smile divided by face width
    pub smile_width_ratio: Option<f64>,
}

impl FaceFeatures {
    /// Aggregate detector output for one face.
    pub fn from_regions(face_width: u32, face_height: u32, eyes: &[Rect], smiles: &[Rect]) -> Self {
        let (avg_eye_center_y, avg_eye_height) = if eyes.len() >= 2 {
            let pair = &eyes[..2];
            let center = pair.iter().map(Rect::center_y).sum::<f64>() / 2.0;
            let height = pair.iter().map(|e| e.height as f64).sum::<f64>() / 2.0;
            (Some(center), Some(height))
        } else {
            (None, None)
        };

        let smile_width_ratio = if face_width > 0 {
            smiles
                .iter()
                .map(|s| s.width)
                .max()
                .map(|w| w as f64 / face_width as f64)
        } else {
            None
        };

        Self {
            face_width: face_width as f64,
            face_height: face_height as f64,
            eye_count: eyes.len(),
            smile_count: smiles.len(),
            avg_eye_center_y,
            avg_eye_height,
            smile_width_ratio,
        }
    }

    /// Face height over width; 1.0 for degenerate faces.
    pub fn aspect_ratio(&self) -> f64 {
        if self.face_width > 0.0 {
            self.face_height / self.face_width
        } else {
            1.0
        }
    }

    pub fn has_smile(&self) -> bool {
        self.smile_count > 0
    }
}
