//! Per-image pipeline: faces, then eyes and smiles inside each face, then a
//! label per face.

use image::{imageops, DynamicImage, GrayImage, RgbImage};
use metrics::{counter, histogram};
use moodlens_models::{FaceResult, RegionKind, Taxonomy};
use std::time::Instant;
use tracing::debug;

use crate::classifier::EmotionClassifier;
use crate::detection::CascadeSet;
use crate::error::MediaResult;

/// Loaded detectors plus the rule set. Immutable once built; share it behind
/// an `Arc`.
#[derive(Debug, Clone)]
pub struct FaceAnalyzer {
    cascades: CascadeSet,
    classifier: EmotionClassifier,
}

impl FaceAnalyzer {
    pub fn new(cascades: CascadeSet, classifier: EmotionClassifier) -> Self {
        Self {
            cascades,
            classifier,
        }
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.classifier.taxonomy()
    }

    pub fn classifier(&self) -> &EmotionClassifier {
        &self.classifier
    }

    pub fn cascades(&self) -> &CascadeSet {
        &self.cascades
    }

    /// Analyze a decoded image.
    pub fn analyze(&self, image: &DynamicImage) -> MediaResult<Vec<FaceResult>> {
        self.analyze_gray(&image.to_luma8())
    }

    /// Analyze a raw video frame.
    pub fn analyze_rgb(&self, frame: &RgbImage) -> MediaResult<Vec<FaceResult>> {
        self.analyze_gray(&imageops::grayscale(frame))
    }

    /// Analyze a grayscale image. Faces come back in detector order with
    /// eye and smile rectangles relative to their face.
    pub fn analyze_gray(&self, gray: &GrayImage) -> MediaResult<Vec<FaceResult>> {
        let start = Instant::now();
        let (width, height) = gray.dimensions();

        let faces = self.cascades.detect(RegionKind::Face, gray)?;
        let mut results = Vec::with_capacity(faces.len());

        for face in faces {
            let Some(face) = face.clip_to(width, height) else {
                continue;
            };
            let roi = imageops::crop_imm(gray, face.x, face.y, face.width, face.height).to_image();
            let eyes = self.cascades.detect(RegionKind::Eye, &roi)?;
            let smiles = self.cascades.detect(RegionKind::Smile, &roi)?;
            let emotion = self.classifier.classify(face.width, face.height, &eyes, &smiles);

            debug!(
                face = %face,
                eyes = eyes.len(),
                smiles = smiles.len(),
                emotion = %emotion,
                "Classified face"
            );
            counter!("moodlens_faces_classified_total", "emotion" => emotion.as_str()).increment(1);

            results.push(FaceResult {
                face,
                eyes,
                smiles,
                emotion,
            });
        }

        histogram!("moodlens_analysis_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{RegionDetector, StaticDetector};
    use moodlens_models::{Emotion, Rect};
    use std::sync::Arc;

    fn analyzer(faces: Vec<Rect>, eyes: Vec<Rect>, smiles: Vec<Rect>, taxonomy: Taxonomy) -> FaceAnalyzer {
        let set = CascadeSet::new(
            Arc::new(StaticDetector::new(faces)) as Arc<dyn RegionDetector>,
            Arc::new(StaticDetector::new(eyes)),
            Arc::new(StaticDetector::new(smiles)),
        );
        FaceAnalyzer::new(set, EmotionClassifier::new(taxonomy))
    }

    #[test]
    fn test_no_faces_is_empty_not_error() {
        let a = analyzer(vec![], vec![], vec![], Taxonomy::Basic);
        let out = a.analyze(&DynamicImage::new_rgb8(64, 64)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_face_with_angry_eyes() {
        let a = analyzer(
            vec![Rect::new(20, 20, 200, 200)],
            vec![Rect::new(30, 15, 50, 50), Rect::new(110, 15, 50, 50)],
            vec![],
            Taxonomy::Basic,
        );
        let out = a.analyze(&DynamicImage::new_rgb8(300, 300)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].face, Rect::new(20, 20, 200, 200));
        assert_eq!(out[0].eyes.len(), 2);
        assert_eq!(out[0].emotion, Emotion::Angry);
    }

    #[test]
    fn test_smile_wins() {
        let a = analyzer(
            vec![Rect::new(0, 0, 100, 100)],
            vec![Rect::new(10, 60, 10, 10), Rect::new(50, 60, 10, 10)],
            vec![Rect::new(20, 70, 40, 20)],
            Taxonomy::Basic,
        );
        let out = a.analyze(&DynamicImage::new_rgb8(120, 120)).unwrap();
        assert_eq!(out[0].emotion, Emotion::Happy);
    }

    #[test]
    fn test_faces_outside_image_are_skipped() {
        let a = analyzer(
            vec![Rect::new(500, 500, 50, 50), Rect::new(10, 10, 40, 40)],
            vec![],
            vec![],
            Taxonomy::Extended,
        );
        let out = a.analyze(&DynamicImage::new_rgb8(100, 100)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].emotion, Emotion::Neutral);
        assert_eq!(a.taxonomy(), Taxonomy::Extended);
    }
}
