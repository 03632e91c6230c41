//! Rule-based emotion classifier.
//!
//! A single pass over a fixed decision list; the first matching rule wins and
//! nothing is revisited. The classifier never fails: missing signal falls
//! through to [`Emotion::Neutral`].
//!
//! # Basic rule set
//! 1. Two or more eyes: large eyes high in the face read as `angry`,
//!    otherwise eyes low in the face read as `sad`.
//! 2. Any smile overrides the eye-based label with `happy`.
//!
//! # Extended rule set
//! Same shape, with smile width, very large eyes, face aspect ratio and a
//! single detected eye adding `excited`, `surprised`, `fear` and `disgust`.

use moodlens_models::{Emotion, Rect, Taxonomy};
use serde::{Deserialize, Serialize};

use crate::features::FaceFeatures;

/// Fractions of the face size the rules compare against.
///
/// All comparisons are strict: a value exactly at a threshold does not fire
/// the rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    /// Mean eye height above this fraction of face height counts as wide eyes
    pub angry_eye_height: f64,
    /// Mean eye center above (less than) this fraction of face height counts as high eyes
    pub angry_eye_position: f64,
    /// Mean eye center below (greater than) this fraction of face height counts as low eyes
    pub sad_eye_position: f64,
    /// Extended set: mean eye height above this fraction reads as surprise
    pub surprised_eye_height: f64,
    /// Extended set: widest smile above this fraction of face width reads as excitement
    pub excited_smile_width: f64,
    /// Extended set: face height/width above this ratio turns sad into fear
    pub fear_aspect_ratio: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            angry_eye_height: 0.20,
            angry_eye_position: 0.40,
            sad_eye_position: 1.0 / 3.0,
            surprised_eye_height: 0.25,
            excited_smile_width: 0.50,
            fear_aspect_ratio: 1.30,
        }
    }
}

/// Maps face geometry to one label of a taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionClassifier {
    taxonomy: Taxonomy,
    thresholds: RuleThresholds,
}

impl EmotionClassifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            thresholds: RuleThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RuleThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Label one face from its size and the eyes/smiles found inside it
    /// (coordinates relative to the face).
    pub fn classify(&self, face_width: u32, face_height: u32, eyes: &[Rect], smiles: &[Rect]) -> Emotion {
        self.classify_features(&FaceFeatures::from_regions(face_width, face_height, eyes, smiles))
    }

    pub fn classify_features(&self, features: &FaceFeatures) -> Emotion {
        match self.taxonomy {
            Taxonomy::Basic => basic_rules(features, &self.thresholds),
            Taxonomy::Extended => extended_rules(features, &self.thresholds),
        }
    }
}

/// Classify with the basic rule set and default thresholds.
pub fn classify(face_width: u32, face_height: u32, eyes: &[Rect], smiles: &[Rect]) -> Emotion {
    EmotionClassifier::default().classify(face_width, face_height, eyes, smiles)
}

fn basic_rules(f: &FaceFeatures, t: &RuleThresholds) -> Emotion {
    let mut emotion = Emotion::Neutral;

    if let (Some(center), Some(height)) = (f.avg_eye_center_y, f.avg_eye_height) {
        if height > f.face_height * t.angry_eye_height && center < f.face_height * t.angry_eye_position {
            emotion = Emotion::Angry;
        } else if center > f.face_height * t.sad_eye_position {
            emotion = Emotion::Sad;
        }
    }

    // Smile takes priority over anything the eyes suggested.
    if f.has_smile() {
        emotion = Emotion::Happy;
    }

    emotion
}

fn extended_rules(f: &FaceFeatures, t: &RuleThresholds) -> Emotion {
    if f.has_smile() {
        return match f.smile_width_ratio {
            Some(ratio) if ratio > t.excited_smile_width => Emotion::Excited,
            _ => Emotion::Happy,
        };
    }

    if let (Some(center), Some(height)) = (f.avg_eye_center_y, f.avg_eye_height) {
        if center < f.face_height * t.angry_eye_position {
            if height > f.face_height * t.surprised_eye_height {
                return Emotion::Surprised;
            }
            if height > f.face_height * t.angry_eye_height {
                return Emotion::Angry;
            }
        }
        if center > f.face_height * t.sad_eye_position {
            return if f.aspect_ratio() > t.fear_aspect_ratio {
                Emotion::Fear
            } else {
                Emotion::Sad
            };
        }
        return Emotion::Neutral;
    }

    if f.eye_count == 1 {
        return Emotion::Disgust;
    }

    Emotion::Neutral
}
