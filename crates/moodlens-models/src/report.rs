//! Analysis results for images and videos.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::emotion::{Emotion, Taxonomy};
use crate::location::LocationResult;
use crate::rect::Rect;

/// Summary shown when an image contains no faces.
pub const NO_FACES_SUMMARY: &str = "No faces detected";

/// Kind of uploaded media, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png"];
    pub const VIDEO_EXTENSIONS: &'static [&'static str] = &["mp4", "avi"];

    /// Classify a filename by its extension (case-insensitive).
    ///
    /// Returns `None` for anything outside the allow-list.
    pub fn from_filename(filename: &str) -> Option<MediaKind> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// One classified face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceResult {
    /// Face rectangle in image coordinates
    pub face: Rect,
    /// Eyes, relative to the face
    pub eyes: Vec<Rect>,
    /// Smiles, relative to the face
    pub smiles: Vec<Rect>,
    pub emotion: Emotion,
}

/// Per-label face counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LabelCounts(BTreeMap<Emotion, u64>);

impl LabelCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the labels of a face list.
    pub fn from_faces(faces: &[FaceResult]) -> Self {
        let mut counts = Self::new();
        for face in faces {
            counts.add(face.emotion, 1);
        }
        counts
    }

    pub fn add(&mut self, emotion: Emotion, n: u64) {
        if n > 0 {
            *self.0.entry(emotion).or_insert(0) += n;
        }
    }

    /// Fold another set of counts into this one.
    pub fn merge(&mut self, other: &LabelCounts) {
        for (emotion, n) in &other.0 {
            self.add(*emotion, *n);
        }
    }

    pub fn get(&self, emotion: Emotion) -> u64 {
        self.0.get(&emotion).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u64)> + '_ {
        self.0.iter().map(|(e, n)| (*e, *n))
    }

    /// Human-readable summary, e.g. `"2 Happy, 1 Sad"`.
    ///
    /// Labels follow the taxonomy's reporting order and zero counts are
    /// skipped. Labels outside the taxonomy are appended at the end.
    pub fn summary(&self, taxonomy: Taxonomy) -> String {
        if self.is_empty() {
            return NO_FACES_SUMMARY.to_string();
        }

        let ordered = taxonomy.labels().iter().copied().chain(
            self.0
                .keys()
                .copied()
                .filter(|e| !taxonomy.contains(*e)),
        );

        ordered
            .filter_map(|emotion| {
                let n = self.get(emotion);
                (n > 0).then(|| format!("{} {}", n, emotion.display_name()))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of analyzing one image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageReport {
    /// Analysis ID (also used to download the annotated image)
    pub id: String,
    /// Original upload filename
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub taxonomy: Taxonomy,
    pub faces: Vec<FaceResult>,
    pub counts: LabelCounts,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationResult>,
    pub created_at: DateTime<Utc>,
}

impl ImageReport {
    /// Build a report from classified faces.
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        (width, height): (u32, u32),
        taxonomy: Taxonomy,
        faces: Vec<FaceResult>,
    ) -> Self {
        let counts = LabelCounts::from_faces(&faces);
        let summary = counts.summary(taxonomy);
        Self {
            id: id.into(),
            filename: filename.into(),
            width,
            height,
            taxonomy,
            faces,
            counts,
            summary,
            location: None,
            created_at: Utc::now(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Labels found in one sampled video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSummary {
    /// Index of the frame in the source video
    pub frame_index: u64,
    /// Position in seconds
    pub timestamp: f64,
    pub faces: usize,
    pub counts: LabelCounts,
}

/// Aggregated result of analyzing a video.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VideoReport {
    pub taxonomy: Taxonomy,
    /// Every Nth frame was analyzed
    pub frame_skip: u32,
    pub frames_analyzed: u64,
    /// Totals across all analyzed frames
    pub counts: LabelCounts,
    pub summary: String,
    pub frames: Vec<FrameSummary>,
}

impl VideoReport {
    pub fn new(taxonomy: Taxonomy, frame_skip: u32) -> Self {
        Self {
            taxonomy,
            frame_skip,
            summary: LabelCounts::new().summary(taxonomy),
            ..Default::default()
        }
    }

    /// Record one analyzed frame.
    pub fn push_frame(&mut self, frame: FrameSummary) {
        self.counts.merge(&frame.counts);
        self.frames_analyzed += 1;
        self.summary = self.counts.summary(self.taxonomy);
        self.frames.push(frame);
    }
}
