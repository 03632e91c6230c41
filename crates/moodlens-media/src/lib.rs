//! Image and video analysis for MoodLens.
//!
//! This crate provides:
//! - Cascade detectors for faces, eyes and smiles (native or OpenCV)
//! - Face feature aggregation and the rule-based emotion classifier
//! - The per-image [`FaceAnalyzer`] pipeline
//! - Annotated image rendering and encoding
//! - Sampled frame iteration over videos via FFmpeg

pub mod analyzer;
pub mod classifier;
pub mod decode;
pub mod detection;
pub mod error;
pub mod features;
pub mod font;
pub mod probe;
pub mod render;
pub mod video;

pub use analyzer::FaceAnalyzer;
pub use classifier::{classify, EmotionClassifier, RuleThresholds};
pub use decode::{decode_image, encode_image, OutputFormat};
pub use detection::{
    CascadeSet, DetectParams, DetectorBackend, HaarCascade, RegionDetector, StaticDetector,
};
pub use error::{MediaError, MediaResult};
pub use features::FaceFeatures;
pub use probe::{check_ffmpeg, check_ffprobe, probe_video, VideoInfo};
pub use render::{annotate, RenderOptions};
pub use video::{FrameSampler, SampleEnd, SampleOptions, SampleOutcome, SampledFrame, DEFAULT_FRAME_SKIP};
