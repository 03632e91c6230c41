//! Shared data models for MoodLens.
//!
//! This crate provides Serde-serializable types for:
//! - Detected regions (faces, eyes, smiles)
//! - Emotion labels and taxonomies
//! - Per-image and per-video analysis reports
//! - Video analysis jobs
//! - Location detection results

pub mod emotion;
pub mod job;
pub mod location;
pub mod rect;
pub mod report;

// Re-export common types
pub use emotion::{Emotion, EmotionParseError, Taxonomy};
pub use job::{JobId, JobState, VideoJobStatus};
pub use location::{LocationResult, LocationSource};
pub use rect::{Rect, Region, RegionKind};
pub use report::{FaceResult, FrameSummary, ImageReport, LabelCounts, MediaKind, VideoReport};
