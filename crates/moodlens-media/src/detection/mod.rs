//! Face, eye and smile locators.
//!
//! Every locator implements [`RegionDetector`]; which engine backs it is
//! decided once at startup:
//!
//! - **Native** (always available): Viola-Jones evaluator over integral
//!   images, reading the stock OpenCV XML cascades itself.
//! - **OpenCV** (`opencv` feature): `objdetect::CascadeClassifier` reading the
//!   stock XML cascades.
//!
//! Models are loaded once into a [`CascadeSet`] and shared read-only.

pub mod cascade;
pub mod grouping;
pub mod integral;
#[cfg(feature = "opencv")]
pub mod opencv_backend;

use image::GrayImage;
use moodlens_models::{Rect, RegionKind};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::{MediaError, MediaResult};

pub use cascade::HaarCascade;

/// Multi-scale search parameters for one detector call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Window growth per pyramid level (> 1.0)
    pub scale_factor: f64,
    /// Overlapping raw hits a region needs to survive grouping
    pub min_neighbors: u32,
    /// Smallest window (width, height)
    pub min_size: (u32, u32),
    /// Largest window; unbounded when `None`
    pub max_size: Option<(u32, u32)>,
}

impl DetectParams {
    /// Face search over the whole image.
    pub fn face() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
            min_size: (30, 30),
            max_size: None,
        }
    }

    /// Eye search inside a face.
    pub fn eye() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: (0, 0),
            max_size: None,
        }
    }

    /// Smile search inside a face; strict to keep false smiles out.
    pub fn smile() -> Self {
        Self {
            scale_factor: 1.8,
            min_neighbors: 20,
            min_size: (0, 0),
            max_size: None,
        }
    }

    pub fn for_kind(kind: RegionKind) -> Self {
        match kind {
            RegionKind::Face => Self::face(),
            RegionKind::Eye => Self::eye(),
            RegionKind::Smile => Self::smile(),
        }
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(self.scale_factor > 1.0) {
            return Err(MediaError::detection_failed(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

impl Default for DetectParams {
    fn default() -> Self {
        Self::eye()
    }
}

/// A pretrained sliding-window object detector.
pub trait RegionDetector: Send + Sync {
    /// Find objects in a grayscale image. Rectangles are in image coordinates.
    fn detect(&self, image: &GrayImage, params: &DetectParams) -> MediaResult<Vec<Rect>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Detector that reports the same rectangles for every image, clipped to
/// the image bounds. Useful for wiring tests and demos without models.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    rects: Vec<Rect>,
}

impl StaticDetector {
    pub fn new(rects: Vec<Rect>) -> Self {
        Self { rects }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl RegionDetector for StaticDetector {
    fn detect(&self, image: &GrayImage, _params: &DetectParams) -> MediaResult<Vec<Rect>> {
        let (w, h) = image.dimensions();
        Ok(self.rects.iter().filter_map(|r| r.clip_to(w, h)).collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Which engine evaluates the cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorBackend {
    #[default]
    Native,
    OpenCv,
}

impl DetectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorBackend::Native => "native",
            DetectorBackend::OpenCv => "opencv",
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorBackend {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(DetectorBackend::Native),
            "opencv" => Ok(DetectorBackend::OpenCv),
            other => Err(MediaError::internal(format!("Unknown detector backend: {}", other))),
        }
    }
}

/// Stock cascade file stem for each region kind.
pub fn cascade_file_stem(kind: RegionKind) -> &'static str {
    match kind {
        RegionKind::Face => "haarcascade_frontalface_default",
        RegionKind::Eye => "haarcascade_eye",
        RegionKind::Smile => "haarcascade_smile",
    }
}

/// Path of the stock cascade for `kind` inside `dir`.
pub fn cascade_path(dir: &Path, kind: RegionKind) -> PathBuf {
    dir.join(format!("{}.xml", cascade_file_stem(kind)))
}

/// The three detectors the analyzer needs, with their search parameters.
#[derive(Clone)]
pub struct CascadeSet {
    face: Arc<dyn RegionDetector>,
    eye: Arc<dyn RegionDetector>,
    smile: Arc<dyn RegionDetector>,
    face_params: DetectParams,
    eye_params: DetectParams,
    smile_params: DetectParams,
}

impl CascadeSet {
    /// Build from already-constructed detectors using default parameters.
    pub fn new(
        face: Arc<dyn RegionDetector>,
        eye: Arc<dyn RegionDetector>,
        smile: Arc<dyn RegionDetector>,
    ) -> Self {
        Self {
            face,
            eye,
            smile,
            face_params: DetectParams::face(),
            eye_params: DetectParams::eye(),
            smile_params: DetectParams::smile(),
        }
    }

    /// Override the search parameters for one region kind.
    pub fn with_params(mut self, kind: RegionKind, params: DetectParams) -> Self {
        match kind {
            RegionKind::Face => self.face_params = params,
            RegionKind::Eye => self.eye_params = params,
            RegionKind::Smile => self.smile_params = params,
        }
        self
    }

    /// Load the stock cascades from `dir`.
    pub fn load(dir: impl AsRef<Path>, backend: DetectorBackend) -> MediaResult<Self> {
        let dir = dir.as_ref();
        let face = load_detector(dir, RegionKind::Face, backend)?;
        let eye = load_detector(dir, RegionKind::Eye, backend)?;
        let smile = load_detector(dir, RegionKind::Smile, backend)?;
        info!(backend = %backend, dir = %dir.display(), "Cascade models loaded");
        Ok(Self::new(face, eye, smile))
    }

    pub fn detector(&self, kind: RegionKind) -> &dyn RegionDetector {
        match kind {
            RegionKind::Face => self.face.as_ref(),
            RegionKind::Eye => self.eye.as_ref(),
            RegionKind::Smile => self.smile.as_ref(),
        }
    }

    pub fn params(&self, kind: RegionKind) -> &DetectParams {
        match kind {
            RegionKind::Face => &self.face_params,
            RegionKind::Eye => &self.eye_params,
            RegionKind::Smile => &self.smile_params,
        }
    }

    /// Run the detector for `kind` with its configured parameters.
    pub fn detect(&self, kind: RegionKind, image: &GrayImage) -> MediaResult<Vec<Rect>> {
        self.detector(kind).detect(image, self.params(kind))
    }
}

impl fmt::Debug for CascadeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeSet")
            .field("face", &self.face.name())
            .field("eye", &self.eye.name())
            .field("smile", &self.smile.name())
            .finish()
    }
}

fn load_detector(
    dir: &Path,
    kind: RegionKind,
    backend: DetectorBackend,
) -> MediaResult<Arc<dyn RegionDetector>> {
    let path = cascade_path(dir, kind);
    if !path.exists() {
        return Err(MediaError::model_not_found(path.display().to_string()));
    }

    match backend {
        DetectorBackend::Native => Ok(Arc::new(HaarCascade::from_path(&path)?)),
        #[cfg(feature = "opencv")]
        DetectorBackend::OpenCv => Ok(Arc::new(opencv_backend::OpenCvCascade::from_path(&path)?)),
        #[cfg(not(feature = "opencv"))]
        DetectorBackend::OpenCv => Err(MediaError::internal(
            "OpenCV detector backend not available. Build with --features opencv",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_params_match_stock_calls() {
        assert_eq!(DetectParams::face().scale_factor, 1.3);
        assert_eq!(DetectParams::face().min_neighbors, 5);
        assert_eq!(DetectParams::smile().scale_factor, 1.8);
        assert_eq!(DetectParams::smile().min_neighbors, 20);
        assert_eq!(DetectParams::for_kind(RegionKind::Eye), DetectParams::eye());
    }

    #[test]
    fn test_validate_rejects_non_growing_scale() {
        let params = DetectParams {
            scale_factor: 1.0,
            ..DetectParams::face()
        };
        assert!(params.validate().is_err());
        assert!(DetectParams::face().validate().is_ok());
    }

    #[test]
    fn test_cascade_paths_use_stock_names() {
        let dir = Path::new("/models");
        assert_eq!(
            cascade_path(dir, RegionKind::Smile),
            PathBuf::from("/models/haarcascade_smile.xml")
        );
        assert_eq!(
            cascade_path(dir, RegionKind::Face),
            PathBuf::from("/models/haarcascade_frontalface_default.xml")
        );
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("OpenCV".parse::<DetectorBackend>().unwrap(), DetectorBackend::OpenCv);
        assert_eq!("native".parse::<DetectorBackend>().unwrap(), DetectorBackend::Native);
        assert!("yunet".parse::<DetectorBackend>().is_err());
    }

    #[test]
    fn test_load_missing_models_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = CascadeSet::load(dir.path(), DetectorBackend::Native).unwrap_err();
        assert!(matches!(err, MediaError::ModelNotFound(_)));
    }

    #[test]
    fn test_native_loads_stock_xml_names() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [RegionKind::Face, RegionKind::Eye, RegionKind::Smile] {
            std::fs::write(cascade_path(dir.path(), kind), cascade::EDGE_CASCADE_XML).unwrap();
        }

        let set = CascadeSet::load(dir.path(), DetectorBackend::Native).unwrap();
        assert_eq!(set.detector(RegionKind::Smile).name(), "haarcascade_smile");
        assert_eq!(set.detector(RegionKind::Face).name(), "haarcascade_frontalface_default");
    }
}
