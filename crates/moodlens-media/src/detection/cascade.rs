//! Native Viola-Jones cascade evaluator.
//!
//! Reads the new-style HAAR cascades OpenCV ships
//! (`haarcascade_frontalface_default.xml` and friends):
//!
//! ```xml
//! <opencv_storage><cascade type_id="opencv-cascade-classifier">
//!   <stageType>BOOST</stageType><featureType>HAAR</featureType>
//!   <height>24</height><width>24</width>
//!   <stages><_>
//!     <stageThreshold>-1.2</stageThreshold>
//!     <weakClassifiers><_>
//!       <internalNodes>0 -1 0 0.004</internalNodes>
//!       <leafValues>-0.8 0.6</leafValues></_></weakClassifiers></_></stages>
//!   <features><_><rects><_>6 4 12 9 -1.</_><_>6 7 12 3 3.</_></rects></_></features>
//! </cascade></opencv_storage>
//! ```
//!
//! The same tree written by `cv::FileStorage` as `.json` is accepted too.
//!
//! Search follows `detectMultiScale`: the image is shrunk by successive
//! scale factors, each level is scanned with the fixed training window over
//! its own integral image, and hits are mapped back and grouped. Pyramid
//! levels run in parallel.

use image::imageops::{self, FilterType};
use image::GrayImage;
use moodlens_models::Rect;
use rayon::prelude::*;
use roxmltree::Node as XmlNode;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::grouping::{group_rectangles, GROUP_EPS};
use super::integral::IntegralImage;
use super::{DetectParams, RegionDetector};
use crate::error::{MediaError, MediaResult};

#[derive(Debug, Deserialize)]
struct CascadeFile {
    cascade: CascadeDef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeDef {
    #[serde(default)]
    feature_type: Option<String>,
    width: u32,
    height: u32,
    stages: Vec<StageDef>,
    features: Vec<FeatureDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageDef {
    stage_threshold: f64,
    weak_classifiers: Vec<WeakDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakDef {
    internal_nodes: NumberList,
    leaf_values: NumberList,
}

#[derive(Debug, Deserialize)]
struct FeatureDef {
    rects: Vec<NumberList>,
    #[serde(default)]
    tilted: Option<serde_json::Value>,
}

/// Either a JSON number array or OpenCV's space-separated text form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberList {
    Numbers(Vec<f64>),
    Text(String),
}

impl NumberList {
    fn values(&self) -> MediaResult<Vec<f64>> {
        match self {
            NumberList::Numbers(v) => Ok(v.clone()),
            NumberList::Text(s) => s
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .map_err(|_| MediaError::invalid_model(format!("bad number '{}'", tok)))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    /// Next node index when > 0, otherwise `-leaf_index`
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct WeakClassifier {
    nodes: Vec<Node>,
    leaves: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f64,
    weak: Vec<WeakClassifier>,
}

#[derive(Debug, Clone, Copy)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f64,
}

#[derive(Debug, Clone)]
struct Feature {
    rects: Vec<WeightedRect>,
}

/// A boosted cascade of Haar-like features.
#[derive(Debug, Clone)]
pub struct HaarCascade {
    name: String,
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<Feature>,
}

impl HaarCascade {
    /// Load a cascade file; `.json` is read as JSON, anything else as XML.
    pub fn from_path(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::model_not_found(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("cascade")
            .to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json(name, &text),
            _ => Self::from_xml(name, &text),
        }
    }

    /// Parse a cascade from OpenCV's XML storage format.
    pub fn from_xml(name: impl Into<String>, xml: &str) -> MediaResult<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| MediaError::invalid_model(format!("cascade XML: {}", e)))?;
        let cascade = doc
            .root_element()
            .children()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or_else(|| {
                MediaError::invalid_model("no <cascade> node; old-style cascades are not supported")
            })?;
        Self::from_def(name.into(), xml_cascade(cascade)?)
    }

    /// Parse a cascade from its JSON text.
    pub fn from_json(name: impl Into<String>, json: &str) -> MediaResult<Self> {
        let file: CascadeFile = serde_json::from_str(json)
            .map_err(|e| MediaError::invalid_model(format!("cascade JSON: {}", e)))?;
        Self::from_def(name.into(), file.cascade)
    }

    fn from_def(name: String, def: CascadeDef) -> MediaResult<Self> {
        if let Some(kind) = def.feature_type.as_deref() {
            if !kind.eq_ignore_ascii_case("haar") {
                return Err(MediaError::invalid_model(format!(
                    "unsupported feature type {}",
                    kind
                )));
            }
        }
        if def.width < 3 || def.height < 3 {
            return Err(MediaError::invalid_model(format!(
                "window {}x{} too small",
                def.width, def.height
            )));
        }

        let features = def
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| parse_feature(i, f, def.width, def.height))
            .collect::<MediaResult<Vec<_>>>()?;

        let stages = def
            .stages
            .iter()
            .map(|s| {
                let weak = s
                    .weak_classifiers
                    .iter()
                    .map(|w| parse_weak(w, features.len()))
                    .collect::<MediaResult<Vec<_>>>()?;
                Ok(Stage {
                    threshold: s.stage_threshold,
                    weak,
                })
            })
            .collect::<MediaResult<Vec<_>>>()?;

        if stages.is_empty() {
            return Err(MediaError::invalid_model("cascade has no stages"));
        }

        debug!(
            name = %name,
            window = ?(def.width, def.height),
            stages = stages.len(),
            features = features.len(),
            "Parsed Haar cascade"
        );

        Ok(Self {
            name,
            window: (def.width, def.height),
            stages,
            features,
        })
    }

    /// Training window size (width, height).
    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run all stages on the window with top-left `(x, y)` in `ii`.
    pub fn evaluate_window(&self, ii: &IntegralImage, x: u32, y: u32) -> bool {
        let (ww, wh) = self.window;
        // Variance over the window minus a one pixel border
        let area = ((ww - 2) * (wh - 2)) as f64;
        let sum = ii.sum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let sqsum = ii.sqsum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let nf = area * sqsum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut total = 0.0;
            for weak in &stage.weak {
                let mut idx = 0i32;
                loop {
                    let node = &weak.nodes[idx as usize];
                    let value = self.feature_value(ii, node.feature, x, y) / nf;
                    idx = if value < node.threshold { node.left } else { node.right };
                    if idx <= 0 {
                        break;
                    }
                }
                total += weak.leaves[(-idx) as usize];
            }
            if total < stage.threshold {
                return false;
            }
        }
        true
    }

    #[inline]
    fn feature_value(&self, ii: &IntegralImage, feature: usize, x: u32, y: u32) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight * ii.sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }

    /// Scale factors whose window fits the image and the size limits.
    fn pyramid(&self, width: u32, height: u32, params: &DetectParams) -> Vec<f64> {
        let (ww, wh) = self.window;
        let mut factors = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let win_w = (ww as f64 * factor).round() as u32;
            let win_h = (wh as f64 * factor).round() as u32;
            let scaled_w = (width as f64 / factor).round() as u32;
            let scaled_h = (height as f64 / factor).round() as u32;

            if scaled_w < ww || scaled_h < wh {
                break;
            }
            if let Some((max_w, max_h)) = params.max_size {
                if win_w > max_w || win_h > max_h {
                    break;
                }
            }
            if win_w >= params.min_size.0 && win_h >= params.min_size.1 {
                factors.push(factor);
            }
            factor *= params.scale_factor;
        }
        factors
    }

    fn scan_level(&self, image: &GrayImage, factor: f64) -> Vec<Rect> {
        let (width, height) = image.dimensions();
        let (ww, wh) = self.window;
        let scaled_w = (width as f64 / factor).round() as u32;
        let scaled_h = (height as f64 / factor).round() as u32;

        let ii = if scaled_w == width && scaled_h == height {
            IntegralImage::new(image)
        } else {
            IntegralImage::new(&imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle))
        };

        let step = if factor > 2.0 { 1 } else { 2 };
        let win_w = (ww as f64 * factor).round() as u32;
        let win_h = (wh as f64 * factor).round() as u32;

        let mut hits = Vec::new();
        for y in (0..=(scaled_h - wh)).step_by(step) {
            for x in (0..=(scaled_w - ww)).step_by(step) {
                if self.evaluate_window(&ii, x, y) {
                    hits.push(Rect::new(
                        (x as f64 * factor).round() as u32,
                        (y as f64 * factor).round() as u32,
                        win_w,
                        win_h,
                    ));
                }
            }
        }
        hits
    }
}

impl RegionDetector for HaarCascade {
    fn detect(&self, image: &GrayImage, params: &DetectParams) -> MediaResult<Vec<Rect>> {
        params.validate()?;
        let (width, height) = image.dimensions();
        let factors = self.pyramid(width, height, params);
        if factors.is_empty() {
            return Ok(Vec::new());
        }

        let hits: Vec<Rect> = factors
            .par_iter()
            .map(|&factor| self.scan_level(image, factor))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        let grouped = group_rectangles(&hits, params.min_neighbors, GROUP_EPS);
        Ok(grouped
            .into_iter()
            .filter_map(|r| r.clip_to(width, height))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn xml_cascade(cascade: XmlNode) -> MediaResult<CascadeDef> {
    let feature_type = xml_child(cascade, "featureType").ok().map(xml_text);

    let stages = xml_items(xml_child(cascade, "stages")?)
        .map(|stage| {
            let weak_classifiers = xml_items(xml_child(stage, "weakClassifiers")?)
                .map(|weak| {
                    Ok(WeakDef {
                        internal_nodes: NumberList::Text(xml_text(xml_child(weak, "internalNodes")?)),
                        leaf_values: NumberList::Text(xml_text(xml_child(weak, "leafValues")?)),
                    })
                })
                .collect::<MediaResult<Vec<_>>>()?;
            Ok(StageDef {
                stage_threshold: xml_number(stage, "stageThreshold")?,
                weak_classifiers,
            })
        })
        .collect::<MediaResult<Vec<_>>>()?;

    let features = xml_items(xml_child(cascade, "features")?)
        .map(|feature| {
            let rects = xml_items(xml_child(feature, "rects")?)
                .map(|r| NumberList::Text(xml_text(r)))
                .collect();
            let tilted = xml_child(feature, "tilted")
                .ok()
                .map(|t| serde_json::Value::Bool(xml_text(t) != "0"));
            Ok(FeatureDef { rects, tilted })
        })
        .collect::<MediaResult<Vec<_>>>()?;

    Ok(CascadeDef {
        feature_type,
        width: xml_number(cascade, "width")?,
        height: xml_number(cascade, "height")?,
        stages,
        features,
    })
}

fn xml_child<'a, 'i>(node: XmlNode<'a, 'i>, tag: &str) -> MediaResult<XmlNode<'a, 'i>> {
    node.children().find(|c| c.has_tag_name(tag)).ok_or_else(|| {
        MediaError::invalid_model(format!("missing <{}> in <{}>", tag, node.tag_name().name()))
    })
}

/// Element children; OpenCV names sequence items `_`.
fn xml_items<'a, 'i>(node: XmlNode<'a, 'i>) -> impl Iterator<Item = XmlNode<'a, 'i>> {
    node.children().filter(|c| c.is_element())
}

fn xml_text(node: XmlNode) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

fn xml_number<T: std::str::FromStr>(node: XmlNode, tag: &str) -> MediaResult<T> {
    let text = xml_text(xml_child(node, tag)?);
    text.parse()
        .map_err(|_| MediaError::invalid_model(format!("bad <{}> value '{}'", tag, text)))
}

fn parse_feature(index: usize, def: &FeatureDef, ww: u32, wh: u32) -> MediaResult<Feature> {
    let tilted = match &def.tilted {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
        Some(_) => true,
    };
    if tilted {
        return Err(MediaError::invalid_model(format!(
            "feature {} is tilted; only upright features are supported",
            index
        )));
    }

    let rects = def
        .rects
        .iter()
        .map(|list| {
            let v = list.values()?;
            if v.len() != 5 || v[..4].iter().any(|c| *c < 0.0) {
                return Err(MediaError::invalid_model(format!(
                    "feature {} has a malformed rect",
                    index
                )));
            }
            let r = WeightedRect {
                x: v[0] as u32,
                y: v[1] as u32,
                width: v[2] as u32,
                height: v[3] as u32,
                weight: v[4],
            };
            if r.x + r.width > ww || r.y + r.height > wh {
                return Err(MediaError::invalid_model(format!(
                    "feature {} leaves the {}x{} window",
                    index, ww, wh
                )));
            }
            Ok(r)
        })
        .collect::<MediaResult<Vec<_>>>()?;

    if rects.is_empty() {
        return Err(MediaError::invalid_model(format!("feature {} has no rects", index)));
    }
    Ok(Feature { rects })
}

fn parse_weak(def: &WeakDef, feature_count: usize) -> MediaResult<WeakClassifier> {
    let raw = def.internal_nodes.values()?;
    let leaves = def.leaf_values.values()?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(MediaError::invalid_model("internal nodes must come in groups of four"));
    }

    let nodes: Vec<Node> = raw
        .chunks_exact(4)
        .map(|c| Node {
            left: c[0] as i32,
            right: c[1] as i32,
            feature: c[2] as usize,
            threshold: c[3],
        })
        .collect();

    for node in &nodes {
        if node.feature >= feature_count {
            return Err(MediaError::invalid_model(format!(
                "node references missing feature {}",
                node.feature
            )));
        }
        for next in [node.left, node.right] {
            let ok = if next > 0 {
                (next as usize) < nodes.len()
            } else {
                ((-next) as usize) < leaves.len()
            };
            if !ok {
                return Err(MediaError::invalid_model(format!("dangling node link {}", next)));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}

/// Stock-format cascade that fires when the lower half of an 8x8 window is
/// brighter than the upper half.
#[cfg(test)]
pub(crate) const EDGE_CASCADE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>8</height>
  <width>8</width>
  <stageParams>
    <maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>5.0000000000000000e-01</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 5.0000000000000000e-01</internalNodes>
          <leafValues>
            0. 1.0000000000000000e+00</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          1 1 6 3 -1.</_>
        <_>
          1 4 6 3 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Fires when the lower half of the window is brighter than the upper half.
    const EDGE_CASCADE: &str = r#"{
        "cascade": {
            "stageType": "BOOST",
            "featureType": "HAAR",
            "width": 8,
            "height": 8,
            "stages": [
                { "stageThreshold": 0.5,
                  "weakClassifiers": [
                      { "internalNodes": [0, -1, 0, 0.5], "leafValues": [0.0, 1.0] }
                  ] }
            ],
            "features": [
                { "rects": [[1, 1, 6, 3, -1.0], "1 4 6 3 1."] }
            ]
        }
    }"#;

    fn edge_image() -> GrayImage {
        GrayImage::from_fn(40, 40, |_, y| if y < 20 { Luma([0]) } else { Luma([255]) })
    }

    fn single_level() -> DetectParams {
        DetectParams {
            scale_factor: 10.0,
            min_neighbors: 0,
            min_size: (0, 0),
            max_size: None,
        }
    }

    #[test]
    fn test_parses_mixed_rect_forms() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        assert_eq!(cascade.window(), (8, 8));
        assert_eq!(cascade.stage_count(), 1);
        assert_eq!(cascade.name(), "edge");
    }

    #[test]
    fn test_window_on_edge_passes() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let ii = IntegralImage::new(&edge_image());
        assert!(cascade.evaluate_window(&ii, 0, 16));
        // Uniform black window: no variance, no response
        assert!(!cascade.evaluate_window(&ii, 0, 0));
    }

    #[test]
    fn test_detect_finds_edge_only() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let hits = cascade.detect(&edge_image(), &single_level()).unwrap();
        assert!(!hits.is_empty());
        for r in &hits {
            assert!(r.y <= 20 && r.bottom() >= 20, "hit {:?} misses the edge", r);
        }
    }

    #[test]
    fn test_uniform_image_has_no_hits() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let flat = GrayImage::from_pixel(40, 40, Luma([128]));
        assert!(cascade.detect(&flat, &single_level()).unwrap().is_empty());
    }

    #[test]
    fn test_image_smaller_than_window() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let tiny = GrayImage::from_pixel(6, 6, Luma([0]));
        assert!(cascade.detect(&tiny, &DetectParams::eye()).unwrap().is_empty());
    }

    #[test]
    fn test_min_size_skips_small_levels() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let params = DetectParams {
            min_size: (100, 100),
            ..single_level()
        };
        assert!(cascade.detect(&edge_image(), &params).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_tilted_features() {
        let json = EDGE_CASCADE.replace(r#""1 4 6 3 1."] }"#, r#""1 4 6 3 1."], "tilted": 1 }"#);
        let err = HaarCascade::from_json("edge", &json).unwrap_err();
        assert!(matches!(err, MediaError::InvalidModel(_)));
    }

    #[test]
    fn test_rejects_rect_outside_window() {
        let json = EDGE_CASCADE.replace("[1, 1, 6, 3, -1.0]", "[4, 1, 6, 3, -1.0]");
        assert!(HaarCascade::from_json("edge", &json).is_err());
    }

    #[test]
    fn test_rejects_dangling_feature_index() {
        let json = EDGE_CASCADE.replace("[0, -1, 0, 0.5]", "[0, -1, 3, 0.5]");
        assert!(HaarCascade::from_json("edge", &json).is_err());
    }

    #[test]
    fn test_parses_stock_xml() {
        let cascade = HaarCascade::from_xml("edge", EDGE_CASCADE_XML).unwrap();
        assert_eq!(cascade.window(), (8, 8));
        assert_eq!(cascade.stage_count(), 1);

        let ii = IntegralImage::new(&edge_image());
        assert!(cascade.evaluate_window(&ii, 0, 16));
        assert!(!cascade.evaluate_window(&ii, 0, 0));
    }

    #[test]
    fn test_xml_and_json_agree() {
        let xml = HaarCascade::from_xml("edge", EDGE_CASCADE_XML).unwrap();
        let json = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        assert_eq!(
            xml.detect(&edge_image(), &single_level()).unwrap(),
            json.detect(&edge_image(), &single_level()).unwrap()
        );
    }

    #[test]
    fn test_rejects_old_style_xml() {
        let old = r#"<opencv_storage><haarcascade_frontalface_alt type_id="opencv-haar-classifier">
            <size>20 20</size></haarcascade_frontalface_alt></opencv_storage>"#;
        let err = HaarCascade::from_xml("old", old).unwrap_err();
        assert!(matches!(err, MediaError::InvalidModel(_)));
    }

    #[test]
    fn test_xml_missing_stages_is_invalid() {
        let xml = EDGE_CASCADE_XML.replace("<stages>", "<stagez>").replace("</stages>", "</stagez>");
        assert!(HaarCascade::from_xml("edge", &xml).is_err());
    }

    #[test]
    fn test_from_path_reads_xml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haarcascade_edge.xml");
        std::fs::write(&path, EDGE_CASCADE_XML).unwrap();

        let cascade = HaarCascade::from_path(&path).unwrap();
        assert_eq!(cascade.name(), "haarcascade_edge");
        assert_eq!(cascade.window(), (8, 8));
    }

    #[test]
    fn test_image_exactly_window_size_is_scanned() {
        let cascade = HaarCascade::from_json("edge", EDGE_CASCADE).unwrap();
        let img = GrayImage::from_fn(8, 8, |_, y| if y < 4 { Luma([0]) } else { Luma([255]) });
        let ii = IntegralImage::new(&img);
        assert!(cascade.evaluate_window(&ii, 0, 0));

        let hits = cascade.detect(&img, &single_level()).unwrap();
        assert_eq!(hits, vec![Rect::new(0, 0, 8, 8)]);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = HaarCascade::from_path("/nonexistent/cascade.json").unwrap_err();
        assert!(matches!(err, MediaError::ModelNotFound(_)));
    }
}
