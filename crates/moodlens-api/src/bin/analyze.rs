//! Analyze a local image from the command line.
//!
//! Usage: `moodlens-analyze <image> [output]`
//!
//! Prints the label summary and one line per face, then writes the annotated
//! image to `output` (default `<stem>_annotated.png` next to the input).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use image::GenericImageView;
use tracing_subscriber::EnvFilter;

use moodlens_api::AnalysisConfig;
use moodlens_location::LocationDetector;
use moodlens_media::{
    annotate, decode_image, encode_image, CascadeSet, EmotionClassifier, FaceAnalyzer, OutputFormat,
    RenderOptions,
};
use moodlens_models::{ImageReport, MediaKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("moodlens=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: moodlens-analyze <image> [output]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output(&input));

    let filename = input.display().to_string();
    if MediaKind::from_filename(&filename) != Some(MediaKind::Image) {
        bail!(
            "unsupported file type: {} (allowed: {})",
            filename,
            MediaKind::IMAGE_EXTENSIONS.join(", ")
        );
    }

    let config = AnalysisConfig::from_env();
    let cascades = CascadeSet::load(&config.cascade_dir, config.detector_backend)
        .with_context(|| format!("loading cascades from {}", config.cascade_dir.display()))?;
    let analyzer = FaceAnalyzer::new(cascades, EmotionClassifier::new(config.taxonomy));

    let bytes = tokio::fs::read(&input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let image = decode_image(&bytes).context("Processing error")?;
    let faces = analyzer.analyze(&image)?;

    let want_location = std::env::var("GOOGLE_VISION_API_KEY").is_ok();
    let location = if want_location {
        Some(LocationDetector::from_env()?.detect(&bytes).await)
    } else {
        None
    };

    let canvas = annotate(&image, &faces, location.as_ref(), &RenderOptions::default());
    let format = OutputFormat::from_path(&output);
    std::fs::write(&output, encode_image(&canvas, format)?)
        .with_context(|| format!("writing {}", output.display()))?;

    let report = ImageReport::new(
        uuid::Uuid::new_v4().to_string(),
        filename,
        (image.width(), image.height()),
        config.taxonomy,
        faces,
    );

    println!("{}", report.summary);
    for (i, face) in report.faces.iter().enumerate() {
        println!(
            "  face {}: {} at {} (eyes: {}, smiles: {})",
            i + 1,
            face.emotion.display_name(),
            face.face,
            face.eyes.len(),
            face.smiles.len()
        );
    }
    if let Some(location) = &location {
        println!("Location: {}", location.description);
    }
    println!("Annotated image written to {}", output.display());

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_annotated.png", stem))
}
