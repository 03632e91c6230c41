//! Annotated output images.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelRect;
use moodlens_models::{FaceResult, LocationResult, Rect};

use crate::font;

/// Color for text that is not tied to an emotion label.
pub const UNLABELED_COLOR: [u8; 3] = [255, 255, 255];

/// Drawing knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Face box line thickness in pixels
    pub thickness: u32,
    /// Label font scale (1 = 7 px tall glyphs)
    pub label_scale: u32,
    /// Also outline detected eyes and smiles
    pub draw_features: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            thickness: 3,
            label_scale: 2,
            draw_features: false,
        }
    }
}

/// Draw face boxes and uppercase labels on a copy of `image`.
pub fn annotate(
    image: &DynamicImage,
    faces: &[FaceResult],
    location: Option<&LocationResult>,
    options: &RenderOptions,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    annotate_in_place(&mut canvas, faces, location, options);
    canvas
}

/// Like [`annotate`], drawing directly onto `canvas`.
pub fn annotate_in_place(
    canvas: &mut RgbImage,
    faces: &[FaceResult],
    location: Option<&LocationResult>,
    options: &RenderOptions,
) {
    for face in faces {
        let color = Rgb(face.emotion.color());
        draw_box(canvas, &face.face, options.thickness, color);

        if options.draw_features {
            for feature in face.eyes.iter().chain(face.smiles.iter()) {
                draw_box(canvas, &feature.offset_by(&face.face), 1, color);
            }
        }

        let label = face.emotion.as_str().to_uppercase();
        let text_h = font::text_height(options.label_scale) as i32;
        let mut text_y = face.face.y as i32 - 10 - text_h;
        if text_y < 0 {
            // No room above the box; put the label just inside it
            text_y = face.face.y as i32 + options.thickness as i32 + 2;
        }
        font::draw_text(canvas, face.face.x as i32 + 5, text_y, &label, options.label_scale, color);
    }

    if let Some(location) = location {
        let text = format!("LOCATION: {}", location.description);
        let text_h = font::text_height(options.label_scale) as i32;
        let y = canvas.height() as i32 - text_h - 8;
        font::draw_text(canvas, 8, y, &text, options.label_scale, Rgb(UNLABELED_COLOR));
    }
}

/// Hollow rectangle growing inward by `thickness` pixels.
fn draw_box(canvas: &mut RgbImage, rect: &Rect, thickness: u32, color: Rgb<u8>) {
    for t in 0..thickness.max(1) {
        let inset = 2 * t;
        if rect.width <= inset || rect.height <= inset {
            break;
        }
        let r = PixelRect::at((rect.x + t) as i32, (rect.y + t) as i32)
            .of_size(rect.width - inset, rect.height - inset);
        draw_hollow_rect_mut(canvas, r, color);
    }
}
