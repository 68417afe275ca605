//! Rendering of search candidates into recognizer-ready images.
//!
//! Each candidate is derived from the oriented source photo by
//! crop → scale → rotate → (invert) and encoded as PNG. Pure image-to-image
//! transforms; no I/O.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tracing::debug;

use super::search::{Candidate, CropRegion, Polarity};
use super::BarcodeError;

/// Background for the corners uncovered by a tilt.
const TILT_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// A candidate rendered and encoded for the recognition service.
#[derive(Debug)]
pub struct RenderedCandidate {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode raw image bytes and apply EXIF orientation.
///
/// Phone cameras store portrait shots sideways and record the rotation in EXIF
/// tag 0x0112; without correction the crop regions land on the wrong band.
pub fn load_source(bytes: &[u8]) -> Result<RgbImage, BarcodeError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BarcodeError::ImageDecode(e.to_string()))?;
    let oriented = apply_orientation(img, read_exif_orientation(bytes));
    Ok(oriented.to_rgb8())
}

/// Orientation value recorded by the camera, `None` for photos without EXIF
/// (screenshots, re-encoded PNGs) or without the tag.
pub fn read_exif_orientation(bytes: &[u8]) -> Option<u32> {
    let metadata = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    metadata
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Turn a phone capture upright before the crop bands are cut.
///
/// 6 and 8 are the portrait holds (sensor rotated a quarter turn), 3 is the
/// phone upside down; the even/odd remainder are mirrored front-camera shots.
pub fn apply_orientation(img: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    let upright = match orientation {
        Some(6) => img.rotate90(),
        Some(8) => img.rotate270(),
        Some(3) => img.rotate180(),
        Some(2) => img.fliph(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(7) => img.rotate270().fliph(),
        _ => return img,
    };
    debug!(orientation = ?orientation, "Barcode photo reoriented");
    upright
}

/// Render one search candidate from the oriented source.
pub fn render_candidate(
    source: &RgbImage,
    candidate: &Candidate<'_>,
) -> Result<RenderedCandidate, BarcodeError> {
    let cropped = crop_fraction(source, candidate.crop);
    let scaled = scale(&cropped, candidate.scale);
    let mut rotated = rotate(&scaled, candidate.rotation);

    if candidate.polarity == Polarity::Inverted {
        image::imageops::invert(&mut rotated);
    }

    let (width, height) = rotated.dimensions();
    let png_bytes = encode_png(&rotated)?;

    debug!(
        index = candidate.index,
        crop = %candidate.crop.label,
        scale = candidate.scale,
        rotation = candidate.rotation,
        size = format!("{width}x{height}"),
        png_size = png_bytes.len(),
        "Rendered barcode candidate"
    );

    Ok(RenderedCandidate {
        png_bytes,
        width,
        height,
    })
}

/// Pixel rectangle `(x, y, w, h)` for a fractional crop, clamped to the image
/// and never empty.
pub fn crop_rect(width: u32, height: u32, region: &CropRegion) -> (u32, u32, u32, u32) {
    let px = |frac: f32, total: u32| ((frac.clamp(0.0, 1.0) * total as f32).floor() as u32).min(total.saturating_sub(1));
    let x = px(region.x, width);
    let y = px(region.y, height);
    let w = ((region.width * width as f32).floor() as u32).clamp(1, (width - x).max(1));
    let h = ((region.height * height as f32).floor() as u32).clamp(1, (height - y).max(1));
    (x, y, w, h)
}

fn crop_fraction(source: &RgbImage, region: &CropRegion) -> RgbImage {
    let (x, y, w, h) = crop_rect(source.width(), source.height(), region);
    image::imageops::crop_imm(source, x, y, w, h).to_image()
}

fn scale(img: &RgbImage, factor: f32) -> RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return img.clone();
    }
    let w = ((img.width() as f32 * factor).floor() as u32).max(1);
    let h = ((img.height() as f32 * factor).floor() as u32).max(1);
    image::imageops::resize(img, w, h, FilterType::Triangle)
}

/// Rotate clockwise by `degrees`. Quarter turns are lossless and swap
/// width/height for 90/270; other angles go through [`rotate_tilt`].
pub fn rotate(img: &RgbImage, degrees: i32) -> RgbImage {
    match degrees.rem_euclid(360) {
        0 => img.clone(),
        90 => image::imageops::rotate90(img),
        180 => image::imageops::rotate180(img),
        270 => image::imageops::rotate270(img),
        _ => rotate_tilt(img, degrees as f32),
    }
}

/// Arbitrary-angle clockwise rotation onto the rotated bounding box.
///
/// Bilinear sampling; uncovered corners get `TILT_BACKGROUND`.
pub fn rotate_tilt(img: &RgbImage, degrees: f32) -> RgbImage {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let out_w = (w * cos.abs() + h * sin.abs()).ceil().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).ceil().max(1.0) as u32;

    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ocx, ocy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);

    RgbImage::from_fn(out_w, out_h, |ox, oy| {
        let dx = ox as f32 + 0.5 - ocx;
        let dy = oy as f32 + 0.5 - ocy;
        // Inverse of the clockwise rotation (y axis points down).
        let sx = dx * cos + dy * sin + cx - 0.5;
        let sy = -dx * sin + dy * cos + cy - 0.5;
        sample_bilinear(img, sx, sy).unwrap_or(TILT_BACKGROUND)
    })
}

fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(out))
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, BarcodeError> {
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| BarcodeError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    fn png_of(img: &RgbImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    fn decode(bytes: &[u8]) -> RgbImage {
        image::load_from_memory(bytes).unwrap().to_rgb8()
    }

    fn candidate<'a>(crop: &'a CropRegion, scale: f32, rotation: i32, polarity: Polarity) -> Candidate<'a> {
        Candidate {
            index: 0,
            crop,
            scale,
            rotation,
            polarity,
        }
    }

    // ── load_source ──

    #[test]
    fn load_source_decodes_png() {
        let bytes = png_of(&solid(40, 20, [10, 20, 30]));
        let img = load_source(&bytes).unwrap();
        assert_eq!(img.dimensions(), (40, 20));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn load_source_rejects_garbage() {
        let err = load_source(b"definitely not an image").unwrap_err();
        assert!(matches!(err, BarcodeError::ImageDecode(_)));
    }

    #[test]
    fn no_exif_is_normal_orientation() {
        let bytes = png_of(&solid(4, 4, [0, 0, 0]));
        assert_eq!(read_exif_orientation(&bytes), None);
    }

    #[test]
    fn orientation_six_rotates_quarter_turn() {
        let img = DynamicImage::ImageRgb8(solid(30, 10, [0, 0, 0]));
        let fixed = apply_orientation(img, Some(6));
        assert_eq!((fixed.to_rgb8().width(), fixed.to_rgb8().height()), (10, 30));
    }

    #[test]
    fn upside_down_capture_turned_half() {
        let mut img = solid(2, 1, [0, 0, 0]);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        let fixed = apply_orientation(DynamicImage::ImageRgb8(img), Some(3)).to_rgb8();
        assert_eq!(fixed.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(fixed.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn missing_orientation_is_identity() {
        let img = DynamicImage::ImageRgb8(solid(30, 10, [0, 0, 0]));
        assert_eq!(apply_orientation(img, None).to_rgb8().dimensions(), (30, 10));
    }

    #[test]
    fn unknown_orientation_is_identity() {
        let img = DynamicImage::ImageRgb8(solid(30, 10, [0, 0, 0]));
        let same = apply_orientation(img, Some(42)).to_rgb8();
        assert_eq!(same.dimensions(), (30, 10));
    }

    // ── crop_rect ──

    #[test]
    fn center_crop_rect() {
        assert_eq!(crop_rect(200, 100, &CropRegion::center()), (20, 25, 160, 50));
    }

    #[test]
    fn bottom_crop_rect() {
        assert_eq!(crop_rect(200, 100, &CropRegion::bottom()), (0, 60, 200, 40));
    }

    #[test]
    fn crop_rect_never_empty_on_tiny_images() {
        let (x, y, w, h) = crop_rect(2, 2, &CropRegion::center());
        assert!(w >= 1 && h >= 1);
        assert!(x + w <= 2 && y + h <= 2);
    }

    // ── rotate ──

    #[test]
    fn quarter_turns_swap_dimensions() {
        let img = solid(30, 10, [0, 0, 0]);
        assert_eq!(rotate(&img, 90).dimensions(), (10, 30));
        assert_eq!(rotate(&img, 270).dimensions(), (10, 30));
        assert_eq!(rotate(&img, 180).dimensions(), (30, 10));
        assert_eq!(rotate(&img, 0).dimensions(), (30, 10));
    }

    #[test]
    fn rotate90_is_clockwise() {
        let mut img = solid(3, 2, [0, 0, 0]);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let r = rotate(&img, 90);
        // Top-left moves to top-right.
        assert_eq!(r.get_pixel(r.width() - 1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn tilt_grows_bounding_box() {
        let img = solid(100, 40, [0, 0, 0]);
        for angle in [8, -8] {
            let r = rotate(&img, angle);
            assert!(r.width() > 100, "width {}", r.width());
            assert!(r.height() > 40, "height {}", r.height());
        }
    }

    #[test]
    fn tilt_fills_corners_with_background_and_keeps_center() {
        let img = solid(100, 40, [0, 0, 0]);
        let r = rotate_tilt(&img, 8.0);
        assert_eq!(*r.get_pixel(0, 0), TILT_BACKGROUND);
        assert_eq!(r.get_pixel(r.width() / 2, r.height() / 2).0, [0, 0, 0]);
    }

    // ── render_candidate ──

    #[test]
    fn render_applies_crop_scale_rotation() {
        let source = solid(200, 100, [128, 128, 128]);
        let crop = CropRegion::center();
        let rendered = render_candidate(&source, &candidate(&crop, 0.5, 90, Polarity::Normal)).unwrap();
        // center crop 160x50 → scaled 80x25 → rotated 25x80
        assert_eq!((rendered.width, rendered.height), (25, 80));
        assert_eq!(decode(&rendered.png_bytes).dimensions(), (25, 80));
    }

    #[test]
    fn render_inverts_luminance() {
        let source = solid(50, 50, [200, 10, 0]);
        let crop = CropRegion::full();
        let rendered = render_candidate(&source, &candidate(&crop, 1.0, 0, Polarity::Inverted)).unwrap();
        let out = decode(&rendered.png_bytes);
        assert_eq!(out.get_pixel(10, 10).0, [55, 245, 255]);
    }

    #[test]
    fn render_normal_polarity_keeps_pixels() {
        let source = solid(50, 50, [200, 10, 0]);
        let crop = CropRegion::full();
        let rendered = render_candidate(&source, &candidate(&crop, 1.0, 180, Polarity::Normal)).unwrap();
        let out = decode(&rendered.png_bytes);
        assert_eq!(out.get_pixel(10, 10).0, [200, 10, 0]);
    }
}
