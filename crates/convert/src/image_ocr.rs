//! Image OCR chain: deskew, upscale, denoise, adaptive threshold,
//! morphological open, then OCR. Grounded on the original service's
//! `ImageConverter._deskew_image`/`_preprocess_image` (OpenCV) and
//! `pytesseract.image_to_string(config="--psm 6 --oem 3")`, re-expressed
//! with `image`/`imageproc` for the raster pipeline and `leptess` (a
//! Tesseract binding) for the OCR pass itself.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::morphology::{erode, dilate};
use imageproc::distance_transform::Norm;
use leptess::LepTess;

const UPSCALE_FACTOR: f32 = 1.5;
const BLUR_SIGMA: f32 = 1.0;
const ADAPTIVE_THRESHOLD_BLOCK_RADIUS: u32 = 12;

pub fn extract_text(bytes: &[u8]) -> String {
  let Ok(image) = image::load_from_memory(bytes) else {
    return String::new();
  };
  let preprocessed = preprocess(image);
  ocr(&preprocessed).unwrap_or_default()
}

fn preprocess(image: DynamicImage) -> GrayImage {
  let gray = image.to_luma8();
  let deskewed = deskew(&gray);
  let upscaled = upscale(&deskewed);
  let blurred = gaussian_blur_f32(&upscaled, BLUR_SIGMA);
  let thresholded = adaptive_threshold(&blurred, ADAPTIVE_THRESHOLD_BLOCK_RADIUS);
  morphological_open(&thresholded)
}

/// Estimate a small rotation angle from the image's minimum-area bounding
/// rectangle and correct it. A cheap deskew is enough for scanned resumes,
/// which are rarely off by more than a few degrees.
fn deskew(gray: &GrayImage) -> GrayImage {
  let angle = estimate_skew_angle(gray);
  if angle.abs() < 0.2 {
    return gray.clone();
  }
  rotate_about_center(
    gray,
    angle.to_radians(),
    Interpolation::Bilinear,
    Luma([255]),
  )
}

/// Angle estimate via the second-order image moments of the dark
/// (foreground) pixels — the orientation of a scanned text block's
/// principal axis approximates its skew, the same signal a
/// minAreaRect-over-foreground-pixels heuristic targets, without needing a
/// full Hough line detector for what is usually a near-zero correction.
fn estimate_skew_angle(gray: &GrayImage) -> f32 {
  let (width, height) = gray.dimensions();
  let mut sum_x = 0f64;
  let mut sum_y = 0f64;
  let mut count = 0f64;

  for y in 0..height {
    for x in 0..width {
      if gray.get_pixel(x, y).0[0] < 128 {
        sum_x += x as f64;
        sum_y += y as f64;
        count += 1.0;
      }
    }
  }

  if count < 50.0 {
    return 0.0;
  }

  let mean_x = sum_x / count;
  let mean_y = sum_y / count;

  let mut mu_xx = 0f64;
  let mut mu_yy = 0f64;
  let mut mu_xy = 0f64;
  for y in 0..height {
    for x in 0..width {
      if gray.get_pixel(x, y).0[0] < 128 {
        let dx = x as f64 - mean_x;
        let dy = y as f64 - mean_y;
        mu_xx += dx * dx;
        mu_yy += dy * dy;
        mu_xy += dx * dy;
      }
    }
  }

  let angle_rad = 0.5 * (2.0 * mu_xy).atan2(mu_xx - mu_yy);
  let angle_deg = angle_rad.to_degrees() as f32;

  // Text blocks are wider than tall; the principal-axis angle is only
  // meaningful as a *small* correction near zero. Clamp to a sane range so
  // a mostly-symmetric foreground (e.g. a photo, not text) can't produce a
  // wild rotation.
  angle_deg.clamp(-15.0, 15.0)
}

fn upscale(gray: &GrayImage) -> GrayImage {
  let (width, height) = gray.dimensions();
  let new_width = (width as f32 * UPSCALE_FACTOR) as u32;
  let new_height = (height as f32 * UPSCALE_FACTOR) as u32;
  image::imageops::resize(gray, new_width, new_height, image::imageops::FilterType::Lanczos3)
}

fn morphological_open(gray: &GrayImage) -> GrayImage {
  let eroded = erode(gray, Norm::LInf, 1);
  dilate(&eroded, Norm::LInf, 1)
}

fn ocr(gray: &GrayImage) -> Option<String> {
  let mut engine = LepTess::new(None, "eng").ok()?;
  let dynamic = DynamicImage::ImageLuma8(gray.clone());
  let mut buf = Vec::new();
  dynamic
    .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
    .ok()?;
  engine.set_image_from_mem(&buf).ok()?;
  engine.get_utf8_text().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn garbage_bytes_yield_empty_string() {
    assert_eq!(extract_text(b"not an image"), "");
  }

  #[test]
  fn upscale_grows_dimensions() {
    let gray = GrayImage::from_pixel(10, 10, Luma([255]));
    let scaled = upscale(&gray);
    assert_eq!(scaled.dimensions(), (15, 15));
  }
}
