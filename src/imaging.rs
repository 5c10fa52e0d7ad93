use std::io::Cursor;

use image::DynamicImage;
use image::ImageFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagingError {
  #[error("failed to decode photo: {0}")]
  Decode(#[source] image::ImageError),
  #[error("failed to encode photo: {0}")]
  Encode(#[source] image::ImageError),
}

/// Turns a photo a quarter turn clockwise and re-encodes it as JPEG.
pub fn rotate_clockwise(bytes: &[u8]) -> Result<Vec<u8>, ImagingError> {
  let decoded = image::load_from_memory(bytes).map_err(ImagingError::Decode)?;
  // JPEG has no alpha channel.
  let rotated = DynamicImage::ImageRgb8(decoded.rotate90().to_rgb8());

  let mut out = Cursor::new(Vec::new());
  rotated
    .write_to(&mut out, ImageFormat::Jpeg)
    .map_err(ImagingError::Encode)?;
  Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use image::DynamicImage;
  use image::ImageFormat;
  use image::Rgb;
  use image::RgbImage;

  use super::rotate_clockwise;

  const WIDTH: u32 = 32;
  const HEIGHT: u32 = 16;

  /// Left half dark, right half light.
  fn two_tone_jpeg() -> Vec<u8> {
    let img = RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
      if x < WIDTH / 2 { Rgb([10, 10, 10]) } else { Rgb([245, 245, 245]) }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
      .write_to(&mut out, ImageFormat::Jpeg)
      .unwrap();
    out.into_inner()
  }

  fn luma_at(bytes: &[u8], x: u32, y: u32) -> u8 {
    image::load_from_memory(bytes).unwrap().to_luma8().get_pixel(x, y).0[0]
  }

  #[test]
  fn quarter_turn_swaps_dimensions_and_moves_left_edge_to_top() {
    let rotated = rotate_clockwise(&two_tone_jpeg()).unwrap();
    let decoded = image::load_from_memory(&rotated).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (HEIGHT, WIDTH));
    // clockwise: the dark left half ends up on top
    assert!(luma_at(&rotated, HEIGHT / 2, 2) < 64);
    assert!(luma_at(&rotated, HEIGHT / 2, WIDTH - 3) > 192);
  }

  #[test]
  fn four_turns_restore_orientation() {
    let original = two_tone_jpeg();
    let mut current = original.clone();
    for _ in 0 .. 4 {
      current = rotate_clockwise(&current).unwrap();
    }
    let decoded = image::load_from_memory(&current).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (WIDTH, HEIGHT));
    assert!(luma_at(&current, 2, HEIGHT / 2) < 64);
    assert!(luma_at(&current, WIDTH - 3, HEIGHT / 2) > 192);
  }

  #[test]
  fn garbage_input_is_a_decode_error() {
    assert!(matches!(
      rotate_clockwise(b"not an image"),
      Err(super::ImagingError::Decode(_))
    ));
  }
}
