use std::fs;
use std::io::BufReader;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Decoded image data (CPU side)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A decoded, display-ready bitmap. EXIF orientation is already applied, so
/// width/height are the dimensions as shown on screen.
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Estimated memory footprint for cache accounting. Always counted at
    /// four bytes per pixel regardless of the stored format.
    pub fn estimated_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(image::ImageError),
}

impl From<image::ImageError> for LoadError {
    fn from(e: image::ImageError) -> LoadError {
        match e {
            image::ImageError::IoError(io) => LoadError::Io(io),
            other => LoadError::Decode(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Decode `path` into a display-ready bitmap.
///
/// Applies the EXIF Orientation tag, optionally downscales so both sides fit
/// in `max_size` (aspect preserved, never upscaled), and converts to RGB for
/// opaque sources or RGBA when the source carries alpha.
pub fn load(path: &Path, max_size: Option<u32>) -> Result<Bitmap, LoadError> {
    let img = image::open(path)?;
    let img = apply_orientation(img, read_orientation(path));

    let (w, h) = img.dimensions();
    let img = match max_size {
        Some(max) if w > max || h > max => img.resize(max, max, FilterType::Lanczos3),
        _ => img,
    };

    Ok(to_bitmap(img))
}

fn to_bitmap(img: DynamicImage) -> Bitmap {
    if img.color().has_alpha() {
        let rgba = img.into_rgba8();
        Bitmap {
            width: rgba.width(),
            height: rgba.height(),
            format: PixelFormat::Rgba,
            pixels: rgba.into_raw(),
        }
    } else {
        let rgb = img.into_rgb8();
        Bitmap {
            width: rgb.width(),
            height: rgb.height(),
            format: PixelFormat::Rgb,
            pixels: rgb.into_raw(),
        }
    }
}

/// EXIF Orientation value (1..=8), or 1 when absent or unreadable.
pub fn read_orientation(path: &Path) -> u32 {
    let Ok(file) = fs::File::open(path) else {
        return 1;
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Map the eight EXIF orientation codes onto rotations and flips. Code 1 is
/// identity; unknown codes are treated as identity.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Display dimensions (after orientation) and file size for the info bar.
/// Failures are not interesting here, they just yield zeros.
pub fn image_info(path: &Path) -> (u32, u32, u64) {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let (w, h) = match image::image_dimensions(path) {
        Ok(dims) => dims,
        Err(_) => return (0, 0, size),
    };
    // Orientations 5..=8 swap the displayed axes
    match read_orientation(path) {
        5..=8 => (h, w, size),
        _ => (w, h, size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn orientation_6_rotates_90() {
        let img = DynamicImage::new_rgb8(100, 200);
        let out = apply_orientation(img, 6);
        assert_eq!(out.dimensions(), (200, 100));
    }

    #[test]
    fn orientation_identity_codes() {
        for code in [0, 1, 9, 99] {
            let img = DynamicImage::new_rgb8(10, 20);
            assert_eq!(apply_orientation(img, code).dimensions(), (10, 20));
        }
    }

    #[test]
    fn orientation_codes_that_swap_axes() {
        for code in [2, 3, 4] {
            let img = DynamicImage::new_rgb8(10, 20);
            assert_eq!(apply_orientation(img, code).dimensions(), (10, 20));
        }
        for code in [5, 6, 7, 8] {
            let img = DynamicImage::new_rgb8(10, 20);
            assert_eq!(apply_orientation(img, code).dimensions(), (20, 10));
        }
    }

    #[test]
    fn load_downscales_and_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbaImage::from_pixel(400, 200, image::Rgba([10, 20, 30, 128]))
            .save(&path)
            .unwrap();

        let bmp = load(&path, Some(100)).unwrap();
        assert_eq!(bmp.format, PixelFormat::Rgba);
        assert_eq!((bmp.width, bmp.height), (100, 50));
        assert_eq!(bmp.pixels.len(), 100 * 50 * 4);
    }

    #[test]
    fn load_never_upscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbImage::new(20, 10).save(&path).unwrap();

        let bmp = load(&path, Some(100)).unwrap();
        assert_eq!((bmp.width, bmp.height), (20, 10));
        assert_eq!(bmp.format, PixelFormat::Rgb);
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        fs::write(&path, b"not an image at all").unwrap();
        assert!(load(&path, None).is_err());
    }

    #[test]
    fn info_is_zero_on_failure() {
        let (w, h, size) = image_info(Path::new("/no/such/image.png"));
        assert_eq!((w, h, size), (0, 0, 0));
    }
}
