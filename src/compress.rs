use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, RgbImage};
use thiserror::Error;

use crate::loader::{apply_orientation, read_orientation};

// ---------------------------------------------------------------------------
// Image re-encoding
// ---------------------------------------------------------------------------

pub const DEFAULT_SUFFIX: &str = "_compressed";

pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CompressFormat {
    Jpeg,
    Png,
    Webp,
}

impl CompressFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CompressFormat::Jpeg => "jpg",
            CompressFormat::Png => "png",
            CompressFormat::Webp => "webp",
        }
    }
}

/// Session-wide compression defaults, filled from the command line and
/// turned into a request when the user compresses a file.
#[derive(Debug, Clone)]
pub struct CompressSettings {
    pub quality: u8,
    pub max_width: Option<u32>,
    pub format: CompressFormat,
    pub suffix: String,
}

impl CompressSettings {
    pub fn request_for(&self, input: PathBuf) -> CompressRequest {
        CompressRequest {
            input,
            quality: self.quality,
            max_width: self.max_width,
            format: self.format,
            suffix: self.suffix.clone(),
        }
    }
}

/// One user-initiated compression action.
#[derive(Debug, Clone)]
pub struct CompressRequest {
    pub input: PathBuf,
    pub quality: u8,
    pub max_width: Option<u32>,
    pub format: CompressFormat,
    pub suffix: String,
}

/// Result reported back to the UI. Failures are carried as a message here,
/// never as a propagated error.
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub error: Option<String>,
}

impl CompressOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Size reduction in percent (0 when nothing was written).
    pub fn reduction_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_bytes as f64 / self.original_bytes as f64) * 100.0
    }
}

#[derive(Debug, Error)]
enum CompressError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Re-encode `request.input` at the requested quality/size/format, writing
/// `{stem}{suffix}.{ext}` next to the input. All failures come back as a
/// failed outcome.
pub fn compress(request: &CompressRequest) -> CompressOutcome {
    let original_bytes = fs::metadata(&request.input).map(|m| m.len()).unwrap_or(0);

    match run(request) {
        Ok(output) => {
            let compressed_bytes = fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
            CompressOutcome {
                input: request.input.clone(),
                output: Some(output),
                original_bytes,
                compressed_bytes,
                error: None,
            }
        }
        Err(e) => {
            log::warn!("compress {} failed: {}", request.input.display(), e);
            CompressOutcome {
                input: request.input.clone(),
                output: None,
                original_bytes,
                compressed_bytes: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

fn run(request: &CompressRequest) -> Result<PathBuf, CompressError> {
    let output = output_path(&request.input, &request.suffix, request.format);

    let img = image::open(&request.input)?;
    let img = apply_orientation(img, read_orientation(&request.input));
    let img = downscale(img, request.max_width);

    let file = fs::File::create(&output)?;
    match request.format {
        CompressFormat::Jpeg => {
            let rgb = flatten_to_rgb(&img);
            let mut encoder = JpegEncoder::new_with_quality(file, request.quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
        }
        CompressFormat::Png => {
            // Maximum lossless compression; quality does not apply
            let encoder = png::PngEncoder::new_with_quality(
                file,
                png::CompressionType::Best,
                png::FilterType::Adaptive,
            );
            write_rgb_or_rgba(encoder, &img)?;
        }
        CompressFormat::Webp => {
            // The webp encoder in this stack is lossless-only
            let encoder = WebPEncoder::new_lossless(file);
            write_rgb_or_rgba(encoder, &img)?;
        }
    }

    Ok(output)
}

pub fn output_path(input: &Path, suffix: &str, format: CompressFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}{}.{}", stem, suffix, format.extension());
    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn downscale(img: DynamicImage, max_width: Option<u32>) -> DynamicImage {
    match max_width {
        Some(max) if img.width() > max => {
            let h = ((img.height() as u64 * max as u64) / img.width() as u64).max(1) as u32;
            img.resize_exact(max, h, FilterType::Lanczos3)
        }
        _ => img,
    }
}

/// Composite any transparency onto an opaque white background. JPEG has no
/// alpha channel.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let a = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + 255 * (255 - a)) / 255) as u8;
        }
    }
    rgb
}

fn write_rgb_or_rgba<E: image::ImageEncoder>(
    encoder: E,
    img: &DynamicImage,
) -> Result<(), image::ImageError> {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        encoder.write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
    } else {
        let rgb = img.to_rgb8();
        encoder.write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
    }
}
