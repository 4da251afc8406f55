use std::path::PathBuf;

use clap::Parser;
use sysinfo;

use crate::cache::{DEFAULT_MAX_ITEMS, DEFAULT_MAX_MEMORY_MB};
use crate::compress::{CompressFormat, CompressSettings, DEFAULT_QUALITY, DEFAULT_SUFFIX};

pub const HELP_KEYS: &str = "\
Key Bindings:
  q              : Quit
  Left / Right   : Previous / next file
  Home / End     : First / last file
  + / - / Wheel  : Zoom in / out
  0              : Fit to window
  1              : Actual size
  F11 / DblClick : Toggle fullscreen
  Esc            : Leave fullscreen
  i              : Toggle info bar
  c              : Compress current image
";

#[derive(Parser)]
#[command(name = "lv", about = "A folder-browsing photo and video viewer", after_help = HELP_KEYS)]
pub struct Cli {
    /// File or directory to open (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Thumbnail cache memory budget (e.g. 256MB, 1GB). Default: 100MB,
    /// capped at 10% of RAM
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Maximum number of cached thumbnails
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    pub cache_items: usize,

    /// Background decode threads. Default: based on CPU count
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// JPEG quality used by the compressor (1-100)
    #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,

    /// Limit compressed images to this width, keeping aspect ratio
    #[arg(long, value_name = "PIXELS")]
    pub max_width: Option<u32>,

    /// Output format for compressed images
    #[arg(long, value_enum, default_value = "jpeg")]
    pub format: CompressFormat,

    /// Suffix appended to compressed file names
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
}

impl Cli {
    pub fn memory_budget(&self) -> usize {
        match &self.memory {
            Some(s) => parse_memory_budget(s) as usize,
            None => default_memory_budget() as usize,
        }
    }

    pub fn compress_settings(&self) -> CompressSettings {
        CompressSettings {
            quality: self.quality.clamp(1, 100),
            max_width: self.max_width,
            format: self.format,
            suffix: self.suffix.clone(),
        }
    }
}

pub fn parse_memory_budget(s: &str) -> u64 {
    let s = s.trim().to_uppercase();
    if let Some(num) = s.strip_suffix("GB") {
        num.trim().parse::<f64>().unwrap_or(1.0) as u64 * 1024 * 1024 * 1024
    } else if let Some(num) = s.strip_suffix("MB") {
        num.trim().parse::<f64>().unwrap_or(100.0) as u64 * 1024 * 1024
    } else {
        s.parse::<f64>().unwrap_or(100.0) as u64 * 1024 * 1024
    }
}

/// Default thumbnail budget, kept below a tenth of physical memory on small
/// machines.
pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let default = (DEFAULT_MAX_MEMORY_MB as u64) * 1024 * 1024;
    default.min(sys.total_memory() / 10).max(16 * 1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_budget_suffixes() {
        assert_eq!(parse_memory_budget("256MB"), 256 * 1024 * 1024);
        assert_eq!(parse_memory_budget("2GB"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_budget("64"), 64 * 1024 * 1024);
        assert_eq!(parse_memory_budget(" 1 gb "), 1024 * 1024 * 1024);
    }

    #[test]
    fn cli_accepts_optional_path() {
        let cli = Cli::parse_from(["lv"]);
        assert!(cli.path.is_none());

        let cli = Cli::parse_from(["lv", "/tmp/photos"]);
        assert_eq!(cli.path, Some(PathBuf::from("/tmp/photos")));
    }

    #[test]
    fn cli_compress_settings() {
        let cli = Cli::parse_from(["lv", "-q", "90", "--format", "webp", "--max-width", "1600"]);
        let settings = cli.compress_settings();
        assert_eq!(settings.quality, 90);
        assert_eq!(settings.format, CompressFormat::Webp);
        assert_eq!(settings.max_width, Some(1600));
        assert_eq!(settings.suffix, DEFAULT_SUFFIX);
    }
}
