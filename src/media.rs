use std::fs;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Supported media types
// ---------------------------------------------------------------------------

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

/// What a file is, decided once at scan time so the rest of the code never
/// re-derives it from extension strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

impl MediaKind {
    pub fn classify(path: &Path) -> MediaKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return MediaKind::Unsupported;
        };
        let ext = ext.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != MediaKind::Unsupported
    }
}

/// One entry in the browsable file list. Identity is the path; the kind is
/// fixed at listing time.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn new(path: PathBuf) -> Option<MediaFile> {
        let kind = MediaKind::classify(&path);
        kind.is_supported().then_some(MediaFile { path, kind })
    }
}

/// List supported media files directly inside `folder` (no recursion),
/// sorted case-insensitively by full path. An unreadable directory yields an
/// empty list rather than an error.
pub fn list_media(folder: &Path) -> Vec<MediaFile> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<MediaFile> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| MediaFile::new(e.path()))
        .collect();

    files.sort_by_key(|f| f.path.to_string_lossy().to_lowercase());
    files
}

/// Resolve a startup/open target into a browsable file list and the index to
/// show first. A file opens its folder with itself current; a directory
/// opens at the first entry; a path that does not exist opens nothing.
pub fn open_target(path: &Path) -> (Vec<MediaFile>, usize) {
    if path.is_dir() {
        return (list_media(path), 0);
    }
    if !path.is_file() {
        return (Vec::new(), 0);
    }
    let folder = path.parent().unwrap_or(Path::new("."));
    let files = list_media(folder);
    let index = files.iter().position(|f| f.path == path).unwrap_or(0);
    (files, index)
}

/// Human-readable file size for the info bar and compression report.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn classify_by_extension() {
        assert_eq!(MediaKind::classify(Path::new("/a/b.JPG")), MediaKind::Image);
        assert_eq!(MediaKind::classify(Path::new("/a/b.webp")), MediaKind::Image);
        assert_eq!(MediaKind::classify(Path::new("/a/b.mkv")), MediaKind::Video);
        assert_eq!(MediaKind::classify(Path::new("/a/b.txt")), MediaKind::Unsupported);
        assert_eq!(MediaKind::classify(Path::new("/a/noext")), MediaKind::Unsupported);
    }

    #[test]
    fn list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "d.png", "e.txt", "B.gif"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let files = list_media(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // e.txt filtered out, case-insensitive order
        assert_eq!(names, ["B.gif", "c.jpg", "d.png"]);
    }

    #[test]
    fn open_file_lists_folder_with_file_current() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "d.png", "e.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let (files, index) = open_target(&dir.path().join("c.jpg"));
        assert_eq!(files.len(), 2);
        assert_eq!(files[index].path, dir.path().join("c.jpg"));
    }

    #[test]
    fn open_missing_path_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();

        // sibling files exist, but the named file does not
        let (files, index) = open_target(&dir.path().join("ghost.jpg"));
        assert!(files.is_empty());
        assert_eq!(index, 0);
    }

    #[test]
    fn open_folder_starts_at_first_entry() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let (files, index) = open_target(dir.path());
        assert_eq!(index, 0);
        assert_eq!(files[0].path, dir.path().join("a.jpg"));
    }

    #[test]
    fn missing_folder_is_empty() {
        assert!(list_media(Path::new("/no/such/folder")).is_empty());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(2048), "2.0KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0MB");
    }
}
