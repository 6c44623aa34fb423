//! Audio file enumeration
//!
//! Flat directory of audio files; the file name is the resource key.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Extensions listed and accepted for processing
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Audio directory not found: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Audio file not found: {0}")]
    NotFound(String),
}

/// One audio file in the library
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// True when `key` names a file directly inside a directory
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

/// MIME type from the file extension, `audio/mpeg` when unknown
pub fn mime_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        _ => "audio/mpeg",
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

pub struct AudioLibrary {
    dir: PathBuf,
}

impl AudioLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Audio files directly in the directory, sorted by name
    pub fn list(&self) -> Result<Vec<AudioFile>, LibraryError> {
        if !self.dir.is_dir() {
            return Err(LibraryError::DirectoryMissing(self.dir.clone()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !has_audio_extension(entry.path()) {
                continue;
            }

            let Some(filename) = entry.file_name().to_str() else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            files.push(AudioFile {
                filename: filename.to_string(),
                path: entry.path().to_path_buf(),
                size,
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Path of an existing file named `filename`
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, LibraryError> {
        if !is_safe_key(filename) {
            return Err(LibraryError::InvalidName(filename.to_string()));
        }
        let path = self.dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LibraryError::NotFound(filename.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library_with(files: &[&str]) -> (TempDir, AudioLibrary) {
        let dir = TempDir::new().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), b"0123456789").unwrap();
        }
        let library = AudioLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn lists_only_audio_files_sorted() {
        let (dir, library) = library_with(&["b.wav", "a.MP3", "notes.txt", "c.ogg"]);
        std::fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let names: Vec<String> = library.list().unwrap().into_iter().map(|f| f.filename).collect();

        assert_eq!(names, vec!["a.MP3", "b.wav", "c.ogg"]);
        assert_eq!(library.list().unwrap()[0].size, 10);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let library = AudioLibrary::new("/nonexistent/scribe/audio");
        assert!(matches!(library.list(), Err(LibraryError::DirectoryMissing(_))));
    }

    #[test]
    fn resolve_checks_name_and_existence() {
        let (_dir, library) = library_with(&["lecture.mp3"]);

        assert!(library.resolve("lecture.mp3").is_ok());
        assert!(matches!(library.resolve("other.mp3"), Err(LibraryError::NotFound(_))));
        assert!(matches!(library.resolve("../lecture.mp3"), Err(LibraryError::InvalidName(_))));
    }

    #[test]
    fn safe_keys() {
        assert!(is_safe_key("lecture.mp3"));
        assert!(!is_safe_key(""));
        assert!(!is_safe_key("a/b.mp3"));
        assert!(!is_safe_key("a\\b.mp3"));
        assert!(!is_safe_key(".."));
        assert!(!is_safe_key("../lecture.mp3"));
        assert!(is_safe_key("my..song.mp3"));
        assert!(is_safe_key("..hidden.mp3"));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type("a.mp3"), "audio/mpeg");
        assert_eq!(mime_type("a.WAV"), "audio/wav");
        assert_eq!(mime_type("a.m4a"), "audio/mp4");
        assert_eq!(mime_type("a.flac"), "audio/flac");
        assert_eq!(mime_type("a.ogg"), "audio/ogg");
        assert_eq!(mime_type("a.bin"), "audio/mpeg");
    }
}
