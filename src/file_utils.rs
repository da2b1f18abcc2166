use anyhow::{Result, Context, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use log::debug;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::language_utils::language_variants;
use crate::subtitle_processor::Dialect;

// @module: File and directory utilities

// @const: Characters that may not appear in a written file name
const FORBIDDEN_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

// @const: Markup extensions probed after the requested one
const FALLBACK_EXTENSIONS: &[&str] = &["srt", "vtt"];

// @struct: A caption file found in a scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionArtifact {
    // @field: Full path of the file
    pub path: PathBuf,
    // @field: Language code taken from the file name
    pub language: String,
    // @field: Dialect implied by the extension
    pub dialect: Dialect,
    // @field: File name carried an `.auto.` marker
    pub is_auto_generated: bool,
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        Self::write_bytes(path, content.as_bytes())
    }

    /// Write raw bytes to a file, creating the parent directory
    pub fn write_bytes<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Expand a leading `~` to the home directory
    pub fn expand_home<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| path.to_path_buf()),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Make a title safe to use as a file name
    ///
    /// Separators and reserved characters become `_`, control characters are
    /// dropped, leading and trailing dots and whitespace are trimmed and the
    /// result is cut to `max_chars` characters.
    pub fn sanitize_filename(title: &str, max_chars: usize) -> String {
        let replaced: String = title
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
            .collect();

        let truncated: String = replaced
            .trim_matches(|c: char| c == '.' || c.is_whitespace())
            .chars()
            .take(max_chars)
            .collect();
        let cleaned = truncated.trim_end_matches(|c: char| c == '.' || c.is_whitespace());

        if cleaned.is_empty() {
            "untitled".to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Candidate file names for a caption artifact, in priority order
    pub fn artifact_candidates(base: &str, languages: &[String], extension: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        for lang in languages {
            for variant in language_variants(lang) {
                for ext in std::iter::once(extension).chain(FALLBACK_EXTENSIONS.iter().copied()) {
                    for name in [format!("{base}.{variant}.{ext}"), format!("{base}.{variant}.auto.{ext}")] {
                        if !candidates.contains(&name) {
                            candidates.push(name);
                        }
                    }
                }
            }
        }
        candidates
    }

    /// Find the caption file a download left in `dir`
    ///
    /// Exact candidates from [`Self::artifact_candidates`] win; otherwise any
    /// `base.*.ext` file is taken, first by extension preference then by name.
    pub fn locate_caption_artifact<P: AsRef<Path>>(
        dir: P,
        base: &str,
        languages: &[String],
        extension: &str,
    ) -> Result<Option<CaptionArtifact>> {
        let dir = dir.as_ref();

        for name in Self::artifact_candidates(base, languages, extension) {
            let path = dir.join(&name);
            if Self::file_exists(&path) {
                debug!("Found caption artifact {}", name);
                return Ok(Self::describe_artifact(path, base));
            }
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        for ext in std::iter::once(extension).chain(FALLBACK_EXTENSIONS.iter().copied()) {
            let prefix = format!("{}.", base);
            let suffix = format!(".{}", ext);
            let hit = names.iter().find(|name| {
                name.starts_with(&prefix) && name.ends_with(&suffix) && name.len() > prefix.len() + suffix.len()
            });
            if let Some(name) = hit {
                debug!("Found caption artifact {} by wildcard", name);
                return Ok(Self::describe_artifact(dir.join(name), base));
            }
        }

        Ok(None)
    }

    fn describe_artifact(path: PathBuf, base: &str) -> Option<CaptionArtifact> {
        let name = path.file_name()?.to_string_lossy().to_string();
        let rest = name.strip_prefix(base)?.trim_start_matches('.');
        let parts: Vec<&str> = rest.split('.').collect();
        let extension = *parts.last()?;
        let is_auto_generated = parts.len() >= 3 && parts[parts.len() - 2] == "auto";
        let language = if is_auto_generated {
            parts[parts.len() - 3]
        } else if parts.len() >= 2 {
            parts[parts.len() - 2]
        } else {
            ""
        }
        .to_string();

        let dialect = match extension.to_ascii_lowercase().as_str() {
            "srt" => Dialect::Srt,
            "vtt" => Dialect::Vtt,
            _ => Dialect::Plain,
        };

        Some(CaptionArtifact {
            path,
            language,
            dialect,
            is_auto_generated,
        })
    }
}

// @struct: Private copy of a cookie jar, deleted on drop
#[derive(Debug)]
pub struct SessionToken {
    file: NamedTempFile,
}

impl SessionToken {
    /// Copy a Netscape cookie file into a private temporary file
    pub fn from_cookie_file<P: AsRef<Path>>(source: P) -> Result<Self> {
        let source = FileManager::expand_home(source);
        if !FileManager::file_exists(&source) {
            return Err(anyhow!("Cookies file does not exist: {:?}", source));
        }

        let file = tempfile::Builder::new()
            .prefix("subgrab-cookies-")
            .suffix(".txt")
            .tempfile()
            .context("Failed to create temporary cookies file")?;
        fs::copy(&source, file.path())
            .with_context(|| format!("Failed to copy cookies file: {:?}", source))?;

        debug!("Session cookies copied to {:?}", file.path());
        Ok(Self { file })
    }

    // @returns: Path of the private copy
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
