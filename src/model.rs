use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_CATEGORY: &str = "regular";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub file: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Track {
    pub fn new(file: &str, title: &str) -> Self {
        Self {
            id: None,
            file: file.to_string(),
            title: title.to_string(),
            artist: None,
            category: None,
        }
    }

    /// Identity used by the like store.
    pub fn like_key(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.file)
    }

    pub fn display_title(&self) -> String {
        clean_title(&self.title)
    }

    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

/// Drops one trailing numeric disambiguator: `"Rainy Day 2"` -> `"Rainy Day"`.
pub fn clean_title(title: &str) -> String {
    let trimmed = title.trim();
    let without_digits = trimmed.trim_end_matches(|ch: char| ch.is_ascii_digit());
    if without_digits.len() == trimmed.len() {
        return trimmed.to_string();
    }

    let head = without_digits.trim_end();
    if head.is_empty() || head.len() == without_digits.len() {
        return trimmed.to_string();
    }
    head.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistDocument {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_true")]
    pub repeat: bool,
}

fn default_true() -> bool {
    true
}

/// Where track files live relative to the playlist document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBase {
    Directory(PathBuf),
    Remote(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(PathBuf),
    Remote(Url),
}

impl MediaSource {
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Remote(url) => url.to_string(),
        }
    }
}

impl SourceBase {
    pub fn resolve(&self, file: &str) -> MediaSource {
        if let Ok(url) = Url::parse(file)
            && matches!(url.scheme(), "http" | "https")
        {
            return MediaSource::Remote(url);
        }

        match self {
            Self::Directory(dir) => {
                let path = PathBuf::from(file);
                if path.is_absolute() {
                    MediaSource::File(path)
                } else {
                    MediaSource::File(dir.join(path))
                }
            }
            Self::Remote(base) => match base.join(file) {
                Ok(url) => MediaSource::Remote(url),
                Err(_) => MediaSource::Remote(base.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub playing: bool,
    pub track_index: usize,
    pub time: f64,
}
