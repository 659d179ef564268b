use crate::error::RadioError;
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{MediaSource, PlaylistDocument, SourceBase, Track};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    Local(PathBuf),
    Remote(Url),
}

impl PlaylistSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(url) = Url::parse(trimmed)
            && matches!(url.scheme(), "http" | "https")
        {
            return Self::Remote(url);
        }
        Self::Local(PathBuf::from(trimmed))
    }

    pub fn base(&self) -> SourceBase {
        match self {
            Self::Local(path) => {
                let dir = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                SourceBase::Directory(dir)
            }
            Self::Remote(url) => SourceBase::Remote(url.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub tracks: Vec<Track>,
    pub shuffle: bool,
    pub repeat: bool,
    pub base: SourceBase,
}

impl Playlist {
    pub fn resolve(&self, track: &Track) -> MediaSource {
        self.base.resolve(&track.file)
    }
}

/// Fetches and parses the playlist document, then applies the category filter.
pub fn load(
    source: &PlaylistSource,
    category: Option<&str>,
    fetcher: &dyn Fetcher,
) -> Result<Playlist, RadioError> {
    let raw = match source {
        PlaylistSource::Local(path) => read_local(path)?,
        PlaylistSource::Remote(url) => {
            let response = fetcher.fetch(&FetchRequest::document(url.clone()))?;
            if !response.is_success() {
                return Err(RadioError::NetworkFailure(format!(
                    "{url}: HTTP status {}",
                    response.status
                )));
            }
            response.body
        }
    };

    let document = parse_document(&raw)?;
    let total = document.tracks.len();
    let tracks = filter_by_category(document.tracks, category);
    if tracks.is_empty() {
        return Err(RadioError::Empty);
    }

    info!(
        total,
        selected = tracks.len(),
        category = category.unwrap_or("-"),
        shuffle = document.shuffle,
        repeat = document.repeat,
        "playlist loaded"
    );
    Ok(Playlist {
        tracks,
        shuffle: document.shuffle,
        repeat: document.repeat,
        base: source.base(),
    })
}

pub fn parse_document(raw: &[u8]) -> Result<PlaylistDocument, RadioError> {
    serde_json::from_slice(raw).map_err(|err| RadioError::ParseFailure(err.to_string()))
}

fn read_local(path: &Path) -> Result<Vec<u8>, RadioError> {
    fs::read(path).map_err(|err| RadioError::NetworkFailure(format!("{}: {err}", path.display())))
}

/// Keeps tracks of the requested category. Falls back to the full list when
/// nothing matches or when no track carries a category at all.
pub fn filter_by_category(tracks: Vec<Track>, category: Option<&str>) -> Vec<Track> {
    let Some(wanted) = category.map(str::trim).filter(|wanted| !wanted.is_empty()) else {
        return tracks;
    };

    if tracks.iter().all(|track| track.category.is_none()) {
        warn!(category = wanted, "playlist has no categories, using all tracks");
        return tracks;
    }

    let matching: Vec<Track> = tracks
        .iter()
        .filter(|track| track.category_or_default().eq_ignore_ascii_case(wanted))
        .cloned()
        .collect();
    if matching.is_empty() {
        warn!(category = wanted, "no tracks in category, using all tracks");
        return tracks;
    }
    matching
}

/// Identity order, or a uniform permutation when shuffling.
pub fn build_play_order(len: usize, shuffle: bool, rng: &mut SmallRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if shuffle {
        order.shuffle(rng);
    }
    order
}
