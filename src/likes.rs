use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug)]
pub struct LikeStore {
    path: PathBuf,
    liked: BTreeSet<String>,
}

impl LikeStore {
    /// Never fails: an unreadable or corrupt file starts an empty set.
    pub fn load(path: &Path) -> Self {
        let liked = match read_liked(path) {
            Ok(liked) => liked,
            Err(err) => {
                warn!(path = %path.display(), "ignoring unreadable likes: {err:#}");
                BTreeSet::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            liked,
        }
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.liked.contains(track_id)
    }

    /// Flips the like state, persists, and returns the new state.
    pub fn toggle(&mut self, track_id: &str) -> Result<bool> {
        let now_liked = if self.liked.remove(track_id) {
            false
        } else {
            self.liked.insert(track_id.to_string());
            true
        };
        self.save()?;
        Ok(now_liked)
    }

    pub fn len(&self) -> usize {
        self.liked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liked.is_empty()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let ids: Vec<&String> = self.liked.iter().collect();
        let json = serde_json::to_string(&ids)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

fn read_liked(path: &Path) -> Result<BTreeSet<String>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read likes file {}", path.display()))?;
    let ids: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse likes file {}", path.display()))?;
    Ok(ids.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn double_toggle_restores_state() {
        let dir = tempdir().expect("tempdir");
        let mut store = LikeStore::load(&dir.path().join("likes.json"));

        assert!(!store.is_liked("rain"));
        assert!(store.toggle("rain").expect("toggle"));
        assert!(store.is_liked("rain"));
        assert!(!store.toggle("rain").expect("toggle"));
        assert!(!store.is_liked("rain"));
    }

    #[test]
    fn likes_survive_reload_as_array() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("likes.json");
        let mut store = LikeStore::load(&path);
        store.toggle("b.mp3").expect("toggle");
        store.toggle("a.mp3").expect("toggle");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw, r#"["a.mp3","b.mp3"]"#);

        let reloaded = LikeStore::load(&path);
        assert!(reloaded.is_liked("a.mp3"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("likes.json");
        fs::write(&path, "{not json").expect("write");

        let store = LikeStore::load(&path);
        assert!(store.is_empty());
    }
}
