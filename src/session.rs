use crate::model::SessionSnapshot;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Writes the snapshot while playing; otherwise removes any previous one.
pub fn store_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    if !snapshot.playing {
        return clear_snapshot(path);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(track_index = snapshot.track_index, time = snapshot.time, "session snapshot stored");
    Ok(())
}

/// One-shot read: the file is removed whether or not it parses.
pub fn take_snapshot(path: &Path) -> Option<SessionSnapshot> {
    let raw = fs::read_to_string(path).ok()?;
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), "failed to remove session snapshot: {err}");
    }

    match serde_json::from_str::<SessionSnapshot>(&raw) {
        Ok(snapshot) if Duration::try_from_secs_f64(snapshot.time).is_ok() => Some(snapshot),
        Ok(_) => None,
        Err(err) => {
            warn!(path = %path.display(), "ignoring corrupt session snapshot: {err}");
            None
        }
    }
}

fn clear_snapshot(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_is_consumed_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let snapshot = SessionSnapshot {
            playing: true,
            track_index: 3,
            time: 42.5,
        };

        store_snapshot(&path, &snapshot).expect("store");
        assert_eq!(take_snapshot(&path), Some(snapshot));
        assert_eq!(take_snapshot(&path), None);
    }

    #[test]
    fn paused_exit_clears_previous_snapshot() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        store_snapshot(
            &path,
            &SessionSnapshot {
                playing: true,
                track_index: 1,
                time: 1.0,
            },
        )
        .expect("store");

        store_snapshot(&path, &SessionSnapshot::default()).expect("store");
        assert!(!path.exists());
    }

    #[test]
    fn out_of_range_time_counts_as_none() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        for time in ["1e300", "-3.0"] {
            fs::write(
                &path,
                format!(r#"{{"playing":true,"track_index":0,"time":{time}}}"#),
            )
            .expect("write");
            assert_eq!(take_snapshot(&path), None);
            assert!(!path.exists());
        }
    }

    #[test]
    fn corrupt_snapshot_counts_as_none() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "playing=true").expect("write");

        assert_eq!(take_snapshot(&path), None);
        assert!(!path.exists());
    }
}
