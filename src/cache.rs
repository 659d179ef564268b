use crate::error::RadioError;
use crate::fetch::{Destination, FetchRequest, FetchResponse, Fetcher};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use url::Url;

const ACTIVE_MARKER: &str = "ACTIVE";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
}

/// On-disk equivalent of the browser Cache API: one directory per cache name.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn open(&self, name: &str) -> Result<Cache> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Cache { dir })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?;
        for entry in entries.filter_map(|entry| entry.ok()) {
            if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.root.join(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("failed to delete {}", dir.display()))?;
        Ok(true)
    }

    pub fn active_version(&self) -> Option<String> {
        let raw = fs::read_to_string(self.root.join(ACTIVE_MARKER)).ok()?;
        let name = raw.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn set_active(&self, name: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let marker = self.root.join(ACTIVE_MARKER);
        fs::write(&marker, name).with_context(|| format!("failed to write {}", marker.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn put(&self, url: &Url, response: &FetchResponse) -> Result<()> {
        let key = entry_key(url);
        let body_path = self.dir.join(format!("{key}.body"));
        let meta_path = self.dir.join(format!("{key}.json"));

        fs::write(&body_path, &response.body)
            .with_context(|| format!("failed to write {}", body_path.display()))?;
        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
        };
        fs::write(&meta_path, serde_json::to_vec(&meta)?)
            .with_context(|| format!("failed to write {}", meta_path.display()))?;
        Ok(())
    }

    pub fn lookup(&self, url: &Url) -> Option<FetchResponse> {
        let key = entry_key(url);
        let raw = fs::read(self.dir.join(format!("{key}.json"))).ok()?;
        let meta: EntryMeta = serde_json::from_slice(&raw).ok()?;
        if meta.url != url.as_str() {
            return None;
        }
        let body = fs::read(self.dir.join(format!("{key}.body"))).ok()?;
        Some(FetchResponse {
            status: meta.status,
            content_type: meta.content_type,
            body,
        })
    }
}

fn entry_key(url: &Url) -> String {
    Sha256::digest(url.as_str().as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    SkipWaiting,
}

#[derive(Debug)]
struct Lifecycle {
    state: WorkerState,
    controlling: Option<String>,
}

/// Request interceptor in front of the network. Audio passes through
/// untouched; everything else is network-first with a cache fallback.
pub struct CacheWorker {
    network: Arc<dyn Fetcher>,
    storage: CacheStorage,
    version: String,
    shell_assets: Vec<Url>,
    lifecycle: Mutex<Lifecycle>,
}

impl CacheWorker {
    /// Installs this version and activates it unless a different version is
    /// still in control, in which case it waits for `SkipWaiting`.
    pub fn register(
        storage: CacheStorage,
        version: &str,
        shell_assets: Vec<Url>,
        network: Arc<dyn Fetcher>,
    ) -> Self {
        let controlling = storage.active_version();
        let worker = Self {
            network,
            storage,
            version: version.to_string(),
            shell_assets,
            lifecycle: Mutex::new(Lifecycle {
                state: WorkerState::Installing,
                controlling: controlling.clone(),
            }),
        };

        worker.install();
        match controlling {
            Some(active) if active != worker.version => {
                info!(waiting = %worker.version, active = %active, "cache worker waiting");
                worker.lifecycle().state = WorkerState::Waiting;
            }
            _ => worker.activate(),
        }
        worker
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle().state
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn post_message(&self, message: WorkerMessage) {
        match message {
            WorkerMessage::SkipWaiting => {
                if self.state() == WorkerState::Waiting {
                    self.activate();
                }
            }
        }
    }

    fn install(&self) {
        let cache = match self.storage.open(&self.version) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(version = %self.version, "cache install failed: {err:#}");
                return;
            }
        };

        let mut stored = 0_usize;
        for asset in &self.shell_assets {
            match self.network.fetch(&FetchRequest::asset(asset.clone())) {
                Ok(response) if response.status == 200 => match cache.put(asset, &response) {
                    Ok(()) => stored += 1,
                    Err(err) => warn!(url = %asset, "failed to precache: {err:#}"),
                },
                Ok(response) => warn!(url = %asset, status = response.status, "precache skipped"),
                Err(err) => warn!(url = %asset, "precache failed: {err}"),
            }
        }
        info!(version = %self.version, stored, total = self.shell_assets.len(), "shell assets cached");
    }

    fn activate(&self) {
        match self.storage.keys() {
            Ok(names) => {
                for name in names.iter().filter(|name| **name != self.version) {
                    match self.storage.delete(name) {
                        Ok(_) => info!(cache = %name, "deleted stale cache"),
                        Err(err) => warn!(cache = %name, "failed to delete stale cache: {err:#}"),
                    }
                }
            }
            Err(err) => warn!("failed to enumerate caches: {err:#}"),
        }

        if let Err(err) = self.storage.set_active(&self.version) {
            warn!(version = %self.version, "failed to record active cache: {err:#}");
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.controlling = Some(self.version.clone());
        lifecycle.state = WorkerState::Active;
        info!(version = %self.version, "cache worker active");
    }

    fn controlling_cache(&self) -> Option<Cache> {
        let name = self.lifecycle().controlling.clone()?;
        self.storage.open(&name).ok()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Fetcher for CacheWorker {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, RadioError> {
        if request.is_audio() {
            return self.network.fetch(request);
        }

        match self.network.fetch(request) {
            Ok(response) => {
                if response.status == 200
                    && let Some(cache) = self.controlling_cache()
                    && let Err(err) = cache.put(&request.url, &response)
                {
                    warn!(url = %request.url, "opportunistic cache update failed: {err:#}");
                }
                Ok(response)
            }
            Err(err) => {
                let Some(cache) = self.controlling_cache() else {
                    return Err(err);
                };
                if let Some(hit) = cache.lookup(&request.url) {
                    debug!(url = %request.url, "served from offline cache");
                    return Ok(hit);
                }
                if request.destination == Destination::Document
                    && let Some(root) = self.shell_assets.first()
                    && let Some(hit) = cache.lookup(root)
                {
                    debug!(url = %request.url, shell = %root, "served shell root from offline cache");
                    return Ok(hit);
                }
                Err(err)
            }
        }
    }
}
