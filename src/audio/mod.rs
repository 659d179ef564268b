mod probe;
mod tap;

use crate::error::RadioError;
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::MediaSource;
use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub use probe::duration as probe_duration;
pub use tap::{SampleTap, TapWindow, TappedSource};

pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
const MAX_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaError {
    pub code: Option<MediaErrorCode>,
    pub message: String,
}

impl MediaError {
    pub fn new(code: MediaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Ready {
        duration: Option<Duration>,
    },
    TimeUpdate {
        position: Duration,
        duration: Option<Duration>,
    },
    Ended,
    Error(MediaError),
}

/// Playback surface the controller drives. Events are pulled with
/// `poll_event` from the UI loop.
pub trait MediaElement {
    fn set_source(&mut self, source: &MediaSource);
    fn play(&mut self) -> Result<(), RadioError>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn poll_event(&mut self) -> Option<MediaEvent>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> Option<String>;

    fn sample_tap(&self) -> Option<SampleTap> {
        None
    }
}

struct Resolved {
    generation: u64,
    result: Result<PathBuf, MediaError>,
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    fetcher: Arc<dyn Fetcher>,
    stream_dir: PathBuf,
    resolved_tx: Sender<Resolved>,
    resolved_rx: Receiver<Resolved>,
    generation: u64,
    current: Option<MediaSource>,
    loaded: bool,
    wants_play: bool,
    track_duration: Option<Duration>,
    scratch_file: Option<PathBuf>,
    events: VecDeque<MediaEvent>,
    ended_reported: bool,
    last_time_update: Option<Instant>,
    volume: f32,
    tap: SampleTap,
}

impl RodioAudioEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, stream_dir: PathBuf) -> Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;
        let (resolved_tx, resolved_rx) = mpsc::channel();

        Ok(Self {
            stream,
            sink,
            fetcher,
            stream_dir,
            resolved_tx,
            resolved_rx,
            generation: 0,
            current: None,
            loaded: false,
            wants_play: false,
            track_duration: None,
            scratch_file: None,
            events: VecDeque::new(),
            ended_reported: false,
            last_time_update: None,
            volume: 1.0,
            tap: SampleTap::new(),
        })
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            let default = OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                });
            match default {
                Ok(stream) => Ok(stream),
                Err(default_err) => open_fallback_stream().with_context(|| {
                    format!(
                        "unable to start any audio output stream after default failed: {default_err:#}"
                    )
                }),
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }

    fn remove_scratch(&mut self) {
        if let Some(path) = self.scratch_file.take()
            && let Err(err) = fs::remove_file(&path)
        {
            debug!(path = %path.display(), "failed to remove stream scratch file: {err}");
        }
    }

    fn drain_resolved(&mut self) {
        while let Ok(resolved) = self.resolved_rx.try_recv() {
            if resolved.generation != self.generation {
                if let Ok(path) = resolved.result {
                    discard_stale_download(&path, &self.stream_dir);
                }
                continue;
            }

            match resolved.result {
                Ok(path) => {
                    if path.starts_with(&self.stream_dir) {
                        self.scratch_file = Some(path.clone());
                    }
                    if let Err(err) = self.attach(&path) {
                        self.events.push_back(MediaEvent::Error(err));
                    }
                }
                Err(err) => self.events.push_back(MediaEvent::Error(err)),
            }
        }
    }

    fn attach(&mut self, path: &Path) -> Result<(), MediaError> {
        let file = File::open(path).map_err(|err| {
            MediaError::new(
                MediaErrorCode::SrcNotSupported,
                format!("{}: {err}", path.display()),
            )
        })?;
        let source = Decoder::try_from(file).map_err(|err| {
            MediaError::new(MediaErrorCode::Decode, format!("{}: {err}", path.display()))
        })?;

        self.track_duration = source
            .total_duration()
            .filter(|duration| !duration.is_zero())
            .or_else(|| probe::duration(path));

        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.sink.set_volume(self.volume);
        self.sink.append(TappedSource::new(source, self.tap.clone()));
        if self.wants_play {
            self.sink.play();
        }

        self.loaded = true;
        self.ended_reported = false;
        self.events.push_back(MediaEvent::Ready {
            duration: self.track_duration,
        });
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.loaded && !self.sink.is_paused()
    }
}

impl MediaElement for RodioAudioEngine {
    fn set_source(&mut self, source: &MediaSource) {
        self.sink.stop();
        self.remove_scratch();
        self.generation = self.generation.wrapping_add(1);
        self.current = Some(source.clone());
        self.loaded = false;
        self.wants_play = false;
        self.track_duration = None;
        self.events.clear();
        self.ended_reported = false;
        self.last_time_update = None;
        self.tap.clear();

        let generation = self.generation;
        let source = source.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let stream_dir = self.stream_dir.clone();
        let tx = self.resolved_tx.clone();
        thread::spawn(move || {
            let result = resolve_source(&source, fetcher.as_ref(), &stream_dir, generation);
            let _ = tx.send(Resolved { generation, result });
        });
    }

    fn play(&mut self) -> Result<(), RadioError> {
        if self.current.is_none() {
            return Err(RadioError::SourceUnsupportedOrMissing(
                "no source selected".to_string(),
            ));
        }
        self.wants_play = true;
        if self.loaded {
            self.sink.play();
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.wants_play = false;
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.generation = self.generation.wrapping_add(1);
        self.remove_scratch();
        self.current = None;
        self.loaded = false;
        self.wants_play = false;
        self.track_duration = None;
        self.events.clear();
        self.tap.clear();
    }

    fn is_paused(&self) -> bool {
        !self.wants_play
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.drain_resolved();
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }

        if !self.is_playing() {
            return None;
        }
        if self.sink.empty() {
            if self.ended_reported {
                return None;
            }
            self.ended_reported = true;
            return Some(MediaEvent::Ended);
        }

        let due = self
            .last_time_update
            .is_none_or(|last| last.elapsed() >= TIME_UPDATE_INTERVAL);
        if !due {
            return None;
        }
        self.last_time_update = Some(Instant::now());
        Some(MediaEvent::TimeUpdate {
            position: self.sink.get_pos(),
            duration: self.track_duration,
        })
    }

    fn position(&self) -> Option<Duration> {
        self.loaded.then(|| self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if !self.loaded {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        self.ended_reported = false;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn output_name(&self) -> Option<String> {
        let config = self.stream.config();
        Some(format!(
            "System output ({} ch, {} Hz)",
            config.channel_count(),
            config.sample_rate()
        ))
    }

    fn sample_tap(&self) -> Option<SampleTap> {
        Some(self.tap.clone())
    }
}

impl Drop for RodioAudioEngine {
    fn drop(&mut self) {
        self.remove_scratch();
    }
}

/// Turns a media source into a local file the decoder can open. Remote audio
/// is downloaded into `stream_dir`.
fn resolve_source(
    source: &MediaSource,
    fetcher: &dyn Fetcher,
    stream_dir: &Path,
    generation: u64,
) -> Result<PathBuf, MediaError> {
    match source {
        MediaSource::File(path) => {
            if path.is_file() {
                Ok(path.clone())
            } else {
                Err(MediaError::new(
                    MediaErrorCode::SrcNotSupported,
                    format!("missing audio file {}", path.display()),
                ))
            }
        }
        MediaSource::Remote(url) => {
            let response = fetcher
                .fetch(&FetchRequest::audio(url.clone()))
                .map_err(|err| MediaError::new(MediaErrorCode::Network, err.to_string()))?;
            if !response.is_success() {
                return Err(MediaError::new(
                    MediaErrorCode::SrcNotSupported,
                    format!("{url}: HTTP status {}", response.status),
                ));
            }

            let extension = url
                .path()
                .rsplit('/')
                .next()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| !ext.is_empty() && ext.len() <= 5)
                .unwrap_or_else(|| "mp3".to_string());
            let path = stream_dir.join(format!("stream-{generation}.{extension}"));

            fs::create_dir_all(stream_dir)
                .and_then(|()| fs::write(&path, &response.body))
                .map_err(|err| {
                    warn!(path = %path.display(), "failed to store streamed audio: {err}");
                    MediaError::new(MediaErrorCode::Aborted, err.to_string())
                })?;
            Ok(path)
        }
    }
}

/// Removes a download that finished after its source was replaced. Local
/// files outside the stream directory are never touched.
fn discard_stale_download(path: &Path, stream_dir: &Path) {
    if !path.starts_with(stream_dir) {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        debug!(path = %path.display(), "failed to remove stale stream file: {err}");
    }
}

fn open_fallback_stream() -> Result<OutputStream> {
    let host = rodio::cpal::default_host();
    let mut candidates: Vec<String> = host
        .output_devices()
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|device| device.name().ok())
        .collect();
    candidates.sort_by_cached_key(|name| {
        let lower = name.to_ascii_lowercase();
        let rank = if lower.contains("pulse") {
            0_u8
        } else if lower.contains("pipewire") {
            1_u8
        } else if lower.contains("default") {
            2_u8
        } else {
            3_u8
        };
        (rank, lower)
    });
    candidates.dedup();

    for candidate in candidates {
        let Some(device) = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
        else {
            continue;
        };
        let opened = OutputStreamBuilder::from_device(device)
            .context("failed to open fallback output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start fallback output stream")
            });
        match opened {
            Ok(stream) => return Ok(stream),
            Err(err) => debug!(device = %candidate, "output device rejected: {err:#}"),
        }
    }

    Err(anyhow::anyhow!("no usable output device"))
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Engine without an output device. Keeps a wall-clock position so the rest
/// of the player behaves as if audio were running.
pub struct NullAudioEngine {
    output_available: bool,
    paused: bool,
    current: Option<MediaSource>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    events: VecDeque<MediaEvent>,
    ended_reported: bool,
    last_time_update: Option<Instant>,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            output_available: true,
            paused: true,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            events: VecDeque::new(),
            ended_reported: false,
            last_time_update: None,
        }
    }

    /// Stand-in used when no output device could be opened: every `play`
    /// is refused.
    pub fn unavailable() -> Self {
        Self {
            output_available: false,
            ..Self::new()
        }
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for NullAudioEngine {
    fn set_source(&mut self, source: &MediaSource) {
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.ended_reported = false;
        self.last_time_update = None;
        self.events.clear();
        self.current = Some(source.clone());

        self.track_duration = match source {
            MediaSource::File(path) if !path.is_file() => {
                self.events
                    .push_back(MediaEvent::Error(MediaError::new(
                        MediaErrorCode::SrcNotSupported,
                        format!("missing audio file {}", path.display()),
                    )));
                return;
            }
            MediaSource::File(path) => probe::duration(path),
            MediaSource::Remote(_) => None,
        };
        self.events.push_back(MediaEvent::Ready {
            duration: self.track_duration,
        });
    }

    fn play(&mut self) -> Result<(), RadioError> {
        if !self.output_available {
            return Err(RadioError::PlaybackBlocked(
                "no audio output device".to_string(),
            ));
        }
        if self.current.is_none() {
            return Err(RadioError::SourceUnsupportedOrMissing(
                "no source selected".to_string(),
            ));
        }
        if self.paused {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.events.clear();
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        if self.paused || self.current.is_none() {
            return None;
        }

        if let Some(duration) = self.track_duration
            && self.current_position() >= duration
        {
            if self.ended_reported {
                return None;
            }
            self.ended_reported = true;
            return Some(MediaEvent::Ended);
        }

        let due = self
            .last_time_update
            .is_none_or(|last| last.elapsed() >= TIME_UPDATE_INTERVAL);
        if !due {
            return None;
        }
        self.last_time_update = Some(Instant::now());
        Some(MediaEvent::TimeUpdate {
            position: self.current_position(),
            duration: self.track_duration,
        })
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        self.ended_reported = false;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn output_name(&self) -> Option<String> {
        Some("Null audio engine".to_string())
    }
}
