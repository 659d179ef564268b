use crate::audio::{MediaElement, NullAudioEngine, RodioAudioEngine};
use crate::cache::{CacheStorage, CacheWorker, WorkerMessage};
use crate::config::{self, Settings};
use crate::controller::{PlaybackController, PlaybackListener, PlaybackState};
use crate::error::RadioError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::i18n::Strings;
use crate::install::{
    ClickOutcome, DesktopEntryPrompt, InstallPrompter, Platform, PromptChoice, desktop_entry_path,
    user_agent,
};
use crate::likes::LikeStore;
use crate::model::{SessionSnapshot, Track};
use crate::playlist::{self, Playlist, PlaylistSource};
use crate::session;
use crate::visualizer::Visualizer;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::env;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

const VOLUME_STEP: f32 = 0.05;
const SEEK_STEP_SECONDS: f64 = 5.0;
const FLASH_TTL: Duration = Duration::from_secs(3);
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const STREAM_DIR: &str = "lofi-radio-stream";

pub struct App {
    pub controller: Option<PlaybackController>,
    pub load_error: Option<RadioError>,
    pub likes: LikeStore,
    pub prompter: InstallPrompter,
    pub visualizer: Visualizer,
    pub strings: &'static Strings,
    pub instructions: Option<Platform>,
    pub category: Option<String>,
    flash: Option<(String, Instant)>,
    pub dirty: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        loaded: Result<Playlist, RadioError>,
        likes: LikeStore,
        prompter: InstallPrompter,
        visualizer: Visualizer,
        strings: &'static Strings,
    ) -> Self {
        let (controller, load_error) = match loaded {
            Ok(playlist) => {
                let mut controller = PlaybackController::new(playlist);
                controller.add_listener(Box::new(LogListener));
                (Some(controller), None)
            }
            Err(err) => {
                warn!("playlist unavailable: {err}");
                (None, Some(err))
            }
        };
        Self {
            controller,
            load_error,
            likes,
            prompter,
            visualizer,
            strings,
            instructions: None,
            category: None,
            flash: None,
            dirty: true,
            should_quit: false,
        }
    }

    /// Loads the first track, or resumes the previous session when one was
    /// saved while playing.
    pub fn start(
        &mut self,
        media: &mut dyn MediaElement,
        autoplay: bool,
        snapshot: Option<SessionSnapshot>,
    ) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let resumed = snapshot.is_some_and(|snapshot| controller.resume(snapshot, media));
        if !resumed {
            controller.load_track(0, autoplay, media);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(PlaybackController::is_playing)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.controller.as_ref()?.current_track()
    }

    pub fn current_liked(&self) -> bool {
        self.current_track()
            .is_some_and(|track| self.likes.is_liked(track.like_key()))
    }

    /// Feeds engine events to the controller and runs due timers.
    pub fn pump(&mut self, media: &mut dyn MediaElement, now: Instant) {
        if self
            .flash
            .as_ref()
            .is_some_and(|(_, since)| now.saturating_duration_since(*since) >= FLASH_TTL)
        {
            self.flash = None;
            self.dirty = true;
        }

        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        while let Some(event) = media.poll_event() {
            controller.handle_event(event, media, now);
        }
        controller.tick(now, media);
        if controller.dirty {
            controller.dirty = false;
            self.dirty = true;
        }
    }

    pub fn status_text(&self) -> String {
        if let Some((message, _)) = &self.flash {
            return message.clone();
        }
        if let Some(err) = &self.load_error {
            return match err {
                RadioError::Empty => self.strings.playlist_empty.to_string(),
                other => format!("{}: {other}", self.strings.playlist_error),
            };
        }
        self.controller
            .as_ref()
            .map(|controller| controller.status().text(self.strings).to_string())
            .unwrap_or_default()
    }

    pub fn handle_key(&mut self, key: KeyEvent, media: &mut dyn MediaElement, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        self.dirty = true;

        if self.instructions.is_some()
            && matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('i'))
        {
            self.instructions = None;
            return;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => self.instructions = None,
            KeyCode::Char('i') => self.click_install(now),
            KeyCode::Char('l') => self.toggle_like(now),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_volume(VOLUME_STEP, media, now),
            KeyCode::Char('-') => self.adjust_volume(-VOLUME_STEP, media, now),
            _ => {
                let Some(controller) = self.controller.as_mut() else {
                    return;
                };
                match key.code {
                    KeyCode::Char(' ') => controller.toggle(media),
                    KeyCode::Char('n') | KeyCode::Right => controller.next(media),
                    KeyCode::Char('p') | KeyCode::Left => controller.previous(media),
                    KeyCode::Char(']') => controller.seek_by(SEEK_STEP_SECONDS, media),
                    KeyCode::Char('[') => controller.seek_by(-SEEK_STEP_SECONDS, media),
                    _ => {}
                }
            }
        }
    }

    pub fn snapshot(&self, media: &dyn MediaElement) -> SessionSnapshot {
        self.controller
            .as_ref()
            .map(|controller| controller.snapshot(media))
            .unwrap_or_default()
    }

    fn toggle_like(&mut self, now: Instant) {
        let Some(key) = self.current_track().map(|track| track.like_key().to_string()) else {
            return;
        };
        let message = match self.likes.toggle(&key) {
            Ok(true) => self.strings.liked.to_string(),
            Ok(false) => self.strings.unliked.to_string(),
            Err(err) => {
                warn!(track = %key, "failed to save likes: {err:#}");
                self.strings.likes_save_error.to_string()
            }
        };
        self.set_flash(message, now);
    }

    fn click_install(&mut self, now: Instant) {
        let message = match self.prompter.click(now) {
            ClickOutcome::Instructions(platform) => {
                self.instructions = Some(platform);
                return;
            }
            ClickOutcome::Prompted(PromptChoice::Accepted) => self.strings.install_done.to_string(),
            ClickOutcome::Prompted(PromptChoice::Dismissed) => {
                self.strings.install_dismissed.to_string()
            }
            ClickOutcome::PromptFailed(err) => {
                warn!("install prompt failed: {err}");
                format!("{}: {err}", self.strings.install_error)
            }
        };
        self.set_flash(message, now);
    }

    fn adjust_volume(&mut self, delta: f32, media: &mut dyn MediaElement, now: Instant) {
        let volume = (media.volume() + delta).clamp(0.0, 1.0);
        match self.controller.as_mut() {
            Some(controller) => controller.set_volume(volume, media),
            None => media.set_volume(volume),
        }
        let percent = (media.volume() * 100.0).round() as u16;
        self.set_flash(format!("{}: {percent}%", self.strings.volume), now);
    }

    fn set_flash(&mut self, message: String, now: Instant) {
        self.flash = Some((message, now));
        self.dirty = true;
    }
}

struct LogListener;

impl PlaybackListener for LogListener {
    fn on_track_change(&mut self, track: &Track, index: usize) {
        info!(index, title = %track.display_title(), file = %track.file, "track changed");
    }

    fn on_state_change(&mut self, state: PlaybackState) {
        info!(?state, "playback state changed");
    }
}

pub fn run(settings: Settings) -> Result<()> {
    let strings = settings.resolved_locale().strings();
    let source = PlaylistSource::parse(&settings.playlist);
    let fetcher = build_fetcher(&settings, &source)?;

    let mut media: Box<dyn MediaElement> =
        match RodioAudioEngine::new(Arc::clone(&fetcher), env::temp_dir().join(STREAM_DIR)) {
            Ok(engine) => Box::new(engine),
            Err(err) => {
                warn!("audio output unavailable, running silent: {err:#}");
                Box::new(NullAudioEngine::unavailable())
            }
        };
    media.set_volume(settings.volume);
    info!(output = ?media.output_name(), "audio engine ready");

    let loaded = playlist::load(&source, settings.category.as_deref(), fetcher.as_ref());
    let likes = LikeStore::load(&config::likes_path()?);
    let visualizer = Visualizer::new(media.sample_tap());
    let prompter = build_prompter(Instant::now());
    let mut app = App::new(loaded, likes, prompter, visualizer, strings);
    app.category = settings.category.clone();

    let session_path = config::session_path()?;
    let snapshot = session::take_snapshot(&session_path);
    app.start(&mut *media, settings.autoplay, snapshot);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_draw = Instant::now();
    let result: Result<()> = loop {
        let now = Instant::now();
        app.pump(&mut *media, now);

        let animating = app.visualizer.is_enabled() && app.is_playing();
        if app.dirty || animating || last_draw.elapsed() > REDRAW_INTERVAL {
            let playing = app.is_playing();
            app.visualizer.frame(playing);
            if let Err(err) = terminal.draw(|frame| crate::ui::draw(frame, &app, &*media, now)) {
                break Err(err.into());
            }
            app.dirty = false;
            last_draw = Instant::now();
        }

        match event::poll(Duration::from_millis(33)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => break Err(err.into()),
        }
        match event::read() {
            Ok(Event::Key(key)) => app.handle_key(key, &mut *media, Instant::now()),
            Ok(Event::Resize(_, _)) => app.dirty = true,
            Ok(_) => {}
            Err(err) => break Err(err.into()),
        }
        if app.should_quit {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let store_result = session::store_snapshot(&session_path, &app.snapshot(&*media));
    media.stop();
    result?;
    store_result?;
    Ok(())
}

fn build_fetcher(settings: &Settings, source: &PlaylistSource) -> Result<Arc<dyn Fetcher>> {
    let network: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
    if !settings.offline_cache {
        return Ok(network);
    }

    let mut shell_assets: Vec<Url> = Vec::new();
    if let PlaylistSource::Remote(url) = source {
        shell_assets.push(url.clone());
    }
    for raw in &settings.shell_assets {
        match Url::parse(raw) {
            Ok(url) => shell_assets.push(url),
            Err(err) => warn!(asset = %raw, "ignoring shell asset: {err}"),
        }
    }

    let storage = CacheStorage::new(&config::cache_root()?);
    let worker = CacheWorker::register(storage, &settings.cache_version, shell_assets, network);
    worker.post_message(WorkerMessage::SkipWaiting);
    info!(version = worker.version(), state = ?worker.state(), "offline cache registered");
    Ok(Arc::new(worker))
}

fn build_prompter(now: Instant) -> InstallPrompter {
    let platform = Platform::sniff(&user_agent());
    let Some(entry) = desktop_entry_path().filter(|_| cfg!(target_os = "linux")) else {
        return InstallPrompter::new(platform, false);
    };
    if DesktopEntryPrompt::is_installed(&entry) {
        return InstallPrompter::new(platform, true);
    }

    let mut prompter = InstallPrompter::new(platform, false);
    match env::current_exe() {
        Ok(exe) => prompter.on_install_available(Box::new(DesktopEntryPrompt::new(entry, exe)), now),
        Err(err) => warn!("cannot locate executable for launcher: {err}"),
    }
    prompter
}
