use crate::audio::{MediaElement, MediaError, MediaErrorCode, MediaEvent};
use crate::i18n::Strings;
use crate::model::{SessionSnapshot, Track};
use crate::playlist::{Playlist, build_play_order};
use crate::progress::{self, ProgressReport};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const ERROR_SKIP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    /// Ready, but the output refused to start.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    ClickToStart,
    Loading,
    Playing,
    Paused,
    EndOfPlaylist,
    TrackLoadError,
    PlaybackError,
}

impl Status {
    pub fn text(self, strings: &Strings) -> &'static str {
        match self {
            Self::ClickToStart => strings.click_to_start,
            Self::Loading => strings.loading,
            Self::Playing => strings.playing,
            Self::Paused => strings.pause,
            Self::EndOfPlaylist => strings.end_of_playlist,
            Self::TrackLoadError => strings.track_load_error,
            Self::PlaybackError => strings.playback_error,
        }
    }
}

pub trait PlaybackListener {
    fn on_track_change(&mut self, _track: &Track, _index: usize) {}
    fn on_progress(&mut self, _report: &ProgressReport) {}
    fn on_state_change(&mut self, _state: PlaybackState) {}
}

pub struct PlaybackController {
    playlist: Playlist,
    order: Vec<usize>,
    current: usize,
    state: PlaybackState,
    autoplay: bool,
    play_requested: bool,
    pending_skip: Option<Instant>,
    pending_seek: Option<f64>,
    current_time: f64,
    duration: Option<f64>,
    status: Status,
    rng: SmallRng,
    listeners: Vec<Box<dyn PlaybackListener>>,
    pub dirty: bool,
}

impl PlaybackController {
    pub fn new(playlist: Playlist) -> Self {
        Self::with_rng(playlist, SmallRng::from_os_rng())
    }

    pub fn with_rng(playlist: Playlist, mut rng: SmallRng) -> Self {
        let order = build_play_order(playlist.tracks.len(), playlist.shuffle, &mut rng);
        Self {
            playlist,
            order,
            current: 0,
            state: PlaybackState::Idle,
            autoplay: false,
            play_requested: false,
            pending_skip: None,
            pending_seek: None,
            current_time: 0.0,
            duration: None,
            status: Status::ClickToStart,
            rng,
            listeners: Vec::new(),
            dirty: true,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn PlaybackListener>) {
        self.listeners.push(listener);
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Playing, or about to play once the pending load completes.
    pub fn wants_playback(&self) -> bool {
        match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Loading => self.autoplay,
            _ => false,
        }
    }

    pub fn has_pending_skip(&self) -> bool {
        self.pending_skip.is_some()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.order
            .get(self.current)
            .and_then(|idx| self.playlist.tracks.get(*idx))
    }

    pub fn counter_label(&self) -> String {
        if self.order.is_empty() {
            return String::from("0 / 0");
        }
        format!("{} / {}", self.current + 1, self.order.len())
    }

    pub fn report(&self) -> ProgressReport {
        progress::report(self.current_time, self.duration)
    }

    pub fn load_track(&mut self, index: usize, autoplay: bool, media: &mut dyn MediaElement) {
        if self.order.is_empty() {
            return;
        }
        let index = if index < self.order.len() {
            index
        } else if self.playlist.repeat {
            0
        } else {
            self.halt(media);
            return;
        };

        self.current = index;
        self.autoplay = autoplay;
        self.pending_skip = None;
        self.pending_seek = None;
        self.current_time = 0.0;
        self.duration = None;

        let Some(track) = self.current_track() else {
            return;
        };
        let source = self.playlist.resolve(track);
        debug!(index, source = %source.label(), autoplay, "loading track");
        media.set_source(&source);

        self.status = Status::Loading;
        self.set_state(PlaybackState::Loading);
        if let Some(track_idx) = self.order.get(index).copied()
            && let Some(track) = self.playlist.tracks.get(track_idx)
        {
            for listener in &mut self.listeners {
                listener.on_track_change(track, index);
            }
        }
    }

    pub fn play(&mut self, media: &mut dyn MediaElement) {
        if self.order.is_empty() {
            return;
        }
        self.play_requested = true;
        match self.state {
            PlaybackState::Idle => self.load_track(self.current, true, media),
            // The halted track has already played out; start it over.
            PlaybackState::Ready if self.status == Status::EndOfPlaylist => {
                self.load_track(self.current, true, media)
            }
            PlaybackState::Loading => self.autoplay = true,
            PlaybackState::Ready | PlaybackState::Blocked | PlaybackState::Playing => {
                self.autoplay = true;
                self.start_output(media);
            }
        }
        self.dirty = true;
    }

    pub fn pause(&mut self, media: &mut dyn MediaElement) {
        self.autoplay = false;
        if self.state == PlaybackState::Playing {
            media.pause();
            self.status = Status::Paused;
            self.set_state(PlaybackState::Ready);
        }
        self.dirty = true;
    }

    pub fn toggle(&mut self, media: &mut dyn MediaElement) {
        if self.wants_playback() {
            self.pause(media);
        } else {
            self.play(media);
        }
    }

    pub fn next(&mut self, media: &mut dyn MediaElement) {
        if self.order.is_empty() {
            return;
        }
        let continue_playing = self.wants_playback();
        let mut index = self.current + 1;
        if index >= self.order.len() {
            if !self.playlist.repeat {
                self.halt(media);
                return;
            }
            if self.playlist.shuffle {
                self.order =
                    build_play_order(self.playlist.tracks.len(), true, &mut self.rng);
                debug!("play order reshuffled");
            }
            index = 0;
        }
        self.load_track(index, continue_playing, media);
    }

    pub fn previous(&mut self, media: &mut dyn MediaElement) {
        if self.order.is_empty() {
            return;
        }
        let continue_playing = self.wants_playback();
        let index = match self.current.checked_sub(1) {
            Some(index) => index,
            None if self.playlist.repeat => self.order.len() - 1,
            None => return,
        };
        self.load_track(index, continue_playing, media);
    }

    pub fn handle_event(&mut self, event: MediaEvent, media: &mut dyn MediaElement, now: Instant) {
        match event {
            MediaEvent::Ready { duration } => {
                if self.state != PlaybackState::Loading {
                    return;
                }
                self.duration = duration.map(|duration| duration.as_secs_f64());
                if let Some(time) = self.pending_seek.take()
                    && time > 0.0
                {
                    self.restore_position(time, media);
                }
                self.status = if self.play_requested {
                    Status::Paused
                } else {
                    Status::ClickToStart
                };
                self.set_state(PlaybackState::Ready);
                if self.autoplay {
                    self.start_output(media);
                }
                self.notify_progress();
            }
            MediaEvent::TimeUpdate { position, duration } => {
                self.current_time = position.as_secs_f64();
                if duration.is_some() {
                    self.duration = duration.map(|duration| duration.as_secs_f64());
                }
                self.notify_progress();
            }
            MediaEvent::Ended => {
                if self.state != PlaybackState::Playing {
                    return;
                }
                self.autoplay = true;
                self.next(media);
            }
            MediaEvent::Error(err) => self.handle_media_error(&err, now),
        }
        self.dirty = true;
    }

    /// Runs the delayed skip scheduled by a media error.
    pub fn tick(&mut self, now: Instant, media: &mut dyn MediaElement) {
        if let Some(due) = self.pending_skip
            && now >= due
        {
            self.pending_skip = None;
            self.next(media);
            self.dirty = true;
        }
    }

    pub fn seek(&mut self, fraction: f64, media: &mut dyn MediaElement) {
        let Some(duration) = self.known_duration() else {
            return;
        };
        self.seek_to_seconds(duration * fraction.clamp(0.0, 1.0), media);
    }

    pub fn seek_by(&mut self, delta_seconds: f64, media: &mut dyn MediaElement) {
        let Some(duration) = self.known_duration() else {
            return;
        };
        let target = (self.current_time + delta_seconds).clamp(0.0, duration);
        self.seek_to_seconds(target, media);
    }

    pub fn set_volume(&mut self, volume: f32, media: &mut dyn MediaElement) {
        media.set_volume(volume.clamp(0.0, 1.0));
        self.dirty = true;
    }

    /// Restores the track a previous session was playing. Returns whether the
    /// snapshot was applied.
    pub fn resume(&mut self, snapshot: SessionSnapshot, media: &mut dyn MediaElement) -> bool {
        if !snapshot.playing || snapshot.track_index >= self.order.len() {
            return false;
        }
        info!(
            track_index = snapshot.track_index,
            time = snapshot.time,
            "resuming previous session"
        );
        self.play_requested = true;
        self.load_track(snapshot.track_index, true, media);
        if snapshot.time.is_finite() && snapshot.time > 0.0 {
            self.pending_seek = Some(snapshot.time);
        }
        true
    }

    pub fn snapshot(&self, media: &dyn MediaElement) -> SessionSnapshot {
        let time = media
            .position()
            .map_or(self.current_time, |position| position.as_secs_f64());
        SessionSnapshot {
            playing: self.wants_playback(),
            track_index: self.current,
            time,
        }
    }

    fn start_output(&mut self, media: &mut dyn MediaElement) {
        match media.play() {
            Ok(()) => {
                self.status = Status::Playing;
                self.set_state(PlaybackState::Playing);
            }
            Err(err) if err.is_blocked() => {
                info!("playback blocked: {err}");
                self.autoplay = false;
                self.status = Status::ClickToStart;
                self.set_state(PlaybackState::Blocked);
            }
            Err(err) => {
                warn!("playback failed: {err}");
                self.autoplay = false;
                self.status = Status::PlaybackError;
                self.set_state(PlaybackState::Ready);
            }
        }
    }

    fn handle_media_error(&mut self, err: &MediaError, now: Instant) {
        let genuine = match err.code {
            Some(MediaErrorCode::Aborted) => false,
            Some(_) => true,
            None => self.play_requested,
        };
        if !genuine {
            debug!(message = %err.message, "ignoring media load noise");
            return;
        }

        warn!(code = ?err.code, message = %err.message, "track failed to load");
        self.status = Status::TrackLoadError;
        if self.pending_skip.is_none() {
            self.pending_skip = Some(now + ERROR_SKIP_DELAY);
        }
    }

    fn halt(&mut self, media: &mut dyn MediaElement) {
        media.pause();
        self.autoplay = false;
        self.pending_skip = None;
        self.status = Status::EndOfPlaylist;
        info!("end of playlist");
        self.set_state(PlaybackState::Ready);
        self.dirty = true;
    }

    fn restore_position(&mut self, time: f64, media: &mut dyn MediaElement) {
        let target = self
            .known_duration()
            .map_or(time, |duration| time.min(duration));
        let position = match Duration::try_from_secs_f64(target) {
            Ok(position) => position,
            Err(err) => {
                warn!(time, "ignoring saved position: {err}");
                return;
            }
        };
        match media.seek_to(position) {
            Ok(()) => self.current_time = target,
            Err(err) => warn!("failed to restore position: {err:#}"),
        }
    }

    fn seek_to_seconds(&mut self, seconds: f64, media: &mut dyn MediaElement) {
        match media.seek_to(Duration::from_secs_f64(seconds.max(0.0))) {
            Ok(()) => {
                self.current_time = seconds;
                self.notify_progress();
            }
            Err(err) => debug!("seek ignored: {err:#}"),
        }
        self.dirty = true;
    }

    fn known_duration(&self) -> Option<f64> {
        progress::known_duration(self.duration)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "playback state");
        self.state = state;
        self.dirty = true;
        for listener in &mut self.listeners {
            listener.on_state_change(state);
        }
    }

    fn notify_progress(&mut self) {
        let report = self.report();
        for listener in &mut self.listeners {
            listener.on_progress(&report);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::SampleTap;
    use crate::error::RadioError;
    use crate::model::{MediaSource, SourceBase};
    use proptest::prop_assert;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Engine double: records calls and lets the test decide how `play` ends.
    #[derive(Default)]
    pub(crate) struct FakeMedia {
        pub sources: Vec<MediaSource>,
        pub playing: bool,
        pub refuse_play: bool,
        pub events: VecDeque<MediaEvent>,
        pub seeks: Vec<Duration>,
        pub position: Duration,
        pub volume: f32,
    }

    impl MediaElement for FakeMedia {
        fn set_source(&mut self, source: &MediaSource) {
            self.playing = false;
            self.position = Duration::ZERO;
            self.sources.push(source.clone());
        }

        fn play(&mut self) -> Result<(), RadioError> {
            if self.refuse_play {
                return Err(RadioError::PlaybackBlocked("autoplay policy".to_string()));
            }
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn stop(&mut self) {
            self.playing = false;
        }

        fn is_paused(&self) -> bool {
            !self.playing
        }

        fn poll_event(&mut self) -> Option<MediaEvent> {
            self.events.pop_front()
        }

        fn position(&self) -> Option<Duration> {
            Some(self.position)
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn seek_to(&mut self, position: Duration) -> anyhow::Result<()> {
            self.position = position;
            self.seeks.push(position);
            Ok(())
        }

        fn volume(&self) -> f32 {
            self.volume
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn output_name(&self) -> Option<String> {
            None
        }

        fn sample_tap(&self) -> Option<SampleTap> {
            None
        }
    }

    pub(crate) fn playlist(len: usize, shuffle: bool, repeat: bool) -> Playlist {
        Playlist {
            tracks: (0..len)
                .map(|n| Track::new(&format!("track_{n}.mp3"), &format!("Track {n}")))
                .collect(),
            shuffle,
            repeat,
            base: SourceBase::Directory(PathBuf::from("/music")),
        }
    }

    fn controller(len: usize, shuffle: bool, repeat: bool) -> PlaybackController {
        PlaybackController::with_rng(playlist(len, shuffle, repeat), SmallRng::seed_from_u64(7))
    }

    fn ready(controller: &mut PlaybackController, media: &mut FakeMedia) {
        controller.handle_event(
            MediaEvent::Ready {
                duration: Some(Duration::from_secs(180)),
            },
            media,
            Instant::now(),
        );
    }

    #[test]
    fn first_play_loads_index_zero_and_starts_when_ready() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);

        controller.play(&mut media);
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert_eq!(
            media.sources,
            vec![MediaSource::File(PathBuf::from("/music/track_0.mp3"))]
        );

        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.status(), Status::Playing);
        assert!(media.playing);
    }

    #[test]
    fn load_without_autoplay_waits_for_user() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);

        controller.load_track(0, false, &mut media);
        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Ready);
        assert_eq!(controller.status(), Status::ClickToStart);
        assert!(!media.playing);
    }

    #[test]
    fn pause_while_loading_cancels_autoplay() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);

        controller.play(&mut media);
        controller.pause(&mut media);
        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Ready);
        assert!(!media.playing);
    }

    #[test]
    fn blocked_play_shows_prompt_not_error() {
        let mut media = FakeMedia {
            refuse_play: true,
            ..FakeMedia::default()
        };
        let mut controller = controller(3, false, true);

        controller.load_track(0, true, &mut media);
        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Blocked);
        assert_eq!(controller.status(), Status::ClickToStart);

        media.refuse_play = false;
        controller.play(&mut media);
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn next_at_end_without_repeat_stops_quietly() {
        let mut media = FakeMedia::default();
        let mut controller = controller(2, false, false);

        controller.load_track(1, true, &mut media);
        ready(&mut controller, &mut media);
        controller.next(&mut media);

        assert_eq!(controller.state(), PlaybackState::Ready);
        assert_eq!(controller.status(), Status::EndOfPlaylist);
        assert_eq!(controller.current_index(), 1);
        assert!(!controller.wants_playback());
        assert!(!media.playing);
    }

    #[test]
    fn play_after_end_of_playlist_restarts_last_track() {
        let mut media = FakeMedia::default();
        let mut controller = controller(2, false, false);

        controller.load_track(1, true, &mut media);
        ready(&mut controller, &mut media);
        controller.handle_event(MediaEvent::Ended, &mut media, Instant::now());
        assert_eq!(controller.status(), Status::EndOfPlaylist);
        assert_eq!(media.sources.len(), 1);

        controller.play(&mut media);
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(media.sources.len(), 2);

        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.status(), Status::Playing);
        assert!(media.playing);
    }

    #[test]
    fn previous_at_start_wraps_only_with_repeat() {
        let mut media = FakeMedia::default();
        let mut looping = controller(4, false, true);
        looping.load_track(0, false, &mut media);
        looping.previous(&mut media);
        assert_eq!(looping.current_index(), 3);

        let mut straight = controller(4, false, false);
        straight.load_track(0, false, &mut media);
        straight.previous(&mut media);
        assert_eq!(straight.current_index(), 0);
    }

    #[test]
    fn wrap_with_shuffle_reshuffles_order() {
        let mut media = FakeMedia::default();
        let mut controller = controller(12, true, true);
        let first_order = controller.order().to_vec();

        controller.load_track(11, true, &mut media);
        let mut reshuffled = false;
        for _ in 0..8 {
            controller.next(&mut media);
            assert_eq!(controller.current_index(), 0);
            if controller.order() != first_order.as_slice() {
                reshuffled = true;
                break;
            }
            controller.load_track(11, true, &mut media);
        }
        assert!(reshuffled, "wrapping should draw a fresh order");
    }

    #[test]
    fn ended_advances_with_autoplay() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);
        controller.play(&mut media);
        ready(&mut controller, &mut media);

        controller.handle_event(MediaEvent::Ended, &mut media, Instant::now());
        assert_eq!(controller.current_index(), 1);
        ready(&mut controller, &mut media);
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn genuine_error_schedules_single_skip() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);
        let now = Instant::now();
        controller.load_track(0, false, &mut media);

        let decode = MediaError::new(MediaErrorCode::Decode, "bad frame");
        controller.handle_event(MediaEvent::Error(decode.clone()), &mut media, now);
        controller.handle_event(
            MediaEvent::Error(decode),
            &mut media,
            now + Duration::from_millis(500),
        );
        assert_eq!(controller.status(), Status::TrackLoadError);

        controller.tick(now + Duration::from_millis(999), &mut media);
        assert_eq!(controller.current_index(), 0);
        controller.tick(now + ERROR_SKIP_DELAY, &mut media);
        assert_eq!(controller.current_index(), 1);
        controller.tick(now + Duration::from_secs(5), &mut media);
        assert_eq!(controller.current_index(), 1);
    }

    #[test]
    fn load_noise_is_ignored() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);
        let now = Instant::now();
        controller.load_track(0, false, &mut media);

        controller.handle_event(
            MediaEvent::Error(MediaError::uncoded("empty src")),
            &mut media,
            now,
        );
        controller.handle_event(
            MediaEvent::Error(MediaError::new(MediaErrorCode::Aborted, "aborted")),
            &mut media,
            now,
        );
        assert!(!controller.has_pending_skip());
        assert_eq!(controller.status(), Status::Loading);

        controller.play(&mut media);
        controller.handle_event(
            MediaEvent::Error(MediaError::uncoded("stalled")),
            &mut media,
            now,
        );
        assert!(controller.has_pending_skip());
    }

    #[test]
    fn resume_seeks_once_ready() {
        let mut media = FakeMedia::default();
        let mut controller = controller(5, false, true);
        let applied = controller.resume(
            SessionSnapshot {
                playing: true,
                track_index: 3,
                time: 42.0,
            },
            &mut media,
        );
        assert!(applied);
        assert_eq!(controller.current_index(), 3);

        ready(&mut controller, &mut media);
        assert_eq!(media.seeks, vec![Duration::from_secs(42)]);
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.report().elapsed_label, "0:42");
    }

    #[test]
    fn resume_with_absurd_time_does_not_overshoot() {
        let mut media = FakeMedia::default();
        let mut controller = controller(2, false, true);
        assert!(controller.resume(
            SessionSnapshot {
                playing: true,
                track_index: 0,
                time: 1e300,
            },
            &mut media,
        ));
        ready(&mut controller, &mut media);
        assert_eq!(media.seeks, vec![Duration::from_secs(180)]);
        assert_eq!(controller.state(), PlaybackState::Playing);

        let mut media = FakeMedia::default();
        let mut controller = self::controller(2, false, true);
        controller.resume(
            SessionSnapshot {
                playing: true,
                track_index: 1,
                time: 1e300,
            },
            &mut media,
        );
        controller.handle_event(MediaEvent::Ready { duration: None }, &mut media, Instant::now());
        assert!(media.seeks.is_empty());
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn resume_ignores_stale_or_paused_snapshots() {
        let mut media = FakeMedia::default();
        let mut controller = controller(2, false, true);
        assert!(!controller.resume(
            SessionSnapshot {
                playing: true,
                track_index: 9,
                time: 1.0,
            },
            &mut media,
        ));
        assert!(!controller.resume(SessionSnapshot::default(), &mut media));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(media.sources.is_empty());
    }

    #[test]
    fn seek_by_fraction_uses_duration() {
        let mut media = FakeMedia::default();
        let mut controller = controller(1, false, true);
        controller.seek(0.5, &mut media);
        assert!(media.seeks.is_empty());

        controller.load_track(0, false, &mut media);
        ready(&mut controller, &mut media);
        controller.seek(0.5, &mut media);
        controller.seek_by(-200.0, &mut media);
        assert_eq!(
            media.seeks,
            vec![Duration::from_secs(90), Duration::ZERO]
        );
    }

    #[test]
    fn snapshot_reflects_playback() {
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);
        controller.play(&mut media);
        ready(&mut controller, &mut media);
        media.position = Duration::from_millis(12_500);

        let snapshot = controller.snapshot(&media);
        assert!(snapshot.playing);
        assert_eq!(snapshot.track_index, 0);
        assert!((snapshot.time - 12.5).abs() < 1e-9);
        assert_eq!(controller.counter_label(), "1 / 3");
    }

    #[derive(Default)]
    struct Recorded {
        tracks: Vec<usize>,
        states: Vec<PlaybackState>,
        progress: usize,
    }

    struct Recorder(Rc<RefCell<Recorded>>);

    impl PlaybackListener for Recorder {
        fn on_track_change(&mut self, _track: &Track, index: usize) {
            self.0.borrow_mut().tracks.push(index);
        }

        fn on_progress(&mut self, _report: &ProgressReport) {
            self.0.borrow_mut().progress += 1;
        }

        fn on_state_change(&mut self, state: PlaybackState) {
            self.0.borrow_mut().states.push(state);
        }
    }

    #[test]
    fn listeners_see_track_state_and_progress() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut media = FakeMedia::default();
        let mut controller = controller(3, false, true);
        controller.add_listener(Box::new(Recorder(Rc::clone(&recorded))));

        controller.play(&mut media);
        ready(&mut controller, &mut media);
        controller.handle_event(
            MediaEvent::TimeUpdate {
                position: Duration::from_secs(3),
                duration: Some(Duration::from_secs(180)),
            },
            &mut media,
            Instant::now(),
        );
        controller.next(&mut media);

        let recorded = recorded.borrow();
        assert_eq!(recorded.tracks, vec![0, 1]);
        assert_eq!(
            recorded.states,
            vec![
                PlaybackState::Loading,
                PlaybackState::Ready,
                PlaybackState::Playing,
                PlaybackState::Loading,
            ]
        );
        assert_eq!(recorded.progress, 2);
    }

    proptest::proptest! {
        #[test]
        fn repeat_returns_to_start_after_full_pass(
            len in 1usize..40,
            shuffle in proptest::bool::ANY,
            seed in proptest::num::u64::ANY,
        ) {
            let mut media = FakeMedia::default();
            let mut controller = PlaybackController::with_rng(
                playlist(len, shuffle, true),
                SmallRng::seed_from_u64(seed),
            );
            controller.load_track(0, false, &mut media);

            for step in 1..=len {
                controller.next(&mut media);
                prop_assert!(controller.current_index() == step % len);
            }
            prop_assert!(controller.current_index() == 0);
            prop_assert!(media.sources.len() == len + 1);
        }

        #[test]
        fn index_stays_in_bounds_under_random_commands(
            len in 1usize..12,
            shuffle in proptest::bool::ANY,
            repeat in proptest::bool::ANY,
            ops in proptest::collection::vec(0u8..9, 1..200),
        ) {
            let mut media = FakeMedia::default();
            let mut controller = PlaybackController::with_rng(
                playlist(len, shuffle, repeat),
                SmallRng::seed_from_u64(len as u64),
            );
            let start = Instant::now();

            for (step, op) in ops.into_iter().enumerate() {
                let now = start + Duration::from_millis(step as u64 * 400);
                match op {
                    0 => controller.play(&mut media),
                    1 => controller.pause(&mut media),
                    2 => controller.toggle(&mut media),
                    3 => controller.next(&mut media),
                    4 => controller.previous(&mut media),
                    5 => controller.handle_event(MediaEvent::Ready { duration: Some(Duration::from_secs(60)) }, &mut media, now),
                    6 => controller.handle_event(MediaEvent::Ended, &mut media, now),
                    7 => controller.handle_event(
                        MediaEvent::Error(MediaError::new(MediaErrorCode::Network, "offline")),
                        &mut media,
                        now,
                    ),
                    _ => controller.tick(now, &mut media),
                }

                prop_assert!(controller.current_index() < controller.order().len());
                prop_assert!(controller.current_track().is_some());
                let mut order = controller.order().to_vec();
                order.sort_unstable();
                prop_assert!(order == (0..len).collect::<Vec<_>>());
            }
        }
    }
}
