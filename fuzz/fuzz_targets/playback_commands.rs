#![no_main]

use libfuzzer_sys::fuzz_target;
use lofi_radio::audio::{MediaElement, MediaError, MediaErrorCode, MediaEvent};
use lofi_radio::controller::{ERROR_SKIP_DELAY, PlaybackController};
use lofi_radio::error::RadioError;
use lofi_radio::model::{MediaSource, SourceBase, Track};
use lofi_radio::playlist::Playlist;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const TRACK_LENGTH: Duration = Duration::from_secs(180);

#[derive(Default)]
struct ScriptedMedia {
    loaded: bool,
    playing: bool,
    refuse_play: bool,
    position: Duration,
}

impl MediaElement for ScriptedMedia {
    fn set_source(&mut self, _source: &MediaSource) {
        self.loaded = true;
        self.playing = false;
        self.position = Duration::ZERO;
    }

    fn play(&mut self) -> Result<(), RadioError> {
        if self.refuse_play {
            return Err(RadioError::PlaybackBlocked(String::from("refused")));
        }
        self.playing = self.loaded;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        *self = Self {
            refuse_play: self.refuse_play,
            ..Self::default()
        };
    }

    fn is_paused(&self) -> bool {
        !self.playing
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        None
    }

    fn position(&self) -> Option<Duration> {
        self.loaded.then_some(self.position)
    }

    fn duration(&self) -> Option<Duration> {
        self.loaded.then_some(TRACK_LENGTH)
    }

    fn seek_to(&mut self, position: Duration) -> anyhow::Result<()> {
        self.position = position.min(TRACK_LENGTH);
        Ok(())
    }

    fn volume(&self) -> f32 {
        1.0
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn output_name(&self) -> Option<String> {
        None
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&header, commands)) = data.split_first() else {
        return;
    };
    let len = usize::from(header % 8);
    let playlist = Playlist {
        tracks: (0..len)
            .map(|idx| Track::new(&format!("track_{idx}.mp3"), &format!("Track {idx}")))
            .collect(),
        shuffle: header & 0x40 != 0,
        repeat: header & 0x80 != 0,
        base: SourceBase::Directory(PathBuf::from("/music")),
    };
    let mut controller =
        PlaybackController::with_rng(playlist, SmallRng::seed_from_u64(u64::from(header)));
    let mut media = ScriptedMedia::default();
    let mut now = Instant::now();

    for byte in commands {
        let event = match byte % 12 {
            0 => {
                controller.play(&mut media);
                None
            }
            1 => {
                controller.pause(&mut media);
                None
            }
            2 => {
                controller.next(&mut media);
                None
            }
            3 => {
                controller.previous(&mut media);
                None
            }
            4 => Some(MediaEvent::Ready {
                duration: Some(TRACK_LENGTH),
            }),
            5 => Some(MediaEvent::Ended),
            6 => Some(MediaEvent::Error(MediaError::new(
                MediaErrorCode::Network,
                "dropped",
            ))),
            7 => Some(MediaEvent::Error(MediaError::uncoded("noise"))),
            8 => {
                controller.seek(f64::from(byte >> 4) / 15.0, &mut media);
                None
            }
            9 => {
                media.refuse_play = !media.refuse_play;
                None
            }
            10 => {
                now += ERROR_SKIP_DELAY;
                controller.tick(now, &mut media);
                None
            }
            _ => Some(MediaEvent::TimeUpdate {
                position: media.position,
                duration: Some(TRACK_LENGTH),
            }),
        };
        if let Some(event) = event {
            controller.handle_event(event, &mut media, now);
        }

        assert!(len == 0 || controller.current_index() < len);
        let report = controller.report();
        assert!((0.0..=100.0).contains(&report.percent));
    }
});
