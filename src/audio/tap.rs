use rodio::Source;
use rodio::source::SeekError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TAP_CAPACITY: usize = 8_192;
const FLUSH_EVERY: usize = 1_024;

#[derive(Debug, Default)]
struct TapBuffer {
    samples: VecDeque<f32>,
    channels: u16,
    sample_rate: u32,
}

/// Ring buffer of the most recently played samples, shared between the
/// audio thread and the visualizer.
#[derive(Debug, Clone, Default)]
pub struct SampleTap {
    inner: Arc<Mutex<TapBuffer>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TapWindow {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, samples: &[f32], channels: u16, sample_rate: u32) {
        let Ok(mut buffer) = self.inner.lock() else {
            return;
        };
        buffer.channels = channels.max(1);
        buffer.sample_rate = sample_rate;
        buffer.samples.extend(samples.iter().copied());
        let overflow = buffer.samples.len().saturating_sub(TAP_CAPACITY);
        buffer.samples.drain(..overflow);
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.inner.lock() {
            buffer.samples.clear();
        }
    }

    /// Last `frames` frames mixed down to mono.
    pub fn window(&self, frames: usize) -> Option<TapWindow> {
        let buffer = self.inner.lock().ok()?;
        if buffer.sample_rate == 0 || buffer.samples.is_empty() {
            return None;
        }

        let channels = usize::from(buffer.channels.max(1));
        let wanted = frames.saturating_mul(channels).min(buffer.samples.len());
        let usable = wanted - wanted % channels;
        let start = buffer.samples.len() - usable;
        let interleaved: Vec<f32> = buffer.samples.range(start..).copied().collect();
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Some(TapWindow {
            samples,
            sample_rate: buffer.sample_rate,
        })
    }
}

/// Passes samples through unchanged while copying them into a `SampleTap`.
pub struct TappedSource<S> {
    inner: S,
    tap: SampleTap,
    pending: Vec<f32>,
}

impl<S: Source> TappedSource<S> {
    pub fn new(inner: S, tap: SampleTap) -> Self {
        tap.clear();
        Self {
            inner,
            tap,
            pending: Vec::with_capacity(FLUSH_EVERY),
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.tap.push(
            &self.pending,
            u16::from(self.inner.channels()),
            u32::from(self.inner.sample_rate()),
        );
        self.pending.clear();
    }
}

impl<S: Source> Iterator for TappedSource<S> {
    type Item = rodio::Sample;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(sample) = self.inner.next() else {
            self.flush();
            return None;
        };
        self.pending.push(sample);
        if self.pending.len() >= FLUSH_EVERY {
            self.flush();
        }
        Some(sample)
    }
}

impl<S: Source> Source for TappedSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, position: Duration) -> Result<(), SeekError> {
        self.pending.clear();
        self.tap.clear();
        self.inner.try_seek(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_mixes_channels_to_mono() {
        let tap = SampleTap::new();
        tap.push(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 48_000);

        let window = tap.window(2).expect("window");
        assert_eq!(window.sample_rate, 48_000);
        assert_eq!(window.samples, vec![0.5, 0.0]);
    }

    #[test]
    fn buffer_keeps_only_recent_samples() {
        let tap = SampleTap::new();
        let block = vec![0.25_f32; TAP_CAPACITY];
        tap.push(&block, 1, 44_100);
        tap.push(&[1.0], 1, 44_100);

        let window = tap.window(TAP_CAPACITY * 2).expect("window");
        assert_eq!(window.samples.len(), TAP_CAPACITY);
        assert_eq!(window.samples.last().copied(), Some(1.0));
    }

    #[test]
    fn empty_tap_has_no_window() {
        assert!(SampleTap::new().window(512).is_none());
    }
}
