use crate::audio::{SampleTap, TapWindow};

pub const WINDOW_FRAMES: usize = 2_048;
pub const BAR_COUNT: usize = 24;
const SMOOTHING: f32 = 0.8;
const MIN_FREQUENCY_HZ: f32 = 40.0;
const MAX_FREQUENCY_HZ: f32 = 16_000.0;
const FLOOR_DB: f32 = -60.0;

/// Frequency bars fed from the engine's sample tap. Disabled when the engine
/// has no tap.
#[derive(Debug, Clone)]
pub struct Visualizer {
    tap: Option<SampleTap>,
    levels: Vec<f32>,
    active: bool,
}

impl Visualizer {
    pub fn new(tap: Option<SampleTap>) -> Self {
        Self {
            tap,
            levels: vec![0.0; BAR_COUNT],
            active: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tap.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advances one UI frame. Returns the bar levels in `0.0..=1.0`, or
    /// `None` when nothing should be drawn.
    pub fn frame(&mut self, playing: bool) -> Option<&[f32]> {
        if !playing {
            self.clear();
            return None;
        }
        let window = self.tap.as_ref()?.window(WINDOW_FRAMES)?;
        self.update(&window);
        self.active = true;
        Some(&self.levels)
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn clear(&mut self) {
        self.levels.iter_mut().for_each(|level| *level = 0.0);
        self.active = false;
    }

    fn update(&mut self, window: &TapWindow) {
        let fresh = spread_bins(&bin_levels(&window.samples, window.sample_rate as f32));
        for (level, target) in self.levels.iter_mut().zip(fresh) {
            *level = SMOOTHING * *level + (1.0 - SMOOTHING) * target;
        }
    }
}

/// Goertzel levels at log-spaced centre frequencies, mapped from dBFS onto
/// `0.0..=1.0`.
pub fn bin_levels(samples: &[f32], sample_rate_hz: f32) -> Vec<f32> {
    let max_hz = MAX_FREQUENCY_HZ.min(sample_rate_hz * 0.5 * 0.95);
    let frequencies = log_spaced_frequencies(MIN_FREQUENCY_HZ, max_hz, BAR_COUNT);
    let scale = (samples.len() as f32 * 0.5).max(1.0);

    frequencies
        .into_iter()
        .map(|frequency_hz| {
            let magnitude = goertzel_power(samples, frequency_hz, sample_rate_hz).sqrt() / scale;
            let db = 20.0 * magnitude.max(1e-6).log10();
            ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0)
        })
        .collect()
}

fn spread_bins(bins: &[f32]) -> Vec<f32> {
    if bins.len() < 3 {
        return bins.to_vec();
    }
    let mut spread = bins.to_vec();
    for idx in 1..bins.len() - 1 {
        spread[idx] = (bins[idx - 1] + bins[idx] * 2.0 + bins[idx + 1]) / 4.0;
    }
    spread
}

fn log_spaced_frequencies(min_hz: f32, max_hz: f32, count: usize) -> Vec<f32> {
    if count <= 1 {
        return vec![min_hz.max(1.0)];
    }

    let min = min_hz.max(1.0);
    let max = max_hz.max(min * 2.0);
    let ratio = (max / min).powf(1.0 / (count - 1) as f32);
    (0..count).map(|idx| min * ratio.powi(idx as i32)).collect()
}

fn goertzel_power(samples: &[f32], frequency_hz: f32, sample_rate_hz: f32) -> f32 {
    if samples.len() < 2
        || !frequency_hz.is_finite()
        || !sample_rate_hz.is_finite()
        || frequency_hz <= 0.0
        || frequency_hz >= sample_rate_hz * 0.5
    {
        return 0.0;
    }

    let omega = std::f32::consts::TAU * frequency_hz / sample_rate_hz;
    let coeff = 2.0 * omega.cos();
    let mut q1 = 0.0_f32;
    let mut q2 = 0.0_f32;
    for sample in samples {
        let q0 = coeff * q1 - q2 + *sample;
        q2 = q1;
        q1 = q0;
    }
    let real = q1 - q2 * omega.cos();
    let imag = q2 * omega.sin();
    real.mul_add(real, imag * imag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency_hz: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|idx| {
                (std::f32::consts::TAU * frequency_hz * idx as f32 / sample_rate as f32).sin()
                    * 0.8
            })
            .collect()
    }

    #[test]
    fn frequencies_are_log_spaced_and_increasing() {
        let freqs = log_spaced_frequencies(40.0, 16_000.0, BAR_COUNT);
        assert_eq!(freqs.len(), BAR_COUNT);
        assert!((freqs[0] - 40.0).abs() < 1e-3);
        assert!((freqs[BAR_COUNT - 1] - 16_000.0).abs() < 1.0);
        let ratio = freqs[1] / freqs[0];
        assert!((freqs[5] / freqs[4] - ratio).abs() < 1e-3);
    }

    #[test]
    fn low_tone_lights_low_bars() {
        let samples = sine(60.0, 44_100, WINDOW_FRAMES);
        let levels = bin_levels(&samples, 44_100.0);
        let low = levels[..4].iter().copied().fold(0.0_f32, f32::max);
        let high = levels[BAR_COUNT - 4..].iter().copied().fold(0.0_f32, f32::max);
        assert!(low > high, "low={low} high={high}");
    }

    #[test]
    fn silence_gives_zero_levels() {
        let levels = bin_levels(&[0.0; WINDOW_FRAMES], 48_000.0);
        assert!(levels.iter().all(|level| *level == 0.0));
    }

    #[test]
    fn levels_rise_gradually_and_clear_when_stopped() {
        let tap = SampleTap::new();
        tap.push(&sine(440.0, 44_100, WINDOW_FRAMES), 1, 44_100);
        let mut visualizer = Visualizer::new(Some(tap));

        let first = visualizer.frame(true).expect("frame").to_vec();
        let second = visualizer.frame(true).expect("frame").to_vec();
        let peak = first.iter().copied().fold(0.0_f32, f32::max);
        assert!(peak > 0.0 && peak <= 1.0 - SMOOTHING + 1e-6);
        assert!(second.iter().zip(&first).all(|(b, a)| b >= a));

        assert!(visualizer.frame(false).is_none());
        assert!(!visualizer.is_active());
        assert!(visualizer.levels().iter().all(|level| *level == 0.0));
    }

    #[test]
    fn missing_tap_disables_visualizer() {
        let mut visualizer = Visualizer::new(None);
        assert!(!visualizer.is_enabled());
        assert!(visualizer.frame(true).is_none());
    }
}
