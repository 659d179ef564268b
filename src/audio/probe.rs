use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

/// Container-level duration for sources the decoder cannot size up front
/// (most VBR mp3 files). Zero-length results count as unknown.
pub fn duration(path: &Path) -> Option<Duration> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    probed
        .format
        .default_track()
        .and_then(|track| codec_duration(&track.codec_params))
        .filter(|duration| !duration.is_zero())
}

fn codec_duration(codec_params: &CodecParameters) -> Option<Duration> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
        .map(|(frame_count, sample_rate)| {
            Duration::from_secs_f64(frame_count as f64 / f64::from(sample_rate))
        })
}
