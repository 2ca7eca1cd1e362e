//! Sample rate conversion backed by rubato's FFT resampler.

use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

use crate::{AudioBuffer, AudioError, Format};

/// Frames per processing block handed to the resampler.
const CHUNK_SIZE: usize = 1024;

/// Resamples a buffer to `target_rate`, down-mixing to mono first.
///
/// The output has `round(frames * target_rate / source_rate)` frames; the
/// resampler's group delay is trimmed from the front.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, AudioError> {
    let mono = buffer.to_mono();
    let src_rate = mono.format().sample_rate;
    if src_rate == target_rate {
        return Ok(mono);
    }
    if src_rate == 0 || target_rate == 0 {
        return Err(AudioError::Resample(format!(
            "invalid sample rates {src_rate} -> {target_rate}"
        )));
    }

    let input = mono.samples();
    let expected = (input.len() as f64 * target_rate as f64 / src_rate as f64).round() as usize;

    let mut resampler =
        FftFixedInOut::<f32>::new(src_rate as usize, target_rate as usize, CHUNK_SIZE, 1)?;
    let delay = resampler.output_delay();

    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut input_buf = vec![Vec::<f32>::new(); 1];
    let mut output_buf = vec![Vec::<f32>::new(); 1];
    let mut pos = 0;

    // Keep feeding (zero padded past the end) until the delayed tail is out.
    while output.len() < expected + delay {
        let frames_needed = resampler.input_frames_next();
        input_buf[0].clear();
        if pos < input.len() {
            let end = usize::min(pos + frames_needed, input.len());
            input_buf[0].extend_from_slice(&input[pos..end]);
            pos = end;
        }
        input_buf[0].resize(frames_needed, 0.0);

        output_buf[0].clear();
        output_buf[0].resize(resampler.output_frames_next(), 0.0);

        let (_, written) = resampler.process_into_buffer(&input_buf, &mut output_buf, None)?;
        output.extend_from_slice(&output_buf[0][..written]);
    }

    let samples: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    debug!(
        source = mono.source(),
        from = src_rate,
        to = target_rate,
        frames = samples.len(),
        "resampled audio"
    );
    Ok(AudioBuffer::new(mono.source(), Format::mono(target_rate), samples))
}
