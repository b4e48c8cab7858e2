//! Concatenation of per-chunk waveforms.

/// Join chunk waveforms with `silence_secs` of silence between them.
///
/// Returns the waveform and its duration in seconds. The waveform is trimmed to
/// `floor(sample_rate * duration)` samples when it runs longer than that.
pub fn assemble(
    wavs: &[Vec<f32>],
    durations: &[f32],
    silence_secs: f32,
    sample_rate: u32,
) -> (Vec<f32>, f32) {
    if wavs.is_empty() {
        return (Vec::new(), 0.0);
    }

    let silence_len = (silence_secs.max(0.0) as f64 * sample_rate as f64).floor() as usize;
    let capacity = wavs.iter().map(Vec::len).sum::<usize>() + silence_len * (wavs.len() - 1);
    let mut out = Vec::with_capacity(capacity);

    for (i, wav) in wavs.iter().enumerate() {
        if i > 0 {
            out.resize(out.len() + silence_len, 0.0);
        }
        out.extend_from_slice(wav);
    }

    let total: f64 = durations.iter().map(|&d| d as f64).sum::<f64>()
        + (wavs.len() - 1) as f64 * silence_secs as f64;
    let target = (sample_rate as f64 * total).floor().max(0.0) as usize;
    out.truncate(target);

    (out, total as f32)
}
