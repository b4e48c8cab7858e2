//! Initial noise for the denoising loop.

use std::f64::consts::PI;

use ndarray::{s, Array3};
use rand::Rng;

use crate::vocab::length_to_mask;

/// Smallest uniform draw fed to the logarithm in the Box-Muller transform.
const MIN_UNIFORM: f64 = 1e-10;

/// Shape parameters that turn predicted durations into latent sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentGeometry {
    pub sample_rate: u32,
    pub base_chunk_size: usize,
    pub compress_factor: usize,
    pub latent_dim: usize,
}

impl LatentGeometry {
    /// Waveform samples covered by one latent frame.
    pub fn frame_size(&self) -> usize {
        self.base_chunk_size * self.compress_factor
    }

    pub fn channels(&self) -> usize {
        self.latent_dim * self.compress_factor
    }

    /// `floor(duration * sample_rate)`, negative durations count as zero.
    pub fn wav_len(&self, duration_secs: f32) -> usize {
        (duration_secs.max(0.0) as f64 * self.sample_rate as f64).floor() as usize
    }

    pub fn latent_len(&self, wav_len: usize) -> usize {
        wav_len.div_ceil(self.frame_size())
    }
}

/// One standard-normal draw via Box-Muller.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1: f64 = rng.gen::<f64>().max(MIN_UNIFORM);
    let u2: f64 = rng.gen::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()) as f32
}

/// Draw the noisy starting latent for a batch of predicted durations.
///
/// Returns the latent `(batch, latent_dim * compress, latent_len)` and its mask
/// `(batch, 1, latent_len)`. Frames past an item's own length are exactly zero.
pub fn sample_noisy_latent<R: Rng + ?Sized>(
    durations: &[f32],
    geometry: &LatentGeometry,
    rng: &mut R,
) -> (Array3<f32>, Array3<f32>) {
    let wav_lengths: Vec<usize> = durations.iter().map(|&d| geometry.wav_len(d)).collect();
    let wav_len_max = wav_lengths.iter().copied().max().unwrap_or(0);
    let latent_len = geometry.latent_len(wav_len_max);

    let mut latent = Array3::<f32>::zeros((durations.len(), geometry.channels(), latent_len));
    latent.iter_mut().for_each(|x| *x = standard_normal(rng));

    let latent_lengths: Vec<usize> = wav_lengths
        .iter()
        .map(|&len| geometry.latent_len(len))
        .collect();
    for (b, &valid) in latent_lengths.iter().enumerate() {
        latent.slice_mut(s![b, .., valid..]).fill(0.0);
    }

    (latent, length_to_mask(&latent_lengths, latent_len))
}
