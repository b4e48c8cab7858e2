//! End-to-end synthesis: text and a voice style in, waveform out.

use std::time::Instant;

use rand::Rng;

use crate::assemble::assemble;
use crate::chunk::chunk_text;
use crate::config::{ModelConfig, SynthesisOptions};
use crate::denoise::{Conditioning, Denoiser, StepObserver};
use crate::engine::{InferenceEngine, ModelOps, Operation, MAX_DURATION_SECS};
use crate::error::{Result, TtsError};
use crate::latent::sample_noisy_latent;
use crate::normalize::{normalize, NormalizedText};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::style::VoiceStyle;
use crate::vocab::VocabIndexer;
use crate::wav::{encode_wav, encode_wav_base64};

/// A finished generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Speech {
    pub samples: Vec<f32>,
    /// Seconds, including inter-chunk silence.
    pub duration: f32,
    pub sample_rate: u32,
    /// Number of chunks the text was split into.
    pub chunks: usize,
}

impl Speech {
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate)
    }

    pub fn to_wav_base64(&self) -> Result<String> {
        encode_wav_base64(&self.samples, self.sample_rate)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration as f64 * 1000.0).round() as u64
    }
}

/// Output of one batched pass through the four operations.
struct BatchOutput {
    wav: Vec<f32>,
    durations: Vec<f32>,
}

pub struct TextToSpeech<E: InferenceEngine> {
    config: ModelConfig,
    indexer: VocabIndexer,
    engine: E,
}

impl<E: InferenceEngine> TextToSpeech<E> {
    pub fn new(config: ModelConfig, indexer: VocabIndexer, engine: E) -> Self {
        Self { config, indexer, engine }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Synthesize `text` with a single-speaker `style`.
    pub fn synthesize(
        &mut self,
        text: &str,
        style: &VoiceStyle,
        opts: &SynthesisOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<Speech> {
        self.synthesize_with_rng(text, style, opts, progress, &mut rand::thread_rng())
    }

    /// As [`synthesize`](Self::synthesize) with an explicit noise source.
    pub fn synthesize_with_rng<R: Rng + ?Sized>(
        &mut self,
        text: &str,
        style: &VoiceStyle,
        opts: &SynthesisOptions,
        progress: &mut dyn ProgressSink,
        rng: &mut R,
    ) -> Result<Speech> {
        opts.validate()?;
        if style.batch_size() != 1 {
            return Err(TtsError::invalid(format!(
                "single-speaker synthesis needs a style batch of 1, got {}",
                style.batch_size()
            )));
        }

        let chunks = chunk_text(text, opts.max_chunk_len);
        if chunks.is_empty() {
            return Err(TtsError::invalid("text is empty"));
        }
        let total_chunks = chunks.len();
        let started = Instant::now();

        let mut wavs = Vec::with_capacity(total_chunks);
        let mut durations = Vec::with_capacity(total_chunks);

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let normalized = normalize(chunk);
            tracing::debug!(chunk_index, total_chunks, chars = normalized.char_len(), "synthesizing chunk");

            let mut observer = |step: usize, total_steps: usize| {
                progress.emit(ProgressEvent::denoising(step, total_steps, chunk_index, total_chunks));
            };
            let out = self.infer(std::slice::from_ref(&normalized), style, opts, rng, &mut observer)?;

            wavs.push(out.wav);
            durations.push(out.durations[0]);
        }

        let (samples, duration) =
            assemble(&wavs, &durations, opts.silence_duration, self.sample_rate());
        tracing::info!(
            chunks = total_chunks,
            duration_secs = duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "synthesis complete"
        );

        Ok(Speech {
            samples,
            duration,
            sample_rate: self.sample_rate(),
            chunks: total_chunks,
        })
    }

    /// One batched pass over several texts. `style` must have one row per text.
    /// Texts are not chunked; each result is trimmed to its own duration.
    pub fn synthesize_batch(
        &mut self,
        texts: &[&str],
        style: &VoiceStyle,
        opts: &SynthesisOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<Speech>> {
        self.synthesize_batch_with_rng(texts, style, opts, progress, &mut rand::thread_rng())
    }

    pub fn synthesize_batch_with_rng<R: Rng + ?Sized>(
        &mut self,
        texts: &[&str],
        style: &VoiceStyle,
        opts: &SynthesisOptions,
        progress: &mut dyn ProgressSink,
        rng: &mut R,
    ) -> Result<Vec<Speech>> {
        opts.validate()?;
        if texts.is_empty() {
            return Err(TtsError::invalid("no texts to synthesize"));
        }
        if style.batch_size() != texts.len() {
            return Err(TtsError::invalid(format!(
                "style batch {} does not match {} texts",
                style.batch_size(),
                texts.len()
            )));
        }
        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(TtsError::invalid(format!("text {i} is empty")));
        }

        let normalized: Vec<NormalizedText> = texts.iter().map(|t| normalize(t)).collect();
        let mut observer = |step: usize, total_steps: usize| {
            progress.emit(ProgressEvent::denoising(step, total_steps, 0, 1));
        };
        let out = self.infer(&normalized, style, opts, rng, &mut observer)?;

        let batch = texts.len();
        if out.wav.len() % batch != 0 {
            return Err(TtsError::inference(
                Operation::Vocode.name(),
                format!("{} samples cannot be split into {batch} rows", out.wav.len()),
            ));
        }
        let row_len = out.wav.len() / batch;
        let geometry = self.config.latent_geometry();
        let sample_rate = self.sample_rate();

        let speeches = out
            .durations
            .iter()
            .enumerate()
            .map(|(i, &duration)| {
                let row = &out.wav[i * row_len..(i + 1) * row_len];
                let keep = geometry.wav_len(duration).min(row.len());
                Speech {
                    samples: row[..keep].to_vec(),
                    duration,
                    sample_rate,
                    chunks: 1,
                }
            })
            .collect::<Vec<_>>();
        tracing::info!(batch, "batch synthesis complete");
        Ok(speeches)
    }

    fn infer<R: Rng + ?Sized>(
        &mut self,
        texts: &[NormalizedText],
        style: &VoiceStyle,
        opts: &SynthesisOptions,
        rng: &mut R,
        observer: &mut dyn StepObserver,
    ) -> Result<BatchOutput> {
        let (text_ids, text_mask) = self.indexer.encode(texts);

        let mut durations = self.engine.predict_duration(&text_ids, &style.dp, &text_mask)?;
        for d in durations.iter_mut() {
            *d /= opts.speed;
            if *d > MAX_DURATION_SECS {
                return Err(TtsError::inference(
                    Operation::PredictDuration.name(),
                    format!("duration {d}s at speed {} exceeds {MAX_DURATION_SECS}s", opts.speed),
                ));
            }
        }

        let text_emb = self.engine.encode_text(&text_ids, &style.ttl, &text_mask)?;

        let geometry = self.config.latent_geometry();
        let (latent, latent_mask) = sample_noisy_latent(&durations, &geometry, rng);

        let cond = Conditioning {
            text_emb: &text_emb,
            style_ttl: &style.ttl,
            latent_mask: &latent_mask,
            text_mask: &text_mask,
        };
        let started = Instant::now();
        let latent = Denoiser::new(latent, cond, opts.total_step)?.run(&mut self.engine, observer)?;
        tracing::debug!(
            steps = opts.total_step,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "denoising finished"
        );

        let wav = self.engine.vocode(&latent)?;
        Ok(BatchOutput { wav, durations })
    }
}
