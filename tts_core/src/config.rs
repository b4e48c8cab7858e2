// Model and synthesis configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk::MAX_CHUNK_LENGTH;
use crate::error::{Result, TtsError};
use crate::latent::LatentGeometry;

/// File name of the model configuration inside a model directory.
pub const CONFIG_FILE: &str = "tts.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderConfig {
    pub sample_rate: u32,
    pub base_chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToLatentConfig {
    pub chunk_compress_factor: usize,
    pub latent_dim: usize,
}

/// The subset of `tts.json` the pipeline needs; other keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub ae: AutoencoderConfig,
    pub ttl: TextToLatentConfig,
}

impl ModelConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            TtsError::asset(format!("failed to read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let config: ModelConfig = serde_json::from_slice(bytes)
            .map_err(|e| TtsError::asset(format!("invalid model config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("ae.sample_rate", self.ae.sample_rate as usize),
            ("ae.base_chunk_size", self.ae.base_chunk_size),
            ("ttl.chunk_compress_factor", self.ttl.chunk_compress_factor),
            ("ttl.latent_dim", self.ttl.latent_dim),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(TtsError::asset(format!("model config: {name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.ae.sample_rate
    }

    pub fn latent_geometry(&self) -> LatentGeometry {
        LatentGeometry {
            sample_rate: self.ae.sample_rate,
            base_chunk_size: self.ae.base_chunk_size,
            compress_factor: self.ttl.chunk_compress_factor,
            latent_dim: self.ttl.latent_dim,
        }
    }
}

/// Per-request knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    /// Denoising steps per chunk.
    pub total_step: usize,
    /// Predicted durations are divided by this factor.
    pub speed: f32,
    /// Seconds of silence between chunks.
    pub silence_duration: f32,
    /// Chunk length limit in characters.
    pub max_chunk_len: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            total_step: 5,
            speed: 1.05,
            silence_duration: 0.3,
            max_chunk_len: MAX_CHUNK_LENGTH,
        }
    }
}

impl SynthesisOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(TtsError::invalid(format!("speed must be positive, got {}", self.speed)));
        }
        if !(self.silence_duration.is_finite() && self.silence_duration >= 0.0) {
            return Err(TtsError::invalid(format!(
                "silence_duration must be non-negative, got {}",
                self.silence_duration
            )));
        }
        if self.max_chunk_len == 0 {
            return Err(TtsError::invalid("max_chunk_len must be positive"));
        }
        Ok(())
    }
}
