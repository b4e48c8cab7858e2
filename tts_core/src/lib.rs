//! Text-to-speech inference over a four-stage diffusion model.
//!
//! Text is split into chunks, normalized, and mapped to token ids. For each chunk a
//! duration predictor sizes a noisy latent, a text encoder conditions it, a vector
//! estimator refines it over a fixed number of steps, and a vocoder turns it into
//! samples. Chunk waveforms are joined with silence into one [`Speech`].
//!
//! The network weights run behind [`InferenceEngine`]; enable the `onnx` feature for
//! the ONNX Runtime backend.

pub mod assemble;
pub mod assets;
pub mod chunk;
pub mod config;
pub mod denoise;
pub mod engine;
pub mod error;
pub mod latent;
pub mod normalize;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod progress;
pub mod style;
pub mod vocab;
pub mod wav;

pub use assemble::assemble;
pub use assets::ModelAssets;
pub use chunk::{chunk_text, MAX_CHUNK_LENGTH};
pub use config::{ModelConfig, SynthesisOptions};
pub use denoise::{Conditioning, DenoiseState, Denoiser, StepObserver};
pub use engine::{
    InferenceEngine, ModelOps, NamedInputs, NamedOutputs, Operation, Tensor, TensorView, MAX_DURATION_SECS,
};
pub use error::{Result, TtsError};
pub use latent::{sample_noisy_latent, LatentGeometry};
pub use normalize::{normalize, NormalizedText};
pub use pipeline::{Speech, TextToSpeech};
pub use progress::{LoadTracker, NoProgress, ProgressEvent, ProgressSink};
pub use style::VoiceStyle;
pub use vocab::VocabIndexer;
pub use wav::{encode_wav, encode_wav_base64, write_wav_file};
