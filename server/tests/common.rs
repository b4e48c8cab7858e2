//! Common utilities for integration tests

use axum::Router;
use ndarray::{Array3, ArrayD, IxDyn};

use server::config::ServerConfig;
use server::voices::VoiceCatalog;
use server::{build_router, AppState, DynEngine};
use tts_core::{
    InferenceEngine, ModelConfig, NamedInputs, NamedOutputs, Operation, Result, Tensor,
    TensorView, TextToSpeech, VocabIndexer, VoiceStyle,
};

pub const SAMPLE_RATE: u32 = 1000;
const FRAME: usize = 20;

/// Answers every operation with small deterministic tensors: a fixed duration per
/// text, a halved latent per step, and a constant waveform.
pub struct MockEngine {
    pub duration_secs: f32,
    pub fail_vocoder: bool,
}

fn f32_shape(inputs: &NamedInputs<'_>, name: &str) -> Vec<usize> {
    match inputs.get(name) {
        Some(TensorView::F32(v)) => v.shape().to_vec(),
        other => panic!("expected f32 input {name}, got {other:?}"),
    }
}

impl InferenceEngine for MockEngine {
    fn run(&mut self, op: Operation, inputs: NamedInputs<'_>) -> Result<NamedOutputs> {
        let out = match op {
            Operation::PredictDuration => {
                let batch = f32_shape(&inputs, "text_mask")[0];
                Tensor::F32(ArrayD::from_elem(IxDyn(&[batch]), self.duration_secs))
            }
            Operation::EncodeText => {
                let mask = f32_shape(&inputs, "text_mask");
                Tensor::F32(ArrayD::zeros(IxDyn(&[mask[0], 4, mask[2]])))
            }
            Operation::EstimateVector => match inputs.get("noisy_latent") {
                Some(TensorView::F32(v)) => Tensor::F32(v.mapv(|x| x * 0.5)),
                other => panic!("noisy_latent missing: {other:?}"),
            },
            Operation::Vocode => {
                if self.fail_vocoder {
                    return Err(tts_core::TtsError::Inference {
                        operation: op.name(),
                        message: "mock vocoder failure".into(),
                    });
                }
                let shape = f32_shape(&inputs, "latent");
                Tensor::F32(ArrayD::from_elem(IxDyn(&[shape[0], shape[2] * FRAME]), 0.25))
            }
        };
        Ok(NamedOutputs::new().with(op.output_name(), out))
    }
}

pub fn test_style() -> VoiceStyle {
    VoiceStyle::new(Array3::from_elem((1, 4, 8), 0.1), Array3::from_elem((1, 1, 8), 0.1)).unwrap()
}

pub fn test_state(engine: MockEngine) -> AppState {
    let model_config = ModelConfig::from_json_slice(
        br#"{"ae": {"sample_rate": 1000, "base_chunk_size": 10},
             "ttl": {"chunk_compress_factor": 2, "latent_dim": 2}}"#,
    )
    .unwrap();
    let engine: DynEngine = Box::new(engine);
    let tts = TextToSpeech::new(model_config, VocabIndexer::new((0..256).collect()), engine);

    let mut voices = VoiceCatalog::new();
    voices.insert("M1", test_style());
    voices.insert("F1", test_style());

    let config = ServerConfig {
        total_steps: Some(2),
        ..Default::default()
    };
    AppState::new(tts, voices, config)
}

/// Create a test app instance
pub fn create_test_app() -> Router {
    create_app_with(MockEngine {
        duration_secs: 0.5,
        fail_vocoder: false,
    })
}

pub fn create_app_with(engine: MockEngine) -> Router {
    build_router(test_state(engine)).expect("router builds")
}
