//! ONNX Runtime backend: one session per operation.

use std::collections::HashMap;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue, SessionInputs};
use ort::value::Tensor as OrtTensor;

use crate::assets::ModelAssets;
use crate::engine::{InferenceEngine, NamedInputs, NamedOutputs, Operation, Tensor, TensorView};
use crate::error::{Result, TtsError};
use crate::pipeline::TextToSpeech;
use crate::progress::{LoadTracker, ProgressSink};

pub struct OnnxEngine {
    duration_predictor: Session,
    text_encoder: Session,
    vector_estimator: Session,
    vocoder: Session,
}

fn model_file(op: Operation) -> String {
    format!("{}.onnx", op.name())
}

fn load_session(path: &Path) -> Result<Session> {
    let build = || -> ort::Result<Session> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
    };
    build().map_err(|e| TtsError::asset(format!("failed to load {}: {e}", path.display())))
}

impl OnnxEngine {
    /// Load the four sessions from `dir`, reporting each one to `tracker`.
    pub fn load(dir: &Path, tracker: &mut LoadTracker<'_>) -> Result<Self> {
        let mut open = |op: Operation| -> Result<Session> {
            let file = model_file(op);
            let session = load_session(&dir.join(&file))?;
            tracker.loaded(&file);
            Ok(session)
        };
        Ok(Self {
            duration_predictor: open(Operation::PredictDuration)?,
            text_encoder: open(Operation::EncodeText)?,
            vector_estimator: open(Operation::EstimateVector)?,
            vocoder: open(Operation::Vocode)?,
        })
    }

    fn session(&mut self, op: Operation) -> &mut Session {
        match op {
            Operation::PredictDuration => &mut self.duration_predictor,
            Operation::EncodeText => &mut self.text_encoder,
            Operation::EstimateVector => &mut self.vector_estimator,
            Operation::Vocode => &mut self.vocoder,
        }
    }
}

fn to_input(op: Operation, view: &TensorView<'_>) -> Result<SessionInputValue<'static>> {
    let value = match view {
        TensorView::F32(v) => OrtTensor::from_array(v.to_owned()).map(|t| t.into_dyn()),
        TensorView::I64(v) => OrtTensor::from_array(v.to_owned()).map(|t| t.into_dyn()),
    };
    value
        .map(SessionInputValue::from)
        .map_err(|e| TtsError::inference(op.name(), format!("failed to build input tensor: {e}")))
}

impl InferenceEngine for OnnxEngine {
    fn run(&mut self, op: Operation, inputs: NamedInputs<'_>) -> Result<NamedOutputs> {
        let mut feed: HashMap<String, SessionInputValue<'static>> = HashMap::with_capacity(inputs.len());
        for (name, view) in inputs.iter() {
            feed.insert(name.to_string(), to_input(op, view)?);
        }

        let outputs = self
            .session(op)
            .run(SessionInputs::from(feed))
            .map_err(|e| TtsError::inference(op.name(), e.to_string()))?;

        let name = op.output_name();
        let value = outputs
            .get(name)
            .ok_or_else(|| TtsError::inference(op.name(), format!("missing output '{name}'")))?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| TtsError::inference(op.name(), e.to_string()))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let array = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| TtsError::inference(op.name(), e.to_string()))?;

        Ok(NamedOutputs::new().with(name, Tensor::F32(array)))
    }
}

/// Config, vocabulary and four models, in that order.
pub const RESOURCE_COUNT: usize = ModelAssets::RESOURCE_COUNT + 4;

/// Load a ready-to-use pipeline from a model directory.
pub fn load_text_to_speech<P: AsRef<Path>>(
    dir: P,
    sink: &mut dyn ProgressSink,
) -> Result<TextToSpeech<OnnxEngine>> {
    let dir = dir.as_ref();
    let mut tracker = LoadTracker::new(RESOURCE_COUNT, sink);
    let assets = ModelAssets::load_with(dir, &mut tracker)?;
    let engine = OnnxEngine::load(dir, &mut tracker)?;
    tracing::info!(dir = %dir.display(), "onnx models loaded");
    Ok(assets.into_text_to_speech(engine))
}
