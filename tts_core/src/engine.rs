//! Boundary to the neural sub-models.
//!
//! The pipeline never executes network weights itself. It hands named tensors to an
//! [`InferenceEngine`] and reads named tensors back; [`ModelOps`] layers typed
//! helpers with output validation on top of that single capability.

use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayViewD, Ix3};

use crate::error::{Result, TtsError};

/// Longest speech a single chunk may last. Chunks are a few sentences, so anything
/// beyond this is a malformed model output.
pub const MAX_DURATION_SECS: f32 = 600.0;

/// The four independently invocable sub-models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    PredictDuration,
    EncodeText,
    EstimateVector,
    Vocode,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::PredictDuration,
        Operation::EncodeText,
        Operation::EstimateVector,
        Operation::Vocode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::PredictDuration => "duration_predictor",
            Operation::EncodeText => "text_encoder",
            Operation::EstimateVector => "vector_estimator",
            Operation::Vocode => "vocoder",
        }
    }

    /// Name of the tensor this operation produces.
    pub fn output_name(self) -> &'static str {
        match self {
            Operation::PredictDuration => "duration",
            Operation::EncodeText => "text_emb",
            Operation::EstimateVector => "denoised_latent",
            Operation::Vocode => "wav_tts",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed input tensor.
#[derive(Debug, Clone)]
pub enum TensorView<'a> {
    F32(ArrayViewD<'a, f32>),
    I64(ArrayViewD<'a, i64>),
}

impl TensorView<'_> {
    pub fn shape(&self) -> &[usize] {
        match self {
            TensorView::F32(a) => a.shape(),
            TensorView::I64(a) => a.shape(),
        }
    }
}

/// Owned output tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

/// Ordered named inputs of one call.
#[derive(Debug, Clone, Default)]
pub struct NamedInputs<'a> {
    entries: Vec<(&'static str, TensorView<'a>)>,
}

impl<'a> NamedInputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn f32<D: ndarray::Dimension>(mut self, name: &'static str, array: &'a ndarray::Array<f32, D>) -> Self {
        self.entries.push((name, TensorView::F32(array.view().into_dyn())));
        self
    }

    pub fn i64<D: ndarray::Dimension>(mut self, name: &'static str, array: &'a ndarray::Array<i64, D>) -> Self {
        self.entries.push((name, TensorView::I64(array.view().into_dyn())));
        self
    }

    pub fn get(&self, name: &str) -> Option<&TensorView<'a>> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TensorView<'a>)> {
        self.entries.iter().map(|(n, t)| (*n, t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Named outputs of one call.
#[derive(Debug, Clone, Default)]
pub struct NamedOutputs {
    entries: HashMap<String, Tensor>,
}

impl NamedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.entries.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    /// Remove the operation's output and require it to be an `f32` tensor.
    pub fn take_f32(&mut self, op: Operation) -> Result<ArrayD<f32>> {
        match self.entries.remove(op.output_name()) {
            Some(Tensor::F32(array)) => Ok(array),
            Some(Tensor::I64(_)) => Err(TtsError::inference(
                op.name(),
                format!("output '{}' is not a float tensor", op.output_name()),
            )),
            None => Err(TtsError::inference(
                op.name(),
                format!("missing output '{}'", op.output_name()),
            )),
        }
    }
}

/// Runs one named operation with named tensor inputs. Calls are blocking and never
/// overlap: the pipeline holds `&mut self` for the whole exchange.
pub trait InferenceEngine {
    fn run(&mut self, op: Operation, inputs: NamedInputs<'_>) -> Result<NamedOutputs>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn run(&mut self, op: Operation, inputs: NamedInputs<'_>) -> Result<NamedOutputs> {
        (**self).run(op, inputs)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for &mut E {
    fn run(&mut self, op: Operation, inputs: NamedInputs<'_>) -> Result<NamedOutputs> {
        (**self).run(op, inputs)
    }
}

fn into_3d(op: Operation, array: ArrayD<f32>) -> Result<Array3<f32>> {
    let shape = array.shape().to_vec();
    array.into_dimensionality::<Ix3>().map_err(|_| {
        TtsError::inference(op.name(), format!("expected a 3-D output, got shape {shape:?}"))
    })
}

/// Typed wrappers over the four operations.
pub trait ModelOps: InferenceEngine {
    /// Seconds of audio per batch item.
    fn predict_duration(
        &mut self,
        text_ids: &Array2<i64>,
        style_dp: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Vec<f32>> {
        let op = Operation::PredictDuration;
        let inputs = NamedInputs::new()
            .i64("text_ids", text_ids)
            .f32("style_dp", style_dp)
            .f32("text_mask", text_mask);
        let duration = self.run(op, inputs)?.take_f32(op)?;
        let batch = text_ids.nrows();
        if duration.len() != batch {
            return Err(TtsError::inference(
                op.name(),
                format!("expected {batch} durations, got {}", duration.len()),
            ));
        }
        if duration.iter().any(|d| !d.is_finite()) {
            return Err(TtsError::inference(op.name(), "non-finite duration"));
        }
        if let Some(d) = duration.iter().find(|&&d| !(0.0..=MAX_DURATION_SECS).contains(&d)) {
            return Err(TtsError::inference(
                op.name(),
                format!("duration {d}s outside 0..={MAX_DURATION_SECS}s"),
            ));
        }
        Ok(duration.iter().copied().collect())
    }

    fn encode_text(
        &mut self,
        text_ids: &Array2<i64>,
        style_ttl: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Array3<f32>> {
        let op = Operation::EncodeText;
        let inputs = NamedInputs::new()
            .i64("text_ids", text_ids)
            .f32("style_ttl", style_ttl)
            .f32("text_mask", text_mask);
        let text_emb = into_3d(op, self.run(op, inputs)?.take_f32(op)?)?;
        if text_emb.shape()[0] != text_ids.nrows() {
            return Err(TtsError::inference(
                op.name(),
                format!(
                    "text embedding batch {} does not match {} inputs",
                    text_emb.shape()[0],
                    text_ids.nrows()
                ),
            ));
        }
        Ok(text_emb)
    }

    /// One denoising step; the result must have the latent's shape.
    #[allow(clippy::too_many_arguments)]
    fn estimate_vector(
        &mut self,
        noisy_latent: &Array3<f32>,
        text_emb: &Array3<f32>,
        style_ttl: &Array3<f32>,
        latent_mask: &Array3<f32>,
        text_mask: &Array3<f32>,
        current_step: &Array1<f32>,
        total_step: &Array1<f32>,
    ) -> Result<Array3<f32>> {
        let op = Operation::EstimateVector;
        let inputs = NamedInputs::new()
            .f32("noisy_latent", noisy_latent)
            .f32("text_emb", text_emb)
            .f32("style_ttl", style_ttl)
            .f32("latent_mask", latent_mask)
            .f32("text_mask", text_mask)
            .f32("current_step", current_step)
            .f32("total_step", total_step);
        let denoised = into_3d(op, self.run(op, inputs)?.take_f32(op)?)?;
        if denoised.shape() != noisy_latent.shape() {
            return Err(TtsError::inference(
                op.name(),
                format!(
                    "denoised latent shape {:?} differs from input {:?}",
                    denoised.shape(),
                    noisy_latent.shape()
                ),
            ));
        }
        if denoised.iter().any(|v| !v.is_finite()) {
            return Err(TtsError::inference(op.name(), "denoised latent contains NaN or Inf"));
        }
        Ok(denoised)
    }

    /// Flat samples for the whole batch, item rows laid out back to back.
    fn vocode(&mut self, latent: &Array3<f32>) -> Result<Vec<f32>> {
        let op = Operation::Vocode;
        let inputs = NamedInputs::new().f32("latent", latent);
        let wav = self.run(op, inputs)?.take_f32(op)?;
        Ok(wav.iter().copied().collect())
    }
}

impl<E: InferenceEngine + ?Sized> ModelOps for E {}
