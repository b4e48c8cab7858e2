//! Iterative latent refinement.
//!
//! A [`Denoiser`] owns the latent for one chunk and walks it through a fixed number
//! of vector-estimator calls. Each step replaces the latent with the estimator's
//! output; nothing is accumulated. Steps can be driven one at a time, so a caller
//! that wants to stop early simply stops calling [`Denoiser::step`].

use ndarray::{Array1, Array3};

use crate::engine::{InferenceEngine, ModelOps};
use crate::error::{Result, TtsError};

/// Notified synchronously before each step runs, with a 1-based step index.
pub trait StepObserver {
    fn on_step(&mut self, step: usize, total_steps: usize);
}

impl<F: FnMut(usize, usize)> StepObserver for F {
    fn on_step(&mut self, step: usize, total_steps: usize) {
        self(step, total_steps)
    }
}

/// Where a [`Denoiser`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenoiseState {
    Initialized,
    /// `next_step` steps have completed; the next estimator call uses that index.
    Stepping { next_step: usize },
    Done,
}

/// Read-only conditioning shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub struct Conditioning<'a> {
    pub text_emb: &'a Array3<f32>,
    pub style_ttl: &'a Array3<f32>,
    pub latent_mask: &'a Array3<f32>,
    pub text_mask: &'a Array3<f32>,
}

pub struct Denoiser<'a> {
    latent: Array3<f32>,
    cond: Conditioning<'a>,
    total_steps: usize,
    total_step_tensor: Array1<f32>,
    state: DenoiseState,
}

impl<'a> Denoiser<'a> {
    pub fn new(latent: Array3<f32>, cond: Conditioning<'a>, total_steps: usize) -> Result<Self> {
        let batch = latent.shape()[0];
        let latent_len = latent.shape()[2];
        if cond.latent_mask.shape() != [batch, 1, latent_len] {
            return Err(TtsError::invalid(format!(
                "latent mask shape {:?} does not fit latent {:?}",
                cond.latent_mask.shape(),
                latent.shape()
            )));
        }
        if cond.text_emb.shape()[0] != batch || cond.text_mask.shape()[0] != batch {
            return Err(TtsError::invalid("text conditioning batch differs from latent batch"));
        }

        let state = if total_steps == 0 {
            DenoiseState::Done
        } else {
            DenoiseState::Initialized
        };
        Ok(Self {
            latent,
            cond,
            total_steps,
            total_step_tensor: Array1::from_elem(batch, total_steps as f32),
            state,
        })
    }

    pub fn state(&self) -> DenoiseState {
        self.state
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn latent(&self) -> &Array3<f32> {
        &self.latent
    }

    /// Run one step. Returns `false` once the run is already finished.
    pub fn step<E, O>(&mut self, engine: &mut E, observer: &mut O) -> Result<bool>
    where
        E: InferenceEngine + ?Sized,
        O: StepObserver + ?Sized,
    {
        let step = match self.state {
            DenoiseState::Initialized => 0,
            DenoiseState::Stepping { next_step } => next_step,
            DenoiseState::Done => return Ok(false),
        };

        observer.on_step(step + 1, self.total_steps);

        let current_step = Array1::from_elem(self.latent.shape()[0], step as f32);
        self.latent = engine.estimate_vector(
            &self.latent,
            self.cond.text_emb,
            self.cond.style_ttl,
            self.cond.latent_mask,
            self.cond.text_mask,
            &current_step,
            &self.total_step_tensor,
        )?;

        let completed = step + 1;
        self.state = if completed == self.total_steps {
            DenoiseState::Done
        } else {
            DenoiseState::Stepping { next_step: completed }
        };
        tracing::trace!(step = completed, total = self.total_steps, "denoising step done");
        Ok(true)
    }

    /// Drive the remaining steps and hand back the final latent.
    pub fn run<E, O>(mut self, engine: &mut E, observer: &mut O) -> Result<Array3<f32>>
    where
        E: InferenceEngine + ?Sized,
        O: StepObserver + ?Sized,
    {
        while self.step(engine, observer)? {}
        Ok(self.latent)
    }

    /// Final latent; `None` until the run is done.
    pub fn into_latent(self) -> Option<Array3<f32>> {
        (self.state == DenoiseState::Done).then_some(self.latent)
    }
}
