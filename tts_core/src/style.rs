//! Voice style assets.

use std::fs;
use std::path::Path;

use ndarray::{concatenate, Array3, Axis};
use serde::Deserialize;

use crate::error::{Result, TtsError};

/// On-disk tensor: a shape descriptor plus arbitrarily nested numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleComponent {
    pub dims: Vec<usize>,
    pub data: serde_json::Value,
    #[serde(rename = "type", default)]
    pub dtype: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStyleData {
    pub style_ttl: StyleComponent,
    pub style_dp: StyleComponent,
}

/// Conditioning tensors for a voice, shared read-only across generations.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceStyle {
    pub ttl: Array3<f32>,
    pub dp: Array3<f32>,
}

impl VoiceStyle {
    pub fn new(ttl: Array3<f32>, dp: Array3<f32>) -> Result<Self> {
        if ttl.shape()[0] != dp.shape()[0] {
            return Err(TtsError::asset(format!(
                "style_ttl batch {} differs from style_dp batch {}",
                ttl.shape()[0],
                dp.shape()[0]
            )));
        }
        Ok(Self { ttl, dp })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            TtsError::asset(format!("failed to read voice style {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let data: VoiceStyleData = serde_json::from_slice(bytes)
            .map_err(|e| TtsError::asset(format!("voice style is not valid JSON: {e}")))?;
        Self::new(
            component_to_array("style_ttl", &data.style_ttl)?,
            component_to_array("style_dp", &data.style_dp)?,
        )
    }

    /// Stack several styles along the batch axis for batched synthesis.
    pub fn stack(styles: &[VoiceStyle]) -> Result<Self> {
        if styles.is_empty() {
            return Err(TtsError::invalid("cannot stack an empty list of voice styles"));
        }
        let ttl_views: Vec<_> = styles.iter().map(|s| s.ttl.view()).collect();
        let dp_views: Vec<_> = styles.iter().map(|s| s.dp.view()).collect();
        let ttl = concatenate(Axis(0), &ttl_views)
            .map_err(|e| TtsError::invalid(format!("style_ttl shapes differ: {e}")))?;
        let dp = concatenate(Axis(0), &dp_views)
            .map_err(|e| TtsError::invalid(format!("style_dp shapes differ: {e}")))?;
        Self::new(ttl, dp)
    }

    /// Number of speakers in the leading dimension.
    pub fn batch_size(&self) -> usize {
        self.ttl.shape()[0]
    }
}

fn component_to_array(name: &str, component: &StyleComponent) -> Result<Array3<f32>> {
    if let Some(dtype) = &component.dtype {
        if dtype != "float32" {
            return Err(TtsError::asset(format!("{name}: unsupported type '{dtype}'")));
        }
    }
    let dims: [usize; 3] = component.dims.as_slice().try_into().map_err(|_| {
        TtsError::asset(format!("{name}: expected 3 dims, got {:?}", component.dims))
    })?;

    let mut flat = Vec::with_capacity(dims.iter().product());
    flatten_into(name, &component.data, &mut flat)?;

    Array3::from_shape_vec(dims, flat).map_err(|e| {
        TtsError::asset(format!("{name}: data does not match dims {dims:?}: {e}"))
    })
}

fn flatten_into(name: &str, value: &serde_json::Value, out: &mut Vec<f32>) -> Result<()> {
    match value {
        serde_json::Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| TtsError::asset(format!("{name}: unrepresentable number {n}")))?;
            out.push(v as f32);
        }
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_into(name, item, out)?;
            }
        }
        other => {
            return Err(TtsError::asset(format!("{name}: unexpected value {other}")));
        }
    }
    Ok(())
}
