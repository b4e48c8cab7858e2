//! Engine-independent files of a model directory.

use std::path::Path;

use crate::config::{ModelConfig, CONFIG_FILE};
use crate::engine::InferenceEngine;
use crate::error::{Result, TtsError};
use crate::pipeline::TextToSpeech;
use crate::progress::{LoadTracker, ProgressSink};
use crate::vocab::VocabIndexer;

pub const VOCAB_FILE: &str = "unicode_indexer.json";

/// Config and vocabulary, loaded before any engine exists.
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub config: ModelConfig,
    pub indexer: VocabIndexer,
}

impl ModelAssets {
    /// Number of `Loading` events [`load`](Self::load) emits.
    pub const RESOURCE_COUNT: usize = 2;

    pub fn load<P: AsRef<Path>>(dir: P, sink: &mut dyn ProgressSink) -> Result<Self> {
        let mut tracker = LoadTracker::new(Self::RESOURCE_COUNT, sink);
        Self::load_with(dir.as_ref(), &mut tracker)
    }

    /// Load into an existing tracker so callers can report more resources after these.
    pub fn load_with(dir: &Path, tracker: &mut LoadTracker<'_>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TtsError::asset(format!("model directory {} not found", dir.display())));
        }

        let config = ModelConfig::from_path(dir.join(CONFIG_FILE))?;
        tracker.loaded(CONFIG_FILE);

        let indexer = VocabIndexer::from_path(dir.join(VOCAB_FILE))?;
        tracker.loaded(VOCAB_FILE);

        tracing::info!(
            dir = %dir.display(),
            sample_rate = config.sample_rate(),
            vocab_size = indexer.len(),
            "model assets loaded"
        );
        Ok(Self { config, indexer })
    }

    pub fn into_text_to_speech<E: InferenceEngine>(self, engine: E) -> TextToSpeech<E> {
        TextToSpeech::new(self.config, self.indexer, engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tts_core_{name}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_loads_and_reports_progress() {
        let dir = temp_dir("assets_ok");
        fs::write(
            dir.join(CONFIG_FILE),
            r#"{"ae": {"sample_rate": 44100, "base_chunk_size": 512},
                "ttl": {"chunk_compress_factor": 6, "latent_dim": 24}}"#,
        )
        .unwrap();
        fs::write(dir.join(VOCAB_FILE), "[0, 1, 2, 3]").unwrap();

        let mut events = Vec::new();
        let mut sink = |e: ProgressEvent| events.push(e);
        let assets = ModelAssets::load(&dir, &mut sink).unwrap();
        assert_eq!(assets.config.sample_rate(), 44100);
        assert_eq!(assets.indexer.len(), 4);

        let resources: Vec<_> = events
            .iter()
            .map(|e| match e {
                ProgressEvent::Loading { current, total, resource } => (*current, *total, resource.as_str()),
                _ => panic!("unexpected event {e:?}"),
            })
            .collect();
        assert_eq!(resources, vec![(1, 2, CONFIG_FILE), (2, 2, VOCAB_FILE)]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_directory_and_files() {
        let missing = std::env::temp_dir().join("tts_core_definitely_missing_dir");
        assert!(matches!(
            ModelAssets::load(&missing, &mut crate::progress::NoProgress),
            Err(TtsError::Asset(_))
        ));

        let dir = temp_dir("assets_empty");
        let err = ModelAssets::load(&dir, &mut crate::progress::NoProgress).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE), "{err}");
        fs::remove_dir_all(&dir).ok();
    }
}
