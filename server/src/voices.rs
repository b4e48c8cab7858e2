// Voice styles available to requests, keyed by file stem

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tts_core::VoiceStyle;

#[derive(Debug, Default, Clone)]
pub struct VoiceCatalog {
    styles: BTreeMap<String, Arc<VoiceStyle>>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` in `dir`. Files that fail to parse are skipped with a warning.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut catalog = Self::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("Failed to read voice styles from {}: {e}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match VoiceStyle::from_path(&path) {
                Ok(style) if style.batch_size() == 1 => catalog.insert(id, style),
                Ok(style) => tracing::warn!(
                    "Skipping voice {id}: expected one speaker, found {}",
                    style.batch_size()
                ),
                Err(e) => tracing::warn!("Skipping voice {id}: {e}"),
            }
        }

        tracing::info!("Loaded {} voice style(s) from {}", catalog.len(), dir.display());
        Ok(catalog)
    }

    pub fn insert(&mut self, id: impl Into<String>, style: VoiceStyle) {
        self.styles.insert(id.into(), Arc::new(style));
    }

    pub fn get(&self, id: &str) -> Option<Arc<VoiceStyle>> {
        self.styles.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: &str = r#"{
        "style_ttl": {"dims": [1, 1, 2], "data": [[[0.1, 0.2]]], "type": "float32"},
        "style_dp": {"dims": [1, 1, 1], "data": [[[0.3]]], "type": "float32"}
    }"#;

    #[test]
    fn test_load_dir_uses_file_stems() {
        let dir = std::env::temp_dir().join(format!("server_voices_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("M1.json"), STYLE).unwrap();
        std::fs::write(dir.join("F1.json"), STYLE).unwrap();
        std::fs::write(dir.join("broken.json"), "{").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let catalog = VoiceCatalog::load_dir(&dir).unwrap();
        assert_eq!(catalog.ids(), vec!["F1".to_string(), "M1".to_string()]);
        assert!(catalog.get("M1").is_some());
        assert!(catalog.get("broken").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        assert!(VoiceCatalog::load_dir(Path::new("/definitely/not/here")).is_err());
    }
}
