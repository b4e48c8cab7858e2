// Configuration for the server, read from the environment

use std::path::PathBuf;
use std::time::Duration;

use tts_core::SynthesisOptions;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub model_dir: PathBuf,
    pub voice_styles_dir: PathBuf,
    pub default_voice: String,
    /// Overrides the library default when set.
    pub total_steps: Option<usize>,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            model_dir: PathBuf::from("assets/onnx"),
            voice_styles_dir: PathBuf::from("assets/voice_styles"),
            default_voice: "M1".to_string(),
            total_steps: None,
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let model_dir = std::env::var("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_dir);

        let voice_styles_dir = std::env::var("VOICE_STYLES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.voice_styles_dir);

        let default_voice = std::env::var("DEFAULT_VOICE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.default_voice);

        let total_steps = env_parse("TOTAL_STEPS");

        let rate_limit_per_minute = env_parse("RATE_LIMIT_PER_MINUTE")
            .filter(|&n: &u32| n > 0)
            .unwrap_or(defaults.rate_limit_per_minute);

        let request_timeout_secs =
            env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port,
            model_dir,
            voice_styles_dir,
            default_voice,
            total_steps,
            rate_limit_per_minute,
            request_timeout_secs,
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options applied when a request leaves a knob unset.
    pub fn default_options(&self) -> SynthesisOptions {
        let mut opts = SynthesisOptions::default();
        if let Some(steps) = self.total_steps {
            opts.total_step = steps;
        }
        opts
    }
}
