use crate::error::ApiError;

/// Maximum text length for TTS requests, in characters
const MAX_TEXT_LENGTH: usize = 5000;
const MAX_VOICE_ID_LENGTH: usize = 64;
const MAX_TOTAL_STEP: usize = 50;
const SPEED_RANGE: (f32, f32) = (0.5, 2.0);
const MAX_SILENCE_SECS: f32 = 5.0;

/// Validate TTS request
pub fn validate_tts_request(text: &str, voice: Option<&str>) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    if let Some(voice) = voice {
        if !is_valid_voice_id(voice) {
            return Err(ApiError::InvalidInput(format!(
                "Invalid voice id: {}. Expected letters, digits, '-' or '_'",
                voice
            )));
        }
    }

    Ok(())
}

/// Validate the optional synthesis knobs of a request
pub fn validate_synthesis_options(
    total_step: Option<usize>,
    speed: Option<f32>,
    silence_duration: Option<f32>,
) -> Result<(), ApiError> {
    if let Some(steps) = total_step {
        if steps > MAX_TOTAL_STEP {
            return Err(ApiError::InvalidInput(format!(
                "total_step too large (max {})",
                MAX_TOTAL_STEP
            )));
        }
    }
    if let Some(speed) = speed {
        let (min, max) = SPEED_RANGE;
        if !(min..=max).contains(&speed) {
            return Err(ApiError::InvalidInput(format!(
                "speed must be between {} and {}",
                min, max
            )));
        }
    }
    if let Some(silence) = silence_duration {
        if !(0.0..=MAX_SILENCE_SECS).contains(&silence) {
            return Err(ApiError::InvalidInput(format!(
                "silence_duration must be between 0 and {} seconds",
                MAX_SILENCE_SECS
            )));
        }
    }
    Ok(())
}

/// Voice ids are file stems: letters, digits, '-' and '_'
pub fn is_valid_voice_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VOICE_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
