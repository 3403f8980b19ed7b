//! Error handling for Pitch Perfect
//!
//! Two failure families reach the caller: [`AudioFileError`] when a clip cannot
//! be loaded and [`EngineStartError`] when a playback graph cannot start. Both
//! are recoverable; the controller stays idle after either one.

use thiserror::Error;

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, PitchPerfectError>;

/// Failure to decode a recorded clip
#[derive(Error, Debug)]
pub enum AudioFileError {
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,
}

impl AudioFileError {
    /// Load and start failures leave the controller idle and usable
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AudioFileError::FileNotFound { .. } => "FILE_NOT_FOUND",
            AudioFileError::InvalidAudio { .. } => "INVALID_AUDIO",
            AudioFileError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            AudioFileError::EmptyAudio => "EMPTY_AUDIO",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            AudioFileError::FileNotFound { .. } => vec![
                "Record a new clip before choosing an effect",
                "Check the file path is correct",
            ],
            AudioFileError::InvalidAudio { .. } => vec![
                "The recording may be corrupted - try recording again",
                "Check if the file plays in another application",
            ],
            AudioFileError::UnsupportedFormat { .. } => vec![
                "Record as mono or stereo PCM WAV",
                "Supported sample formats: 8/16/24/32-bit integer, 32-bit float",
            ],
            AudioFileError::EmptyAudio => vec!["The recording is empty - record a longer clip"],
        }
    }
}

/// Failure to start a playback graph
#[derive(Error, Debug)]
pub enum EngineStartError {
    #[error("No recording loaded")]
    NoSourceLoaded,

    #[error("Audio session is not active for playback")]
    SessionInactive,

    #[error("Cannot allocate render resources: {required_frames} frames requested, budget is {budget_frames}")]
    ResourceExhausted {
        required_frames: usize,
        budget_frames: usize,
    },

    #[error("Format mismatch between {from} and {to}")]
    FormatMismatch { from: String, to: String },

    #[error("Audio output failed: {reason}")]
    Output {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl EngineStartError {
    /// Load and start failures leave the controller idle and usable
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineStartError::NoSourceLoaded => "NO_SOURCE_LOADED",
            EngineStartError::SessionInactive => "SESSION_INACTIVE",
            EngineStartError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            EngineStartError::FormatMismatch { .. } => "FORMAT_MISMATCH",
            EngineStartError::Output { .. } => "OUTPUT_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EngineStartError::NoSourceLoaded => vec!["Load a recording before playing"],
            EngineStartError::SessionInactive => vec![
                "Activate the audio session before playing",
                "Use a session category that allows playback",
            ],
            EngineStartError::ResourceExhausted { .. } => vec![
                "Try a faster effect or a shorter recording",
                "Raise max_render_frames in the configuration",
            ],
            EngineStartError::FormatMismatch { .. } => vec!["Reload the recording"],
            EngineStartError::Output { .. } => vec![
                "Check the output destination is writable",
                "Try playing again",
            ],
        }
    }
}

/// Crate-level error type
#[derive(Error, Debug)]
pub enum PitchPerfectError {
    #[error(transparent)]
    AudioFile(#[from] AudioFileError),

    #[error(transparent)]
    EngineStart(#[from] EngineStartError),

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Unknown preset: {name}")]
    UnknownPreset { name: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PitchPerfectError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PitchPerfectError::AudioFile(e) => e.error_code(),
            PitchPerfectError::EngineStart(e) => e.error_code(),
            PitchPerfectError::InvalidConfig { .. } => "INVALID_CONFIG",
            PitchPerfectError::UnknownPreset { .. } => "UNKNOWN_PRESET",
            PitchPerfectError::Io(_) => "IO_ERROR",
            PitchPerfectError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            PitchPerfectError::AudioFile(_) => true,
            PitchPerfectError::EngineStart(_) => true,
            PitchPerfectError::UnknownPreset { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PitchPerfectError::AudioFile(e) => e.recovery_suggestions(),
            PitchPerfectError::EngineStart(e) => e.recovery_suggestions(),
            PitchPerfectError::UnknownPreset { .. } => {
                vec!["Available presets: slow, fast, chipmunk, vader, echo, reverb"]
            }
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AudioFileError::FileNotFound {
            path: "recordedVoice.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");

        let err = PitchPerfectError::from(EngineStartError::NoSourceLoaded);
        assert_eq!(err.error_code(), "NO_SOURCE_LOADED");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = PitchPerfectError::from(EngineStartError::ResourceExhausted {
            required_frames: 10,
            budget_frames: 5,
        });
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_transparent_display() {
        let err = PitchPerfectError::from(AudioFileError::EmptyAudio);
        assert_eq!(err.to_string(), "Audio contains no samples");
    }
}
