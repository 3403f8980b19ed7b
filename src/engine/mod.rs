//! Audio Engine Module
//!
//! Runtime pieces a playback session is made of:
//! - Audio buffer and stream format
//! - WAV file I/O
//! - Render graph and audio outputs
//! - Completion timer, clocks and the audio session capability
//! - Playback state machine

pub mod buffer;
pub mod clock;
pub mod graph;
pub mod io;
pub mod output;
pub mod session;
pub mod timer;
pub mod transport;

pub use buffer::{calculate_peak, calculate_rms, AudioBuffer, ChannelLayout, StreamFormat};
pub use clock::{Clock, ManualClock, SystemClock};
pub use graph::{Link, NodeId, RenderGraph};
pub use io::{
    decode_wav, generate_test_tone, save_recording, write_wav, WavEncoding, RECORDING_FILE_NAME,
};
pub use output::{AudioOutput, MemoryOutput, MemoryOutputState, WavFileOutput};
pub use session::{AudioSession, SessionCategory, SharedAudioSession};
pub use timer::{completion_delay, CancellationToken, CompletionTimer};
pub use transport::{PlaybackState, SessionEnd, Transport};
