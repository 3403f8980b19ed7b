//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;

use crate::config::ControllerConfig;
use crate::controller::{EffectGraphController, SessionReport};
use crate::engine::{
    calculate_peak, calculate_rms, decode_wav, generate_test_tone, save_recording, write_wav,
    AudioBuffer, AudioOutput, MemoryOutput, SharedAudioSession, SystemClock, WavEncoding,
    WavFileOutput,
};
use crate::error::Result;
use crate::request::Preset;

/// Longest sleep between completion polls in real-time mode
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Load the configuration file, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => {
            info!("Using configuration: {}", path.display());
            ControllerConfig::from_file(path)
        }
        None => Ok(ControllerConfig::default()),
    }
}

/// Play a clip through a preset, optionally writing the rendered session.
pub fn play(
    clip: &Path,
    preset: Preset,
    out: Option<&Path>,
    encoding: WavEncoding,
    realtime: bool,
    config: ControllerConfig,
) -> Result<()> {
    match out {
        Some(out) => {
            run_session(WavFileOutput::new(out, encoding), clip, preset, realtime, config)?;
            println!("Rendered audio written to {}", out.display());
            Ok(())
        }
        None => run_session(MemoryOutput::new(), clip, preset, realtime, config),
    }
}

fn run_session<O: AudioOutput>(
    output: O,
    clip: &Path,
    preset: Preset,
    realtime: bool,
    config: ControllerConfig,
) -> Result<()> {
    let session = Arc::new(SharedAudioSession::active_playback());
    let mut controller = EffectGraphController::with_clock(output, SystemClock, session, config);

    controller.set_completion_handler(|report: &SessionReport| {
        println!(
            "Session {} finished after {:.2}s",
            report.id,
            report.delay.as_secs_f64()
        );
    });

    let ready = controller.load(clip)?;
    println!(
        "Loaded {}: {} frames, {} Hz, {} ch, {:.2}s",
        clip.display(),
        ready.frames,
        ready.sample_rate,
        ready.channels,
        ready.duration.as_secs_f64()
    );

    controller.play_preset(preset)?;
    let stages: Vec<String> = controller
        .active_stages()
        .iter()
        .map(|k| k.to_string())
        .collect();
    let chain = if stages.is_empty() {
        "plain".to_string()
    } else {
        stages.join(" -> ")
    };
    let length = controller.completion_delay().unwrap_or_default();
    println!(
        "Playing '{}' through [{}], length {:.2}s",
        preset,
        chain,
        length.as_secs_f64()
    );

    if realtime {
        while controller.is_playing() {
            let wait = controller
                .time_remaining()
                .unwrap_or_default()
                .min(POLL_INTERVAL);
            thread::sleep(wait);
            controller.poll();
        }
    } else {
        controller.stop();
    }

    Ok(())
}

/// Print the preset table.
pub fn list_presets() -> Result<()> {
    println!("{:<10} {:>6} {:>8} {:>6} {:>7}", "PRESET", "RATE", "PITCH", "ECHO", "REVERB");
    for preset in Preset::ALL {
        let request = preset.request();
        println!(
            "{:<10} {:>6} {:>8} {:>6} {:>7}",
            preset.name(),
            request.rate.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
            request
                .pitch
                .map(|c| format!("{:+}", c))
                .unwrap_or_else(|| "-".into()),
            if request.echo { "yes" } else { "-" },
            if request.reverb { "yes" } else { "-" },
        );
    }
    Ok(())
}

/// Synthesize a sine clip to a file, or to the default recording in a directory.
pub fn tone(out: &Path, frequency: f32, duration: f32, sample_rate: u32) -> Result<()> {
    let buffer = generate_test_tone(frequency, duration, sample_rate);

    let written = if out.is_dir() {
        save_recording(&buffer, out)?
    } else {
        write_wav(&buffer, out, WavEncoding::Int16)?;
        out.to_path_buf()
    };

    println!(
        "Wrote {:.2}s {} Hz tone to {}",
        buffer.duration_secs(),
        frequency,
        written.display()
    );
    Ok(())
}

/// Print format and level information for a clip.
pub fn info(clip: &Path) -> Result<()> {
    let buffer = decode_wav(clip)?;

    println!("File:        {}", clip.display());
    println!("Format:      {}", buffer.format());
    println!("Frames:      {}", buffer.num_frames());
    println!("Duration:    {:.3}s", buffer.duration_secs());
    for line in level_lines(&buffer) {
        println!("{}", line);
    }

    for preset in Preset::ALL {
        let divisor = preset.request().resolve().duration_divisor();
        println!(
            "  {:<10} plays for {:.2}s",
            preset.name(),
            buffer.duration_secs() / divisor
        );
    }
    Ok(())
}

/// Peak and RMS lines for `info`; both helpers already report dBFS.
fn level_lines(buffer: &AudioBuffer) -> [String; 2] {
    [
        format!("Peak:        {:.1} dBFS", calculate_peak(buffer)),
        format!("RMS:         {:.1} dBFS", calculate_rms(buffer)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RECORDING_FILE_NAME;
    use tempfile::tempdir;

    #[test]
    fn test_tone_into_directory_uses_recording_name() {
        let dir = tempdir().unwrap();
        tone(dir.path(), 330.0, 0.25, 8000).unwrap();

        let clip = decode_wav(&dir.path().join(RECORDING_FILE_NAME)).unwrap();
        assert_eq!(clip.num_frames(), 2000);
    }

    #[test]
    fn test_play_writes_rendered_file() {
        let dir = tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        let out = dir.path().join("slow.wav");
        tone(&clip, 440.0, 0.5, 8000).unwrap();

        play(
            &clip,
            Preset::Slow,
            Some(&out),
            WavEncoding::Float32,
            false,
            ControllerConfig::default(),
        )
        .unwrap();

        let rendered = decode_wav(&out).unwrap();
        assert_eq!(rendered.num_frames(), 8000);
    }

    #[test]
    fn test_play_missing_clip_fails() {
        let dir = tempdir().unwrap();
        let result = play(
            &dir.path().join("missing.wav"),
            Preset::Echo,
            None,
            WavEncoding::Int16,
            false,
            ControllerConfig::default(),
        );
        assert_eq!(result.unwrap_err().error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_info_levels_are_finite() {
        // Half-scale sine: peak -6.0 dBFS, RMS -9.0 dBFS.
        let lines = level_lines(&generate_test_tone(440.0, 0.5, 16000));

        assert_eq!(lines[0], "Peak:        -6.0 dBFS");
        assert_eq!(lines[1], "RMS:         -9.0 dBFS");
        assert!(lines.iter().all(|l| !l.contains("inf")));
    }

    #[test]
    fn test_info_reads_clip() {
        let dir = tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        tone(&clip, 440.0, 0.25, 8000).unwrap();

        assert!(info(&clip).is_ok());
        let missing = info(&dir.path().join("missing.wav"));
        assert_eq!(missing.unwrap_err().error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_load_config_defaults() {
        assert_eq!(load_config(None).unwrap(), ControllerConfig::default());
    }
}
