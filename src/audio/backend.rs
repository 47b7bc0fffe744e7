use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Which speaker a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    /// Narrator's microphone input
    Narrator,
    /// Interviewer voice playback
    Interviewer,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Which speaker produced this frame
    pub source: TrackSource,
}

impl AudioFrame {
    /// Frame duration derived from sample count, not wall clock.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (will resample if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz for transcription
            channels: 1,        // Mono
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Device: narrator microphone (platform capture layer, out of tree)
/// - File: read frames from a WAV file (tests / batch processing)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Where capture frames come from
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Narrator microphone device
    Microphone,
    /// File input (tests / batch processing)
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    pub fn create(input: AudioInput, config: CaptureConfig) -> Result<Box<dyn AudioBackend>> {
        match input {
            AudioInput::Microphone => {
                // Device capture needs a platform layer this crate does
                // not link; callers without one get the fatal startup
                // error the narrator flow expects.
                Err(SessionError::DeviceUnavailable.into())
            }
            AudioInput::File(path) => {
                let backend = super::file::WavFileBackend::new(path, config);
                Ok(Box::new(backend))
            }
        }
    }
}
