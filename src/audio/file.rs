use anyhow::{Context, Result};
use hound::WavReader;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioBackend, AudioFrame, CaptureConfig, TrackSource};

const FRAME_MS: u64 = 100;

/// Audio backend that streams frames from a WAV file.
///
/// Frames are labeled as narrator audio and carry timestamps derived
/// from their position in the file, so downstream duration accounting
/// behaves exactly as with a live microphone.
pub struct WavFileBackend {
    path: PathBuf,
    config: CaptureConfig,
    capturing: bool,
}

impl WavFileBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let reader = WavReader::open(&self.path)
            .with_context(|| format!("Failed to open WAV file: {}", self.path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        info!(
            "WAV backend streaming {}: {}Hz, {} channels, {} samples",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        if spec.sample_rate != self.config.sample_rate || spec.channels != self.config.channels {
            tracing::warn!(
                "WAV format {}Hz/{}ch differs from configured {}Hz/{}ch; frames pass through unresampled",
                spec.sample_rate,
                spec.channels,
                self.config.sample_rate,
                self.config.channels
            );
        }

        self.capturing = true;

        let samples_per_frame =
            (spec.sample_rate as u64 * FRAME_MS / 1000) as usize * spec.channels as usize;
        let sample_rate = spec.sample_rate;
        let channels = spec.channels;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut timestamp_ms = 0u64;
            for chunk in samples.chunks(samples_per_frame.max(1)) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                    source: TrackSource::Narrator,
                };
                timestamp_ms += FRAME_MS;
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
