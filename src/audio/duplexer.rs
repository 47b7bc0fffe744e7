// Capture duplexer: one recording rig, two synchronized artifacts.
//
// The narrator-only track is fed exclusively by microphone frames, so
// it can never contain interviewer audio even when both speak at once.
// The mixed track overlays interviewer frames onto the narrator
// timeline by timestamp, using saturating addition with clipping.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioFrame, CaptureConfig, TrackSource};
use super::track;

/// Immutable output of a finished capture. Cached by the duplexer so a
/// second `finalize()` returns the identical blobs (capture hardware
/// cannot be un-stopped).
#[derive(Debug, Clone)]
pub struct FinalizedTracks {
    /// Narrator + interviewer, WAV bytes. Archival full audio.
    pub mixed: Vec<u8>,
    /// Narrator only, WAV bytes. Transcription and story splitting.
    pub narrator_only: Vec<u8>,
    /// Narrator track duration derived from sample count, not wall clock.
    pub narrator_duration_seconds: f64,
}

/// The live recording rig. Exclusively owned by one session; exposes
/// only finalize-and-hand-over or discard, never partial reads while
/// capturing.
pub struct CaptureDuplexer {
    config: CaptureConfig,
    backend: Box<dyn AudioBackend>,
    mixed: Vec<i16>,
    narrator: Vec<i16>,
    capturing: bool,
    finalized: Option<FinalizedTracks>,
}

impl CaptureDuplexer {
    pub fn new(backend: Box<dyn AudioBackend>, config: CaptureConfig) -> Self {
        info!(
            "Capture duplexer initialized: {}Hz, {} channels, backend {}",
            config.sample_rate,
            config.channels,
            backend.name()
        );

        Self {
            config,
            backend,
            mixed: Vec::new(),
            narrator: Vec::new(),
            capturing: false,
            finalized: None,
        }
    }

    /// Open the capture device and return the frame receiver.
    ///
    /// Idempotent: a second call while capturing is a no-op returning
    /// `None` (the original receiver stays live). Device errors
    /// (`PermissionDenied`, `DeviceUnavailable`) propagate from the
    /// backend and are fatal to starting a session.
    pub async fn start(&mut self) -> Result<Option<mpsc::Receiver<AudioFrame>>> {
        if self.capturing {
            warn!("Capture already started");
            return Ok(None);
        }

        let rx = self.backend.start().await?;
        self.capturing = true;
        info!("Capture started ({})", self.backend.name());
        Ok(Some(rx))
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Current write position in the narrator track, in samples.
    /// Used as an opaque segment marker for spoken-answer messages.
    pub fn narrator_sample_offset(&self) -> u64 {
        self.narrator.len() as u64
    }

    /// Narrator track duration so far, from captured sample count.
    pub fn narrator_duration_seconds(&self) -> f64 {
        track::duration_seconds(
            self.narrator.len(),
            self.config.sample_rate,
            self.config.channels,
        )
    }

    /// Route one captured frame into the track buffers.
    ///
    /// Narrator frames extend the narrator track and are overlaid onto
    /// the mixed track; interviewer frames only touch the mixed track.
    pub fn push_frame(&mut self, frame: AudioFrame) {
        if !self.capturing || self.finalized.is_some() {
            debug!("Dropping frame pushed outside active capture");
            return;
        }

        if frame.sample_rate != self.config.sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                self.config.sample_rate, frame.sample_rate
            );
            return;
        }

        if frame.channels != self.config.channels {
            warn!(
                "Frame channel count mismatch: expected {}, got {}. Dropping frame.",
                self.config.channels, frame.channels
            );
            return;
        }

        let offset = self.sample_offset_for(frame.timestamp_ms);

        match frame.source {
            TrackSource::Narrator => {
                self.narrator.extend_from_slice(&frame.samples);
                Self::mix_into(&mut self.mixed, offset, &frame.samples);
            }
            TrackSource::Interviewer => {
                Self::mix_into(&mut self.mixed, offset, &frame.samples);
            }
        }
    }

    /// Stop capture and hand over both tracks as immutable blobs.
    ///
    /// Callable more than once: the first call finalizes, later calls
    /// return the cached result.
    pub async fn finalize(&mut self) -> Result<FinalizedTracks> {
        if let Some(tracks) = &self.finalized {
            debug!("finalize() called again; returning cached tracks");
            return Ok(tracks.clone());
        }

        if self.capturing {
            self.backend.stop().await?;
            self.capturing = false;
        }

        let tracks = FinalizedTracks {
            mixed: track::encode_wav(&self.mixed, self.config.sample_rate, self.config.channels)?,
            narrator_only: track::encode_wav(
                &self.narrator,
                self.config.sample_rate,
                self.config.channels,
            )?,
            narrator_duration_seconds: self.narrator_duration_seconds(),
        };

        info!(
            "Capture finalized: narrator {:.1}s, mixed {} samples",
            tracks.narrator_duration_seconds,
            self.mixed.len()
        );

        self.finalized = Some(tracks.clone());
        Ok(tracks)
    }

    /// Release the capture device without producing artifacts.
    /// Used on cancellation.
    pub async fn discard(&mut self) -> Result<()> {
        if self.capturing {
            self.backend.stop().await?;
            self.capturing = false;
        }

        self.mixed.clear();
        self.narrator.clear();
        info!("Capture discarded");
        Ok(())
    }

    fn sample_offset_for(&self, timestamp_ms: u64) -> usize {
        (timestamp_ms as usize * self.config.sample_rate as usize / 1000)
            * self.config.channels as usize
    }

    /// Overlay samples onto a buffer at an offset, extending with
    /// silence as needed. Addition clips to i16 range.
    fn mix_into(buffer: &mut Vec<i16>, offset: usize, samples: &[i16]) {
        let end = offset + samples.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }

        for (i, &sample) in samples.iter().enumerate() {
            let sum = buffer[offset + i] as i32 + sample as i32;
            buffer[offset + i] = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}
