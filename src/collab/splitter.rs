use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

const DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

/// One requested cut of the narrator-only track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySegment {
    /// Seconds into the narrator-only track.
    pub start: f64,
    pub end: f64,
    pub title: String,
}

/// One produced file. `index` refers back to the requested segment;
/// entries may be missing on partial failure and the caller falls back
/// per segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitFile {
    pub index: usize,
    /// Audio payload as a data URI.
    pub url: String,
    pub duration_seconds: f64,
}

impl SplitFile {
    pub fn from_wav(index: usize, wav: &[u8], duration_seconds: f64) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wav);
        Self {
            index,
            url: format!("{}{}", DATA_URI_PREFIX, encoded),
            duration_seconds,
        }
    }

    /// Decode the data URI back into WAV bytes.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        let encoded = self
            .url
            .strip_prefix(DATA_URI_PREFIX)
            .context("Split file URL is not an audio data URI")?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Failed to decode split file payload")
    }
}

/// External service that cuts one audio blob into per-range files.
#[async_trait::async_trait]
pub trait AudioSplitter: Send + Sync {
    async fn split(&self, audio: &[u8], segments: &[StorySegment]) -> Result<Vec<SplitFile>>;
}

/// In-process splitter that cuts a WAV blob by sample ranges.
/// The default when no hosted splitting service is configured.
pub struct WavClipSplitter;

#[async_trait::async_trait]
impl AudioSplitter for WavClipSplitter {
    async fn split(&self, audio: &[u8], segments: &[StorySegment]) -> Result<Vec<SplitFile>> {
        let (samples, sample_rate, channels) = crate::audio::track::decode_wav(audio)?;
        let per_second = sample_rate as f64 * channels as f64;

        let mut files = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            let start = ((segment.start * per_second) as usize).min(samples.len());
            let end = ((segment.end * per_second) as usize).clamp(start, samples.len());

            let clip = &samples[start..end];
            let wav = crate::audio::track::encode_wav(clip, sample_rate, channels)?;
            let duration = crate::audio::track::duration_seconds(clip.len(), sample_rate, channels);

            files.push(SplitFile::from_wav(index, &wav, duration));
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let wav = vec![1u8, 2, 3, 4];
        let file = SplitFile::from_wav(0, &wav, 2.5);
        assert!(file.url.starts_with(DATA_URI_PREFIX));
        assert_eq!(file.wav_bytes().unwrap(), wav);
    }

    #[tokio::test]
    async fn wav_clip_splitter_cuts_by_time() {
        // Two seconds of 16kHz mono audio: first second is 1s, second is 2s.
        let mut samples = vec![1i16; 16000];
        samples.extend(vec![2i16; 16000]);
        let wav = crate::audio::track::encode_wav(&samples, 16000, 1).unwrap();

        let segments = vec![
            StorySegment {
                start: 0.0,
                end: 1.0,
                title: "first".into(),
            },
            StorySegment {
                start: 1.0,
                end: 2.0,
                title: "second".into(),
            },
        ];

        let files = WavClipSplitter.split(&wav, &segments).await.unwrap();
        assert_eq!(files.len(), 2);

        let (clip, _, _) = crate::audio::track::decode_wav(&files[1].wav_bytes().unwrap()).unwrap();
        assert!(clip.iter().all(|&s| s == 2));
        assert!((files[1].duration_seconds - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn wav_clip_splitter_clamps_out_of_range_segments() {
        let samples = vec![1i16; 16000];
        let wav = crate::audio::track::encode_wav(&samples, 16000, 1).unwrap();

        let segments = vec![StorySegment {
            start: 0.5,
            end: 99.0,
            title: "tail".into(),
        }];

        let files = WavClipSplitter.split(&wav, &segments).await.unwrap();
        assert!((files[0].duration_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_data_uri() {
        let file = SplitFile {
            index: 0,
            url: "https://example.com/a.wav".to_string(),
            duration_seconds: 1.0,
        };
        assert!(file.wav_bytes().is_err());
    }
}
