use anyhow::{Context, Result};
use std::io::Cursor;

/// Encode a finished PCM track as an in-memory WAV blob.
///
/// The orchestrator hands finished tracks downstream as opaque bytes;
/// WAV keeps them playable without a container negotiation step.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV track")?;
    }

    Ok(cursor.into_inner())
}

/// Decode an in-memory WAV blob back to PCM samples.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32, u16)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .context("Failed to open WAV blob")?;
    let spec = reader.spec();
    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read WAV samples")?;
    Ok((samples, spec.sample_rate, spec.channels))
}

/// Duration of a PCM buffer in seconds, derived from sample count.
pub fn duration_seconds(sample_count: usize, sample_rate: u32, channels: u16) -> f64 {
    if sample_rate == 0 || channels == 0 {
        return 0.0;
    }
    sample_count as f64 / (sample_rate as f64 * channels as f64)
}
