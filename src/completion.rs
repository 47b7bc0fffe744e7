// Completion pipeline: turn an analyzed session into finished stories.
//
// Time mapping uses proportional interpolation from transcript
// character offsets to narrator-track seconds. The analyzer contract
// provides no word timestamps, so position in the transcript is the
// only alignment signal available.

use tracing::{info, warn};

use crate::audio::FinalizedTracks;
use crate::collab::{DetectedStory, SplitFile, StorySegment};

/// One finished story handed to the surrounding application.
#[derive(Debug, Clone)]
pub struct FinishedStory {
    pub title: String,
    pub text: String,
    /// WAV bytes.
    pub audio: Vec<u8>,
    pub duration_seconds: f64,
}

/// Final output of a completed session. The surrounding application
/// owns storage and navigation from here.
#[derive(Debug, Clone)]
pub struct CompletedInterview {
    pub stories: Vec<FinishedStory>,
    pub full_transcript: String,
}

/// Fill `start_time`/`end_time` on each story by interpolating its
/// character offsets against the narrator track duration.
///
/// Times are clamped to the track and repaired to be non-decreasing
/// across stories, since the splitter expects ordered ranges.
pub fn map_offsets_to_times(
    stories: &mut [DetectedStory],
    transcript_len: usize,
    narrator_duration: f64,
) {
    let scale = if transcript_len == 0 {
        0.0
    } else {
        narrator_duration / transcript_len as f64
    };

    let mut previous_end = 0.0f64;
    for story in stories.iter_mut() {
        let mut start = (story.start_index as f64 * scale).clamp(0.0, narrator_duration);
        let mut end = (story.end_index as f64 * scale).clamp(0.0, narrator_duration);

        if start < previous_end {
            start = previous_end;
        }
        if end < start {
            end = start;
        }
        previous_end = end;

        story.start_time = Some(start);
        story.end_time = Some(end);
    }
}

/// Segments for the audio splitter, from time-mapped stories.
/// Stories that were never time-mapped are skipped.
pub fn segments_for(stories: &[DetectedStory]) -> Vec<StorySegment> {
    stories
        .iter()
        .filter_map(|story| {
            let (start, end) = (story.start_time?, story.end_time?);
            Some(StorySegment {
                start,
                end,
                title: story.title.clone(),
            })
        })
        .collect()
}

/// Completion with exactly one story carrying the full session audio.
///
/// Used on the direct path (zero or one detected stories), on
/// "keep as one", and as the degraded path when analysis or splitting
/// fails.
pub fn single_story(
    title: String,
    text: String,
    tracks: &FinalizedTracks,
    full_transcript: String,
) -> CompletedInterview {
    info!("Assembling single-story completion: \"{}\"", title);
    CompletedInterview {
        stories: vec![FinishedStory {
            title,
            text,
            audio: tracks.mixed.clone(),
            duration_seconds: tracks.narrator_duration_seconds,
        }],
        full_transcript,
    }
}

/// Completion with one story per detected segment.
///
/// Split files are matched to segments by index. A segment whose file
/// is missing (partial splitter failure) falls back to the full
/// narrator-only blob rather than being dropped.
pub fn assemble_split(
    stories: &[DetectedStory],
    files: &[SplitFile],
    tracks: &FinalizedTracks,
    full_transcript: String,
) -> CompletedInterview {
    let mut finished = Vec::with_capacity(stories.len());

    for (index, story) in stories.iter().enumerate() {
        let file = files.iter().find(|f| f.index == index);

        let (audio, duration_seconds) = match file.map(|f| (f.wav_bytes(), f.duration_seconds)) {
            Some((Ok(bytes), duration)) => (bytes, duration),
            Some((Err(e), _)) => {
                warn!(
                    "Split file {} is unreadable ({}); falling back to full audio",
                    index, e
                );
                (
                    tracks.narrator_only.clone(),
                    tracks.narrator_duration_seconds,
                )
            }
            None => {
                warn!(
                    "No split file for segment {}; falling back to full audio",
                    index
                );
                (
                    tracks.narrator_only.clone(),
                    tracks.narrator_duration_seconds,
                )
            }
        };

        finished.push(FinishedStory {
            title: story.title.clone(),
            text: story.bridged_text.clone(),
            audio,
            duration_seconds,
        });
    }

    info!(
        "Assembled split completion: {} stories ({} split files received)",
        finished.len(),
        files.len()
    );

    CompletedInterview {
        stories: finished,
        full_transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(start_index: usize, end_index: usize) -> DetectedStory {
        DetectedStory {
            title: "t".to_string(),
            summary: "s".to_string(),
            bridged_text: "text".to_string(),
            start_index,
            end_index,
            start_time: None,
            end_time: None,
        }
    }

    fn tracks() -> FinalizedTracks {
        FinalizedTracks {
            mixed: vec![1, 2, 3],
            narrator_only: vec![4, 5, 6],
            narrator_duration_seconds: 100.0,
        }
    }

    #[test]
    fn proportional_mapping() {
        let mut stories = vec![story(0, 500), story(500, 1000)];
        map_offsets_to_times(&mut stories, 1000, 200.0);

        assert_eq!(stories[0].start_time, Some(0.0));
        assert_eq!(stories[0].end_time, Some(100.0));
        assert_eq!(stories[1].start_time, Some(100.0));
        assert_eq!(stories[1].end_time, Some(200.0));
    }

    #[test]
    fn mapping_clamps_and_repairs_order() {
        // Overlapping and out-of-range offsets from a sloppy analyzer.
        let mut stories = vec![story(0, 800), story(600, 2000)];
        map_offsets_to_times(&mut stories, 1000, 100.0);

        let first_end = stories[0].end_time.unwrap();
        let second_start = stories[1].start_time.unwrap();
        assert!(second_start >= first_end);
        assert!(stories[1].end_time.unwrap() <= 100.0);
    }

    #[test]
    fn mapping_empty_transcript_pins_to_zero() {
        let mut stories = vec![story(10, 20)];
        map_offsets_to_times(&mut stories, 0, 100.0);
        assert_eq!(stories[0].start_time, Some(0.0));
        assert_eq!(stories[0].end_time, Some(0.0));
    }

    #[test]
    fn missing_split_file_falls_back_per_segment() {
        let mut stories = vec![story(0, 100), story(100, 200), story(200, 300)];
        map_offsets_to_times(&mut stories, 300, 30.0);

        // Only the middle segment came back from the splitter.
        let wav = vec![9u8; 8];
        let files = vec![SplitFile::from_wav(1, &wav, 10.0)];

        let done = assemble_split(&stories, &files, &tracks(), "transcript".to_string());

        assert_eq!(done.stories.len(), 3, "no segment may be dropped");
        assert_eq!(done.stories[0].audio, tracks().narrator_only);
        assert_eq!(done.stories[1].audio, wav);
        assert_eq!(done.stories[1].duration_seconds, 10.0);
        assert_eq!(done.stories[2].audio, tracks().narrator_only);
    }

    #[test]
    fn single_story_uses_mixed_track() {
        let done = single_story(
            "My Story".to_string(),
            "Once upon a time".to_string(),
            &tracks(),
            "full".to_string(),
        );
        assert_eq!(done.stories.len(), 1);
        assert_eq!(done.stories[0].audio, tracks().mixed);
        assert_eq!(done.stories[0].duration_seconds, 100.0);
    }
}
