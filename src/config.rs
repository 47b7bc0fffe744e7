use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub interview: InterviewConfig,
    pub drafts: DraftConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Interview policy knobs. These are session policy, not constants:
/// the warmup shortcut in particular is a deliberate UX compression
/// and product may tune it.
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewConfig {
    /// Seconds of wall-clock time before the one-time warning event.
    pub warning_after_secs: u64,
    /// Seconds of wall-clock time before the hard limit forces completion.
    pub hard_limit_secs: u64,
    /// Warmup ends after this many narrator responses even if the
    /// theme's icebreaker list is longer.
    pub warmup_shortcut_responses: usize,
    /// Interval between draft snapshots.
    pub draft_interval_secs: u64,
    /// Whether the live conversational interviewer is enabled. When
    /// false, the scripted follow-up generator handles every turn.
    pub live_interviewer_enabled: bool,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            warning_after_secs: 25 * 60,
            hard_limit_secs: 30 * 60,
            warmup_shortcut_responses: 2,
            draft_interval_secs: 60,
            live_interviewer_enabled: true,
        }
    }
}

impl InterviewConfig {
    pub fn warning_after(&self) -> Duration {
        Duration::from_secs(self.warning_after_secs)
    }

    pub fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.hard_limit_secs)
    }

    pub fn draft_interval(&self) -> Duration {
        Duration::from_secs(self.draft_interval_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct DraftConfig {
    /// Directory holding one draft file per narrator account.
    pub path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interview_defaults() {
        let cfg = InterviewConfig::default();
        assert_eq!(cfg.warning_after(), Duration::from_secs(1500));
        assert_eq!(cfg.hard_limit(), Duration::from_secs(1800));
        assert_eq!(cfg.warmup_shortcut_responses, 2);
        assert_eq!(cfg.draft_interval(), Duration::from_secs(60));
    }
}
