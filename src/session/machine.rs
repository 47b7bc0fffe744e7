use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collab::{DetectedStory, SplitFile};
use crate::config::InterviewConfig;
use crate::draft::Draft;
use crate::error::SessionError;
use crate::session::event::{Effect, SessionEvent};
use crate::session::message::{full_transcript, AudioRef, Message};
use crate::session::phase::Phase;
use crate::session::theme::{deferred_theme, Theme};

/// The interview state machine.
///
/// A pure event-intake object: `apply` consumes one event, mutates the
/// phase/message log, and returns the side effects its owner must run.
/// It performs no I/O and is never touched from two tasks at once; the
/// runner processes events strictly one at a time.
pub struct InterviewMachine {
    id: Uuid,
    account_id: String,
    config: InterviewConfig,
    phase: Phase,
    /// Set once when recording begins; immutable thereafter.
    started_at: Option<DateTime<Utc>>,
    /// Set once during theme selection; immutable after.
    theme: Option<Theme>,
    /// Append-only during an active session.
    messages: Vec<Message>,
    /// Icebreaker questions asked so far.
    warmup_asked: usize,
    /// Narrator responses during warmup.
    warmup_responses: usize,
    /// One in-flight interviewer reply at a time.
    composing: bool,
    /// The warning threshold fires once.
    warned: bool,
    /// Analyzer output, held between analysis and completion.
    detected: Vec<DetectedStory>,
    last_narrator_text: Option<String>,
    /// Elapsed time carried over from a resumed draft.
    resume_offset: Duration,
    main_narrator_turns: usize,
    main_interviewer_turns: usize,
}

impl InterviewMachine {
    /// Fresh session starting at theme selection.
    pub fn new(account_id: impl Into<String>, config: InterviewConfig) -> Self {
        Self::build(account_id.into(), config, Phase::ThemeSelection, None)
    }

    /// Session with a pre-selected topic supplied out of band: theme
    /// selection is skipped entirely and the machine enters `Main`.
    pub fn with_theme(account_id: impl Into<String>, config: InterviewConfig, theme: Theme) -> Self {
        Self::build(account_id.into(), config, Phase::Main, Some(theme))
    }

    /// Reconstruct a session from a draft: directly in `Main`, warmup
    /// not re-entered, clock seeded from the snapshot.
    pub fn resume(account_id: impl Into<String>, config: InterviewConfig, draft: Draft) -> Self {
        let mut machine = Self::build(account_id.into(), config, Phase::Main, draft.theme);
        machine.id = draft.session_id;
        machine.messages = draft.messages;
        machine.resume_offset = Duration::from_secs(draft.elapsed_seconds);
        machine.last_narrator_text = machine
            .messages
            .iter()
            .rev()
            .find(|m| m.is_narrator_response() && !m.content.is_empty())
            .map(|m| m.content.clone());
        machine
    }

    fn build(account_id: String, config: InterviewConfig, phase: Phase, theme: Option<Theme>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            config,
            phase,
            started_at: None,
            theme,
            messages: Vec::new(),
            warmup_asked: 0,
            warmup_responses: 0,
            composing: false,
            warned: false,
            detected: Vec::new(),
            last_narrator_text: None,
            resume_offset: Duration::ZERO,
            main_narrator_turns: 0,
            main_interviewer_turns: 0,
        }
    }

    /// Effects to run when the owner takes over a freshly constructed
    /// machine. Sessions that skip theme selection start their clock
    /// here; a plain session waits for the theme choice.
    pub fn bootstrap(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::ThemeSelection => Vec::new(),
            Phase::Main => {
                self.started_at = Some(Utc::now());
                let mut effects = vec![Effect::StartTimer {
                    offset: self.resume_offset,
                }];

                if self.messages.is_empty() {
                    // Pre-selected topic: open with its first question.
                    if let Some(question) = self.theme.as_ref().and_then(|t| t.icebreakers.first())
                    {
                        self.messages.push(Message::question(question.clone()));
                    }
                } else {
                    self.messages
                        .push(Message::status("Welcome back. Picking up where you left off."));
                    effects.push(Effect::AskInterviewer {
                        narrator_text: self.last_narrator_text.clone().unwrap_or_default(),
                    });
                    self.composing = true;
                }

                effects
            }
            other => {
                debug!("bootstrap in unexpected phase {:?}", other);
                Vec::new()
            }
        }
    }

    /// Process one event. Never called re-entrantly; the runner is the
    /// single owner.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.phase.is_terminal() {
            debug!(
                "Ignoring {} in terminal phase {:?}",
                event.name(),
                self.phase
            );
            return Vec::new();
        }

        match event {
            SessionEvent::CancelRequested => self.cancel(),
            SessionEvent::ThemeChosen(theme) => self.on_theme_chosen(theme),
            SessionEvent::NarratorSpoke { audio_ref } => self.on_narrator_spoke(audio_ref),
            SessionEvent::NarratorTyped(text) => self.on_narrator_typed(text),
            SessionEvent::TranscriptArrived { message_id, text } => {
                self.on_transcript_arrived(message_id, text)
            }
            SessionEvent::ComposingStarted => self.on_composing_started(),
            SessionEvent::InterviewerSaid(text) => self.on_interviewer_said(text),
            SessionEvent::InterviewerErrored(error) => self.on_interviewer_errored(error),
            SessionEvent::RetryInterviewer => self.on_retry_interviewer(),
            SessionEvent::TimerWarning => self.on_timer_warning(),
            SessionEvent::TimerExpired => {
                info!("Hard limit reached; forcing the completion path");
                self.begin_finish()
            }
            SessionEvent::FinishRequested => self.begin_finish(),
            SessionEvent::SplitChoice { split } => self.on_split_choice(split),
            SessionEvent::AnalysisDone { session_id, stories } => {
                self.on_analysis_done(session_id, stories)
            }
            SessionEvent::AnalysisFailed { session_id, error } => {
                self.on_analysis_failed(session_id, error)
            }
            SessionEvent::SplitDone { session_id, files } => self.on_split_done(session_id, files),
            SessionEvent::SplitFailed { session_id, error } => {
                self.on_split_failed(session_id, error)
            }
            SessionEvent::DraftTick => self.on_draft_tick(),
        }
    }

    // ------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------

    fn on_theme_chosen(&mut self, theme: Option<Theme>) -> Vec<Effect> {
        if self.phase != Phase::ThemeSelection {
            return self.reject("theme-chosen");
        }

        let theme = theme.unwrap_or_else(deferred_theme);
        info!("Theme selected: {}", theme.title);
        self.theme = Some(theme);
        self.started_at = Some(Utc::now());
        self.phase = Phase::Warmup;

        self.ask_next_icebreaker();

        vec![Effect::StartTimer {
            offset: Duration::ZERO,
        }]
    }

    fn on_narrator_spoke(&mut self, audio_ref: Option<AudioRef>) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Warmup | Phase::Main) {
            return self.reject("narrator-spoke");
        }

        self.messages
            .push(Message::spoken_answer(audio_ref.unwrap_or(AudioRef(0))));
        self.on_narrator_response()
    }

    fn on_narrator_typed(&mut self, text: String) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Warmup | Phase::Main) {
            return self.reject("narrator-typed");
        }

        self.last_narrator_text = Some(text.clone());
        self.messages.push(Message::typed_answer(text));
        self.on_narrator_response()
    }

    /// Shared narrator-turn logic for spoken and typed answers.
    fn on_narrator_response(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Warmup => {
                self.warmup_responses += 1;

                let icebreakers = self
                    .theme
                    .as_ref()
                    .map(|t| t.icebreakers.len())
                    .unwrap_or(0);
                let shortcut = self.warmup_responses >= self.config.warmup_shortcut_responses;
                let exhausted = self.warmup_asked >= icebreakers;

                if shortcut || exhausted {
                    info!(
                        "Warmup complete after {} responses ({}); entering main interview",
                        self.warmup_responses,
                        if shortcut { "shortcut" } else { "exhausted" }
                    );
                    self.phase = Phase::Main;
                    self.main_narrator_turns += 1;
                    self.composing = true;
                    vec![Effect::AskInterviewer {
                        narrator_text: self.last_narrator_text.clone().unwrap_or_default(),
                    }]
                } else {
                    self.ask_next_icebreaker();
                    Vec::new()
                }
            }
            Phase::Main => {
                self.main_narrator_turns += 1;
                if self.composing {
                    // One outstanding interviewer reply at a time.
                    debug!("Interviewer reply already in flight; not issuing another request");
                    Vec::new()
                } else {
                    self.composing = true;
                    vec![Effect::AskInterviewer {
                        narrator_text: self.last_narrator_text.clone().unwrap_or_default(),
                    }]
                }
            }
            _ => Vec::new(),
        }
    }

    fn on_transcript_arrived(&mut self, message_id: Uuid, text: String) -> Vec<Effect> {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) if msg.content.is_empty() => {
                msg.content = text.clone();
                self.last_narrator_text = Some(text);
            }
            Some(_) => {
                // Backfill happens exactly once.
                warn!("Transcript for message {} already filled; ignoring", message_id);
            }
            None => {
                warn!("Transcript for unknown message {}; ignoring", message_id);
            }
        }
        Vec::new()
    }

    fn on_composing_started(&mut self) -> Vec<Effect> {
        if self.composing {
            // Duplicate indicator guard.
            debug!("Composing indicator already shown");
        } else {
            self.composing = true;
        }
        Vec::new()
    }

    fn on_interviewer_said(&mut self, text: String) -> Vec<Effect> {
        self.composing = false;

        if !matches!(self.phase, Phase::Warmup | Phase::Main) {
            return self.reject("interviewer-said");
        }

        self.messages.push(Message::question(text));
        if self.phase == Phase::Main {
            self.main_interviewer_turns += 1;
        }
        Vec::new()
    }

    fn on_interviewer_errored(&mut self, error: String) -> Vec<Effect> {
        // Recoverable: phase unchanged, accumulated messages kept.
        self.composing = false;
        warn!("Interviewer connection error: {}", error);
        vec![Effect::SurfaceError(SessionError::ConnectionLost(error))]
    }

    fn on_retry_interviewer(&mut self) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Warmup | Phase::Main) || self.composing {
            return Vec::new();
        }

        self.composing = true;
        vec![Effect::AskInterviewer {
            narrator_text: self.last_narrator_text.clone().unwrap_or_default(),
        }]
    }

    fn on_timer_warning(&mut self) -> Vec<Effect> {
        if self.warned {
            return Vec::new();
        }
        self.warned = true;
        self.messages.push(Message::status(
            "Just a few minutes left. A good moment to wrap up this story.",
        ));
        Vec::new()
    }

    /// Explicit finish or hard limit: both run Analyzing through
    /// Completed so the narrator's work is never lost.
    fn begin_finish(&mut self) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Warmup | Phase::Main) {
            debug!("Finish requested in {:?}; already finishing", self.phase);
            return Vec::new();
        }

        let transcript = full_transcript(&self.messages);
        self.phase = Phase::Analyzing;
        self.composing = false;
        self.messages
            .push(Message::status("Looking through your conversation..."));

        vec![
            Effect::FinalizeCapture,
            Effect::RunAnalysis { transcript },
        ]
    }

    fn on_analysis_done(&mut self, session_id: Uuid, stories: Vec<DetectedStory>) -> Vec<Effect> {
        if !self.accept_result(session_id, Phase::Analyzing, "analysis") {
            return Vec::new();
        }

        info!("Analysis detected {} stories", stories.len());
        self.detected = stories;

        if self.detected.len() >= 2 {
            self.phase = Phase::SplitDecision;
            self.messages.push(Message::status(format!(
                "It sounds like you shared {} separate stories.",
                self.detected.len()
            )));
            Vec::new()
        } else {
            self.complete_single()
        }
    }

    fn on_analysis_failed(&mut self, session_id: Uuid, error: String) -> Vec<Effect> {
        if !self.accept_result(session_id, Phase::Analyzing, "analysis") {
            return Vec::new();
        }

        // Degraded, not fatal: treated as zero detected stories.
        warn!("Transcript analysis failed ({}); completing as one story", error);
        self.detected.clear();
        self.complete_single()
    }

    fn on_split_choice(&mut self, split: bool) -> Vec<Effect> {
        if self.phase != Phase::SplitDecision {
            return self.reject("split-choice");
        }

        self.messages.push(Message::option_set(
            if split { "Split into separate stories" } else { "Keep as one story" },
            Some(if split { 1 } else { 0 }),
        ));

        if split {
            self.phase = Phase::Splitting;
            let transcript_len = full_transcript(&self.messages).len();
            vec![Effect::RunSplit {
                stories: self.detected.clone(),
                transcript_len,
            }]
        } else {
            // Keep only the first detected story's cleaned text.
            self.complete_single()
        }
    }

    fn on_split_done(&mut self, session_id: Uuid, files: Vec<SplitFile>) -> Vec<Effect> {
        if !self.accept_result(session_id, Phase::Splitting, "split") {
            return Vec::new();
        }

        self.phase = Phase::Completed;
        vec![
            Effect::StopTimer,
            Effect::DeleteDraft,
            Effect::CompleteSplit {
                stories: self.detected.clone(),
                files,
            },
        ]
    }

    fn on_split_failed(&mut self, session_id: Uuid, error: String) -> Vec<Effect> {
        if !self.accept_result(session_id, Phase::Splitting, "split") {
            return Vec::new();
        }

        // Recoverable: degrade to the single-story path rather than
        // leaving the narrator stuck.
        warn!("Audio split failed ({}); completing as one story", error);
        self.complete_single()
    }

    fn on_draft_tick(&mut self) -> Vec<Effect> {
        let has_response = self.messages.iter().any(Message::is_narrator_response);
        if self.phase.is_active() && has_response {
            vec![Effect::SaveDraft]
        } else {
            Vec::new()
        }
    }

    // ------------------------------------------------------------------
    // Transitions shared by several handlers
    // ------------------------------------------------------------------

    /// The single completion exit point for every one-story path:
    /// direct (≤1 detected), keep-as-one, and the analysis/split
    /// failure fallbacks.
    fn complete_single(&mut self) -> Vec<Effect> {
        let (title, text) = match self.detected.first() {
            Some(story) => (story.title.clone(), story.bridged_text.clone()),
            None => {
                let title = self
                    .theme
                    .as_ref()
                    .map(|t| t.title.clone())
                    .unwrap_or_else(|| "My Story".to_string());
                (title, full_transcript(&self.messages))
            }
        };

        self.phase = Phase::Completed;
        vec![
            Effect::StopTimer,
            Effect::DeleteDraft,
            Effect::CompleteSingle { title, text },
        ]
    }

    /// Cancellation teardown, in the required order: stop timer,
    /// discard capture, delete draft, then the terminal phase.
    fn cancel(&mut self) -> Vec<Effect> {
        info!("Session {} cancelled from {:?}", self.id, self.phase);
        self.phase = Phase::Cancelled;
        vec![
            Effect::StopTimer,
            Effect::DiscardCapture,
            Effect::DeleteDraft,
        ]
    }

    /// Identity-then-phase check for asynchronous collaborator
    /// results. Identity, not phase, decides whether a result belongs
    /// to this session; the phase check catches duplicates.
    fn accept_result(&self, session_id: Uuid, expected: Phase, what: &str) -> bool {
        if session_id != self.id {
            debug!("Dropping {} result for foreign session {}", what, session_id);
            return false;
        }
        if self.phase != expected {
            debug!(
                "Dropping {} result in phase {:?} (expected {:?})",
                what, self.phase, expected
            );
            return false;
        }
        true
    }

    fn ask_next_icebreaker(&mut self) {
        let question = self
            .theme
            .as_ref()
            .and_then(|t| t.icebreakers.get(self.warmup_asked).cloned());
        if let Some(question) = question {
            self.messages.push(Message::question(question));
            self.warmup_asked += 1;
        }
    }

    fn reject(&self, event: &'static str) -> Vec<Effect> {
        warn!("Event {} not valid in phase {:?}", event, self.phase);
        Vec::new()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn theme(&self) -> Option<&Theme> {
        self.theme.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn detected_stories(&self) -> &[DetectedStory] {
        &self.detected
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn resume_offset(&self) -> Duration {
        self.resume_offset
    }

    pub fn main_turn_counts(&self) -> (usize, usize) {
        (self.main_narrator_turns, self.main_interviewer_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::MessageKind;
    use crate::session::theme::builtin_themes;

    fn config() -> InterviewConfig {
        InterviewConfig::default()
    }

    fn machine_in_main() -> InterviewMachine {
        let mut m = InterviewMachine::new("acct", config());
        m.apply(SessionEvent::ThemeChosen(Some(builtin_themes().remove(0))));
        m.apply(SessionEvent::NarratorTyped("answer one".into()));
        let effects = m.apply(SessionEvent::NarratorTyped("answer two".into()));
        assert!(matches!(effects[0], Effect::AskInterviewer { .. }));
        m.apply(SessionEvent::InterviewerSaid("and then?".into()));
        assert_eq!(m.phase(), Phase::Main);
        m
    }

    #[test]
    fn theme_choice_starts_timer_and_warmup() {
        let mut m = InterviewMachine::new("acct", config());
        assert_eq!(m.phase(), Phase::ThemeSelection);

        let effects = m.apply(SessionEvent::ThemeChosen(Some(builtin_themes().remove(0))));
        assert!(matches!(effects[0], Effect::StartTimer { offset } if offset.is_zero()));
        assert_eq!(m.phase(), Phase::Warmup);
        assert!(m.started_at().is_some());
        // First icebreaker asked immediately.
        assert_eq!(m.messages().len(), 1);
        assert_eq!(m.messages()[0].kind, MessageKind::Question);
    }

    #[test]
    fn deferring_theme_still_enters_warmup() {
        let mut m = InterviewMachine::new("acct", config());
        m.apply(SessionEvent::ThemeChosen(None));
        assert_eq!(m.phase(), Phase::Warmup);
        assert!(m.theme().is_some());
    }

    #[test]
    fn preselected_theme_skips_to_main() {
        let mut m = InterviewMachine::with_theme("acct", config(), builtin_themes().remove(0));
        let effects = m.bootstrap();
        assert_eq!(m.phase(), Phase::Main);
        assert!(matches!(effects[0], Effect::StartTimer { .. }));
        assert_eq!(m.messages().len(), 1, "opens with a question");
    }

    #[test]
    fn warmup_shortcut_after_two_responses_on_long_theme() {
        // Theme with 5 icebreakers; shortcut threshold is 2.
        let theme = builtin_themes().remove(0);
        assert_eq!(theme.icebreakers.len(), 5);

        let mut m = InterviewMachine::new("acct", config());
        m.apply(SessionEvent::ThemeChosen(Some(theme)));

        m.apply(SessionEvent::NarratorTyped("first".into()));
        assert_eq!(m.phase(), Phase::Warmup);

        m.apply(SessionEvent::NarratorTyped("second".into()));
        assert_eq!(m.phase(), Phase::Main);

        let responses: Vec<_> = m
            .messages()
            .iter()
            .filter(|msg| msg.is_narrator_response())
            .collect();
        assert_eq!(responses.len(), 2);
    }

    #[test]
    fn warmup_exhaustion_exit() {
        let theme = Theme::new("short", "Short", vec!["only question?".to_string()]);
        let mut m = InterviewMachine::new(
            "acct",
            InterviewConfig {
                warmup_shortcut_responses: 10,
                ..config()
            },
        );
        m.apply(SessionEvent::ThemeChosen(Some(theme)));
        m.apply(SessionEvent::NarratorTyped("done".into()));
        assert_eq!(m.phase(), Phase::Main);
    }

    #[test]
    fn main_turn_parity() {
        let mut m = machine_in_main();

        for i in 0..5 {
            m.apply(SessionEvent::NarratorTyped(format!("turn {}", i)));
            m.apply(SessionEvent::InterviewerSaid(format!("question {}", i)));
        }

        let (narrator, interviewer) = m.main_turn_counts();
        // The warmup-exit turn also produced one interviewer reply.
        assert_eq!(narrator, interviewer);
    }

    #[test]
    fn composing_guard_is_idempotent() {
        let mut m = machine_in_main();

        let effects = m.apply(SessionEvent::NarratorTyped("story".into()));
        assert_eq!(effects.len(), 1);
        assert!(m.is_composing());

        // Second request while one is outstanding: no new ask.
        let effects = m.apply(SessionEvent::NarratorTyped("more".into()));
        assert!(effects.is_empty());

        // Duplicate composing indicator is a no-op.
        m.apply(SessionEvent::ComposingStarted);
        assert!(m.is_composing());

        m.apply(SessionEvent::InterviewerSaid("go on".into()));
        assert!(!m.is_composing());
    }

    #[test]
    fn spoken_answer_backfills_exactly_once() {
        let mut m = machine_in_main();
        m.apply(SessionEvent::NarratorSpoke {
            audio_ref: Some(AudioRef(480)),
        });

        let id = m
            .messages()
            .iter()
            .rev()
            .find(|msg| msg.kind == MessageKind::SpokenAnswer)
            .unwrap()
            .id;

        m.apply(SessionEvent::TranscriptArrived {
            message_id: id,
            text: "what I said".into(),
        });
        m.apply(SessionEvent::TranscriptArrived {
            message_id: id,
            text: "overwrite attempt".into(),
        });

        let msg = m.messages().iter().find(|msg| msg.id == id).unwrap();
        assert_eq!(msg.content, "what I said");
    }

    #[test]
    fn finish_runs_analysis_with_transcript() {
        let mut m = machine_in_main();
        let effects = m.apply(SessionEvent::FinishRequested);

        assert_eq!(m.phase(), Phase::Analyzing);
        assert!(matches!(effects[0], Effect::FinalizeCapture));
        match &effects[1] {
            Effect::RunAnalysis { transcript } => {
                assert!(transcript.contains("Narrator: answer one"));
            }
            other => panic!("expected RunAnalysis, got {:?}", other),
        }
    }

    #[test]
    fn hard_limit_takes_the_same_path_as_finish() {
        let mut m = machine_in_main();
        let effects = m.apply(SessionEvent::TimerExpired);
        assert_eq!(m.phase(), Phase::Analyzing);
        assert!(matches!(effects[1], Effect::RunAnalysis { .. }));
    }

    fn detected(n: usize) -> Vec<DetectedStory> {
        (0..n)
            .map(|i| DetectedStory {
                title: format!("Story {}", i),
                summary: "s".into(),
                bridged_text: format!("text {}", i),
                start_index: i * 100,
                end_index: (i + 1) * 100,
                start_time: None,
                end_time: None,
            })
            .collect()
    }

    #[test]
    fn zero_or_one_story_never_reaches_split_decision() {
        for n in [0usize, 1] {
            let mut m = machine_in_main();
            let id = m.id();
            m.apply(SessionEvent::FinishRequested);
            let effects = m.apply(SessionEvent::AnalysisDone {
                session_id: id,
                stories: detected(n),
            });

            assert_eq!(m.phase(), Phase::Completed);
            assert!(effects
                .iter()
                .any(|e| matches!(e, Effect::CompleteSingle { .. })));
        }
    }

    #[test]
    fn two_stories_reach_split_decision() {
        let mut m = machine_in_main();
        let id = m.id();
        m.apply(SessionEvent::FinishRequested);
        m.apply(SessionEvent::AnalysisDone {
            session_id: id,
            stories: detected(2),
        });
        assert_eq!(m.phase(), Phase::SplitDecision);
    }

    #[test]
    fn keep_as_one_uses_first_story_text() {
        let mut m = machine_in_main();
        let id = m.id();
        m.apply(SessionEvent::FinishRequested);
        m.apply(SessionEvent::AnalysisDone {
            session_id: id,
            stories: detected(3),
        });

        let effects = m.apply(SessionEvent::SplitChoice { split: false });
        match effects
            .iter()
            .find(|e| matches!(e, Effect::CompleteSingle { .. }))
        {
            Some(Effect::CompleteSingle { title, text }) => {
                assert_eq!(title, "Story 0");
                assert_eq!(text, "text 0");
            }
            _ => panic!("expected single completion"),
        }
        assert_eq!(m.phase(), Phase::Completed);
    }

    #[test]
    fn split_choice_runs_splitter() {
        let mut m = machine_in_main();
        let id = m.id();
        m.apply(SessionEvent::FinishRequested);
        m.apply(SessionEvent::AnalysisDone {
            session_id: id,
            stories: detected(2),
        });

        let effects = m.apply(SessionEvent::SplitChoice { split: true });
        assert_eq!(m.phase(), Phase::Splitting);
        assert!(matches!(effects[0], Effect::RunSplit { .. }));
    }

    #[test]
    fn split_failure_degrades_to_single_story() {
        let mut m = machine_in_main();
        let id = m.id();
        m.apply(SessionEvent::FinishRequested);
        m.apply(SessionEvent::AnalysisDone {
            session_id: id,
            stories: detected(2),
        });
        m.apply(SessionEvent::SplitChoice { split: true });

        let effects = m.apply(SessionEvent::SplitFailed {
            session_id: id,
            error: "service down".into(),
        });

        assert_eq!(m.phase(), Phase::Completed);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CompleteSingle { .. })));
    }

    #[test]
    fn analysis_failure_degrades_to_single_story() {
        let mut m = machine_in_main();
        let id = m.id();
        m.apply(SessionEvent::FinishRequested);
        let effects = m.apply(SessionEvent::AnalysisFailed {
            session_id: id,
            error: "timeout".into(),
        });

        assert_eq!(m.phase(), Phase::Completed);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CompleteSingle { .. })));
    }

    #[test]
    fn results_for_a_different_session_are_dropped() {
        let mut m = machine_in_main();
        m.apply(SessionEvent::FinishRequested);

        let effects = m.apply(SessionEvent::AnalysisDone {
            session_id: Uuid::new_v4(),
            stories: detected(2),
        });

        assert!(effects.is_empty());
        assert_eq!(m.phase(), Phase::Analyzing);
    }

    #[test]
    fn cancellation_order_from_any_phase() {
        let phases: Vec<Box<dyn Fn() -> InterviewMachine>> = vec![
            Box::new(|| InterviewMachine::new("a", config())),
            Box::new(machine_in_main),
            Box::new(|| {
                let mut m = machine_in_main();
                m.apply(SessionEvent::FinishRequested);
                m
            }),
        ];

        for build in phases {
            let mut m = build();
            let effects = m.apply(SessionEvent::CancelRequested);

            assert_eq!(m.phase(), Phase::Cancelled);
            assert!(matches!(effects[0], Effect::StopTimer));
            assert!(matches!(effects[1], Effect::DiscardCapture));
            assert!(matches!(effects[2], Effect::DeleteDraft));
        }
    }

    #[test]
    fn terminal_phase_ignores_everything() {
        let mut m = machine_in_main();
        m.apply(SessionEvent::CancelRequested);

        assert!(m.apply(SessionEvent::NarratorTyped("hello?".into())).is_empty());
        assert!(m.apply(SessionEvent::FinishRequested).is_empty());
        assert_eq!(m.phase(), Phase::Cancelled);
    }

    #[test]
    fn warning_fires_once() {
        let mut m = machine_in_main();
        let before = m.messages().len();
        m.apply(SessionEvent::TimerWarning);
        m.apply(SessionEvent::TimerWarning);
        assert_eq!(m.messages().len(), before + 1);
    }

    #[test]
    fn connection_error_keeps_phase_and_messages() {
        let mut m = machine_in_main();
        m.apply(SessionEvent::NarratorTyped("my story".into()));
        let count = m.messages().len();

        let effects = m.apply(SessionEvent::InterviewerErrored("socket closed".into()));

        assert_eq!(m.phase(), Phase::Main);
        assert_eq!(m.messages().len(), count);
        assert!(!m.is_composing());
        assert!(matches!(
            effects[0],
            Effect::SurfaceError(SessionError::ConnectionLost(_))
        ));

        // Retry re-issues the request once.
        let effects = m.apply(SessionEvent::RetryInterviewer);
        assert!(matches!(effects[0], Effect::AskInterviewer { .. }));
        assert!(m.apply(SessionEvent::RetryInterviewer).is_empty());
    }

    #[test]
    fn draft_tick_requires_a_narrator_response() {
        let mut m = InterviewMachine::new("acct", config());
        m.apply(SessionEvent::ThemeChosen(Some(builtin_themes().remove(0))));

        assert!(m.apply(SessionEvent::DraftTick).is_empty());

        m.apply(SessionEvent::NarratorTyped("first answer".into()));
        let effects = m.apply(SessionEvent::DraftTick);
        assert!(matches!(effects[0], Effect::SaveDraft));
    }

    #[test]
    fn resume_restores_messages_and_offset() {
        let mut original = machine_in_main();
        original.apply(SessionEvent::NarratorTyped("before crash".into()));

        let draft = Draft::snapshot(
            original.id(),
            original.messages(),
            original.theme(),
            300,
        );

        let mut resumed = InterviewMachine::resume("acct", config(), draft);
        assert_eq!(resumed.phase(), Phase::Main);
        assert_eq!(resumed.id(), original.id());
        assert_eq!(resumed.messages().len(), original.messages().len());
        assert_eq!(resumed.resume_offset(), Duration::from_secs(300));

        let effects = resumed.bootstrap();
        assert!(matches!(
            effects[0],
            Effect::StartTimer { offset } if offset == Duration::from_secs(300)
        ));
    }

    #[test]
    fn empty_narrator_hard_limit_still_completes() {
        // Hard limit fires before the narrator said anything in Main.
        let mut m = InterviewMachine::with_theme("acct", config(), builtin_themes().remove(0));
        m.bootstrap();
        let id = m.id();

        let effects = m.apply(SessionEvent::TimerExpired);
        match &effects[1] {
            Effect::RunAnalysis { transcript } => {
                assert!(!transcript.contains("Narrator:"));
            }
            other => panic!("expected RunAnalysis, got {:?}", other),
        }

        let effects = m.apply(SessionEvent::AnalysisDone {
            session_id: id,
            stories: Vec::new(),
        });
        assert_eq!(m.phase(), Phase::Completed);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CompleteSingle { .. })));
    }
}
